use super::types::Alert;
use crate::status::Snapshot;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

pub const ALARM_REPEAT_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct AlarmEntry {
    started_at: DateTime<Utc>,
    last_warned_window: u64,
}

/// Tracks how long each binary input has continuously reported alarm.
///
/// An entry exists for a name exactly while its latest observed status is
/// alarm. A name missing from a poll, or reported as a sensor, drops its
/// entry. The repeat check is a tolerance window around each multiple of
/// [`ALARM_REPEAT_INTERVAL`] (`elapsed % interval <= poll_interval`), so a
/// poll that lands outside every window skips that warning entirely. Each
/// window warns at most once.
#[derive(Debug, Default)]
pub struct AlarmTracker {
    entries: HashMap<String, AlarmEntry>,
}

impl AlarmTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn started_at(&self, name: &str) -> Option<DateTime<Utc>> {
        self.entries.get(name).map(|entry| entry.started_at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tick(
        &mut self,
        current: &Snapshot,
        now: DateTime<Utc>,
        poll_interval: Duration,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let repeat_secs = ALARM_REPEAT_INTERVAL.as_secs_f64();
        let tolerance_secs = poll_interval.as_secs_f64();

        for input in current.binary_inputs() {
            if !input.is_alarm() {
                if self.entries.remove(&input.name).is_some() {
                    tracing::debug!(name = %input.name, "alarm cleared");
                }
                continue;
            }

            let Some(entry) = self.entries.get_mut(&input.name) else {
                tracing::debug!(name = %input.name, "alarm started");
                self.entries.insert(
                    input.name.clone(),
                    AlarmEntry {
                        started_at: now,
                        last_warned_window: 0,
                    },
                );
                continue;
            };

            let elapsed_secs = (now - entry.started_at).num_milliseconds().max(0) as f64 / 1000.0;
            if elapsed_secs < repeat_secs || elapsed_secs % repeat_secs > tolerance_secs {
                continue;
            }
            let window = (elapsed_secs / repeat_secs).floor() as u64;
            if window <= entry.last_warned_window {
                continue;
            }
            entry.last_warned_window = window;
            alerts.push(Alert::AlarmPersisting {
                name: input.name.clone(),
                status: input.status.clone(),
                elapsed: Duration::from_secs_f64(elapsed_secs),
            });
        }

        self.entries.retain(|name, _| {
            let present = current.binary_inputs().any(|input| &input.name == name);
            if !present {
                tracing::debug!(name = %name, "alarm input no longer reported");
            }
            present
        });
        alerts
    }
}
