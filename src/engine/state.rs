use super::debounce::AlarmTracker;
use super::detector;
use super::types::Alert;
use crate::report::{ReportDue, ReportSchedule, ReportTime};
use crate::status::Snapshot;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::time::Duration;

/// All mutable monitoring state for the process lifetime.
///
/// Owned behind one mutex; the monitor, the report scheduler and the
/// command handler all go through it.
#[derive(Debug)]
pub struct EngineState {
    last_snapshot: Option<Snapshot>,
    initialized: bool,
    generation: u64,
    alarms: AlarmTracker,
    reports: ReportSchedule,
}

impl EngineState {
    pub fn new(report_times: &[ReportTime]) -> Self {
        Self {
            last_snapshot: None,
            initialized: false,
            generation: 0,
            alarms: AlarmTracker::new(),
            reports: ReportSchedule::new(report_times),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Bumped by every [`initialize`](Self::initialize). A poll that started
    /// under an older generation must not replace the new baseline.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn alarms(&self) -> &AlarmTracker {
        &self.alarms
    }

    pub fn reports(&self) -> &ReportSchedule {
        &self.reports
    }

    /// Seeds the comparison baseline and starts alerting.
    pub fn initialize(&mut self, snapshot: Snapshot) {
        self.last_snapshot = Some(snapshot);
        self.initialized = true;
        self.generation += 1;
    }

    /// Runs change detection and alarm debouncing for one poll, then accepts
    /// `current` as the new baseline. Returns nothing before initialization.
    pub fn observe(
        &mut self,
        current: Snapshot,
        now: DateTime<Utc>,
        poll_interval: Duration,
    ) -> Vec<Alert> {
        if !self.initialized {
            return Vec::new();
        }
        let mut alerts = detector::diff(self.last_snapshot.as_ref(), &current);
        alerts.extend(self.alarms.tick(&current, now, poll_interval));
        self.last_snapshot = Some(current);
        alerts
    }

    /// Like [`observe`](Self::observe) for a snapshot fetched while the engine
    /// was at `generation`. Returns `None` and leaves the state untouched when
    /// an initialize happened in between.
    pub fn observe_from(
        &mut self,
        generation: u64,
        current: Snapshot,
        now: DateTime<Utc>,
        poll_interval: Duration,
    ) -> Option<Vec<Alert>> {
        if generation != self.generation {
            return None;
        }
        Some(self.observe(current, now, poll_interval))
    }

    pub fn due_reports(&mut self, now_local: NaiveDateTime) -> Vec<ReportDue> {
        self.reports.evaluate(now_local)
    }
}
