use crate::engine::{Alert, SharedEngine};
use crate::fetcher::{FetchError, StatusSource};
use crate::format;
use crate::notifier::Notifier;
use crate::status::{self, Snapshot};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

#[derive(Debug, PartialEq)]
pub enum PollOutcome {
    /// Not initialized yet; nothing fetched.
    Idle,
    FetchFailed,
    /// Re-initialized while the fetch was in flight; the result was dropped.
    Superseded,
    Observed { alerts: Vec<Alert> },
}

/// Handle shared by the poll loop, the report scheduler and the command
/// handler. Cloning is cheap; every clone points at the same engine state.
pub struct Monitor<S, N> {
    source: Arc<S>,
    notifier: Arc<N>,
    engine: SharedEngine,
    output_name: Arc<str>,
    poll_interval: Duration,
    timezone: Tz,
}

impl<S, N> Clone for Monitor<S, N> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            notifier: self.notifier.clone(),
            engine: self.engine.clone(),
            output_name: self.output_name.clone(),
            poll_interval: self.poll_interval,
            timezone: self.timezone,
        }
    }
}

impl<S: StatusSource, N: Notifier> Monitor<S, N> {
    pub fn new(
        source: Arc<S>,
        notifier: Arc<N>,
        engine: SharedEngine,
        output_name: &str,
        poll_interval: Duration,
        timezone: Tz,
    ) -> Self {
        Self {
            source,
            notifier,
            engine,
            output_name: Arc::from(output_name),
            poll_interval,
            timezone,
        }
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        let doc = self.source.fetch().await?;
        Ok(status::parse(&doc, &self.output_name))
    }

    /// Seeds the baseline from one fresh fetch and switches alerting on.
    /// A failed fetch leaves the engine untouched.
    pub async fn initialize(&self) -> Result<(), FetchError> {
        let snapshot = self.fetch_snapshot().await?;
        let readings = snapshot.readings().len();
        let mut engine = self.engine.lock().await;
        let reinitialized = engine.last_snapshot().is_some();
        engine.initialize(snapshot);
        tracing::info!(readings, reinitialized, "monitoring initialized");
        Ok(())
    }

    /// Current state formatted for display. Never touches engine state.
    pub async fn status(&self) -> Result<String, FetchError> {
        let snapshot = self.fetch_snapshot().await?;
        Ok(format::status_reply(&snapshot, &self.output_name))
    }

    pub async fn poll_once(&self) -> PollOutcome {
        self.poll_at(Utc::now()).await
    }

    pub(crate) async fn poll_at(&self, now: DateTime<Utc>) -> PollOutcome {
        let generation = {
            let engine = self.engine.lock().await;
            if !engine.is_initialized() {
                return PollOutcome::Idle;
            }
            engine.generation()
        };

        let snapshot = match self.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(error = %err, "status poll failed");
                return PollOutcome::FetchFailed;
            }
        };

        let alerts = {
            let mut engine = self.engine.lock().await;
            let Some(alerts) = engine.observe_from(generation, snapshot, now, self.poll_interval) else {
                tracing::debug!("baseline replaced during poll; dropping stale snapshot");
                return PollOutcome::Superseded;
            };
            tracing::debug!(alerts = alerts.len(), active_alarms = engine.alarms().len(), "poll observed");
            alerts
        };
        self.dispatch(&alerts).await;
        PollOutcome::Observed { alerts }
    }

    pub async fn dispatch(&self, alerts: &[Alert]) {
        for alert in alerts {
            let text = format::alert_message(alert);
            match self.notifier.send(&text, true).await {
                Ok(()) => tracing::info!(kind = alert.kind(), subject = alert.subject(), "alert sent"),
                Err(err) => tracing::warn!(
                    kind = alert.kind(),
                    subject = alert.subject(),
                    error = %err,
                    "alert delivery failed"
                ),
            }
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            interval_secs = self.poll_interval.as_secs_f64(),
            "status monitor started"
        );

        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }
}
