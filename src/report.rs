use crate::fetcher::StatusSource;
use crate::format;
use crate::monitor::Monitor;
use crate::notifier::Notifier;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

pub const REPORT_EVALUATION_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
#[error("invalid report time {0:?}; expected HH:MM (24h)")]
pub struct InvalidReportTime(String);

/// Time of day a daily report is due, in the configured local zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportTime {
    hour: u32,
    minute: u32,
}

impl ReportTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }

    fn as_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for ReportTime {
    type Err = InvalidReportTime;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidReportTime(value.to_string());
        let (hour_raw, minute_raw) = value.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u32 = hour_raw.trim().parse().map_err(|_| invalid())?;
        let minute: u32 = minute_raw.trim().parse().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }
}

impl fmt::Display for ReportTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportDue {
    pub time: ReportTime,
}

#[derive(Debug, Clone)]
struct ReportSlot {
    time: ReportTime,
    sent: bool,
}

/// Per-time "sent today" flags for the daily reports.
///
/// Flags reset once per local calendar day, on the first evaluation that
/// sees a new date. A time that already passed when the process starts fires
/// on the first evaluation.
#[derive(Debug, Clone)]
pub struct ReportSchedule {
    slots: Vec<ReportSlot>,
    day: Option<NaiveDate>,
}

impl ReportSchedule {
    pub fn new(times: &[ReportTime]) -> Self {
        let mut slots: Vec<ReportSlot> = Vec::with_capacity(times.len());
        for time in times {
            if slots.iter().any(|slot| slot.time == *time) {
                continue;
            }
            slots.push(ReportSlot { time: *time, sent: false });
        }
        Self { slots, day: None }
    }

    pub fn times(&self) -> impl Iterator<Item = ReportTime> + '_ {
        self.slots.iter().map(|slot| slot.time)
    }

    #[cfg(test)]
    pub fn is_sent(&self, time: ReportTime) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.time == time && slot.sent)
    }

    pub fn evaluate(&mut self, now: NaiveDateTime) -> Vec<ReportDue> {
        let today = now.date();
        if self.day.is_some_and(|day| day != today) {
            for slot in &mut self.slots {
                slot.sent = false;
            }
            tracing::info!(date = %today, "daily report flags reset");
        }
        self.day = Some(today);

        let time_of_day = now.time();
        let mut due = Vec::new();
        for slot in &mut self.slots {
            if slot.sent || time_of_day < slot.time.as_naive_time() {
                continue;
            }
            slot.sent = true;
            due.push(ReportDue { time: slot.time });
        }
        due
    }
}

/// Evaluates the report schedule once a minute and delivers due reports.
pub async fn run_scheduler<S: StatusSource, N: Notifier>(monitor: Monitor<S, N>) {
    let mut ticker = tokio::time::interval(REPORT_EVALUATION_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let times: Vec<String> = monitor
        .engine()
        .lock()
        .await
        .reports()
        .times()
        .map(|time| time.to_string())
        .collect();
    tracing::info!(?times, "report scheduler started");

    loop {
        ticker.tick().await;
        let now_local = Utc::now().with_timezone(&monitor.timezone()).naive_local();
        let due = monitor.engine().lock().await.due_reports(now_local);
        for report in due {
            send_daily_report(&monitor, report).await;
        }
    }
}

pub async fn send_daily_report<S: StatusSource, N: Notifier>(
    monitor: &Monitor<S, N>,
    report: ReportDue,
) {
    let snapshot = match monitor.fetch_snapshot().await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::warn!(time = %report.time, error = %err, "daily report skipped: status unavailable");
            return;
        }
    };
    let text = format::daily_report(&snapshot, monitor.output_name());
    match monitor.notifier().send(&text, true).await {
        Ok(()) => tracing::info!(time = %report.time, "daily report sent"),
        Err(err) => tracing::warn!(time = %report.time, error = %err, "daily report delivery failed"),
    }
}
