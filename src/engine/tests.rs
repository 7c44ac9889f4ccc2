use super::debounce::AlarmTracker;
use super::detector::diff;
use super::{Alert, EngineState};
use crate::report::ReportTime;
use crate::status::{OutputState, ReadingKind, SensorReading, Snapshot};
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

const POLL: Duration = Duration::from_secs(3);

fn input(name: &str, status: &str) -> SensorReading {
    SensorReading {
        name: name.to_string(),
        kind: ReadingKind::BinaryInput,
        status: status.to_string(),
        value: None,
        unit: None,
    }
}

fn sensor(name: &str, status: &str, value: f64) -> SensorReading {
    SensorReading {
        name: name.to_string(),
        kind: ReadingKind::Sensor,
        status: status.to_string(),
        value: Some(value),
        unit: Some("°C".to_string()),
    }
}

fn output(state: &str) -> Option<OutputState> {
    Some(OutputState {
        name: "Fan".to_string(),
        state: state.to_string(),
    })
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap()
}

fn persisting(alerts: &[Alert]) -> usize {
    alerts
        .iter()
        .filter(|alert| matches!(alert, Alert::AlarmPersisting { .. }))
        .count()
}

#[test]
fn unchanged_status_emits_nothing() {
    let prev = Snapshot::new(vec![input("A", "normal")], output("off"));
    let curr = Snapshot::new(vec![input("A", "normal")], output("off"));
    assert!(diff(Some(&prev), &curr).is_empty());
}

#[test]
fn status_transition_emits_one_sensor_alert() {
    let prev = Snapshot::new(vec![input("A", "normal")], output("off"));
    let curr = Snapshot::new(vec![input("A", "alarm")], output("off"));
    assert_eq!(
        diff(Some(&prev), &curr),
        vec![Alert::SensorChanged {
            name: "A".to_string(),
            status: "alarm".to_string(),
            value: None,
            unit: None,
        }]
    );
}

#[test]
fn value_only_change_is_silent() {
    let prev = Snapshot::new(vec![sensor("A", "normal", 10.0)], None);
    let curr = Snapshot::new(vec![sensor("A", "normal", 99.0)], None);
    assert!(diff(Some(&prev), &curr).is_empty());
}

#[test]
fn status_change_carries_value_and_unit_for_display() {
    let prev = Snapshot::new(vec![sensor("T", "normal", 20.0)], None);
    let curr = Snapshot::new(vec![sensor("T", "high", 41.5)], None);
    let alerts = diff(Some(&prev), &curr);
    assert_eq!(
        alerts,
        vec![Alert::SensorChanged {
            name: "T".to_string(),
            status: "high".to_string(),
            value: Some(41.5),
            unit: Some("°C".to_string()),
        }]
    );
}

#[test]
fn new_readings_alert_and_vanished_readings_do_not() {
    let prev = Snapshot::new(vec![input("Gone", "normal")], None);
    let curr = Snapshot::new(vec![input("Fresh", "normal")], None);
    let alerts = diff(Some(&prev), &curr);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].subject(), "Fresh");
}

#[test]
fn sensor_alerts_precede_output_alert_in_snapshot_order() {
    let prev = Snapshot::new(
        vec![input("B", "normal"), input("A", "normal")],
        output("off"),
    );
    let curr = Snapshot::new(vec![input("B", "alarm"), input("A", "alarm")], output("on"));
    let alerts = diff(Some(&prev), &curr);
    let kinds: Vec<(&str, &str)> = alerts
        .iter()
        .map(|alert| (alert.kind(), alert.subject()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("sensor_changed", "B"),
            ("sensor_changed", "A"),
            ("output_changed", "Fan"),
        ]
    );
}

#[test]
fn without_previous_everything_is_a_change() {
    let curr = Snapshot::new(vec![input("A", "normal")], output("off"));
    assert_eq!(diff(None, &curr).len(), 2);
}

#[test]
fn output_absence_then_appearance_alerts_once_on_appearance() {
    let mut engine = EngineState::new(&[]);
    engine.initialize(Snapshot::new(vec![input("A", "normal")], None));

    let first = engine.observe(Snapshot::new(vec![input("A", "normal")], None), start(), POLL);
    assert!(first.is_empty());

    let second = engine.observe(
        Snapshot::new(vec![input("A", "normal")], output("on")),
        start() + chrono::Duration::seconds(3),
        POLL,
    );
    assert_eq!(
        second,
        vec![Alert::OutputChanged {
            name: "Fan".to_string(),
            state: "on".to_string(),
        }]
    );

    let third = engine.observe(
        Snapshot::new(vec![input("A", "normal")], output("on")),
        start() + chrono::Duration::seconds(6),
        POLL,
    );
    assert!(third.is_empty());
}

#[test]
fn uninitialized_engine_never_alerts() {
    let mut engine = EngineState::new(&[]);
    let snapshots = [
        Snapshot::new(vec![input("A", "alarm")], output("on")),
        Snapshot::new(vec![input("A", "normal")], output("off")),
        Snapshot::new(vec![input("A", "alarm")], None),
    ];
    for (i, snapshot) in snapshots.into_iter().enumerate() {
        let now = start() + chrono::Duration::minutes(10 * i as i64);
        assert!(engine.observe(snapshot, now, POLL).is_empty());
    }
    assert!(engine.last_snapshot().is_none());
    assert!(engine.alarms().is_empty());
}

#[test]
fn sustained_alarm_warns_every_five_minutes() {
    let mut tracker = AlarmTracker::new();
    let alarm = Snapshot::new(vec![input("Leak", "alarm")], None);

    let mut warnings = Vec::new();
    let mut elapsed = 0;
    while elapsed <= 12 * 60 {
        let now = start() + chrono::Duration::seconds(elapsed);
        for alert in tracker.tick(&alarm, now, POLL) {
            warnings.push((elapsed, alert));
        }
        elapsed += 3;
    }

    let at: Vec<i64> = warnings.iter().map(|(secs, _)| *secs).collect();
    assert_eq!(at, vec![300, 600]);
    assert_eq!(
        warnings[0].1,
        Alert::AlarmPersisting {
            name: "Leak".to_string(),
            status: "alarm".to_string(),
            elapsed: Duration::from_secs(300),
        }
    );
}

#[test]
fn first_alarm_detection_is_silent_and_starts_tracking() {
    let mut tracker = AlarmTracker::new();
    let alarm = Snapshot::new(vec![input("Leak", "alarm"), sensor("T", "alarm", 1.0)], None);
    assert!(tracker.tick(&alarm, start(), POLL).is_empty());
    assert_eq!(tracker.started_at("Leak"), Some(start()));
    assert_eq!(tracker.started_at("T"), None);
    assert_eq!(tracker.len(), 1);
}

#[test]
fn recovery_resets_the_alarm_timer() {
    let mut tracker = AlarmTracker::new();
    let alarm = Snapshot::new(vec![input("Leak", "alarm")], None);
    let normal = Snapshot::new(vec![input("Leak", "normal")], None);

    tracker.tick(&alarm, start(), POLL);
    tracker.tick(&alarm, start() + chrono::Duration::seconds(240), POLL);
    tracker.tick(&normal, start() + chrono::Duration::seconds(243), POLL);
    assert!(tracker.is_empty());

    let restart = start() + chrono::Duration::seconds(246);
    assert!(tracker.tick(&alarm, restart, POLL).is_empty());
    assert_eq!(tracker.started_at("Leak"), Some(restart));

    // 300s after the first start is only 54s into the second period.
    let alerts = tracker.tick(&alarm, start() + chrono::Duration::seconds(300), POLL);
    assert!(alerts.is_empty());

    let alerts = tracker.tick(&alarm, restart + chrono::Duration::seconds(300), POLL);
    assert_eq!(persisting(&alerts), 1);
}

#[test]
fn missed_poll_window_skips_that_warning() {
    let mut tracker = AlarmTracker::new();
    let alarm = Snapshot::new(vec![input("Leak", "alarm")], None);
    tracker.tick(&alarm, start(), POLL);
    // 299s then 304s: neither is within 3s past the five minute boundary.
    assert!(tracker
        .tick(&alarm, start() + chrono::Duration::seconds(299), POLL)
        .is_empty());
    assert!(tracker
        .tick(&alarm, start() + chrono::Duration::seconds(304), POLL)
        .is_empty());
    let alerts = tracker.tick(&alarm, start() + chrono::Duration::seconds(601), POLL);
    assert_eq!(persisting(&alerts), 1);
}

#[test]
fn input_missing_from_a_poll_restarts_its_alarm_timer() {
    let mut tracker = AlarmTracker::new();
    let alarm = Snapshot::new(vec![input("Leak", "alarm")], None);
    let without_leak = Snapshot::new(vec![input("Door", "normal")], None);

    tracker.tick(&alarm, start(), POLL);
    tracker.tick(&without_leak, start() + chrono::Duration::seconds(150), POLL);
    assert!(tracker.is_empty());

    let back = start() + chrono::Duration::seconds(297);
    assert!(tracker.tick(&alarm, back, POLL).is_empty());
    assert_eq!(tracker.started_at("Leak"), Some(back));
    // Would be a five minute warning for the first episode.
    assert!(tracker
        .tick(&alarm, start() + chrono::Duration::seconds(300), POLL)
        .is_empty());
}

#[test]
fn sensor_taking_over_an_input_name_drops_its_alarm() {
    let mut tracker = AlarmTracker::new();
    tracker.tick(&Snapshot::new(vec![input("Leak", "alarm")], None), start(), POLL);
    assert_eq!(tracker.len(), 1);

    let shadowed = Snapshot::new(vec![sensor("Leak", "alarm", 1.0)], None);
    let alerts = tracker.tick(&shadowed, start() + chrono::Duration::seconds(300), POLL);
    assert!(alerts.is_empty());
    assert!(tracker.is_empty());
}

#[test]
fn snapshot_from_before_reinitialize_is_discarded() {
    let mut engine = EngineState::new(&[]);
    engine.initialize(Snapshot::new(vec![input("Leak", "normal")], output("off")));
    let fetched_under = engine.generation();

    let fresh = Snapshot::new(vec![input("Leak", "alarm")], output("on"));
    engine.initialize(fresh.clone());
    assert_ne!(engine.generation(), fetched_under);

    let stale = Snapshot::new(vec![input("Leak", "normal")], output("off"));
    assert!(engine
        .observe_from(fetched_under, stale, start(), POLL)
        .is_none());
    assert_eq!(engine.last_snapshot(), Some(&fresh));
    assert!(engine.alarms().is_empty());

    let current = engine.generation();
    let alerts = engine
        .observe_from(current, fresh.clone(), start(), POLL)
        .expect("current generation is accepted");
    assert!(alerts.is_empty());
    assert_eq!(engine.alarms().len(), 1);
}

#[test]
fn observe_combines_transition_and_persisting_alerts() {
    let mut engine = EngineState::new(&[]);
    engine.initialize(Snapshot::new(vec![input("Leak", "normal")], output("off")));

    let alarm = || Snapshot::new(vec![input("Leak", "alarm")], output("off"));
    let first = engine.observe(alarm(), start(), POLL);
    assert_eq!(first.len(), 1);
    assert!(matches!(first[0], Alert::SensorChanged { .. }));

    let mut total_persisting = 0;
    let mut secs = 3;
    while secs <= 12 * 60 {
        let alerts = engine.observe(alarm(), start() + chrono::Duration::seconds(secs), POLL);
        assert!(alerts
            .iter()
            .all(|alert| matches!(alert, Alert::AlarmPersisting { .. })));
        total_persisting += alerts.len();
        secs += 3;
    }
    assert_eq!(total_persisting, 2);
}

#[test]
fn reports_flow_through_engine_state() {
    let time: ReportTime = "17:30".parse().unwrap();
    let mut engine = EngineState::new(&[time]);
    let now = chrono::NaiveDate::from_ymd_opt(2026, 3, 10)
        .unwrap()
        .and_hms_opt(17, 30, 0)
        .unwrap();
    assert_eq!(engine.due_reports(now).len(), 1);
    assert!(engine.reports().is_sent(time));
    assert!(engine.due_reports(now).is_empty());
}
