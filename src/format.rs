use crate::engine::Alert;
use crate::status::{SensorReading, Snapshot};
use std::fmt::Write;

pub const MONITORING_STARTED: &str = "Monitoring started.";
pub const INITIAL_FETCH_FAILED: &str = "Could not fetch initial data; monitoring is not started.";
pub const DATA_UNAVAILABLE: &str = "Data unavailable.";
pub const CAMERA_USAGE: &str = "Invalid command format. Use /get_cam or /get_cam <channel number>.";
pub const CAMERA_UNAVAILABLE: &str = "Could not get a camera snapshot";

const OUTPUT_NOT_REPORTED: &str = "not reported";

pub fn camera_failure(reason: &dyn std::fmt::Display) -> String {
    format!("{CAMERA_UNAVAILABLE}: {reason}")
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn value_text(value: Option<f64>, unit: Option<&str>) -> Option<String> {
    let value = value?;
    Some(escape_html(&format!("{value}{}", unit.unwrap_or(""))))
}

pub fn alert_message(alert: &Alert) -> String {
    match alert {
        Alert::SensorChanged {
            name,
            status,
            value,
            unit,
        } => {
            let mut text = format!(
                "⚠️ Attention! '{}' changed state. New state: <b>{}</b>",
                escape_html(name),
                escape_html(status)
            );
            if let Some(value) = value_text(*value, unit.as_deref()) {
                let _ = write!(text, ", value: <b>{value}</b>");
            }
            text
        }
        Alert::OutputChanged { name, state } => format!(
            "⚠️ Attention! Output '{}' changed state. New state: <b>{}</b>",
            escape_html(name),
            escape_html(state)
        ),
        Alert::AlarmPersisting {
            name,
            status,
            elapsed,
        } => format!(
            "⚠️ WARNING!\n{} has been <b>{}</b> for {} minutes.",
            escape_html(name),
            escape_html(status),
            elapsed.as_secs() / 60
        ),
    }
}

fn reading_line(reading: &SensorReading, separator: &str) -> String {
    let mut line = format!(
        "{}{separator}<b>{}</b>",
        escape_html(&reading.name),
        escape_html(&reading.status)
    );
    if let Some(value) = value_text(reading.value, reading.unit.as_deref()) {
        let _ = write!(line, "{separator}<b>{value}</b>");
    }
    line
}

fn output_line(snapshot: &Snapshot, fallback_name: &str) -> String {
    match snapshot.output() {
        Some(output) => format!(
            "Output '{}' — <b>{}</b>",
            escape_html(&output.name),
            escape_html(&output.state)
        ),
        None => format!(
            "Output '{}' — <b>{OUTPUT_NOT_REPORTED}</b>",
            escape_html(fallback_name)
        ),
    }
}

pub fn daily_report(snapshot: &Snapshot, fallback_output_name: &str) -> String {
    let mut text = String::from("Daily report:\n\n");
    for reading in snapshot.readings() {
        text.push_str(&reading_line(reading, ", "));
        text.push('\n');
    }
    text.push('\n');
    text.push_str(&output_line(snapshot, fallback_output_name));
    text
}

pub fn status_reply(snapshot: &Snapshot, fallback_output_name: &str) -> String {
    let mut text = String::from("📍 Current sensor state:\n\n");
    for reading in snapshot.readings() {
        text.push_str(&reading_line(reading, " — "));
        text.push('\n');
    }
    text.push('\n');
    text.push_str(&output_line(snapshot, fallback_output_name));
    text
}
