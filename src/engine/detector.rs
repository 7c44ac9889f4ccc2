use super::types::Alert;
use crate::status::Snapshot;

/// Compares `current` against the last accepted snapshot.
///
/// Only status transitions count; a changed value with the same status is
/// silent. Readings that vanish are not reported. Sensor alerts come first in
/// snapshot order, the output alert (if any) last.
pub fn diff(previous: Option<&Snapshot>, current: &Snapshot) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for reading in current.readings() {
        let changed = previous
            .and_then(|prev| prev.get(&reading.name))
            .map_or(true, |prev| prev.status != reading.status);
        if changed {
            alerts.push(Alert::SensorChanged {
                name: reading.name.clone(),
                status: reading.status.clone(),
                value: reading.value,
                unit: reading.unit.clone(),
            });
        }
    }

    // An absent output is its own state: nothing to announce while it is
    // missing, and its reappearance counts as a change.
    if let Some(output) = current.output() {
        let changed = previous
            .map_or(true, |prev| prev.output().map(|o| o.state.as_str()) != Some(output.state.as_str()));
        if changed {
            alerts.push(Alert::OutputChanged {
                name: output.name.clone(),
                state: output.state.clone(),
            });
        }
    }

    alerts
}
