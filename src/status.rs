use serde_json::{Map, Value as JsonValue};

pub const STATUS_ALARM: &str = "alarm";
const STATUS_UNKNOWN: &str = "unknown";
const OUTPUT_DEFAULT_STATE: &str = "off";

/// Decoded status document as returned by the device endpoint.
///
/// The fetcher guarantees the top level is a JSON object; everything below
/// that is interpreted leniently by [`parse`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument(Map<String, JsonValue>);

impl RawDocument {
    pub fn new(fields: Map<String, JsonValue>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingKind {
    BinaryInput,
    Sensor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub name: String,
    pub kind: ReadingKind,
    pub status: String,
    pub value: Option<f64>,
    pub unit: Option<String>,
}

impl SensorReading {
    pub fn is_alarm(&self) -> bool {
        self.status == STATUS_ALARM
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputState {
    pub name: String,
    pub state: String,
}

/// Normalised device state at one poll instant.
///
/// Readings keep the order in which they were first seen while parsing; a
/// later entry with the same name replaces the earlier one in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    readings: Vec<SensorReading>,
    output: Option<OutputState>,
}

impl Snapshot {
    #[cfg(test)]
    pub fn new(readings: Vec<SensorReading>, output: Option<OutputState>) -> Self {
        let mut snapshot = Self {
            readings: Vec::with_capacity(readings.len()),
            output,
        };
        for reading in readings {
            snapshot.upsert(reading);
        }
        snapshot
    }

    pub fn readings(&self) -> &[SensorReading] {
        &self.readings
    }

    pub fn get(&self, name: &str) -> Option<&SensorReading> {
        self.readings.iter().find(|reading| reading.name == name)
    }

    pub fn output(&self) -> Option<&OutputState> {
        self.output.as_ref()
    }

    pub fn binary_inputs(&self) -> impl Iterator<Item = &SensorReading> {
        self.readings
            .iter()
            .filter(|reading| reading.kind == ReadingKind::BinaryInput)
    }

    fn upsert(&mut self, reading: SensorReading) {
        match self
            .readings
            .iter_mut()
            .find(|existing| existing.name == reading.name)
        {
            Some(existing) => *existing = reading,
            None => self.readings.push(reading),
        }
    }
}

/// Normalises a status document into a [`Snapshot`].
///
/// Never fails: missing or mistyped sections produce empty results, and
/// entries without a name are dropped. Binary inputs are merged before status
/// sensors, so a sensor sharing a name with an input wins.
pub fn parse(doc: &RawDocument, fallback_output_name: &str) -> Snapshot {
    let mut snapshot = Snapshot::default();

    for entry in section_entries(doc, "dinputs") {
        let Some(name) = entry_name(entry) else {
            continue;
        };
        tracing::trace!(name = %name, "parsed binary input");
        snapshot.upsert(SensorReading {
            name,
            kind: ReadingKind::BinaryInput,
            status: entry_status(entry),
            value: None,
            unit: None,
        });
    }

    for entry in section_entries(doc, "sensors") {
        let Some(name) = entry_name(entry) else {
            continue;
        };
        tracing::trace!(name = %name, "parsed status sensor");
        snapshot.upsert(SensorReading {
            name,
            kind: ReadingKind::Sensor,
            status: entry_status(entry),
            value: entry.get("value").and_then(numeric_value),
            unit: entry
                .get("dim")
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        });
    }

    snapshot.output = parse_output(doc, fallback_output_name);
    snapshot
}

fn parse_output(doc: &RawDocument, fallback_name: &str) -> Option<OutputState> {
    let JsonValue::Object(map) = doc.get("routput")? else {
        return None;
    };
    if map.is_empty() {
        return None;
    }
    let name = map
        .get("name")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback_name)
        .to_string();
    let state = map
        .get("state")
        .and_then(scalar_text)
        .unwrap_or_else(|| OUTPUT_DEFAULT_STATE.to_string());
    Some(OutputState { name, state })
}

fn section_entries<'a>(
    doc: &'a RawDocument,
    key: &str,
) -> impl Iterator<Item = &'a Map<String, JsonValue>> {
    let items: &[JsonValue] = match doc.get(key) {
        Some(JsonValue::Array(items)) => items,
        Some(other) => {
            tracing::debug!(section = key, kind = json_kind(other), "ignoring non-array section");
            &[]
        }
        None => &[],
    };
    items.iter().filter_map(|item| match item {
        JsonValue::Object(map) => Some(map),
        _ => None,
    })
}

fn entry_name(entry: &Map<String, JsonValue>) -> Option<String> {
    entry
        .get("name")
        .and_then(|v| v.as_str())
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

fn entry_status(entry: &Map<String, JsonValue>) -> String {
    entry
        .get("status")
        .and_then(scalar_text)
        .unwrap_or_else(|| STATUS_UNKNOWN.to_string())
}

fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        JsonValue::Number(num) => Some(num.to_string()),
        JsonValue::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn numeric_value(value: &JsonValue) -> Option<f64> {
    let parsed = match value {
        JsonValue::Number(num) => num.as_f64(),
        JsonValue::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
