use std::time::Duration;

/// A human-directed event produced by one monitoring tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    SensorChanged {
        name: String,
        status: String,
        value: Option<f64>,
        unit: Option<String>,
    },
    OutputChanged {
        name: String,
        state: String,
    },
    AlarmPersisting {
        name: String,
        status: String,
        elapsed: Duration,
    },
}

impl Alert {
    pub fn subject(&self) -> &str {
        match self {
            Alert::SensorChanged { name, .. }
            | Alert::OutputChanged { name, .. }
            | Alert::AlarmPersisting { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Alert::SensorChanged { .. } => "sensor_changed",
            Alert::OutputChanged { .. } => "output_changed",
            Alert::AlarmPersisting { .. } => "alarm_persisting",
        }
    }
}
