use thiserror::Error;

/// Failures that cross the step boundary. Everything else is reported
/// through the diagnostic sink or the step report.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum EngineError {
    #[error("CRITICAL: oil temperature {oil_temp:.1} C reached limit {limit:.1} C")]
    CriticalOilTemp { oil_temp: f64, limit: f64 },
    #[error("engine halted after a critical failure")]
    Halted,
    #[error("invalid time step {dt}")]
    InvalidTimeStep { dt: f64 },
}

impl EngineError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CriticalOilTemp { .. } | Self::Halted)
    }
}

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("failed to read parameters from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid parameter JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown engine type '{0}' (expected petrol or diesel)")]
    UnknownEngineType(String),
    #[error("{name} must be finite, got {value}")]
    NotFinite { name: &'static str, value: f64 },
    #[error("{name} must be finite and positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} = {value} outside [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{low} must be below {high}")]
    InvertedBand {
        low: &'static str,
        high: &'static str,
    },
}

/// A diagnostic sink could not persist a record.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink rejected record: {0}")]
    Rejected(String),
}
