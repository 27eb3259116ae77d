//! Event and DTC records emitted by the engine model.
//!
//! The model decides *when* a record is produced; where it ends up is the
//! business of a [`DiagnosticSink`]. Sinks report failures instead of
//! swallowing them so the caller can tell a broken log apart from a broken
//! engine.

use crate::error::SinkError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transient event codes written to the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCode {
    Overspeed,
    OverspeedClear,
    FanOn,
    FanOff,
    PressureSpike,
    DerateOn,
    DerateOff,
    CriticalOilTemp,
    InjectOverspeed,
    InjectOverheat,
    InjectOilfail,
}

impl EventCode {
    pub const ALL: [EventCode; 11] = [
        Self::Overspeed,
        Self::OverspeedClear,
        Self::FanOn,
        Self::FanOff,
        Self::PressureSpike,
        Self::DerateOn,
        Self::DerateOff,
        Self::CriticalOilTemp,
        Self::InjectOverspeed,
        Self::InjectOverheat,
        Self::InjectOilfail,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overspeed => "OVERSPEED",
            Self::OverspeedClear => "OVERSPEED_CLEAR",
            Self::FanOn => "FAN_ON",
            Self::FanOff => "FAN_OFF",
            Self::PressureSpike => "PRESSURE_SPIKE",
            Self::DerateOn => "DERATE_ON",
            Self::DerateOff => "DERATE_OFF",
            Self::CriticalOilTemp => "CRITICAL_OIL_TEMP",
            Self::InjectOverspeed => "INJECT_OVERSPEED",
            Self::InjectOverheat => "INJECT_OVERHEAT",
            Self::InjectOilfail => "INJECT_OILFAIL",
        }
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted diagnostic trouble codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DtcCode {
    Overspeed,
    PressureSpike,
    DerateActive,
    FatalOilTemp,
}

impl DtcCode {
    pub const ALL: [DtcCode; 4] = [
        Self::Overspeed,
        Self::PressureSpike,
        Self::DerateActive,
        Self::FatalOilTemp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overspeed => "OVERSPEED",
            Self::PressureSpike => "PRESSURE_SPIKE",
            Self::DerateActive => "DERATE_ACTIVE",
            Self::FatalOilTemp => "FATAL_OIL_TEMP",
        }
    }
}

impl fmt::Display for DtcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the event or DTC log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<C> {
    /// Seconds, fractional.
    pub timestamp: f64,
    pub code: C,
    pub description: String,
}

pub type EventRecord = Record<EventCode>;
pub type DtcRecord = Record<DtcCode>;

impl<C> Record<C> {
    pub fn new(timestamp: f64, code: C, description: impl Into<String>) -> Self {
        Self {
            timestamp,
            code,
            description: description.into(),
        }
    }
}

pub trait DiagnosticSink {
    fn log_event(&mut self, record: &EventRecord) -> Result<(), SinkError>;
    fn log_dtc(&mut self, record: &DtcRecord) -> Result<(), SinkError>;
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn log_event(&mut self, record: &EventRecord) -> Result<(), SinkError> {
        (**self).log_event(record)
    }

    fn log_dtc(&mut self, record: &DtcRecord) -> Result<(), SinkError> {
        (**self).log_dtc(record)
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn log_event(&mut self, _record: &EventRecord) -> Result<(), SinkError> {
        Ok(())
    }

    fn log_dtc(&mut self, _record: &DtcRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps records in memory. Used by tests and by callers that want to
/// inspect a run after the fact.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub events: Vec<EventRecord>,
    pub dtcs: Vec<DtcRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_count(&self, code: EventCode) -> usize {
        self.events.iter().filter(|r| r.code == code).count()
    }

    pub fn dtc_count(&self, code: DtcCode) -> usize {
        self.dtcs.iter().filter(|r| r.code == code).count()
    }
}

impl DiagnosticSink for MemorySink {
    fn log_event(&mut self, record: &EventRecord) -> Result<(), SinkError> {
        self.events.push(record.clone());
        Ok(())
    }

    fn log_dtc(&mut self, record: &DtcRecord) -> Result<(), SinkError> {
        self.dtcs.push(record.clone());
        Ok(())
    }
}
