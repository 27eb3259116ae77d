//! Downstream collaborators fed by the simulation loop: the per-tick data
//! log and the frame transmitter.

use crate::diagnostics::{DiagnosticSink, DtcRecord, EventRecord};
use crate::error::SinkError;
use crate::frame::FRAME_LEN;
use serde::{Deserialize, Serialize};

/// One row of the data log. Field names double as column headers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    pub timestamp: f64,
    pub rpm: f64,
    pub temp: f64,
    pub pressure: f64,
    pub throttle: f64,
    pub ambient: f64,
    pub oil_health: f64,
    pub oil_temp: f64,
}

pub trait DataSink {
    fn write_data(&mut self, record: &DataRecord) -> Result<(), SinkError>;
}

/// Transmits encoded sensor frames (a bus, a socket, a console).
pub trait FrameSink {
    fn send_frame(
        &mut self,
        timestamp: f64,
        frame: [u8; FRAME_LEN],
        record: &DataRecord,
    ) -> Result<(), SinkError>;
}

impl<S: DataSink + ?Sized> DataSink for &mut S {
    fn write_data(&mut self, record: &DataRecord) -> Result<(), SinkError> {
        (**self).write_data(record)
    }
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn send_frame(
        &mut self,
        timestamp: f64,
        frame: [u8; FRAME_LEN],
        record: &DataRecord,
    ) -> Result<(), SinkError> {
        (**self).send_frame(timestamp, frame, record)
    }
}

impl DataSink for Vec<DataRecord> {
    fn write_data(&mut self, record: &DataRecord) -> Result<(), SinkError> {
        self.push(*record);
        Ok(())
    }
}

impl FrameSink for Vec<[u8; FRAME_LEN]> {
    fn send_frame(
        &mut self,
        _timestamp: f64,
        frame: [u8; FRAME_LEN],
        _record: &DataRecord,
    ) -> Result<(), SinkError> {
        self.push(frame);
        Ok(())
    }
}

/// Drops everything; for runs that only care about diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl DataSink for Discard {
    fn write_data(&mut self, _record: &DataRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

impl FrameSink for Discard {
    fn send_frame(
        &mut self,
        _timestamp: f64,
        _frame: [u8; FRAME_LEN],
        _record: &DataRecord,
    ) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Feeds every record to two sinks. Both are always written; the first
/// error wins.
#[derive(Debug, Clone, Default)]
pub struct Tee<A, B>(pub A, pub B);

fn first_error(a: Result<(), SinkError>, b: Result<(), SinkError>) -> Result<(), SinkError> {
    a.and(b)
}

impl<A: DataSink, B: DataSink> DataSink for Tee<A, B> {
    fn write_data(&mut self, record: &DataRecord) -> Result<(), SinkError> {
        let a = self.0.write_data(record);
        let b = self.1.write_data(record);
        first_error(a, b)
    }
}

impl<A: FrameSink, B: FrameSink> FrameSink for Tee<A, B> {
    fn send_frame(
        &mut self,
        timestamp: f64,
        frame: [u8; FRAME_LEN],
        record: &DataRecord,
    ) -> Result<(), SinkError> {
        let a = self.0.send_frame(timestamp, frame, record);
        let b = self.1.send_frame(timestamp, frame, record);
        first_error(a, b)
    }
}

impl<A: DiagnosticSink, B: DiagnosticSink> DiagnosticSink for Tee<A, B> {
    fn log_event(&mut self, record: &EventRecord) -> Result<(), SinkError> {
        let a = self.0.log_event(record);
        let b = self.1.log_event(record);
        first_error(a, b)
    }

    fn log_dtc(&mut self, record: &DtcRecord) -> Result<(), SinkError> {
        let a = self.0.log_dtc(record);
        let b = self.1.log_dtc(record);
        first_error(a, b)
    }
}
