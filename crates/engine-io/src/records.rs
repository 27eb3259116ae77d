//! CSV persistence for the event, DTC and data logs.
//!
//! Event and DTC logs accumulate across runs: they are opened in append mode
//! and the header row is only written when the file is new. The data log
//! describes a single run and is truncated on open.

use engine_core::diagnostics::{DiagnosticSink, DtcRecord, EventRecord};
use engine_core::error::SinkError;
use engine_core::hal::{DataRecord, DataSink};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const EVENT_LOG: &str = "event_log.csv";
pub const DTC_LOG: &str = "dtc_log.csv";
pub const DATA_LOG: &str = "data_log.csv";

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("failed to prepare log directory {path}: {source}")]
    Directory { path: PathBuf, source: io::Error },
    #[error("failed to open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
}

#[derive(Serialize)]
struct DiagnosticRow<'a> {
    timestamp: String,
    code: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct DataRow {
    timestamp: String,
    rpm: String,
    temp: String,
    pressure: String,
    throttle: String,
    ambient: String,
    oil_health: String,
    oil_temp: String,
}

impl From<&DataRecord> for DataRow {
    fn from(r: &DataRecord) -> Self {
        Self {
            timestamp: format!("{:.6}", r.timestamp),
            rpm: format!("{:.2}", r.rpm),
            temp: format!("{:.2}", r.temp),
            pressure: format!("{:.2}", r.pressure.max(0.0)),
            throttle: format!("{:.3}", r.throttle),
            ambient: format!("{:.2}", r.ambient),
            oil_health: format!("{:.3}", r.oil_health),
            oil_temp: format!("{:.2}", r.oil_temp),
        }
    }
}

fn to_sink_error(e: csv::Error) -> SinkError {
    SinkError::Io(io::Error::from(e))
}

fn open_append(path: &Path) -> Result<csv::Writer<File>, RecorderError> {
    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| RecorderError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file))
}

fn open_truncate(path: &Path) -> Result<csv::Writer<File>, RecorderError> {
    let file = File::create(path).map_err(|source| RecorderError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::WriterBuilder::new().has_headers(true).from_writer(file))
}

/// Appending event and DTC logs.
pub struct CsvDiagnostics {
    events: csv::Writer<File>,
    dtcs: csv::Writer<File>,
}

/// The per-run data log.
pub struct CsvDataLog {
    data: csv::Writer<File>,
}

/// Writes the three run logs under one directory. Every row is flushed as
/// soon as it is written so a crash loses at most the row in flight.
///
/// The two halves are public so a run can borrow them separately as its
/// diagnostic and data sinks.
pub struct CsvRecorder {
    dir: PathBuf,
    pub diagnostics: CsvDiagnostics,
    pub data: CsvDataLog,
}

impl CsvRecorder {
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, RecorderError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| RecorderError::Directory {
            path: dir.clone(),
            source,
        })?;

        let recorder = Self {
            diagnostics: CsvDiagnostics {
                events: open_append(&dir.join(EVENT_LOG))?,
                dtcs: open_append(&dir.join(DTC_LOG))?,
            },
            data: CsvDataLog {
                data: open_truncate(&dir.join(DATA_LOG))?,
            },
            dir,
        };
        tracing::debug!(dir = %recorder.dir.display(), "CSV recorder ready");
        Ok(recorder)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.diagnostics.events.flush()?;
        self.diagnostics.dtcs.flush()?;
        self.data.data.flush()
    }
}

fn write_diagnostic(
    writer: &mut csv::Writer<File>,
    timestamp: f64,
    code: &str,
    description: &str,
) -> Result<(), SinkError> {
    writer
        .serialize(DiagnosticRow {
            timestamp: format!("{timestamp:.6}"),
            code,
            description,
        })
        .map_err(to_sink_error)?;
    writer.flush()?;
    Ok(())
}

impl DiagnosticSink for CsvDiagnostics {
    fn log_event(&mut self, record: &EventRecord) -> Result<(), SinkError> {
        write_diagnostic(
            &mut self.events,
            record.timestamp,
            record.code.as_str(),
            &record.description,
        )
    }

    fn log_dtc(&mut self, record: &DtcRecord) -> Result<(), SinkError> {
        write_diagnostic(
            &mut self.dtcs,
            record.timestamp,
            record.code.as_str(),
            &record.description,
        )
    }
}

impl DataSink for CsvDataLog {
    fn write_data(&mut self, record: &DataRecord) -> Result<(), SinkError> {
        self.data
            .serialize(DataRow::from(record))
            .map_err(to_sink_error)?;
        self.data.flush()?;
        Ok(())
    }
}

impl DiagnosticSink for CsvRecorder {
    fn log_event(&mut self, record: &EventRecord) -> Result<(), SinkError> {
        self.diagnostics.log_event(record)
    }

    fn log_dtc(&mut self, record: &DtcRecord) -> Result<(), SinkError> {
        self.diagnostics.log_dtc(record)
    }
}

impl DataSink for CsvRecorder {
    fn write_data(&mut self, record: &DataRecord) -> Result<(), SinkError> {
        self.data.write_data(record)
    }
}
