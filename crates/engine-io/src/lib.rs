pub mod frame_sink;
pub mod metrics;
pub mod records;

pub use frame_sink::{format_frame_line, ConsoleFrameSink};
pub use metrics::{init_metrics, serve_metrics, MetricsRecorder};
pub use records::{
    CsvDataLog, CsvDiagnostics, CsvRecorder, RecorderError, DATA_LOG, DTC_LOG, EVENT_LOG,
};
