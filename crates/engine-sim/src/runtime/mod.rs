mod app;
mod config;
mod logging;
mod telemetry;

pub use app::{run, run_from_args, run_until, AppError, RunSummary};
pub use config::RuntimeConfig;
