use clap::Parser;
use engine_core::EngineType;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(version, propagate_version = true)]
#[command(
    about = "Engine thermal, lubrication and diagnostics simulator",
    long_about = None
)]
struct Args {
    /// Run duration in seconds.
    #[arg(long, default_value_t = 10.0)]
    duration: f64,
    /// Tick interval in seconds.
    #[arg(long, default_value_t = 0.5)]
    interval: f64,
    /// Seed for engine noise, fault injection and the throttle profile.
    #[arg(long)]
    seed: Option<u64>,
    /// Base fault injection probability per tick, in [0, 1].
    #[arg(long, default_value_t = 0.02, value_parser = parse_probability)]
    fault_rate: f64,
    /// Disable the fault injector entirely.
    #[arg(long)]
    no_faults: bool,
    /// Engine type (petrol|diesel); ignored when --params is given.
    #[arg(long, default_value = "petrol")]
    engine: EngineType,
    /// Override the engine type's redline.
    #[arg(long)]
    redline: Option<f64>,
    /// JSON file with engine parameters; CLI engine options override it.
    #[arg(long)]
    params: Option<PathBuf>,
    /// Directory for event_log.csv, dtc_log.csv and data_log.csv.
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
    /// Run on simulated time without sleeping between ticks.
    #[arg(long)]
    fast: bool,
    /// Do not print frame lines.
    #[arg(long)]
    quiet: bool,
    /// Output logs in JSON format (for log aggregation).
    #[arg(long)]
    json_logs: bool,
    /// Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090).
    #[arg(long)]
    metrics_addr: Option<String>,
    /// Enable run audit logging to the specified JSONL file.
    #[arg(long)]
    audit_log: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub duration: Duration,
    pub interval: Duration,
    pub seed: Option<u64>,
    /// `None` runs without an injector.
    pub fault_rate: Option<f64>,
    pub engine_type: EngineType,
    pub redline_rpm: Option<f64>,
    pub params_path: Option<PathBuf>,
    pub log_dir: PathBuf,
    pub realtime: bool,
    pub print_frames: bool,
    pub json_logs: bool,
    pub metrics_addr: Option<String>,
    pub audit_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(10),
            interval: Duration::from_millis(500),
            seed: None,
            fault_rate: Some(0.02),
            engine_type: EngineType::Petrol,
            redline_rpm: None,
            params_path: None,
            log_dir: PathBuf::from("logs"),
            realtime: true,
            print_frames: true,
            json_logs: false,
            metrics_addr: None,
            audit_path: None,
        }
    }
}

fn parse_probability(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not a probability in [0, 1]"))
    }
}

/// Negative, NaN or absurd values collapse to zero and are caught later by
/// the loop's own checks.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Args::parse().into()
    }

    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Args::try_parse_from(args).map(Self::from)
    }
}

impl From<Args> for RuntimeConfig {
    fn from(args: Args) -> Self {
        Self {
            duration: seconds(args.duration),
            interval: seconds(args.interval),
            seed: args.seed,
            fault_rate: (!args.no_faults).then_some(args.fault_rate),
            engine_type: args.engine,
            redline_rpm: args.redline,
            params_path: args.params,
            log_dir: args.log_dir,
            realtime: !args.fast,
            print_frames: !args.quiet,
            json_logs: args.json_logs,
            metrics_addr: args.metrics_addr,
            audit_path: args.audit_log,
        }
    }
}
