use crate::infra::audit::{AuditEventType, AuditLogger};
use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use engine_core::{
    Clock, Discard, EngineModel, EngineParams, FrameSink, LoopConfig, ParamsError,
    RandomFaultInjector, RunOutcome, RunSinks, RunStats, SimClock, SimulationLoop, SineThrottle,
    Tee, WallClock,
};
use engine_io::{ConsoleFrameSink, CsvRecorder, MetricsRecorder, RecorderError};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid simulation parameters: {0}")]
    Params(#[from] ParamsError),
    #[error(transparent)]
    Recorder(#[from] RecorderError),
    #[error("failed to open audit log {path}: {source}")]
    Audit {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("tick interval must be positive")]
    ZeroInterval,
    #[error("simulation thread panicked")]
    LoopPanicked,
}

/// What a finished run reports back to `main`.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub stats: RunStats,
}

impl RunSummary {
    /// Completed and stopped runs succeed; a critical failure exits with 2
    /// so scripts can tell it apart from a startup error.
    pub fn exit_code(&self) -> ExitCode {
        match self.outcome {
            RunOutcome::Completed | RunOutcome::Stopped => ExitCode::SUCCESS,
            RunOutcome::CriticalFailure { .. } => ExitCode::from(2),
            RunOutcome::Aborted(_) => ExitCode::FAILURE,
        }
    }
}

pub fn run_from_args() -> ExitCode {
    let config = RuntimeConfig::from_env();
    init_tracing(config.json_logs);
    match run(config) {
        Ok(summary) => summary.exit_code(),
        Err(e) => {
            error!(error = %e, "Simulation failed to start");
            ExitCode::FAILURE
        }
    }
}

fn engine_params(config: &RuntimeConfig) -> Result<EngineParams, ParamsError> {
    let mut params = match &config.params_path {
        Some(path) => {
            info!(path = %path.display(), "Loading engine parameters");
            EngineParams::from_json_file(path)?
        }
        None => EngineParams::for_engine(config.engine_type),
    };
    if config.redline_rpm.is_some() {
        params.redline_rpm = config.redline_rpm;
    }
    params.validate()?;
    if params.derate_temp >= params.critical_oil_temp {
        warn!(
            derate_temp = params.derate_temp,
            critical_oil_temp = params.critical_oil_temp,
            "Derate threshold is at or above the critical oil temperature; derate can never protect the engine"
        );
    }
    Ok(params)
}

pub fn run(config: RuntimeConfig) -> Result<RunSummary, AppError> {
    run_until(config, Arc::new(AtomicBool::new(false)))
}

/// Like [`run`], but the loop also ends as soon as `stop` is raised.
pub fn run_until(config: RuntimeConfig, stop: Arc<AtomicBool>) -> Result<RunSummary, AppError> {
    if config.interval.is_zero() {
        return Err(AppError::ZeroInterval);
    }
    let params = engine_params(&config)?;

    telemetry::init();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let audit_logger = init_audit_logger(config.audit_path.as_ref())?;
    let audit = |event_type: AuditEventType, details: serde_json::Value| {
        if let Some(logger) = &audit_logger {
            if let Err(e) = logger.log_event(event_type, details) {
                warn!(error = %e, "Failed to write audit entry");
            }
        }
    };

    let recorder = CsvRecorder::create(&config.log_dir)?;
    let engine = EngineModel::new(params.clone(), config.seed)?;
    let injector = config
        .fault_rate
        .map(|rate| RandomFaultInjector::new(config.seed, rate))
        .transpose()?;

    info!(
        engine_type = params.engine_type.as_str(),
        redline_rpm = params.redline(),
        interval_s = config.interval.as_secs_f64(),
        duration_s = config.duration.as_secs_f64(),
        fault_rate = config.fault_rate,
        seed = config.seed,
        realtime = config.realtime,
        log_dir = %config.log_dir.display(),
        "Starting engine simulation"
    );
    audit(
        AuditEventType::RunStart,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "engine_type": params.engine_type.as_str(),
            "seed": config.seed,
            "fault_rate": config.fault_rate,
            "interval_s": config.interval.as_secs_f64(),
            "duration_s": config.duration.as_secs_f64(),
            "log_dir": config.log_dir.display().to_string(),
        }),
    );

    let stop_loop = Arc::clone(&stop);
    let loop_config = LoopConfig {
        interval: config.interval,
        duration: config.duration,
    };
    let seed = config.seed;
    let realtime = config.realtime;
    let print_frames = config.print_frames;

    let handle = thread::spawn(move || {
        let mut recorder = recorder;
        let mut console: Box<dyn FrameSink> = if print_frames {
            Box::new(ConsoleFrameSink::stdout())
        } else {
            Box::new(Discard)
        };
        let summary = if realtime {
            drive(
                engine,
                WallClock::new(),
                loop_config,
                injector,
                seed,
                &mut recorder,
                &mut *console,
                &stop_loop,
            )
        } else {
            drive(
                engine,
                SimClock::new(),
                loop_config,
                injector,
                seed,
                &mut recorder,
                &mut *console,
                &stop_loop,
            )
        };
        if let Err(e) = recorder.flush() {
            error!(error = %e, "Failed to flush CSV logs");
        }
        summary
    });

    let summary = handle.join().map_err(|_| AppError::LoopPanicked)?;
    let stats = &summary.stats;
    telemetry::record_run(stats);

    if let RunOutcome::CriticalFailure { oil_temp, limit } = summary.outcome {
        error!(oil_temp, limit, "Critical oil temperature, engine halted");
        audit(
            AuditEventType::CriticalFailure,
            json!({
                "oil_temp": oil_temp,
                "limit": limit,
                "simulated_seconds": stats.simulated_seconds,
            }),
        );
    }
    if stats.sink_failures > 0 {
        warn!(sink_failures = stats.sink_failures, "Some records were not persisted");
        audit(
            AuditEventType::SinkFailure,
            json!({ "sink_failures": stats.sink_failures }),
        );
    }

    info!(
        outcome = ?summary.outcome,
        ticks_executed = stats.ticks_executed,
        events_logged = stats.events_logged,
        dtcs_logged = stats.dtcs_logged,
        advisories = stats.advisories,
        derate_ticks = stats.derate_ticks,
        faults_injected = stats.faults_injected,
        sink_failures = stats.sink_failures,
        "Run complete"
    );
    audit(
        AuditEventType::RunComplete,
        json!({
            "outcome": format!("{:?}", summary.outcome),
            "ticks_executed": stats.ticks_executed,
            "events_logged": stats.events_logged,
            "dtcs_logged": stats.dtcs_logged,
            "derate_ticks": stats.derate_ticks,
            "faults_injected": stats.faults_injected,
            "sink_failures": stats.sink_failures,
        }),
    );

    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
fn drive<C: Clock>(
    engine: EngineModel,
    clock: C,
    loop_config: LoopConfig,
    injector: Option<RandomFaultInjector>,
    seed: Option<u64>,
    recorder: &mut CsvRecorder,
    frames: &mut dyn FrameSink,
    stop: &AtomicBool,
) -> RunSummary {
    let mut sim =
        SimulationLoop::new(engine, clock, loop_config).with_throttle(SineThrottle::new(seed));
    if let Some(injector) = injector {
        sim = sim.with_injector(injector);
    }

    let CsvRecorder {
        diagnostics, data, ..
    } = recorder;
    let mut diagnostics = Tee(diagnostics, MetricsRecorder);
    let mut data = Tee(data, MetricsRecorder);
    let outcome = sim.run(
        &mut RunSinks {
            diagnostics: &mut diagnostics,
            data: &mut data,
            frames,
        },
        stop,
    );
    RunSummary {
        outcome,
        stats: sim.stats().clone(),
    }
}

fn init_audit_logger(audit_path: Option<&PathBuf>) -> Result<Option<AuditLogger>, AppError> {
    audit_path
        .map(|path| {
            AuditLogger::new(path)
                .map(|logger| {
                    info!(path = %path.display(), "Audit logging enabled");
                    logger
                })
                .map_err(|source| AppError::Audit {
                    path: path.clone(),
                    source,
                })
        })
        .transpose()
}
