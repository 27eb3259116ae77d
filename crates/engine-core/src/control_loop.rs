use crate::clock::Clock;
use crate::diagnostics::DiagnosticSink;
use crate::engine::{EngineModel, EngineStatus, Tick};
use crate::error::{EngineError, SinkError};
use crate::fault::FaultInjector;
use crate::frame::PRESSURE_MAX;
use crate::hal::{DataRecord, DataSink, FrameSink};
use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct LoopConfig {
    pub interval: Duration,
    pub duration: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            duration: Duration::from_secs(10),
        }
    }
}

/// Throttle command as a function of simulated time.
pub trait ThrottleProfile {
    fn throttle(&mut self, t: f64) -> f64;
}

impl<F> ThrottleProfile for F
where
    F: FnMut(f64) -> f64,
{
    fn throttle(&mut self, t: f64) -> f64 {
        self(t)
    }
}

/// Slow sine sweep around 40 % with a little jitter.
#[derive(Debug, Clone)]
pub struct SineThrottle {
    rng: StdRng,
    pub base: f64,
    pub amplitude: f64,
    pub period_divisor: f64,
    pub jitter: f64,
}

impl SineThrottle {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            base: 0.4,
            amplitude: 0.35,
            period_divisor: 6.0,
            jitter: 0.05,
        }
    }
}

impl ThrottleProfile for SineThrottle {
    fn throttle(&mut self, t: f64) -> f64 {
        let noise = if self.jitter > 0.0 {
            self.rng.gen_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };
        (self.base + self.amplitude * (t / self.period_divisor).sin() + noise).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantThrottle(pub f64);

impl ThrottleProfile for ConstantThrottle {
    fn throttle(&mut self, _t: f64) -> f64 {
        self.0
    }
}

#[derive(Clone, Default, Debug)]
pub struct RunStats {
    pub ticks_executed: u64,
    pub events_logged: u64,
    pub dtcs_logged: u64,
    pub advisories: u64,
    pub derate_ticks: u64,
    pub faults_injected: u64,
    pub sink_failures: u64,
    pub simulated_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    /// Ran for the configured duration.
    Completed,
    /// The stop flag was raised.
    Stopped,
    /// Oil reached the critical temperature; the run is over.
    CriticalFailure { oil_temp: f64, limit: f64 },
    /// The engine refused to step for another reason.
    Aborted(EngineError),
}

/// Where a run's output goes.
pub struct RunSinks<'a> {
    pub diagnostics: &'a mut dyn DiagnosticSink,
    pub data: &'a mut dyn DataSink,
    pub frames: &'a mut dyn FrameSink,
}

/// Drives an [`EngineModel`] tick by tick.
pub struct SimulationLoop<C: Clock> {
    engine: EngineModel,
    injector: Option<Box<dyn FaultInjector + Send>>,
    throttle: Box<dyn ThrottleProfile + Send>,
    clock: C,
    config: LoopConfig,
    stats: RunStats,
}

impl<C: Clock> SimulationLoop<C> {
    pub fn new(engine: EngineModel, clock: C, config: LoopConfig) -> Self {
        Self {
            engine,
            injector: None,
            throttle: Box::new(SineThrottle::new(None)),
            clock,
            config,
            stats: RunStats::default(),
        }
    }

    pub fn with_injector(mut self, injector: impl FaultInjector + Send + 'static) -> Self {
        self.injector = Some(Box::new(injector));
        self
    }

    pub fn with_throttle(mut self, profile: impl ThrottleProfile + Send + 'static) -> Self {
        self.throttle = Box::new(profile);
        self
    }

    pub fn engine(&self) -> &EngineModel {
        &self.engine
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn run(&mut self, sinks: &mut RunSinks<'_>, stop: &AtomicBool) -> RunOutcome {
        let dt = self.config.interval.as_secs_f64();
        let duration_s = self.config.duration.as_secs_f64();

        if dt <= 0.0 {
            return RunOutcome::Aborted(EngineError::InvalidTimeStep { dt });
        }

        let mut status = self.engine.status();
        loop {
            if stop.load(Ordering::Relaxed) {
                return RunOutcome::Stopped;
            }
            if self.clock.elapsed_s() >= duration_s {
                return RunOutcome::Completed;
            }

            let throttle = self.throttle.throttle(self.stats.simulated_seconds);
            let timestamp = self.clock.now_s();
            let tick = Tick {
                throttle,
                dt,
                timestamp,
            };
            let injector = self
                .injector
                .as_deref_mut()
                .map(|injector| injector as &mut dyn FaultInjector);

            match self.engine.step(tick, injector, &mut *sinks.diagnostics) {
                Ok(report) => {
                    self.stats.ticks_executed += 1;
                    self.stats.events_logged += report.events_logged as u64;
                    self.stats.dtcs_logged += report.dtcs_logged as u64;
                    self.stats.advisories += report.advisories.len() as u64;
                    self.stats.faults_injected += report.injected.len() as u64;
                    self.stats.sink_failures += report.sink_errors.len() as u64;
                    if report.status == EngineStatus::Derate {
                        self.stats.derate_ticks += 1;
                    }
                    if report.status != status {
                        info!(
                            "engine status {} -> {} at t={timestamp:.3}",
                            status.as_str(),
                            report.status.as_str()
                        );
                        status = report.status;
                    }

                    let state = self.engine.state();
                    let record = DataRecord {
                        timestamp,
                        rpm: report.reading.rpm,
                        temp: report.reading.coolant_temp,
                        pressure: report.reading.pressure,
                        throttle,
                        ambient: self.engine.params().ambient,
                        oil_health: state.oil_health,
                        oil_temp: state.oil_temp,
                    };
                    let data_result = sinks.data.write_data(&record);
                    self.note_sink_result("data", data_result);
                    let frame_result =
                        sinks
                            .frames
                            .send_frame(timestamp, report.reading.frame(), &record);
                    self.note_sink_result("frame", frame_result);
                }
                Err(EngineError::CriticalOilTemp { oil_temp, limit }) => {
                    error!("critical event: oil temperature {oil_temp:.1} C >= {limit:.1} C");
                    self.stats.ticks_executed += 1;
                    let state = self.engine.state();
                    let record = DataRecord {
                        timestamp,
                        rpm: state.rpm,
                        temp: state.coolant_temp,
                        pressure: state.pressure.clamp(0.0, PRESSURE_MAX),
                        throttle,
                        ambient: self.engine.params().ambient,
                        oil_health: state.oil_health,
                        oil_temp: state.oil_temp,
                    };
                    let data_result = sinks.data.write_data(&record);
                    self.note_sink_result("data", data_result);
                    return RunOutcome::CriticalFailure { oil_temp, limit };
                }
                Err(e) => {
                    error!("engine step refused: {e}");
                    return RunOutcome::Aborted(e);
                }
            }

            self.clock.wait(self.config.interval);
            self.stats.simulated_seconds += dt;
        }
    }

    fn note_sink_result(&mut self, sink: &str, result: Result<(), SinkError>) {
        if let Err(e) = result {
            self.stats.sink_failures += 1;
            error!("{sink} sink failed: {e}");
        }
    }
}
