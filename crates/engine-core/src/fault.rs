use crate::engine::EngineState;
use crate::error::ParamsError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A fault applied by an injector during one tick. The engine turns these
/// into `INJECT_*` events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InjectedFault {
    /// Final tick of an rpm spike.
    Overspeed { throttle: f64 },
    /// Final tick of a coolant spike.
    Overheat,
    /// One-shot oil pump failure.
    OilFailure { delta: f64 },
}

/// Perturbs engine state once per tick.
pub trait FaultInjector {
    fn inject(&mut self, state: &mut EngineState, throttle: f64) -> Vec<InjectedFault>;
}

impl<F> FaultInjector for F
where
    F: FnMut(&mut EngineState, f64) -> Vec<InjectedFault>,
{
    fn inject(&mut self, state: &mut EngineState, throttle: f64) -> Vec<InjectedFault> {
        self(state, throttle)
    }
}

/// Stochastic injector with two spike timers and a one-shot oil failure.
///
/// All draws come from the injector's own `StdRng`, so a fixed seed gives
/// the same spike timing and magnitudes run after run.
#[derive(Debug, Clone)]
pub struct RandomFaultInjector {
    rng: StdRng,
    fault_rate: f64,
    overspeed_timer: u32,
    overheat_timer: u32,
    oil_failure: bool,
}

impl RandomFaultInjector {
    /// `fault_rate` is a per-tick probability and must lie in `[0, 1]`.
    pub fn new(seed: Option<u64>, fault_rate: f64) -> Result<Self, ParamsError> {
        if !(0.0..=1.0).contains(&fault_rate) {
            return Err(ParamsError::OutOfRange {
                name: "fault_rate",
                value: fault_rate,
                min: 0.0,
                max: 1.0,
            });
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            fault_rate,
            overspeed_timer: 0,
            overheat_timer: 0,
            oil_failure: false,
        })
    }

    pub fn fault_rate(&self) -> f64 {
        self.fault_rate
    }

    pub fn overspeed_ticks_remaining(&self) -> u32 {
        self.overspeed_timer
    }

    pub fn overheat_ticks_remaining(&self) -> u32 {
        self.overheat_timer
    }

    pub fn oil_failure_triggered(&self) -> bool {
        self.oil_failure
    }
}

impl FaultInjector for RandomFaultInjector {
    fn inject(&mut self, state: &mut EngineState, throttle: f64) -> Vec<InjectedFault> {
        let mut faults = Vec::new();

        if self.overspeed_timer > 0 {
            state.rpm += self.rng.gen_range(300.0..=900.0);
            if self.overspeed_timer == 1 {
                faults.push(InjectedFault::Overspeed { throttle });
            }
            self.overspeed_timer -= 1;
        } else if self.rng.gen_bool(self.fault_rate) {
            self.overspeed_timer = self.rng.gen_range(2..=6);
        }

        if self.overheat_timer > 0 {
            state.coolant_temp += self.rng.gen_range(0.3..=0.9);
            if self.overheat_timer == 1 {
                faults.push(InjectedFault::Overheat);
            }
            self.overheat_timer -= 1;
        } else if self.rng.gen_bool(self.fault_rate * 0.5) {
            self.overheat_timer = self.rng.gen_range(10..=30);
        }

        if !self.oil_failure && self.rng.gen_bool(self.fault_rate * 0.2) {
            self.oil_failure = true;
            let delta = self.rng.gen_range(0.2..=0.6);
            state.oil_health = (state.oil_health - delta).max(0.0);
            faults.push(InjectedFault::OilFailure { delta });
        }

        faults
    }
}
