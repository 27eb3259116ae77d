//! Engine model: rpm, coolant/oil thermal and oil pressure dynamics with
//! threshold-driven events, DTCs and derate.

use crate::derate::{DerateController, DerateState};
use crate::diagnostics::{DiagnosticSink, DtcCode, EventCode, Record};
use crate::error::{EngineError, ParamsError, SinkError};
use crate::fault::{FaultInjector, InjectedFault};
use crate::frame::{encode_frame, FRAME_LEN, PRESSURE_MAX};
use crate::params::EngineParams;
use log::{error, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Excess target rpm above the redline is scaled by this factor.
const SOFT_LIMIT_COMPRESSION: f64 = 0.25;
const THROTTLE_EXPONENT: f64 = 0.85;

/// Overspeed latches above `redline + OVERSPEED_MARGIN`, clamps rpm at
/// `redline + OVERSPEED_CLAMP` and clears below `redline - OVERSPEED_CLEAR`.
const OVERSPEED_MARGIN: f64 = 50.0;
const OVERSPEED_CLAMP: f64 = 100.0;
const OVERSPEED_CLEAR: f64 = 100.0;

const OIL_TO_COOLANT: f64 = 0.10;
const OIL_HEAT_PER_RPM: f64 = 0.0020;
const OIL_COOLING_DIVISOR: f64 = 200.0;

const PRESSURE_RPM_GAIN: f64 = 350.0;
const PRESSURE_RPM_EXPONENT: f64 = 0.9;

const FAN_PRESSURE_FACTOR: f64 = 0.985;

/// Oil wear starts above this temperature.
const OIL_WEAR_TEMP: f64 = 100.0;
const OIL_WEAR_REFERENCE: f64 = 90.0;
const OIL_SEVERE_TEMP: f64 = 115.0;
const OIL_EXTREME_TEMP: f64 = 120.0;

/// Physical state of the engine. Mutated in place by [`EngineModel::step`]
/// and by fault injectors.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    pub rpm: f64,
    pub coolant_temp: f64,
    pub oil_temp: f64,
    /// 1.0 = fresh oil, 0.0 = failed.
    pub oil_health: f64,
    /// Smoothed internal oil pressure in kPa.
    pub pressure: f64,
    /// Effective rev ceiling; reduced while derating.
    pub max_rpm: f64,
    pub fan_active: bool,
    pub derate_active: bool,
    /// Seconds spent with oil above 100 C, decaying at half rate when cool.
    pub hot_seconds: f64,
    pub total_run_seconds: f64,
}

impl EngineState {
    pub fn from_params(params: &EngineParams) -> Self {
        Self {
            rpm: params.initial_rpm,
            coolant_temp: params.initial_coolant_temp,
            oil_temp: params.initial_oil_temp,
            oil_health: 1.0,
            pressure: params.initial_pressure,
            max_rpm: params.max_rpm,
            fan_active: false,
            derate_active: false,
            hot_seconds: 0.0,
            total_run_seconds: 0.0,
        }
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::from_params(&EngineParams::default())
    }
}

/// One tick of input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub throttle: f64,
    pub dt: f64,
    /// Seconds; stamped onto every record emitted during the tick.
    pub timestamp: f64,
}

impl Tick {
    pub fn new(throttle: f64, dt: f64) -> Self {
        Self {
            throttle,
            dt,
            timestamp: 0.0,
        }
    }

    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Noisy readings as a sensor would report them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    pub rpm: f64,
    pub coolant_temp: f64,
    pub pressure: f64,
}

impl SensorReading {
    pub fn frame(&self) -> [u8; FRAME_LEN] {
        encode_frame(self.rpm, self.coolant_temp, self.pressure.min(PRESSURE_MAX))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineStatus {
    #[default]
    Ok,
    Derate,
}

impl EngineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Derate => "derate",
        }
    }
}

/// Non-fatal warnings. They change no state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Advisory {
    HighOilTemp { oil_temp: f64 },
    LowOilPressure { pressure: f64 },
}

#[derive(Debug)]
pub struct StepReport {
    pub reading: SensorReading,
    pub status: EngineStatus,
    pub advisories: Vec<Advisory>,
    pub injected: Vec<InjectedFault>,
    pub events_logged: usize,
    pub dtcs_logged: usize,
    /// Records the sink failed to persist this tick.
    pub sink_errors: Vec<SinkError>,
}

/// Writes records for one tick and keeps sink failures instead of
/// dropping them.
struct Emitter<'a> {
    sink: &'a mut dyn DiagnosticSink,
    timestamp: f64,
    events: usize,
    dtcs: usize,
    errors: Vec<SinkError>,
}

impl<'a> Emitter<'a> {
    fn new(sink: &'a mut dyn DiagnosticSink, timestamp: f64) -> Self {
        Self {
            sink,
            timestamp,
            events: 0,
            dtcs: 0,
            errors: Vec::new(),
        }
    }

    fn event(&mut self, code: EventCode, description: String) {
        match self
            .sink
            .log_event(&Record::new(self.timestamp, code, description))
        {
            Ok(()) => self.events += 1,
            Err(e) => {
                error!("failed to log event {code}: {e}");
                self.errors.push(e);
            }
        }
    }

    fn dtc(&mut self, code: DtcCode, description: String) {
        match self
            .sink
            .log_dtc(&Record::new(self.timestamp, code, description))
        {
            Ok(()) => self.dtcs += 1,
            Err(e) => {
                error!("failed to log DTC {code}: {e}");
                self.errors.push(e);
            }
        }
    }
}

/// First-order relaxation factor for a step of `dt` with time constant `tau`.
fn relaxation(dt: f64, tau: f64) -> f64 {
    1.0 - (-dt / tau.max(1e-6)).exp()
}

fn gauss(rng: &mut StdRng, sigma: f64) -> f64 {
    Normal::new(0.0, sigma)
        .map(|normal| normal.sample(rng))
        .unwrap_or(0.0)
}

/// The engine model. Owns its state, its parameters and its noise source.
#[derive(Debug, Clone)]
pub struct EngineModel {
    params: EngineParams,
    state: EngineState,
    rng: StdRng,
    derate: DerateController,
    overspeed_active: bool,
    halted: bool,
}

impl EngineModel {
    /// Build a model from validated parameters. `seed` makes the sensor and
    /// heat noise reproducible.
    pub fn new(params: EngineParams, seed: Option<u64>) -> Result<Self, ParamsError> {
        params.validate()?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            state: EngineState::from_params(&params),
            derate: DerateController::new(params.max_rpm),
            params,
            rng,
            overspeed_active: false,
            halted: false,
        })
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Direct access for test harnesses and external resets.
    pub fn state_mut(&mut self) -> &mut EngineState {
        &mut self.state
    }

    /// Oil change: restores health and forgets accumulated hot time.
    pub fn service_oil(&mut self) {
        self.state.oil_health = 1.0;
        self.state.hot_seconds = 0.0;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn overspeed_active(&self) -> bool {
        self.overspeed_active
    }

    pub fn derate_state(&self) -> DerateState {
        self.derate.state()
    }

    pub fn status(&self) -> EngineStatus {
        if self.state.derate_active {
            EngineStatus::Derate
        } else {
            EngineStatus::Ok
        }
    }

    /// Advance the engine by one tick.
    ///
    /// Returns [`EngineError::CriticalOilTemp`] once when the oil reaches the
    /// critical temperature; every later call returns
    /// [`EngineError::Halted`] without touching the state.
    pub fn step(
        &mut self,
        tick: Tick,
        injector: Option<&mut dyn FaultInjector>,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<StepReport, EngineError> {
        if self.halted {
            return Err(EngineError::Halted);
        }
        if !tick.dt.is_finite() || tick.dt <= 0.0 {
            return Err(EngineError::InvalidTimeStep { dt: tick.dt });
        }

        let Self {
            params,
            state,
            rng,
            derate,
            overspeed_active,
            halted,
        } = self;
        let dt = tick.dt;
        let mut out = Emitter::new(sink, tick.timestamp);

        let mut throttle = if tick.throttle.is_finite() {
            tick.throttle.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if state.derate_active {
            throttle *= params.derate_factor;
        }

        // Rpm: non-linear throttle map with a soft limiter above the redline.
        let redline = params.redline();
        let mut target_rpm =
            params.idle_rpm + throttle.powf(THROTTLE_EXPONENT) * (state.max_rpm - params.idle_rpm);
        if target_rpm > redline {
            target_rpm = redline + (target_rpm - redline) * SOFT_LIMIT_COMPRESSION;
        }
        state.rpm += (target_rpm - state.rpm) * relaxation(dt, params.rpm_time_constant);

        if state.rpm > redline + OVERSPEED_MARGIN {
            if !*overspeed_active {
                *overspeed_active = true;
                out.event(
                    EventCode::Overspeed,
                    format!("RPM {:.1} exceeded redline {:.0}", state.rpm, redline),
                );
                out.dtc(
                    DtcCode::Overspeed,
                    format!("RPM {:.1} exceeded redline", state.rpm),
                );
            }
            state.rpm = state.rpm.min(redline + OVERSPEED_CLAMP);
        } else if *overspeed_active && state.rpm < redline - OVERSPEED_CLEAR {
            *overspeed_active = false;
            out.event(
                EventCode::OverspeedClear,
                format!("RPM {:.1} returned below clear threshold", state.rpm),
            );
        }

        // Thermal.
        let rpm_fraction = state.rpm / state.max_rpm.max(1.0);
        let heat = (0.9 * throttle + 0.3 * rpm_fraction) * 10.0 + rng.gen_range(-0.1..=0.1);
        let cooling = (state.coolant_temp - params.ambient) / params.thermal_time_constant.max(1.0);

        if !state.fan_active
            && (state.coolant_temp > params.fan_on_temp || state.oil_temp > params.fan_on_temp)
        {
            state.fan_active = true;
            out.event(
                EventCode::FanOn,
                format!(
                    "Fan turned ON at coolant {:.1}C oil {:.1}C",
                    state.coolant_temp, state.oil_temp
                ),
            );
        }
        if state.fan_active
            && state.coolant_temp < params.fan_off_temp
            && state.oil_temp < params.fan_off_temp
        {
            state.fan_active = false;
            out.event(
                EventCode::FanOff,
                format!(
                    "Fan turned OFF at coolant {:.1}C oil {:.1}C",
                    state.coolant_temp, state.oil_temp
                ),
            );
        }
        let fan_cooling = if state.fan_active {
            params.fan_cooling_power * (0.5 + 0.5 * rpm_fraction)
        } else {
            0.0
        };

        let oil_to_coolant = OIL_TO_COOLANT * (state.oil_temp - state.coolant_temp);
        let mut coolant_delta = (heat - cooling - fan_cooling + oil_to_coolant) * dt;
        // Heating is unbounded, cooling is rate limited.
        let max_cooling = params.max_coolant_cool_rate * dt;
        if coolant_delta < -max_cooling {
            coolant_delta = -max_cooling;
        }
        state.coolant_temp += coolant_delta;

        let oil_heat = OIL_HEAT_PER_RPM * state.rpm;
        let oil_cooling = (state.oil_temp - params.ambient) / OIL_COOLING_DIVISOR;
        state.oil_temp += (oil_heat - oil_cooling) * dt;

        // Oil pressure.
        let pump_flow = rpm_fraction * state.oil_health;
        let rpm_pressure = PRESSURE_RPM_GAIN * rpm_fraction.powf(PRESSURE_RPM_EXPONENT);
        let temp_factor = (1.0 - (state.oil_temp - 90.0) / 200.0).max(0.4);
        let target_pressure = (params.oil_pump_base + rpm_pressure * pump_flow) * temp_factor;
        let alpha = relaxation(dt, params.pressure_time_constant);
        state.pressure = state.pressure * (1.0 - alpha) + target_pressure * alpha;
        let pressure_kpa = state.pressure.clamp(0.0, params.pressure_ceiling);

        // Logged on every tick above the threshold; the DTC log keeps a
        // record per sample while the condition persists.
        if pressure_kpa > params.pressure_spike_kpa {
            out.event(
                EventCode::PressureSpike,
                format!(
                    "Pressure spike {:.1} kPa at RPM {:.1}",
                    pressure_kpa, state.rpm
                ),
            );
            out.dtc(
                DtcCode::PressureSpike,
                format!("Pressure {:.1} kPa", pressure_kpa),
            );
        }

        let mut injected = Vec::new();
        if let Some(injector) = injector {
            for fault in injector.inject(state, throttle) {
                match fault {
                    InjectedFault::Overspeed { throttle } => out.event(
                        EventCode::InjectOverspeed,
                        format!("Injected RPM spike at throttle {:.2}", throttle),
                    ),
                    InjectedFault::Overheat => out.event(
                        EventCode::InjectOverheat,
                        "Injected overheat spike".to_string(),
                    ),
                    InjectedFault::OilFailure { delta } => out.event(
                        EventCode::InjectOilfail,
                        format!("Injected oil pump failure, oil_health -{:.2}", delta),
                    ),
                }
                injected.push(fault);
            }
        }

        // Oil wear.
        if state.oil_temp > OIL_WEAR_TEMP {
            state.hot_seconds += dt;
            let mut decay = params.oil_health_decay_rate
                * (state.oil_temp - OIL_WEAR_REFERENCE)
                * dt
                * (1.0 + state.hot_seconds / 120.0);
            if state.oil_temp > OIL_SEVERE_TEMP {
                let mut extra = ((state.oil_temp - OIL_SEVERE_TEMP) / 8.0).exp() * 0.002 * dt;
                if state.oil_temp > OIL_EXTREME_TEMP {
                    extra *= 5.0;
                }
                decay += extra;
            }
            state.oil_health = (state.oil_health - decay).max(0.0);
        } else {
            state.hot_seconds = (state.hot_seconds - dt * 0.5).max(0.0);
        }
        state.total_run_seconds += dt;

        // Readings: noise is layered on top of the physical state, never
        // fed back into it.
        let noise_rpm = gauss(rng, (0.002 * state.rpm).max(1.0));
        let noise_temp = gauss(rng, (0.002 * state.coolant_temp).max(0.2));
        let noise_pressure = gauss(rng, (0.005 * pressure_kpa).max(0.5));

        let mut reading = SensorReading {
            rpm: (state.rpm + noise_rpm).max(0.0),
            coolant_temp: (state.coolant_temp + noise_temp).max(params.ambient),
            pressure: (pressure_kpa + noise_pressure).max(0.0),
        };
        if state.fan_active {
            reading.coolant_temp =
                (reading.coolant_temp - fan_cooling * dt.min(1.0)).max(params.ambient);
            reading.pressure = (reading.pressure * FAN_PRESSURE_FACTOR).max(0.0);
        }

        state.coolant_temp = state.coolant_temp.max(params.ambient);
        state.rpm = state.rpm.max(0.0);

        let ceiling = params.effective_redline();
        if state.rpm > ceiling {
            state.rpm = state.rpm.min(ceiling + OVERSPEED_CLAMP);
        }

        let mut advisories = Vec::new();
        if state.oil_temp > params.oil_temp_warning {
            warn!("OilTemp high: {:.1} C", state.oil_temp);
            advisories.push(Advisory::HighOilTemp {
                oil_temp: state.oil_temp,
            });
        }
        if reading.pressure < params.low_pressure_warning {
            warn!("LowOilPressure: {:.1} kPa", reading.pressure);
            advisories.push(Advisory::LowOilPressure {
                pressure: reading.pressure,
            });
        }

        let update = derate.update(params, state.oil_temp, &mut state.max_rpm, dt);
        state.derate_active = derate.is_active();
        if update.engaged.is_some() {
            out.event(
                EventCode::DerateOn,
                format!("OilTemp {:.1}C reached derate threshold", state.oil_temp),
            );
        }
        if update.dtc_due {
            out.dtc(
                DtcCode::DerateActive,
                format!("Derate engaged at OilTemp {:.1}C", state.oil_temp),
            );
        }
        if update.released {
            out.event(
                EventCode::DerateOff,
                format!(
                    "OilTemp {:.1}C cooled below derate threshold",
                    state.oil_temp
                ),
            );
        }

        if state.oil_temp >= params.critical_oil_temp {
            let failure = EngineError::CriticalOilTemp {
                oil_temp: state.oil_temp,
                limit: params.critical_oil_temp,
            };
            out.event(EventCode::CriticalOilTemp, failure.to_string());
            out.dtc(DtcCode::FatalOilTemp, failure.to_string());
            *halted = true;
            return Err(failure);
        }

        let status = if state.derate_active {
            EngineStatus::Derate
        } else {
            EngineStatus::Ok
        };

        Ok(StepReport {
            reading,
            status,
            advisories,
            injected,
            events_logged: out.events,
            dtcs_logged: out.dtcs,
            sink_errors: out.errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DtcRecord, EventRecord, MemorySink, NullSink};
    use crate::params::EngineType;

    fn model() -> EngineModel {
        EngineModel::new(EngineParams::default(), Some(42)).unwrap()
    }

    fn step(engine: &mut EngineModel, sink: &mut MemorySink, throttle: f64, dt: f64) -> StepReport {
        engine
            .step(Tick::new(throttle, dt), None, sink)
            .expect("step should not fail")
    }

    #[test]
    fn rpm_converges_monotonically_to_target() {
        let mut engine = model();
        let mut sink = MemorySink::new();
        let throttle: f64 = 0.3;
        let target = 800.0 + throttle.powf(0.85) * (7000.0 - 800.0);

        let mut previous_gap = (target - engine.state().rpm).abs();
        for _ in 0..40 {
            step(&mut engine, &mut sink, throttle, 0.1);
            let gap = (target - engine.state().rpm).abs();
            assert!(gap <= previous_gap + 1e-9);
            assert!(engine.state().rpm <= target + 1e-9);
            previous_gap = gap;
        }
        assert!(previous_gap < 0.1 * target);
    }

    #[test]
    fn idle_throttle_settles_at_idle() {
        let mut engine = model();
        let mut sink = MemorySink::new();
        for _ in 0..100 {
            step(&mut engine, &mut sink, 0.0, 0.1);
        }
        assert!((engine.state().rpm - 800.0).abs() < 1.0);
        assert_eq!(engine.status(), EngineStatus::Ok);
    }

    #[test]
    fn throttle_is_clamped() {
        let mut a = model();
        let mut b = model();
        let mut sink = MemorySink::new();
        let ra = step(&mut a, &mut sink, 3.0, 0.1);
        let rb = step(&mut b, &mut sink, 1.0, 0.1);
        assert_eq!(a.state(), b.state());
        assert_eq!(ra.reading, rb.reading);
    }

    #[test]
    fn refuses_params_that_would_break_the_step() {
        let cases = [
            EngineParams {
                pressure_ceiling: -1.0,
                ..EngineParams::default()
            },
            EngineParams {
                idle_rpm: f64::NAN,
                ..EngineParams::default()
            },
        ];
        for params in cases {
            assert!(EngineModel::new(params, Some(1)).is_err());
        }
    }

    #[test]
    fn status_tags() {
        assert_eq!(EngineStatus::Ok.as_str(), "ok");
        assert_eq!(EngineStatus::Derate.as_str(), "derate");
    }

    #[test]
    fn rejects_invalid_dt() {
        let mut engine = model();
        let before = engine.state().clone();
        for dt in [0.0, -1.0, f64::NAN] {
            let result = engine.step(Tick::new(0.5, dt), None, &mut NullSink);
            assert!(matches!(result, Err(EngineError::InvalidTimeStep { .. })));
            assert!(!result.unwrap_err().is_terminal());
        }
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn overspeed_latches_once_and_clears_with_hysteresis() {
        let mut engine = model();
        let mut sink = MemorySink::new();
        let redline = engine.params().redline();

        // Push past redline + 50 via the state and hold throttle high.
        // Oil is pinned so the run stays clear of derate and critical.
        engine.state_mut().rpm = redline + 80.0;
        for _ in 0..10 {
            engine.state_mut().oil_temp = 80.0;
            step(&mut engine, &mut sink, 1.0, 0.1);
        }
        assert!(engine.overspeed_active());
        assert_eq!(sink.event_count(EventCode::Overspeed), 1);
        assert_eq!(sink.dtc_count(DtcCode::Overspeed), 1);
        assert!(engine.state().rpm <= redline + 100.0);

        // Inside the band (redline - 100 .. redline + 50): no clear.
        for _ in 0..5 {
            engine.state_mut().rpm = redline - 50.0;
            engine.state_mut().oil_temp = 80.0;
            step(&mut engine, &mut sink, 0.78, 0.01);
            assert!(engine.overspeed_active());
        }
        assert_eq!(sink.event_count(EventCode::OverspeedClear), 0);

        // Drop well below the clear threshold.
        for _ in 0..60 {
            engine.state_mut().oil_temp = 80.0;
            step(&mut engine, &mut sink, 0.2, 0.1);
        }
        assert!(!engine.overspeed_active());
        assert_eq!(sink.event_count(EventCode::OverspeedClear), 1);
        assert_eq!(sink.event_count(EventCode::Overspeed), 1);
    }

    #[test]
    fn fan_hysteresis_does_not_thrash_in_band() {
        let mut engine = model();
        let mut sink = MemorySink::new();

        engine.state_mut().coolant_temp = 101.0;
        step(&mut engine, &mut sink, 0.2, 0.01);
        assert!(engine.state().fan_active);
        assert_eq!(sink.event_count(EventCode::FanOn), 1);

        for _ in 0..20 {
            engine.state_mut().coolant_temp = 97.0;
            engine.state_mut().oil_temp = 90.0;
            step(&mut engine, &mut sink, 0.2, 0.01);
            assert!(engine.state().fan_active);
        }
        assert_eq!(sink.event_count(EventCode::FanOn), 1);
        assert_eq!(sink.event_count(EventCode::FanOff), 0);

        engine.state_mut().coolant_temp = 94.0;
        engine.state_mut().oil_temp = 90.0;
        step(&mut engine, &mut sink, 0.2, 0.01);
        assert!(!engine.state().fan_active);
        assert_eq!(sink.event_count(EventCode::FanOff), 1);
    }

    #[test]
    fn fan_turns_on_for_hot_oil_alone() {
        let mut engine = model();
        let mut sink = MemorySink::new();
        engine.state_mut().oil_temp = 101.0;
        step(&mut engine, &mut sink, 0.2, 0.01);
        assert!(engine.state().fan_active);
    }

    #[test]
    fn fan_off_requires_both_below_threshold() {
        let mut engine = model();
        let mut sink = MemorySink::new();
        engine.state_mut().oil_temp = 101.0;
        step(&mut engine, &mut sink, 0.2, 0.01);

        engine.state_mut().coolant_temp = 80.0;
        engine.state_mut().oil_temp = 96.0;
        step(&mut engine, &mut sink, 0.2, 0.01);
        assert!(engine.state().fan_active);
    }

    #[test]
    fn coolant_cooling_is_rate_limited() {
        let mut engine = model();
        let mut sink = MemorySink::new();
        engine.state_mut().coolant_temp = 110.0;
        engine.state_mut().oil_temp = 30.0;
        let dt = 0.5;
        let before = engine.state().coolant_temp;
        step(&mut engine, &mut sink, 0.0, dt);
        let drop = before - engine.state().coolant_temp;
        assert!(drop <= 1.5 * dt + 1e-9, "dropped {drop}");
        assert!(drop > 0.0);
    }

    #[test]
    fn coolant_never_below_ambient() {
        let mut engine = model();
        let mut sink = MemorySink::new();
        engine.state_mut().coolant_temp = 25.5;
        engine.state_mut().oil_temp = 25.0;
        for _ in 0..50 {
            let report = step(&mut engine, &mut sink, 0.0, 1.0);
            assert!(engine.state().coolant_temp >= 25.0);
            assert!(report.reading.coolant_temp >= 25.0);
        }
    }

    #[test]
    fn pressure_spike_logged_every_tick() {
        let params = EngineParams {
            oil_pump_base: 400.0,
            ..EngineParams::default()
        };
        let mut engine = EngineModel::new(params, Some(1)).unwrap();
        let mut sink = MemorySink::new();
        engine.state_mut().pressure = 350.0;
        engine.state_mut().oil_temp = 60.0;
        for _ in 0..5 {
            step(&mut engine, &mut sink, 0.5, 0.1);
        }
        assert_eq!(sink.event_count(EventCode::PressureSpike), 5);
        assert_eq!(sink.dtc_count(DtcCode::PressureSpike), 5);
    }

    #[test]
    fn pressure_readout_is_clamped() {
        let params = EngineParams {
            oil_pump_base: 1000.0,
            ..EngineParams::default()
        };
        let mut engine = EngineModel::new(params, Some(1)).unwrap();
        let mut sink = MemorySink::new();
        for _ in 0..50 {
            engine.state_mut().oil_temp = 60.0;
            let report = step(&mut engine, &mut sink, 0.5, 0.5);
            // Clamped readout plus a few sigma of noise.
            assert!(report.reading.pressure < 350.0 + 6.0 * 1.75);
        }
        assert!(engine.state().pressure > 350.0);
    }

    #[test]
    fn worn_oil_loses_pressure() {
        let mut fresh = model();
        let mut worn = model();
        worn.state_mut().oil_health = 0.1;
        let mut sink = MemorySink::new();
        for _ in 0..15 {
            step(&mut fresh, &mut sink, 0.6, 0.2);
            step(&mut worn, &mut sink, 0.6, 0.2);
        }
        assert!(worn.state().pressure < fresh.state().pressure);
    }

    #[test]
    fn oil_health_decays_only_when_hot() {
        let mut engine = model();
        let mut sink = MemorySink::new();
        engine.state_mut().oil_temp = 95.0;
        step(&mut engine, &mut sink, 0.0, 0.5);
        assert_eq!(engine.state().oil_health, 1.0);

        engine.state_mut().oil_temp = 112.0;
        step(&mut engine, &mut sink, 0.0, 0.5);
        assert!(engine.state().oil_health < 1.0);
        assert_eq!(engine.state().hot_seconds, 0.5);
    }

    #[test]
    fn hot_seconds_recover_at_half_rate() {
        let mut engine = model();
        let mut sink = MemorySink::new();
        engine.state_mut().hot_seconds = 2.0;
        engine.state_mut().oil_temp = 80.0;
        step(&mut engine, &mut sink, 0.0, 1.0);
        assert_eq!(engine.state().hot_seconds, 1.5);
        for _ in 0..10 {
            step(&mut engine, &mut sink, 0.0, 1.0);
        }
        assert_eq!(engine.state().hot_seconds, 0.0);
    }

    #[test]
    fn oil_health_floors_at_zero() {
        let mut engine = model();
        let mut sink = MemorySink::new();
        for _ in 0..200 {
            engine.state_mut().oil_temp = 123.0;
            step(&mut engine, &mut sink, 0.0, 0.5);
            assert!(engine.state().oil_health >= 0.0);
        }
        assert_eq!(engine.state().oil_health, 0.0);
    }

    #[test]
    fn service_restores_oil() {
        let mut engine = model();
        engine.state_mut().oil_health = 0.2;
        engine.state_mut().hot_seconds = 30.0;
        engine.service_oil();
        assert_eq!(engine.state().oil_health, 1.0);
        assert_eq!(engine.state().hot_seconds, 0.0);
    }

    #[test]
    fn derate_engages_and_releases() {
        let mut engine = model();
        let mut sink = MemorySink::new();

        engine.state_mut().oil_temp = 120.5;
        let report = step(&mut engine, &mut sink, 0.1, 0.1);
        assert_eq!(report.status, EngineStatus::Derate);
        assert_eq!(engine.derate_state(), DerateState::Derating);
        assert_eq!(sink.event_count(EventCode::DerateOn), 1);
        assert_eq!(sink.dtc_count(DtcCode::DerateActive), 1);
        assert_eq!(engine.state().max_rpm, 7000.0 - 50.0);

        engine.state_mut().oil_temp = 118.0;
        step(&mut engine, &mut sink, 0.1, 0.1);
        assert!(engine.state().derate_active);

        engine.state_mut().oil_temp = 110.0;
        let report = step(&mut engine, &mut sink, 0.1, 0.1);
        assert_eq!(report.status, EngineStatus::Ok);
        assert_eq!(sink.event_count(EventCode::DerateOff), 1);
        assert_eq!(sink.dtc_count(DtcCode::DerateActive), 1);
    }

    #[test]
    fn derate_scales_throttle() {
        let mut engine = model();
        let mut sink = MemorySink::new();
        engine.state_mut().oil_temp = 121.0;
        step(&mut engine, &mut sink, 1.0, 0.01);
        assert!(engine.state().derate_active);

        // Same throttle, derated engine settles well below the redline.
        for _ in 0..60 {
            engine.state_mut().oil_temp = 121.0;
            step(&mut engine, &mut sink, 1.0, 0.1);
        }
        assert!(engine.state().rpm < 4000.0);
    }

    #[test]
    fn critical_failure_is_terminal() {
        let mut engine = model();
        let mut sink = MemorySink::new();
        engine.state_mut().oil_temp = 124.99;

        let result = engine.step(Tick::new(1.0, 0.5).at(12.5), None, &mut sink);
        match result {
            Err(e @ EngineError::CriticalOilTemp { oil_temp, limit }) => {
                assert!(e.is_terminal());
                assert!(oil_temp >= 125.0);
                assert_eq!(limit, 125.0);
            }
            other => panic!("expected critical failure, got {other:?}"),
        }
        assert!(engine.is_halted());
        assert_eq!(sink.event_count(EventCode::CriticalOilTemp), 1);
        assert_eq!(sink.dtc_count(DtcCode::FatalOilTemp), 1);
        assert!(sink
            .dtcs
            .iter()
            .filter(|r| r.code == DtcCode::FatalOilTemp)
            .all(|r| r.timestamp == 12.5));

        let frozen = engine.state().clone();
        for _ in 0..3 {
            let again = engine.step(Tick::new(1.0, 0.5), None, &mut sink);
            assert!(matches!(again, Err(EngineError::Halted)));
            assert!(again.unwrap_err().is_terminal());
        }
        assert_eq!(engine.state(), &frozen);
        assert_eq!(sink.event_count(EventCode::CriticalOilTemp), 1);
    }

    #[test]
    fn advisories_reported() {
        let mut engine = model();
        let mut sink = MemorySink::new();
        engine.state_mut().oil_temp = 112.0;
        engine.state_mut().pressure = 20.0;
        let report = step(&mut engine, &mut sink, 0.0, 0.01);
        assert!(report
            .advisories
            .iter()
            .any(|a| matches!(a, Advisory::HighOilTemp { .. })));
        assert!(report
            .advisories
            .iter()
            .any(|a| matches!(a, Advisory::LowOilPressure { .. })));
    }

    #[test]
    fn injector_faults_become_events() {
        let mut engine = model();
        let mut sink = MemorySink::new();
        let mut injector = |state: &mut EngineState, throttle: f64| {
            state.oil_health -= 0.25;
            vec![
                InjectedFault::Overspeed { throttle },
                InjectedFault::OilFailure { delta: 0.25 },
            ]
        };
        let report = engine
            .step(Tick::new(0.4, 0.1), Some(&mut injector), &mut sink)
            .unwrap();
        assert_eq!(report.injected.len(), 2);
        assert_eq!(sink.event_count(EventCode::InjectOverspeed), 1);
        assert_eq!(sink.event_count(EventCode::InjectOilfail), 1);
        assert!(engine.state().oil_health <= 0.75);
    }

    #[test]
    fn diesel_rpm_capped() {
        let params = EngineParams {
            engine_type: EngineType::Diesel,
            redline_rpm: Some(6000.0),
            ..EngineParams::default()
        };
        let mut engine = EngineModel::new(params, Some(9)).unwrap();
        let mut sink = MemorySink::new();
        for _ in 0..15 {
            step(&mut engine, &mut sink, 1.0, 0.2);
            assert!(engine.state().rpm <= 4600.0 + 1e-9);
        }
    }

    #[test]
    fn seeded_models_are_reproducible() {
        let mut a = model();
        let mut b = model();
        let mut sink = MemorySink::new();
        for i in 0..20 {
            let throttle = (i as f64 * 0.1).sin().abs();
            let ra = step(&mut a, &mut sink, throttle, 0.1);
            let rb = step(&mut b, &mut sink, throttle, 0.1);
            assert_eq!(ra.reading, rb.reading);
        }
    }

    struct FailingSink;

    impl DiagnosticSink for FailingSink {
        fn log_event(&mut self, _record: &EventRecord) -> Result<(), SinkError> {
            Err(SinkError::Rejected("disk full".into()))
        }

        fn log_dtc(&mut self, _record: &DtcRecord) -> Result<(), SinkError> {
            Err(SinkError::Rejected("disk full".into()))
        }
    }

    #[test]
    fn sink_failures_are_reported_not_fatal() {
        let mut engine = model();
        engine.state_mut().coolant_temp = 101.0;
        let report = engine
            .step(Tick::new(0.2, 0.1), None, &mut FailingSink)
            .unwrap();
        assert!(engine.state().fan_active);
        assert_eq!(report.sink_errors.len(), 1);
        assert_eq!(report.events_logged, 0);
    }
}
