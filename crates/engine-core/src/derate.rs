use crate::params::EngineParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DerateState {
    #[default]
    Normal,
    Derating,
}

/// What changed during one [`DerateController::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DerateUpdate {
    /// Entered `Derating` this tick; carries the captured target.
    pub engaged: Option<f64>,
    /// The one-per-engagement DTC should be written now.
    pub dtc_due: bool,
    /// Returned to `Normal` this tick.
    pub released: bool,
}

/// Oil-temperature driven power limiter.
///
/// Engagement captures a reduced rev ceiling and ramps `max_rpm` toward it
/// at `derate_ramp_rate` rpm/s. Release happens `derate_hysteresis` degrees
/// below the engagement threshold, after which `max_rpm` ramps back to the
/// original value at the same rate.
#[derive(Debug, Clone)]
pub struct DerateController {
    state: DerateState,
    original_max_rpm: f64,
    target_max_rpm: f64,
    dtc_logged: bool,
}

impl DerateController {
    pub fn new(original_max_rpm: f64) -> Self {
        Self {
            state: DerateState::Normal,
            original_max_rpm,
            target_max_rpm: original_max_rpm,
            dtc_logged: false,
        }
    }

    pub fn state(&self) -> DerateState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == DerateState::Derating
    }

    pub fn original_max_rpm(&self) -> f64 {
        self.original_max_rpm
    }

    pub fn target_max_rpm(&self) -> f64 {
        self.target_max_rpm
    }

    pub fn update(
        &mut self,
        params: &EngineParams,
        oil_temp: f64,
        max_rpm: &mut f64,
        dt: f64,
    ) -> DerateUpdate {
        let mut update = DerateUpdate::default();
        let ramp = params.derate_ramp_rate * dt;

        if self.state == DerateState::Normal && oil_temp >= params.derate_temp {
            self.state = DerateState::Derating;
            self.dtc_logged = false;
            self.target_max_rpm = (*max_rpm * params.derate_factor).max(params.derate_min_rpm);
            update.engaged = Some(self.target_max_rpm);
        }

        if self.state == DerateState::Derating {
            if *max_rpm > self.target_max_rpm {
                *max_rpm = (*max_rpm - ramp).max(self.target_max_rpm);
            }
            if !self.dtc_logged {
                self.dtc_logged = true;
                update.dtc_due = true;
            }
            if oil_temp < params.derate_temp - params.derate_hysteresis {
                self.state = DerateState::Normal;
                update.released = true;
            }
        }

        if self.state == DerateState::Normal && *max_rpm < self.original_max_rpm {
            *max_rpm = (*max_rpm + ramp).min(self.original_max_rpm);
        }

        update
    }
}
