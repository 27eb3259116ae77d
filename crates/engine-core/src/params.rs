use crate::error::ParamsError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine variant. Selects the default redline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineType {
    #[default]
    Petrol,
    Diesel,
}

impl EngineType {
    pub fn default_redline(self) -> f64 {
        match self {
            Self::Petrol => 6500.0,
            Self::Diesel => DIESEL_REDLINE_CAP,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Petrol => "petrol",
            Self::Diesel => "diesel",
        }
    }
}

impl std::str::FromStr for EngineType {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "petrol" => Ok(Self::Petrol),
            "diesel" => Ok(Self::Diesel),
            other => Err(ParamsError::UnknownEngineType(other.to_string())),
        }
    }
}

/// Hard ceiling applied to the diesel redline regardless of configuration.
pub const DIESEL_REDLINE_CAP: f64 = 4500.0;

/// Tunable constants of the engine model.
///
/// Every field has a default, so a JSON document only needs to name the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    pub engine_type: EngineType,
    /// `None` selects the engine type's default redline.
    pub redline_rpm: Option<f64>,

    pub idle_rpm: f64,
    pub max_rpm: f64,
    pub rpm_time_constant: f64,

    pub ambient: f64,
    pub thermal_time_constant: f64,
    pub max_coolant_cool_rate: f64,
    pub fan_on_temp: f64,
    pub fan_off_temp: f64,
    pub fan_cooling_power: f64,

    pub oil_pump_base: f64,
    pub oil_health_decay_rate: f64,
    pub pressure_time_constant: f64,
    pub pressure_ceiling: f64,
    pub pressure_spike_kpa: f64,

    pub oil_temp_warning: f64,
    pub low_pressure_warning: f64,
    pub critical_oil_temp: f64,

    pub derate_temp: f64,
    pub derate_hysteresis: f64,
    pub derate_factor: f64,
    pub derate_min_rpm: f64,
    pub derate_ramp_rate: f64,

    pub initial_rpm: f64,
    pub initial_coolant_temp: f64,
    pub initial_oil_temp: f64,
    pub initial_pressure: f64,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            engine_type: EngineType::Petrol,
            redline_rpm: None,
            idle_rpm: 800.0,
            max_rpm: 7000.0,
            rpm_time_constant: 1.5,
            ambient: 25.0,
            thermal_time_constant: 40.0,
            max_coolant_cool_rate: 1.5,
            fan_on_temp: 100.0,
            fan_off_temp: 95.0,
            fan_cooling_power: 9.0,
            oil_pump_base: 120.0,
            oil_health_decay_rate: 0.0015,
            pressure_time_constant: 0.6,
            pressure_ceiling: 350.0,
            pressure_spike_kpa: 320.0,
            oil_temp_warning: 110.0,
            low_pressure_warning: 100.0,
            critical_oil_temp: 125.0,
            derate_temp: 120.0,
            derate_hysteresis: 3.0,
            derate_factor: 0.5,
            derate_min_rpm: 1500.0,
            derate_ramp_rate: 500.0,
            initial_rpm: 900.0,
            initial_coolant_temp: 75.0,
            initial_oil_temp: 80.0,
            initial_pressure: 120.0,
        }
    }
}

impl EngineParams {
    pub fn for_engine(engine_type: EngineType) -> Self {
        Self {
            engine_type,
            ..Self::default()
        }
    }

    /// Configured redline, before the diesel cap.
    pub fn redline(&self) -> f64 {
        self.redline_rpm
            .unwrap_or_else(|| self.engine_type.default_redline())
    }

    /// Ceiling used for the end-of-tick re-clamp.
    pub fn effective_redline(&self) -> f64 {
        match self.engine_type {
            EngineType::Diesel => self.redline().min(DIESEL_REDLINE_CAP),
            EngineType::Petrol => self.redline(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ParamsError> {
        let params: Self = serde_json::from_str(raw)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ParamsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ParamsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        let finite = [
            ("idle_rpm", self.idle_rpm),
            ("ambient", self.ambient),
            ("fan_on_temp", self.fan_on_temp),
            ("fan_off_temp", self.fan_off_temp),
            ("fan_cooling_power", self.fan_cooling_power),
            ("oil_pump_base", self.oil_pump_base),
            ("oil_health_decay_rate", self.oil_health_decay_rate),
            ("pressure_spike_kpa", self.pressure_spike_kpa),
            ("oil_temp_warning", self.oil_temp_warning),
            ("low_pressure_warning", self.low_pressure_warning),
            ("critical_oil_temp", self.critical_oil_temp),
            ("derate_temp", self.derate_temp),
            ("derate_hysteresis", self.derate_hysteresis),
            ("derate_min_rpm", self.derate_min_rpm),
            ("initial_rpm", self.initial_rpm),
            ("initial_coolant_temp", self.initial_coolant_temp),
            ("initial_oil_temp", self.initial_oil_temp),
            ("initial_pressure", self.initial_pressure),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(ParamsError::NotFinite { name, value });
            }
        }

        let positive = [
            ("max_rpm", self.max_rpm),
            ("rpm_time_constant", self.rpm_time_constant),
            ("thermal_time_constant", self.thermal_time_constant),
            ("pressure_time_constant", self.pressure_time_constant),
            ("pressure_ceiling", self.pressure_ceiling),
            ("max_coolant_cool_rate", self.max_coolant_cool_rate),
            ("derate_ramp_rate", self.derate_ramp_rate),
            ("redline_rpm", self.redline()),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ParamsError::NonPositive { name, value });
            }
        }

        if !(self.derate_factor > 0.0 && self.derate_factor <= 1.0) {
            return Err(ParamsError::OutOfRange {
                name: "derate_factor",
                value: self.derate_factor,
                min: 0.0,
                max: 1.0,
            });
        }
        if self.fan_off_temp >= self.fan_on_temp {
            return Err(ParamsError::InvertedBand {
                low: "fan_off_temp",
                high: "fan_on_temp",
            });
        }
        if !(0.0..self.max_rpm).contains(&self.idle_rpm) {
            return Err(ParamsError::InvertedBand {
                low: "idle_rpm",
                high: "max_rpm",
            });
        }
        if !(0.0..=self.max_rpm).contains(&self.derate_min_rpm) {
            return Err(ParamsError::OutOfRange {
                name: "derate_min_rpm",
                value: self.derate_min_rpm,
                min: 0.0,
                max: self.max_rpm,
            });
        }
        if self.derate_hysteresis < 0.0 {
            return Err(ParamsError::OutOfRange {
                name: "derate_hysteresis",
                value: self.derate_hysteresis,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redline_follows_engine_type() {
        assert_eq!(EngineParams::for_engine(EngineType::Petrol).redline(), 6500.0);
        assert_eq!(EngineParams::for_engine(EngineType::Diesel).redline(), 4500.0);
    }

    #[test]
    fn diesel_redline_is_capped() {
        let params = EngineParams {
            engine_type: EngineType::Diesel,
            redline_rpm: Some(5200.0),
            ..EngineParams::default()
        };
        assert_eq!(params.redline(), 5200.0);
        assert_eq!(params.effective_redline(), 4500.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let params =
            EngineParams::from_json_str(r#"{"engine_type":"diesel","derate_temp":115.0}"#)
                .unwrap();
        assert_eq!(params.engine_type, EngineType::Diesel);
        assert_eq!(params.derate_temp, 115.0);
        assert_eq!(params.critical_oil_temp, 125.0);
    }

    #[test]
    fn rejects_inverted_fan_band() {
        let params = EngineParams {
            fan_off_temp: 101.0,
            ..EngineParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ParamsError::InvertedBand { .. })
        ));
    }

    #[test]
    fn rejects_zero_time_constant() {
        let params = EngineParams {
            rpm_time_constant: 0.0,
            ..EngineParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ParamsError::NonPositive {
                name: "rpm_time_constant",
                ..
            })
        ));
    }

    #[test]
    fn rejects_non_positive_pressure_ceiling() {
        for pressure_ceiling in [-1.0, 0.0, f64::NAN] {
            let params = EngineParams {
                pressure_ceiling,
                ..EngineParams::default()
            };
            assert!(
                matches!(
                    params.validate(),
                    Err(ParamsError::NonPositive {
                        name: "pressure_ceiling",
                        ..
                    })
                ),
                "accepted pressure_ceiling {pressure_ceiling}"
            );
        }
    }

    #[test]
    fn rejects_nan_idle_rpm() {
        let params = EngineParams {
            idle_rpm: f64::NAN,
            ..EngineParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ParamsError::NotFinite {
                name: "idle_rpm",
                ..
            })
        ));
    }

    #[test]
    fn rejects_idle_at_or_above_max_rpm() {
        let params = EngineParams {
            idle_rpm: 7000.0,
            ..EngineParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ParamsError::InvertedBand { low: "idle_rpm", .. })
        ));
    }

    #[test]
    fn rejects_non_finite_thresholds() {
        let cases = [
            EngineParams {
                ambient: f64::INFINITY,
                ..EngineParams::default()
            },
            EngineParams {
                derate_temp: f64::NAN,
                ..EngineParams::default()
            },
            EngineParams {
                critical_oil_temp: f64::NEG_INFINITY,
                ..EngineParams::default()
            },
            EngineParams {
                pressure_spike_kpa: f64::NAN,
                ..EngineParams::default()
            },
            EngineParams {
                fan_on_temp: f64::NAN,
                ..EngineParams::default()
            },
        ];
        for params in cases {
            assert!(matches!(
                params.validate(),
                Err(ParamsError::NotFinite { .. })
            ));
        }
    }

    #[test]
    fn rejects_derate_floor_outside_rev_range() {
        for derate_min_rpm in [-10.0, 7500.0] {
            let params = EngineParams {
                derate_min_rpm,
                ..EngineParams::default()
            };
            assert!(matches!(
                params.validate(),
                Err(ParamsError::OutOfRange {
                    name: "derate_min_rpm",
                    ..
                })
            ));
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(EngineParams::default().validate().is_ok());
        assert!(EngineParams::for_engine(EngineType::Diesel).validate().is_ok());
    }

    #[test]
    fn parses_engine_type() {
        assert_eq!("Diesel".parse::<EngineType>().unwrap(), EngineType::Diesel);
        assert!("rotary".parse::<EngineType>().is_err());
    }
}
