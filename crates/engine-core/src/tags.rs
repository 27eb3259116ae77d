/// A logged channel: its data-log column and its metric name.
#[derive(Debug, Clone, Copy)]
pub struct Tag {
    pub key: &'static str,
    pub metric: &'static str,
}

pub const TIMESTAMP: Tag = Tag {
    key: "timestamp",
    metric: "engine_sim_timestamp_seconds",
};

pub const RPM: Tag = Tag {
    key: "rpm",
    metric: "engine_sim_rpm",
};

pub const COOLANT_TEMP: Tag = Tag {
    key: "temp",
    metric: "engine_sim_coolant_temperature_celsius",
};

pub const OIL_PRESSURE: Tag = Tag {
    key: "pressure",
    metric: "engine_sim_oil_pressure_kpa",
};

pub const THROTTLE: Tag = Tag {
    key: "throttle",
    metric: "engine_sim_throttle_ratio",
};

pub const AMBIENT_TEMP: Tag = Tag {
    key: "ambient",
    metric: "engine_sim_ambient_temperature_celsius",
};

pub const OIL_HEALTH: Tag = Tag {
    key: "oil_health",
    metric: "engine_sim_oil_health_ratio",
};

pub const OIL_TEMP: Tag = Tag {
    key: "oil_temp",
    metric: "engine_sim_oil_temperature_celsius",
};

/// Data-log columns in file order.
pub const DATA_COLUMNS: [Tag; 8] = [
    TIMESTAMP,
    RPM,
    COOLANT_TEMP,
    OIL_PRESSURE,
    THROTTLE,
    AMBIENT_TEMP,
    OIL_HEALTH,
    OIL_TEMP,
];
