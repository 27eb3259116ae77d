//! Prometheus metrics for the engine simulator.
//!
//! Gauges mirror the latest data-log row; counters track ticks, diagnostic
//! records by code and sink failures.

use engine_core::diagnostics::{DiagnosticSink, DtcRecord, EventCode, EventRecord};
use engine_core::error::SinkError;
use engine_core::hal::{DataRecord, DataSink};
use engine_core::tags;
use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn gauge(name: &str, help: &str) -> Gauge {
    let gauge = Gauge::new(name, help).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
}

fn counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
}

fn counter_by_code(name: &str, help: &str) -> IntCounterVec {
    let counter = IntCounterVec::new(Opts::new(name, help), &["code"]).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
}

// ============================================================================
// Loop Metrics
// ============================================================================

pub static TICKS_EXECUTED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "engine_sim_ticks_total",
        "Simulation ticks that produced a data row",
    )
});

pub static EVENTS_LOGGED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    counter_by_code("engine_sim_events_total", "Event log records by code")
});

pub static DTCS_LOGGED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    counter_by_code("engine_sim_dtcs_total", "DTC log records by code")
});

pub static SINK_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "engine_sim_sink_failures_total",
        "Records a sink failed to persist",
    )
});

// ============================================================================
// Engine State Metrics
// ============================================================================

pub static RPM: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::RPM.metric, "Measured engine speed"));

pub static COOLANT_TEMP: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        tags::COOLANT_TEMP.metric,
        "Measured coolant temperature in Celsius",
    )
});

pub static OIL_PRESSURE: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::OIL_PRESSURE.metric, "Measured oil pressure in kPa"));

pub static THROTTLE: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::THROTTLE.metric, "Commanded throttle (0.0-1.0)"));

pub static OIL_HEALTH: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::OIL_HEALTH.metric, "Oil health (1.0 = fresh)"));

pub static OIL_TEMP: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::OIL_TEMP.metric, "Oil temperature in Celsius"));

/// Fan state (1 = on, 0 = off)
pub static FAN_ACTIVE: LazyLock<Gauge> =
    LazyLock::new(|| gauge("engine_sim_fan_active", "Cooling fan state (1=on, 0=off)"));

/// Derate state (1 = derating, 0 = normal)
pub static DERATE_ACTIVE: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        "engine_sim_derate_active",
        "Derate state (1=derating, 0=normal)",
    )
});

/// Mirrors the run into the registry. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRecorder;

impl DataSink for MetricsRecorder {
    fn write_data(&mut self, record: &DataRecord) -> Result<(), SinkError> {
        TICKS_EXECUTED.inc();
        RPM.set(record.rpm);
        COOLANT_TEMP.set(record.temp);
        OIL_PRESSURE.set(record.pressure);
        THROTTLE.set(record.throttle);
        OIL_HEALTH.set(record.oil_health);
        OIL_TEMP.set(record.oil_temp);
        Ok(())
    }
}

impl DiagnosticSink for MetricsRecorder {
    fn log_event(&mut self, record: &EventRecord) -> Result<(), SinkError> {
        EVENTS_LOGGED
            .with_label_values(&[record.code.as_str()])
            .inc();
        match record.code {
            EventCode::FanOn => FAN_ACTIVE.set(1.0),
            EventCode::FanOff => FAN_ACTIVE.set(0.0),
            EventCode::DerateOn => DERATE_ACTIVE.set(1.0),
            EventCode::DerateOff => DERATE_ACTIVE.set(0.0),
            _ => {}
        }
        Ok(())
    }

    fn log_dtc(&mut self, record: &DtcRecord) -> Result<(), SinkError> {
        DTCS_LOGGED.with_label_values(&[record.code.as_str()]).inc();
        Ok(())
    }
}

pub fn record_sink_failures(count: u64) {
    SINK_FAILURES.inc_by(count);
}

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Render the registry in the Prometheus text format.
pub fn render() -> Result<Vec<u8>, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            let response = match request.url() {
                "/metrics" => match render() {
                    Ok(buffer) => {
                        let mut response = Response::from_data(buffer);
                        if let Ok(header) = tiny_http::Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"text/plain; version=0.0.4"[..],
                        ) {
                            response = response.with_header(header);
                        }
                        response
                    }
                    Err(e) => {
                        tracing::warn!("Failed to encode metrics: {}", e);
                        Response::from_string("Internal Server Error")
                            .with_status_code(500)
                    }
                },
                "/health" => Response::from_string("OK"),
                // Ready once the loop has produced a row.
                "/ready" if TICKS_EXECUTED.get() > 0 => {
                    Response::from_string("Ready")
                }
                "/ready" => Response::from_string("Not Ready")
                    .with_status_code(503),
                _ => Response::from_string("Not Found")
                    .with_status_code(404),
            };
            let _ = request.respond(response);
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = TICKS_EXECUTED.get();
    let _ = SINK_FAILURES.get();
    let _ = RPM.get();
    let _ = COOLANT_TEMP.get();
    let _ = OIL_PRESSURE.get();
    let _ = THROTTLE.get();
    let _ = OIL_HEALTH.get();
    let _ = OIL_TEMP.get();
    let _ = FAN_ACTIVE.get();
    let _ = DERATE_ACTIVE.get();
    for code in EventCode::ALL {
        let _ = EVENTS_LOGGED.with_label_values(&[code.as_str()]).get();
    }
    for code in engine_core::diagnostics::DtcCode::ALL {
        let _ = DTCS_LOGGED.with_label_values(&[code.as_str()]).get();
    }
}
