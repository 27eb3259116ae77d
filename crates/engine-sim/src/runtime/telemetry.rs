use engine_core::RunStats;
use engine_io::metrics::{self, init_metrics, serve_metrics};
use std::thread;
use tracing::info;

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

/// Push end-of-run counters the per-record sinks cannot see.
pub fn record_run(stats: &RunStats) {
    metrics::record_sink_failures(stats.sink_failures);
}
