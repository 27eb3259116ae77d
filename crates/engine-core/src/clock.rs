use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Time source for the simulation loop.
pub trait Clock {
    /// Timestamp in seconds used for log records.
    fn now_s(&self) -> f64;
    /// Seconds elapsed since the clock was created.
    fn elapsed_s(&self) -> f64;
    /// Let one tick of `interval` pass.
    fn wait(&mut self, interval: Duration);
}

/// Deterministic clock that only moves when the loop waits on it.
#[derive(Debug, Clone, Copy)]
pub struct SimClock {
    origin_s: f64,
    elapsed: Duration,
}

impl SimClock {
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    pub fn starting_at(origin_s: f64) -> Self {
        Self {
            origin_s,
            elapsed: Duration::ZERO,
        }
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimClock {
    fn now_s(&self) -> f64 {
        self.origin_s + self.elapsed.as_secs_f64()
    }

    fn elapsed_s(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    fn wait(&mut self, interval: Duration) {
        self.elapsed += interval;
    }
}

/// Real-time clock. Timestamps are Unix seconds, pacing sleeps.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    start: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now_s(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }

    fn elapsed_s(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn wait(&mut self, interval: Duration) {
        std::thread::sleep(interval);
    }
}
