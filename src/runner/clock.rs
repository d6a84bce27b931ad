//! Run clocks: the elapsed-time source a shape is evaluated against.
//!
//! The shape itself never reads wall time; the scheduler supplies elapsed
//! time through `RunClock`. That keeps `tick` pure and lets tests drive a
//! whole run without sleeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Monotonically non-decreasing elapsed time since the run started.
pub trait RunClock: Send + Sync {
    /// Elapsed run time. Successive calls never go backwards.
    fn elapsed(&self) -> Duration;
}

/// Wall-clock elapsed time, optionally compressed for rehearsal runs.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    started: Instant,
    speedup: f64,
}

impl MonotonicClock {
    /// Real-time clock starting now.
    #[must_use]
    pub fn new() -> Self {
        Self::with_speedup(1.0)
    }

    /// Compressed clock: one wall second counts as `speedup` run seconds.
    ///
    /// The factor must already be validated (finite, positive); config
    /// loading enforces that.
    #[must_use]
    pub fn with_speedup(speedup: f64) -> Self {
        Self {
            started: Instant::now(),
            speedup,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl RunClock for MonotonicClock {
    fn elapsed(&self) -> Duration {
        self.started.elapsed().mul_f64(self.speedup)
    }
}

/// Hand-advanced clock for tests: clones share one position.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Clock positioned at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move forward by `step`.
    pub fn advance(&self, step: Duration) {
        let mut now = self.now.lock();
        *now += step;
    }

    /// Jump to an absolute elapsed position. Saturates backwards motion to
    /// the current position so the clock stays monotonic.
    pub fn set(&self, elapsed: Duration) {
        let mut now = self.now.lock();
        if elapsed > *now {
            *now = elapsed;
        }
    }
}

impl RunClock for ManualClock {
    fn elapsed(&self) -> Duration {
        *self.now.lock()
    }
}
