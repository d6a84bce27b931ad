//! Simulated worker pool: obeys scale orders instantly (optionally with a
//! jittered latency) and records every level it was asked to hold. Lets a
//! schedule be rehearsed end to end without generating any real load.

use std::time::Duration;

use rand::Rng;

use crate::core::errors::{Result, WlsError};
use crate::runner::harness::WorkerPool;

/// In-process stand-in for a real worker fleet.
#[derive(Debug, Default)]
pub struct SimulatedPool {
    active: u32,
    history: Vec<u32>,
    drained: bool,
    scale_latency: Option<Duration>,
    latency_jitter: f64,
    fail_on_call: Option<u64>,
    calls: u64,
}

impl SimulatedPool {
    /// Empty pool, instant scaling.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep roughly `latency` on every scale order, jittered by up to
    /// `jitter` (a fraction in `[0, 1)`) in either direction.
    #[must_use]
    pub fn with_scale_latency(mut self, latency: Duration, jitter: f64) -> Self {
        self.scale_latency = Some(latency);
        self.latency_jitter = jitter.clamp(0.0, 0.99);
        self
    }

    /// Refuse the `n`-th scale order (1-based). For failure-path tests.
    #[must_use]
    pub const fn failing_on_call(mut self, n: u64) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    /// Every level the pool was ordered to, in order.
    #[must_use]
    pub fn history(&self) -> &[u32] {
        &self.history
    }

    /// Whether `drain` has run since the last scale order.
    #[must_use]
    pub const fn is_drained(&self) -> bool {
        self.drained
    }

    /// Number of scale orders received, refused ones included.
    #[must_use]
    pub const fn scale_calls(&self) -> u64 {
        self.calls
    }

    fn jittered_latency(&self) -> Option<Duration> {
        let base = self.scale_latency?;
        if self.latency_jitter <= 0.0 {
            return Some(base);
        }
        let low = 1.0 - self.latency_jitter;
        let high = 1.0 + self.latency_jitter;
        let factor = rand::rng().random_range(low..=high);
        Some(base.mul_f64(factor))
    }
}

impl WorkerPool for SimulatedPool {
    fn active_workers(&self) -> u32 {
        self.active
    }

    fn scale_to(&mut self, target: u32) -> Result<()> {
        self.calls += 1;
        if self.fail_on_call == Some(self.calls) {
            return Err(WlsError::WorkerPool {
                details: format!("injected failure on scale_to({target})"),
            });
        }
        if let Some(latency) = self.jittered_latency() {
            std::thread::sleep(latency);
        }
        self.active = target;
        self.drained = false;
        self.history.push(target);
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        self.active = 0;
        self.drained = true;
        self.history.push(0);
        Ok(())
    }
}
