//! Rate-capped convergence from the current worker count toward a target.
//!
//! Each step may move at most `rate * dt` workers, in either direction.
//! Whole workers move; the fractional remainder is carried into the next
//! step so a rate of 2.5/s averages out to 2.5/s instead of rounding down
//! to 2/s forever. The carry is cleared on arrival so budget saved up
//! during one leg of the wave cannot be spent as a burst on the next.

/// Stateful stepper that paces worker-count changes.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    carry: f64,
}

impl Reconciler {
    /// Reconciler with no carried budget.
    #[must_use]
    pub const fn new() -> Self {
        Self { carry: 0.0 }
    }

    /// Fractional budget carried from previous steps.
    #[must_use]
    pub const fn carry(&self) -> f64 {
        self.carry
    }

    /// Drop any carried budget.
    pub fn reset(&mut self) {
        self.carry = 0.0;
    }

    /// Worker count to aim for this step, moving from `active` toward
    /// `target` at no more than `rate` workers per second over a step of
    /// `dt_seconds`. Never overshoots the target.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn step(&mut self, active: u32, target: u32, rate: f64, dt_seconds: f64) -> u32 {
        if active == target {
            self.carry = 0.0;
            return active;
        }
        let budget = rate.max(0.0).mul_add(dt_seconds.max(0.0), self.carry);
        let whole = budget.floor();
        let gap = f64::from(target.abs_diff(active));
        if whole >= gap {
            self.carry = 0.0;
            return target;
        }
        self.carry = budget - whole;
        // whole < gap <= u32::MAX here, so the cast is lossless.
        let movement = whole as u32;
        if target > active {
            active + movement
        } else {
            active - movement
        }
    }
}
