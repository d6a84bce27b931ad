//! Poll cadence: evenly spaced tick deadlines anchored to a start instant.
//!
//! Deadlines are computed from the anchor, not from the previous wake-up,
//! so a slow tick does not shift the whole grid. When the loop falls more
//! than an interval behind, the missed deadlines are skipped rather than
//! fired back to back.

use std::time::{Duration, Instant};

/// Fixed-interval deadline generator.
///
/// A zero interval is floored to one nanosecond so the grid always moves
/// forward; otherwise every deadline would sit at the anchor.
#[derive(Debug, Clone)]
pub struct Cadence {
    anchor: Instant,
    interval: Duration,
    next_index: u64,
    skipped: u64,
}

impl Cadence {
    /// Cadence anchored at the current instant.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self::anchored_at(Instant::now(), interval)
    }

    /// Cadence anchored at an explicit instant, for deterministic tests.
    #[must_use]
    pub fn anchored_at(anchor: Instant, interval: Duration) -> Self {
        Self {
            anchor,
            interval: interval.max(Duration::from_nanos(1)),
            next_index: 1,
            skipped: 0,
        }
    }

    /// Interval between deadlines.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Deadlines dropped because the loop ran behind schedule.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }

    #[allow(clippy::cast_precision_loss)]
    fn deadline_for(&self, index: u64) -> Instant {
        self.anchor + self.interval.mul_f64(index as f64)
    }

    /// First deadline strictly after `now`. Any deadlines already in the
    /// past are counted as skipped.
    pub fn next_deadline_after(&mut self, now: Instant) -> Instant {
        let mut index = self.next_index;
        let mut deadline = self.deadline_for(index);
        if deadline <= now {
            // Catch up in one jump; the loop below only settles float
            // rounding from `deadline_for`, a step or two at most.
            let behind = (now - self.anchor).as_nanos() / self.interval.as_nanos();
            let caught_up = u64::try_from(behind).unwrap_or(u64::MAX).saturating_add(1);
            index = index.max(caught_up);
            deadline = self.deadline_for(index);
        }
        while deadline <= now {
            index += 1;
            deadline = self.deadline_for(index);
        }
        self.skipped += index - self.next_index;
        self.next_index = index + 1;
        deadline
    }

    /// Block until the next deadline passes.
    pub fn sleep_until_next(&mut self) {
        let now = Instant::now();
        let deadline = self.next_deadline_after(now);
        std::thread::sleep(deadline - now);
    }
}
