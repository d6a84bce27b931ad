//! Wave shape controller: pure piecewise target evaluation over elapsed time.
//!
//! The controller is stateless after construction. `tick` is a total function
//! of the elapsed run time: it holds no interior mutability, performs no I/O,
//! and never blocks, so a shape can be polled from any thread at any cadence
//! and always answers the same for the same instant.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::shape::schedule::{WavePhase, WaveSchedule};

/// One poll of a load shape: a target to drive toward, or the end of the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ShapeTick {
    /// The run is live: converge the pool on `target_users` at no more than
    /// `spawn_rate` workers per second.
    Active {
        /// Worker count the pool should converge on.
        target_users: u32,
        /// Advisory ceiling on workers started or stopped per second.
        spawn_rate: f64,
    },
    /// The schedule has fully elapsed; stop polling and drain.
    Terminal,
}

impl ShapeTick {
    /// Whether this tick ends the run.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }

    /// Target concurrency, when the run is live.
    #[must_use]
    pub const fn target_users(&self) -> Option<u32> {
        match self {
            Self::Active { target_users, .. } => Some(*target_users),
            Self::Terminal => None,
        }
    }
}

/// Polled controller seam between a schedule and the scheduler driving it.
///
/// Implementations must be pure with respect to `elapsed`: repeated calls
/// with the same value return the same tick.
pub trait LoadShape: Send + Sync {
    /// Evaluate the shape at `elapsed` time since run start.
    fn tick(&self, elapsed: Duration) -> ShapeTick;

    /// Label of the phase containing `elapsed`, for shapes that have phases.
    /// Shapes without a phase structure keep the default `None`.
    fn phase_label(&self, _elapsed: Duration) -> Option<&'static str> {
        None
    }
}

/// Wave-shaped ramp controller: climb to the peak, hold it, descend, stop.
///
/// Targets follow the piecewise curve
///
/// ```text
/// ramp-up    (0 <= t < U):      floor(max_users * t / U)
/// hold       (U <= t < U+H):    max_users
/// ramp-down  (U+H <= t < U+H+D): floor(max_users * (1 - (t-U-H)/D))
/// terminal   (t >= U+H+D)
/// ```
///
/// with zero-duration phases skipped rather than divided by, and every
/// active tick carrying the schedule's constant spawn rate.
#[derive(Debug, Clone)]
pub struct WaveShape {
    schedule: WaveSchedule,
}

impl WaveShape {
    /// Validate the schedule and build the controller.
    ///
    /// Fails with `[WLS-1001]` on negative or non-finite durations and on a
    /// non-positive spawn rate. After this returns `Ok`, `tick` is total.
    pub fn new(schedule: WaveSchedule) -> Result<Self> {
        schedule.validate()?;
        Ok(Self { schedule })
    }

    /// The validated schedule this controller evaluates.
    #[must_use]
    pub const fn schedule(&self) -> &WaveSchedule {
        &self.schedule
    }

    /// Phase containing `elapsed`, consistent with what `tick` returns there.
    #[must_use]
    pub fn phase_at(&self, elapsed: Duration) -> WavePhase {
        self.schedule.phase_at_seconds(elapsed.as_secs_f64())
    }

    /// Total scheduled duration.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        Duration::from_secs_f64(self.schedule.total_seconds())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn target_at_seconds(&self, t: f64, phase: WavePhase) -> u32 {
        let s = &self.schedule;
        let peak = f64::from(s.max_users);
        let raw = match phase {
            WavePhase::RampUp => (peak * t / s.ramp_up_seconds).floor(),
            WavePhase::Hold => peak,
            WavePhase::RampDown => {
                let progress = (t - s.ramp_down_start_seconds()) / s.ramp_down_seconds;
                (peak * (1.0 - progress)).floor().max(0.0)
            }
            WavePhase::Done => 0.0,
        };

        // Defensive clamp to [0, max_users]; float rounding at a phase edge
        // must never hand the scheduler an out-of-range target.
        if raw <= 0.0 {
            0
        } else if raw >= peak {
            s.max_users
        } else {
            raw as u32
        }
    }
}

impl LoadShape for WaveShape {
    fn tick(&self, elapsed: Duration) -> ShapeTick {
        let t = elapsed.as_secs_f64();
        let phase = self.schedule.phase_at_seconds(t);
        if phase == WavePhase::Done {
            return ShapeTick::Terminal;
        }
        ShapeTick::Active {
            target_users: self.target_at_seconds(t, phase),
            spawn_rate: self.schedule.spawn_rate,
        }
    }

    fn phase_label(&self, elapsed: Duration) -> Option<&'static str> {
        Some(self.phase_at(elapsed).label())
    }
}
