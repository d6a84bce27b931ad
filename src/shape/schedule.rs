//! Wave schedule: immutable ramp-up / hold / ramp-down description.
//!
//! A schedule is plain data. It can be deserialized from the `[schedule]`
//! config section, so it may hold invalid values until `validate()` accepts
//! it; `WaveShape::new` refuses to build a controller from an invalid one.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, WlsError};

/// Phase of the wave at a given elapsed run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WavePhase {
    RampUp,
    Hold,
    RampDown,
    Done,
}

impl WavePhase {
    /// Stable lowercase label used in journal lines and CLI tables.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RampUp => "ramp_up",
            Self::Hold => "hold",
            Self::RampDown => "ramp_down",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for WavePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One full wave: ramp to `max_users`, hold, ramp back to zero.
///
/// Durations are seconds and may be fractional; a zero-duration phase is
/// skipped entirely. `spawn_rate` is the workers-per-second ceiling the
/// reconciler honors while converging on a target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WaveSchedule {
    pub max_users: u32,
    pub ramp_up_seconds: f64,
    pub hold_seconds: f64,
    pub ramp_down_seconds: f64,
    pub spawn_rate: f64,
}

impl Default for WaveSchedule {
    fn default() -> Self {
        Self::endurance()
    }
}

impl WaveSchedule {
    /// Plain constructor. Call `validate()` (or `WaveShape::new`) before use.
    #[must_use]
    pub const fn new(
        max_users: u32,
        ramp_up_seconds: f64,
        hold_seconds: f64,
        ramp_down_seconds: f64,
        spawn_rate: f64,
    ) -> Self {
        Self {
            max_users,
            ramp_up_seconds,
            hold_seconds,
            ramp_down_seconds,
            spawn_rate,
        }
    }

    /// Soak profile: slow climb, long plateau, slow descent.
    #[must_use]
    pub const fn endurance() -> Self {
        Self::new(200, 100.0, 120.0, 100.0, 2.0)
    }

    /// Spike profile: fast climb straight into a fast descent, no plateau.
    #[must_use]
    pub const fn surge() -> Self {
        Self::new(200, 30.0, 0.0, 30.0, 10.0)
    }

    /// Look up a named preset.
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "endurance" => Some(Self::endurance()),
            "surge" => Some(Self::surge()),
            _ => None,
        }
    }

    /// Names accepted by [`WaveSchedule::preset`].
    #[must_use]
    pub const fn preset_names() -> &'static [&'static str] {
        &["endurance", "surge"]
    }

    /// Check every construction invariant, reporting the first violation.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("ramp_up_seconds", self.ramp_up_seconds),
            ("hold_seconds", self.hold_seconds),
            ("ramp_down_seconds", self.ramp_down_seconds),
        ] {
            if !value.is_finite() {
                return Err(WlsError::invalid_schedule(format!(
                    "{name} must be finite, got {value}"
                )));
            }
            if value < 0.0 {
                return Err(WlsError::invalid_schedule(format!(
                    "{name} must be >= 0, got {value}"
                )));
            }
        }

        if !self.spawn_rate.is_finite() || self.spawn_rate <= 0.0 {
            return Err(WlsError::invalid_schedule(format!(
                "spawn_rate must be finite and > 0, got {}",
                self.spawn_rate
            )));
        }

        Ok(())
    }

    /// Total scheduled duration in seconds.
    #[must_use]
    pub const fn total_seconds(&self) -> f64 {
        self.ramp_up_seconds + self.hold_seconds + self.ramp_down_seconds
    }

    /// Elapsed second at which the hold phase begins.
    #[must_use]
    pub const fn hold_start_seconds(&self) -> f64 {
        self.ramp_up_seconds
    }

    /// Elapsed second at which the ramp-down phase begins.
    #[must_use]
    pub const fn ramp_down_start_seconds(&self) -> f64 {
        self.ramp_up_seconds + self.hold_seconds
    }

    /// Phase containing elapsed second `t`.
    ///
    /// Boundaries belong to the later phase, so a zero-duration phase is never
    /// entered. Any `t` at or past the total duration is `Done`.
    #[must_use]
    pub fn phase_at_seconds(&self, t: f64) -> WavePhase {
        let hold_end = self.ramp_down_start_seconds();
        if t >= self.total_seconds() {
            WavePhase::Done
        } else if t < self.ramp_up_seconds {
            WavePhase::RampUp
        } else if t < hold_end {
            WavePhase::Hold
        } else {
            WavePhase::RampDown
        }
    }
}
