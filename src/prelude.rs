//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use wave_load_shaper::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, WlsError};

// Shape
pub use crate::shape::schedule::{WavePhase, WaveSchedule};
pub use crate::shape::wave::{LoadShape, ShapeTick, WaveShape};

// Runner
pub use crate::runner::clock::{ManualClock, MonotonicClock, RunClock};
pub use crate::runner::pacer::Cadence;
pub use crate::runner::reconcile::Reconciler;

// Journal
pub use crate::journal::report::{RunOutcome, RunReport, TickRecord};
