#![forbid(unsafe_code)]

//! Wave Load Shaper (wls) — wave-shaped concurrency ramps for load drills.
//!
//! A wave is a ramp up to a fixed peak, an optional hold, and a ramp
//! back down to zero. The crate splits the problem in two:
//! 1. **Shape** — a pure function from elapsed time to target worker
//!    count and advisory spawn rate
//! 2. **Runner** — a polling harness that walks a worker pool toward
//!    the current target and journals every tick
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use wave_load_shaper::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use wave_load_shaper::core::config::Config;
//! use wave_load_shaper::shape::wave::{LoadShape, WaveShape};
//! ```

pub mod prelude;

pub mod core;
pub mod journal;
pub mod runner;
pub mod shape;
