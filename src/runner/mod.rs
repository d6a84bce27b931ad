//! Run orchestration: clocks, cadence, reconciliation, and the harness that
//! drives a shape against a worker pool.
//!
//! The pure pieces (clock, pacer, reconciler) are always available; the
//! harness, the simulated pool, and signal wiring sit behind the `runner`
//! feature.

pub mod clock;
#[cfg(feature = "runner")]
pub mod harness;
pub mod pacer;
pub mod reconcile;
#[cfg(feature = "runner")]
pub mod signals;
#[cfg(feature = "runner")]
pub mod sim_pool;
