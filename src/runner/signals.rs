//! Signal handling: SIGINT/SIGTERM request a graceful abort.
//!
//! Uses the `signal-hook` crate for safe registration. The run loop polls
//! the shared abort flag each tick rather than blocking on signals, so an
//! interrupted run still drains its workers before exiting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

// ──────────────────── abort signals ────────────────────

/// Signal state shared between the OS signal handler and the run loop.
///
/// The flag uses `Ordering::Relaxed`; the loop polls it every tick and no
/// ordering with other atomics is required.
#[derive(Clone)]
pub struct AbortSignals {
    abort_flag: Arc<AtomicBool>,
}

impl AbortSignals {
    /// Create a handler on a fresh flag and register OS signal hooks.
    ///
    /// SIGTERM/SIGINT set the flag. Registration is best-effort; failures
    /// are logged to stderr but not fatal.
    #[must_use]
    pub fn new() -> Self {
        Self::onto(Arc::new(AtomicBool::new(false)))
    }

    /// Register OS signal hooks onto an existing flag, typically the one a
    /// `LoadRunner` already polls.
    #[must_use]
    pub fn onto(abort_flag: Arc<AtomicBool>) -> Self {
        let signals = Self { abort_flag };
        signals.register_signals();
        signals
    }

    /// Whether an abort has been requested.
    #[must_use]
    pub fn should_abort(&self) -> bool {
        self.abort_flag.load(Ordering::Relaxed)
    }

    /// Programmatically request an abort (e.g. from a watchdog or a test).
    pub fn request_abort(&self) {
        self.abort_flag.store(true, Ordering::Relaxed);
    }

    fn register_signals(&self) {
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&self.abort_flag)) {
            eprintln!("[WLS-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&self.abort_flag)) {
            eprintln!("[WLS-SIGNAL] failed to register SIGINT: {e}");
        }
    }
}

impl Default for AbortSignals {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────── tests ────────────────────
