//! Journal sink: a dedicated thread owns the `JournalWriter` and drains a
//! bounded crossbeam channel of run events.
//!
//! The scheduler loop sends through `RunJournalHandle::send`, which uses
//! `try_send()` so a stalled disk can never block a tick. Overflowing events
//! are dropped and counted; the sink thread reports the count on its next
//! wake-up.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{Result, WlsError};
use crate::journal::jsonl::{JournalConfig, JournalRecord, JournalWriter, RecordKind, Severity};

// ──────────────────── channel capacity ────────────────────

/// Default bounded channel capacity for run events.
const CHANNEL_CAPACITY: usize = 256;

// ──────────────────── public event type ────────────────────

/// Events the run harness reports to the journal.
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        version: String,
        config_hash: String,
        poll_interval_ms: u64,
    },
    PhaseChanged {
        from: Option<&'static str>,
        to: &'static str,
        elapsed_seconds: f64,
    },
    TickObserved {
        seq: u64,
        elapsed_seconds: f64,
        phase: Option<&'static str>,
        target_users: u32,
        active_workers: u32,
        spawn_rate: f64,
    },
    DrainStarted {
        elapsed_seconds: f64,
        active_workers: u32,
    },
    RunAborted {
        elapsed_seconds: f64,
        active_workers: u32,
    },
    RunFinished {
        outcome: &'static str,
        ticks: u64,
        peak_target: u32,
        peak_active: u32,
        wall_seconds: f64,
    },
    PoolFailed {
        code: String,
        message: String,
    },
    /// Sentinel requesting graceful shutdown of the sink thread.
    Shutdown,
}

// ──────────────────── public handle ────────────────────

/// Thread-safe, cheaply-cloneable handle for sending run events.
///
/// Wraps a bounded crossbeam `Sender`. `send()` never blocks; when the
/// channel is full the event is dropped and counted instead.
#[derive(Clone)]
pub struct RunJournalHandle {
    tx: Sender<RunEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl RunJournalHandle {
    /// Send an event to the sink thread. Non-blocking.
    pub fn send(&self, event: RunEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        // Disconnected is fine during shutdown.
    }

    /// Number of events dropped to channel back-pressure.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Request graceful shutdown of the sink thread.
    ///
    /// Errors with [`WlsError::ChannelClosed`] if the thread already exited,
    /// which means later records may have been lost.
    pub fn finish(&self) -> Result<()> {
        self.tx
            .send(RunEvent::Shutdown)
            .map_err(|_| WlsError::ChannelClosed {
                component: "journal sink",
            })
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the journal sink thread and return a sending handle.
///
/// The handle is `Clone + Send`. The thread runs until `finish()` is called
/// or every handle is dropped; join the returned handle after `finish()` to
/// be sure the journal hit the disk.
pub fn spawn_journal(config: JournalConfig) -> Result<(RunJournalHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<RunEvent>(CHANNEL_CAPACITY);
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = RunJournalHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("wls-journal".to_string())
        .spawn(move || {
            sink_thread_main(rx, config, dropped_clone);
        })
        .map_err(|e| WlsError::Runtime {
            details: format!("failed to spawn journal thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── sink thread ────────────────────

fn sink_thread_main(rx: Receiver<RunEvent>, config: JournalConfig, dropped: Arc<AtomicU64>) {
    let mut journal = JournalWriter::open(config);

    while let Ok(event) = rx.recv() {
        let lost = dropped.swap(0, Ordering::Relaxed);
        if lost > 0 {
            let mut warn = JournalRecord::new(RecordKind::Error, Severity::Warning);
            warn.details = Some(format!("{lost} journal events dropped to back-pressure"));
            journal.write_record(&warn);
        }

        if matches!(event, RunEvent::Shutdown) {
            break;
        }

        journal.write_record(&event_to_record(&event));
    }

    journal.flush();
    journal.fsync();
}

// ──────────────────── event conversion ────────────────────

fn event_to_record(event: &RunEvent) -> JournalRecord {
    match event {
        RunEvent::RunStarted {
            version,
            config_hash,
            poll_interval_ms,
        } => {
            let mut r = JournalRecord::new(RecordKind::RunStart, Severity::Info);
            r.details = Some(format!(
                "version={version} config_hash={config_hash} poll_interval_ms={poll_interval_ms}"
            ));
            r
        }
        RunEvent::PhaseChanged {
            from,
            to,
            elapsed_seconds,
        } => {
            let mut r = JournalRecord::new(RecordKind::PhaseChange, Severity::Info);
            r.phase = Some(format!("{}->{to}", from.unwrap_or("start")));
            r.elapsed_seconds = Some(*elapsed_seconds);
            r
        }
        RunEvent::TickObserved {
            seq,
            elapsed_seconds,
            phase,
            target_users,
            active_workers,
            spawn_rate,
        } => {
            let mut r = JournalRecord::new(RecordKind::Tick, Severity::Info);
            r.seq = Some(*seq);
            r.elapsed_seconds = Some(*elapsed_seconds);
            r.phase = phase.map(str::to_string);
            r.target_users = Some(*target_users);
            r.active_workers = Some(*active_workers);
            r.spawn_rate = Some(*spawn_rate);
            r
        }
        RunEvent::DrainStarted {
            elapsed_seconds,
            active_workers,
        } => {
            let mut r = JournalRecord::new(RecordKind::DrainStart, Severity::Info);
            r.elapsed_seconds = Some(*elapsed_seconds);
            r.active_workers = Some(*active_workers);
            r
        }
        RunEvent::RunAborted {
            elapsed_seconds,
            active_workers,
        } => {
            let mut r = JournalRecord::new(RecordKind::RunAbort, Severity::Warning);
            r.elapsed_seconds = Some(*elapsed_seconds);
            r.active_workers = Some(*active_workers);
            r
        }
        RunEvent::RunFinished {
            outcome,
            ticks,
            peak_target,
            peak_active,
            wall_seconds,
        } => {
            let mut r = JournalRecord::new(RecordKind::RunStop, Severity::Info);
            r.outcome = Some((*outcome).to_string());
            r.ticks = Some(*ticks);
            r.peak_target = Some(*peak_target);
            r.peak_active = Some(*peak_active);
            r.wall_seconds = Some(*wall_seconds);
            r
        }
        RunEvent::PoolFailed { code, message } => {
            let mut r = JournalRecord::new(RecordKind::Error, Severity::Critical);
            r.error_code = Some(code.clone());
            r.error_message = Some(message.clone());
            r
        }
        RunEvent::Shutdown => {
            // Handled in the sink loop; never reaches conversion.
            JournalRecord::new(RecordKind::RunStop, Severity::Info)
        }
    }
}

// ──────────────────── tests ────────────────────
