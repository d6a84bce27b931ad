//! Run harness: polls a load shape at a fixed cadence and reconciles a
//! worker pool toward each target it emits.
//!
//! The harness is generic over the shape, the pool, and the clock, so a
//! whole schedule can be rehearsed in a test with a hand-advanced clock and
//! a simulated pool, then driven for real with the monotonic clock. One
//! `step()` is one poll; `run()` wraps stepping with cadence sleeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::core::errors::{Result, WlsError};
use crate::journal::report::{RunOutcome, RunReport, TickRecord};
use crate::journal::sink::{RunEvent, RunJournalHandle};
use crate::runner::clock::RunClock;
use crate::runner::pacer::Cadence;
use crate::runner::reconcile::Reconciler;
use crate::shape::wave::{LoadShape, ShapeTick};

// ──────────────────── worker pool seam ────────────────────

/// The fleet being scaled. Implementations own worker lifecycle; the
/// harness only ever asks for a count.
pub trait WorkerPool {
    /// Workers currently running.
    fn active_workers(&self) -> u32;

    /// Converge the pool to exactly `target` workers.
    fn scale_to(&mut self, target: u32) -> Result<()>;

    /// Stop every worker and release their resources.
    fn drain(&mut self) -> Result<()>;
}

// ──────────────────── step outcome ────────────────────

/// What a single poll decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The shape is still active; poll again at the next deadline.
    Continue,
    /// The run is over (shape terminal or abort honored) and the pool is
    /// drained.
    Finished,
}

// ──────────────────── published status ────────────────────

/// Snapshot of the most recent poll, published behind a lock so other
/// threads can watch a run without touching the harness.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStatus {
    /// Shape-clock position of the last poll.
    pub elapsed_seconds: f64,
    /// Phase label of the last poll, when the shape has phases.
    pub phase: Option<&'static str>,
    /// Target the shape asked for.
    pub target_users: u32,
    /// Worker count after reconciliation.
    pub active_workers: u32,
    /// Polls completed so far.
    pub ticks: u64,
}

// ──────────────────── load runner ────────────────────

/// Drives one run of a load shape against a worker pool.
pub struct LoadRunner<S, P, C> {
    shape: S,
    pool: P,
    clock: C,
    poll_interval: Duration,
    reconciler: Reconciler,
    journal: Option<RunJournalHandle>,
    progress: Option<Box<dyn FnMut(&TickRecord)>>,
    status: Arc<RwLock<RunStatus>>,
    abort: Arc<AtomicBool>,
    config_hash: String,
    started_wall: Instant,
    seq: u64,
    last_elapsed: Option<f64>,
    last_phase: Option<&'static str>,
    ticks: Vec<TickRecord>,
    peak_target: u32,
    peak_active: u32,
    outcome: Option<RunOutcome>,
}

impl<S: LoadShape, P: WorkerPool, C: RunClock> LoadRunner<S, P, C> {
    /// Harness over `shape`, `pool`, and `clock`, polling every
    /// `poll_interval` of wall time.
    pub fn new(shape: S, pool: P, clock: C, poll_interval: Duration) -> Self {
        Self {
            shape,
            pool,
            clock,
            poll_interval,
            reconciler: Reconciler::new(),
            journal: None,
            progress: None,
            status: Arc::new(RwLock::new(RunStatus::default())),
            abort: Arc::new(AtomicBool::new(false)),
            config_hash: String::new(),
            started_wall: Instant::now(),
            seq: 0,
            last_elapsed: None,
            last_phase: None,
            ticks: Vec::new(),
            peak_target: 0,
            peak_active: 0,
            outcome: None,
        }
    }

    /// Attach a journal handle; every run event is reported through it.
    #[must_use]
    pub fn with_journal(mut self, journal: RunJournalHandle) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Stamp run_start records with a config hash.
    #[must_use]
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// Observe every tick as it happens (e.g. for terminal output).
    #[must_use]
    pub fn with_progress<F: FnMut(&TickRecord) + 'static>(mut self, observer: F) -> Self {
        self.progress = Some(Box::new(observer));
        self
    }

    /// Flag that ends the run at the next poll when set. Clone it into a
    /// signal handler or another thread.
    #[must_use]
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Shared snapshot of the most recent poll.
    #[must_use]
    pub fn status_handle(&self) -> Arc<RwLock<RunStatus>> {
        Arc::clone(&self.status)
    }

    /// The pool under management.
    pub const fn pool(&self) -> &P {
        &self.pool
    }

    /// Poll the shape once and act on the result.
    ///
    /// Pool refusals drain what remains and surface the pool's error.
    pub fn step(&mut self) -> Result<StepOutcome> {
        let elapsed = self.clock.elapsed();
        let t = elapsed.as_secs_f64();

        if self.abort.load(Ordering::Relaxed) {
            self.journal_send(RunEvent::RunAborted {
                elapsed_seconds: t,
                active_workers: self.pool.active_workers(),
            });
            self.drain_pool()?;
            self.last_elapsed = Some(t);
            self.outcome = Some(RunOutcome::Aborted);
            return Ok(StepOutcome::Finished);
        }

        match self.shape.tick(elapsed) {
            ShapeTick::Terminal => {
                self.journal_send(RunEvent::DrainStarted {
                    elapsed_seconds: t,
                    active_workers: self.pool.active_workers(),
                });
                self.drain_pool()?;
                self.publish_status(t, self.shape.phase_label(elapsed), 0, 0);
                self.last_elapsed = Some(t);
                self.outcome = Some(RunOutcome::Completed);
                Ok(StepOutcome::Finished)
            }
            ShapeTick::Active {
                target_users,
                spawn_rate,
            } => {
                let phase = self.shape.phase_label(elapsed);
                if phase != self.last_phase
                    && let Some(to) = phase
                {
                    self.journal_send(RunEvent::PhaseChanged {
                        from: self.last_phase,
                        to,
                        elapsed_seconds: t,
                    });
                }

                let dt = self.last_elapsed.map_or(0.0, |prev| (t - prev).max(0.0));
                let active = self.pool.active_workers();
                let desired = self.reconciler.step(active, target_users, spawn_rate, dt);
                if desired != active
                    && let Err(e) = self.pool.scale_to(desired)
                {
                    self.journal_pool_failure(&e);
                    // The emergency drain can fail too; the journal gets
                    // both, the caller gets the scale error.
                    if let Err(drain_err) = self.pool.drain() {
                        self.journal_pool_failure(&drain_err);
                    }
                    return Err(e);
                }

                self.seq += 1;
                let record = TickRecord {
                    seq: self.seq,
                    elapsed_seconds: t,
                    phase,
                    target_users,
                    active_workers: desired,
                    spawn_rate,
                };
                self.peak_target = self.peak_target.max(target_users);
                self.peak_active = self.peak_active.max(desired);
                self.journal_send(RunEvent::TickObserved {
                    seq: record.seq,
                    elapsed_seconds: t,
                    phase,
                    target_users,
                    active_workers: desired,
                    spawn_rate,
                });
                self.publish_status(t, phase, target_users, desired);
                if let Some(observer) = self.progress.as_mut() {
                    observer(&record);
                }
                self.ticks.push(record);
                self.last_elapsed = Some(t);
                self.last_phase = phase;
                Ok(StepOutcome::Continue)
            }
        }
    }

    /// Poll until the shape goes terminal or an abort is honored, sleeping
    /// between polls on the cadence grid. Returns the sealed report.
    #[allow(clippy::cast_possible_truncation)]
    pub fn run(mut self) -> Result<RunReport> {
        self.journal_send(RunEvent::RunStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash: self.config_hash.clone(),
            poll_interval_ms: self.poll_interval.as_millis() as u64,
        });
        let mut cadence = Cadence::new(self.poll_interval);
        loop {
            match self.step()? {
                StepOutcome::Finished => break,
                StepOutcome::Continue => cadence.sleep_until_next(),
            }
        }
        Ok(self.seal_report())
    }

    /// Seal the report without looping, for callers driving `step()`
    /// themselves. Returns the pool alongside so its end state can be
    /// inspected.
    pub fn finish(mut self) -> (RunReport, P) {
        let report = self.seal_report();
        (report, self.pool)
    }

    // ──────────────────── internals ────────────────────

    fn seal_report(&mut self) -> RunReport {
        let outcome = self.outcome.unwrap_or(RunOutcome::Completed);
        let report = RunReport {
            outcome,
            peak_target: self.peak_target,
            peak_active: self.peak_active,
            shape_seconds: self.last_elapsed.unwrap_or(0.0),
            wall_seconds: self.started_wall.elapsed().as_secs_f64(),
            dropped_journal_events: self
                .journal
                .as_ref()
                .map_or(0, RunJournalHandle::dropped_events),
            ticks: std::mem::take(&mut self.ticks),
        };
        self.journal_send(RunEvent::RunFinished {
            outcome: outcome.label(),
            ticks: self.seq,
            peak_target: report.peak_target,
            peak_active: report.peak_active,
            wall_seconds: report.wall_seconds,
        });
        report
    }

    fn drain_pool(&mut self) -> Result<()> {
        if let Err(e) = self.pool.drain() {
            self.journal_pool_failure(&e);
            return Err(e);
        }
        Ok(())
    }

    fn journal_pool_failure(&self, e: &WlsError) {
        self.journal_send(RunEvent::PoolFailed {
            code: e.code().to_string(),
            message: e.to_string(),
        });
    }

    fn journal_send(&self, event: RunEvent) {
        if let Some(journal) = &self.journal {
            journal.send(event);
        }
    }

    fn publish_status(
        &self,
        elapsed_seconds: f64,
        phase: Option<&'static str>,
        target_users: u32,
        active_workers: u32,
    ) {
        let mut status = self.status.write();
        status.elapsed_seconds = elapsed_seconds;
        status.phase = phase;
        status.target_users = target_users;
        status.active_workers = active_workers;
        status.ticks = self.seq;
    }
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::{LoadRunner, StepOutcome, WorkerPool};
    use crate::core::errors::{Result, WlsError};
    use crate::journal::jsonl::JournalConfig;
    use crate::journal::report::RunOutcome;
    use crate::journal::sink::spawn_journal;
    use crate::runner::clock::{ManualClock, MonotonicClock};
    use crate::runner::sim_pool::SimulatedPool;
    use crate::shape::schedule::WaveSchedule;
    use crate::shape::wave::WaveShape;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn runner_for(
        schedule: WaveSchedule,
        pool: SimulatedPool,
        clock: ManualClock,
    ) -> LoadRunner<WaveShape, SimulatedPool, ManualClock> {
        let shape = WaveShape::new(schedule).expect("valid schedule");
        LoadRunner::new(shape, pool, clock, Duration::from_secs(1))
    }

    /// Pool whose scale and drain calls both refuse, for exercising the
    /// failure journaling path.
    struct SeizedPool;

    impl WorkerPool for SeizedPool {
        fn active_workers(&self) -> u32 {
            0
        }

        fn scale_to(&mut self, target: u32) -> Result<()> {
            Err(WlsError::WorkerPool {
                details: format!("injected failure on scale_to({target})"),
            })
        }

        fn drain(&mut self) -> Result<()> {
            Err(WlsError::WorkerPool {
                details: "injected failure on drain".to_string(),
            })
        }
    }

    fn step_through(
        runner: &mut LoadRunner<WaveShape, SimulatedPool, ManualClock>,
        clock: &ManualClock,
    ) {
        loop {
            match runner.step().expect("pool never fails here") {
                StepOutcome::Finished => break,
                StepOutcome::Continue => clock.advance(Duration::from_secs(1)),
            }
        }
    }

    #[test]
    fn full_wave_runs_to_completion_and_drains() {
        let clock = ManualClock::new();
        let mut runner = runner_for(WaveSchedule::surge(), SimulatedPool::new(), clock.clone());
        step_through(&mut runner, &clock);

        let (report, pool) = runner.finish();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.tick_count(), 60);
        assert_eq!(report.peak_target, 200);
        assert_eq!(report.peak_active, 200);
        assert!(report.shape_seconds >= 60.0);
        assert!(pool.is_drained());
        assert_eq!(pool.active_workers(), 0);
    }

    #[test]
    fn worker_moves_never_beat_the_spawn_rate() {
        let clock = ManualClock::new();
        let mut runner = runner_for(WaveSchedule::surge(), SimulatedPool::new(), clock.clone());
        step_through(&mut runner, &clock);

        let (report, _pool) = runner.finish();
        for pair in report.ticks.windows(2) {
            let moved = pair[1].active_workers.abs_diff(pair[0].active_workers);
            assert!(
                moved <= 10,
                "moved {moved} workers in one 1s tick at rate 10/s"
            );
        }
    }

    #[test]
    fn tight_spawn_rate_lags_the_target_without_overshoot() {
        let schedule = WaveSchedule::new(100, 10.0, 0.0, 10.0, 2.0);
        let clock = ManualClock::new();
        let mut runner = runner_for(schedule, SimulatedPool::new(), clock.clone());

        for _ in 0..6 {
            assert_eq!(runner.step().unwrap(), StepOutcome::Continue);
            clock.advance(Duration::from_secs(1));
        }
        // Six 1s polls at 2 workers/s: the first poll has dt 0.
        assert_eq!(runner.pool().active_workers(), 10);
    }

    #[test]
    fn abort_flag_ends_the_run_and_drains() {
        let clock = ManualClock::new();
        let mut runner = runner_for(
            WaveSchedule::endurance(),
            SimulatedPool::new(),
            clock.clone(),
        );
        for _ in 0..3 {
            assert_eq!(runner.step().unwrap(), StepOutcome::Continue);
            clock.advance(Duration::from_secs(1));
        }
        runner.abort_handle().store(true, Ordering::Relaxed);
        assert_eq!(runner.step().unwrap(), StepOutcome::Finished);

        let (report, pool) = runner.finish();
        assert_eq!(report.outcome, RunOutcome::Aborted);
        assert_eq!(report.tick_count(), 3);
        assert!(pool.is_drained());
    }

    #[test]
    fn pool_refusal_surfaces_the_pool_error() {
        let clock = ManualClock::new();
        let pool = SimulatedPool::new().failing_on_call(1);
        let mut runner = runner_for(WaveSchedule::surge(), pool, clock.clone());

        // t=0 asks for 0 workers, so no scale order goes out yet.
        assert_eq!(runner.step().unwrap(), StepOutcome::Continue);
        clock.advance(Duration::from_secs(1));
        let err = runner.step().unwrap_err();
        assert_eq!(err.code(), "WLS-3101");
        assert!(err.is_retryable());
    }

    #[test]
    fn a_failed_emergency_drain_is_journaled_too() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let (handle, join) = spawn_journal(JournalConfig::at(&path)).unwrap();

        let shape = WaveShape::new(WaveSchedule::surge()).expect("valid schedule");
        let clock = ManualClock::new();
        let mut runner = LoadRunner::new(shape, SeizedPool, clock.clone(), Duration::from_secs(1))
            .with_journal(handle.clone());

        // t=0 asks for 0 workers; the first scale order goes out at t=1.
        assert_eq!(runner.step().unwrap(), StepOutcome::Continue);
        clock.advance(Duration::from_secs(1));
        let err = runner.step().unwrap_err();
        assert_eq!(err.code(), "WLS-3101");
        assert!(err.to_string().contains("scale_to(6)"));

        drop(runner);
        handle.finish().unwrap();
        join.join().unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let errors: Vec<&str> = contents
            .lines()
            .filter(|line| line.contains("\"event\":\"error\""))
            .collect();
        assert_eq!(errors.len(), 2, "scale refusal and drain refusal both land");
        assert!(errors[0].contains("scale_to(6)"));
        assert!(errors[1].contains("injected failure on drain"));
    }

    #[test]
    fn status_snapshot_follows_the_run() {
        let clock = ManualClock::new();
        let mut runner = runner_for(WaveSchedule::surge(), SimulatedPool::new(), clock.clone());
        let status = runner.status_handle();

        runner.step().unwrap();
        clock.advance(Duration::from_secs(1));
        runner.step().unwrap();

        let snap = *status.read();
        assert_eq!(snap.ticks, 2);
        assert_eq!(snap.phase, Some("ramp_up"));
        assert!((snap.elapsed_seconds - 1.0).abs() < f64::EPSILON);
        assert_eq!(snap.target_users, 6);
    }

    #[test]
    fn progress_observer_sees_ticks_in_order() {
        let clock = ManualClock::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut runner = runner_for(WaveSchedule::surge(), SimulatedPool::new(), clock.clone())
            .with_progress(move |tick| sink.borrow_mut().push(tick.seq));

        for _ in 0..3 {
            runner.step().unwrap();
            clock.advance(Duration::from_secs(1));
        }
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn degenerate_schedule_completes_without_any_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let (handle, join) = spawn_journal(JournalConfig::at(&path)).unwrap();

        let schedule = WaveSchedule::new(200, 0.0, 0.0, 0.0, 10.0);
        let runner = runner_for(schedule, SimulatedPool::new(), ManualClock::new())
            .with_journal(handle.clone())
            .with_config_hash("feedc0de");
        let report = runner.run().unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.tick_count(), 0);

        handle.finish().unwrap();
        join.join().unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("run_start"));
        assert!(contents.contains("feedc0de"));
        assert!(contents.contains("drain_start"));
        assert!(contents.contains("\"outcome\":\"completed\""));
    }

    #[test]
    fn a_collapsed_poll_interval_still_finishes_the_run() {
        // Extreme speedups divide the wall poll interval down to zero.
        let shape = WaveShape::new(WaveSchedule::surge()).expect("valid schedule");
        let clock = MonotonicClock::with_speedup(1_000_000.0);
        let runner = LoadRunner::new(shape, SimulatedPool::new(), clock, Duration::ZERO);

        let report = runner.run().unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(report.shape_seconds >= 60.0);
    }

    #[test]
    fn phase_transitions_land_in_the_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let (handle, join) = spawn_journal(JournalConfig::at(&path)).unwrap();

        let schedule = WaveSchedule::new(10, 2.0, 2.0, 2.0, 10.0);
        let clock = ManualClock::new();
        let mut runner =
            runner_for(schedule, SimulatedPool::new(), clock.clone()).with_journal(handle.clone());
        step_through(&mut runner, &clock);
        let (report, _pool) = runner.finish();
        assert_eq!(report.outcome, RunOutcome::Completed);

        handle.finish().unwrap();
        join.join().unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("start->ramp_up"));
        assert!(contents.contains("ramp_up->hold"));
        assert!(contents.contains("hold->ramp_down"));
    }
}
