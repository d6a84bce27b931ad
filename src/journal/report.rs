//! End-of-run summary assembled by the harness.

use serde::Serialize;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The shape went terminal and the pool drained.
    Completed,
    /// An abort request ended the run before the shape finished.
    Aborted,
}

impl RunOutcome {
    /// Stable lowercase label, as written to the journal.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One scheduler poll: what the shape asked for and where the pool landed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickRecord {
    /// 1-based poll sequence number.
    pub seq: u64,
    /// Shape-clock position of this poll.
    pub elapsed_seconds: f64,
    /// Phase label, for shapes that expose phases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<&'static str>,
    /// Worker count the shape asked for.
    pub target_users: u32,
    /// Worker count the pool held after reconciliation.
    pub active_workers: u32,
    /// Spawn-rate ceiling in effect.
    pub spawn_rate: f64,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Terminal state of the run.
    pub outcome: RunOutcome,
    /// Highest target the shape requested.
    pub peak_target: u32,
    /// Highest worker count the pool actually reached.
    pub peak_active: u32,
    /// Last shape-clock position observed.
    pub shape_seconds: f64,
    /// Wall time the run took, before any clock compression.
    pub wall_seconds: f64,
    /// Journal events lost to channel back-pressure, if a journal ran.
    pub dropped_journal_events: u64,
    /// Every poll in order.
    pub ticks: Vec<TickRecord>,
}

impl RunReport {
    /// Number of polls recorded.
    #[must_use]
    pub fn tick_count(&self) -> usize {
        self.ticks.len()
    }

    /// One-line human summary for terminal output.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} after {} ticks: peak target {}, peak active {}, {:.1}s shape time, {:.1}s wall",
            self.outcome,
            self.tick_count(),
            self.peak_target,
            self.peak_active,
            self.shape_seconds,
            self.wall_seconds
        )
    }
}
