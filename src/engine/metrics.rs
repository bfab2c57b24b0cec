//! Engine run metrics.
//!
//! Two levels of visibility:
//!
//! - [`RackMetrics`]: counters kept by every [`Coderack`](super::Coderack),
//!   cheap enough to always collect.
//! - [`RunMetrics`]: timings and the stop reason of one driver run
//!   (`api::run`), bundled into a [`RunResult`] with the outcomes.

use super::continuation::{FailureRecord, Outcome};
use std::fmt;
use std::time::Duration;

// --- Metrics -----------------------------------------------------------------

/// Counters maintained by a coderack.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RackMetrics {
    /// Codelets drawn and executed.
    pub steps: usize,
    /// Codelets admitted.
    pub enqueued: usize,
    /// Sum of work costs returned by executed codelets.
    pub work: usize,
    /// Values delivered to host continuations.
    pub outcomes: usize,
    /// Failure records produced.
    pub failures: usize,
}

/// Why a driver run stopped stepping.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Nothing left on the coderack.
    #[default]
    Exhausted,
    /// `stop_at_first` was set and an outcome arrived.
    FirstResult,
    /// The step budget ran out.
    StepBudget,
    /// The wall-clock budget ran out.
    TimeBudget,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::Exhausted => "exhausted",
            StopReason::FirstResult => "first result",
            StopReason::StepBudget => "step budget",
            StopReason::TimeBudget => "time budget",
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Total elapsed time for the run.
    pub total: Duration,
    /// Time spent seeding every rule against the input.
    pub seeding: Duration,
    /// Time spent stepping the coderack.
    pub search: Duration,
    /// Coderack counters at the end of the run.
    pub rack: RackMetrics,
    pub stop: StopReason,
    /// Codelets still pending when the run stopped.
    pub pending_at_stop: usize,
}

/// Driver output bundled with timing information.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    /// Delivered values, highest salience first.
    pub outcomes: Vec<Outcome>,
    /// Reported dead branches, in the order they happened.
    pub failures: Vec<FailureRecord>,
    pub metrics: RunMetrics,
}

impl RunResult {
    /// The most salient outcome, if any.
    pub fn best(&self) -> Option<&Outcome> {
        self.outcomes.first()
    }

    pub fn texts(&self) -> Vec<String> {
        self.outcomes.iter().map(Outcome::text).collect()
    }
}
