//! Continuations, failures and codelets.
//!
//! Control flow between the matcher, the evaluator and rules is explicit: a
//! piece of work either hands a value to a success [`Continuation`] or reports
//! a dead end to a [`Failure`]. Neither unwinds anything; a failed branch
//! simply schedules no further work.
//!
//! Both are closed enums. Cloning a continuation copies only attempt-specific
//! state (salience, lineage, partial results); rules are referenced by
//! [`RuleId`] into the coderack's [`RuleBook`], so many pending branches can
//! hold "the same" continuation without sharing mutable state.

use super::coderack::Coderack;
use super::context::Context;
use super::evaluator::Evaluator;
use super::matcher::MatchState;
use super::rule::{ArgumentGather, RuleAttempt, RuleBook, RuleId};
use crate::SearchFailure;
use tracing::trace;

/// Identifies a host-side receiver of outcomes and failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Sink(pub u32);

/// A value that reached a host continuation.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub sink: Sink,
    pub value: Context,
    /// Salience of the codelet that delivered the value.
    pub salience: f64,
    /// Coderack step during which the value was delivered.
    pub step: usize,
}

impl Outcome {
    /// The produced words, space separated.
    pub fn text(&self) -> String {
        self.value.to_string()
    }
}

/// A dead branch reported to a `Failure::Report` sink.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub sink: Sink,
    pub reason: SearchFailure,
    /// Description of the continuation that would have run.
    pub continuation: String,
    pub step: usize,
}

/// Chain of rules whose templates are being expanded, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lineage(Vec<RuleId>);

impl Lineage {
    pub fn root() -> Self {
        Lineage::default()
    }

    pub fn contains(&self, rule: RuleId) -> bool {
        self.0.contains(&rule)
    }

    pub fn extended(&self, rule: RuleId) -> Lineage {
        let mut chain = self.0.clone();
        chain.push(rule);
        Lineage(chain)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn rules(&self) -> &[RuleId] {
        &self.0
    }
}

/// What to do with a produced value.
#[derive(Debug, Clone)]
pub enum Continuation {
    /// A rule's bound copy waiting for a candidate binding from the matcher.
    Match(RuleAttempt),
    /// A template evaluation suspended on a nested rule invocation.
    Evaluate(Evaluator),
    /// Argument collection for a template-only rule invocation.
    Gather(ArgumentGather),
    /// Hand the value to the host.
    Host(Sink),
}

impl Continuation {
    /// Deliver `value`; returns the work cost.
    pub fn resume(self, rack: &mut Coderack<'_>, value: Context, failure: &Failure) -> usize {
        match self {
            Continuation::Match(attempt) => attempt.continue_with(rack, value, failure),
            Continuation::Evaluate(evaluator) => evaluator.resume(rack, value, failure),
            Continuation::Gather(gather) => gather.resume(rack, value, failure),
            Continuation::Host(sink) => {
                rack.record_outcome(sink, value);
                1
            }
        }
    }

    /// Short description for traces and failure reports.
    pub fn label(&self, rules: &RuleBook) -> String {
        let rule_name = |id: RuleId| rules.get(id).map(|r| r.name().to_string()).unwrap_or_else(|| format!("#{id}"));
        match self {
            Continuation::Match(attempt) => format!("match({})", rule_name(attempt.rule())),
            Continuation::Evaluate(evaluator) => format!("evaluate(depth {})", evaluator.lineage().depth()),
            Continuation::Gather(gather) => format!("gather({})", rule_name(gather.rule())),
            Continuation::Host(sink) => format!("host({})", sink.0),
        }
    }
}

/// What to do when a branch dies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Failure {
    /// Drop the branch silently.
    #[default]
    Ignore,
    /// Record a [`FailureRecord`] for the host.
    Report(Sink),
}

impl Failure {
    /// Report a dead branch; returns the work cost.
    pub fn fail(&self, rack: &mut Coderack<'_>, reason: SearchFailure, continuation: &Continuation) -> usize {
        trace!(target: "terraced::coderack", %reason, "branch failed");
        if let Failure::Report(sink) = *self {
            let continuation = continuation.label(rack.rules());
            rack.record_failure(sink, reason, continuation);
        }
        1
    }
}

/// Handle of a pending codelet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeletId(pub u64);

/// The deferred work a codelet performs.
#[derive(Debug, Clone)]
pub enum Work {
    /// Hand `value` to `continuation`.
    Continue { continuation: Continuation, value: Context },
    /// Extend a partial match.
    Match(MatchState),
    /// Run a rule's template-only entry point on behalf of a caller.
    Invoke { rule: RuleId, bindings: Context, lineage: Lineage, weight: f64, continuation: Continuation },
}

impl Work {
    /// The success continuation this work ultimately feeds.
    pub fn continuation(&self) -> &Continuation {
        match self {
            Work::Continue { continuation, .. } => continuation,
            Work::Match(state) => state.success(),
            Work::Invoke { continuation, .. } => continuation,
        }
    }
}

/// A unit of weighted, deferred work.
#[derive(Debug, Clone)]
pub struct Codelet {
    pub salience: f64,
    pub work: Work,
    pub failure: Failure,
}

impl Codelet {
    pub fn new(salience: f64, work: Work, failure: Failure) -> Self {
        Codelet { salience, work, failure }
    }

    /// A codelet that delivers `value` to `continuation`.
    pub fn deliver(salience: f64, continuation: Continuation, value: Context, failure: Failure) -> Self {
        Codelet::new(salience, Work::Continue { continuation, value }, failure)
    }
}
