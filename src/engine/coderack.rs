//! The coderack: a salience-weighted pool of pending codelets.
//!
//! One [`step`](Coderack::step) draws a codelet (by salience under
//! `SearchQuality::Best`, round-robin under `Fast`), removes it and runs it.
//! Running it may schedule more codelets and/or record outcomes for the host.
//!
//! ```text
//!      ┌──────────── schedule ◀──────────────┐
//!      ▼                                      │
//! SalienceSet<CodeletId> ──draw──▶ remove ──▶ execute(Work)
//!                                             │
//!                                             └──▶ outcomes / failures
//! ```
//!
//! The coderack has no termination policy of its own; the host decides when to
//! stop calling `step` (see `api::run`). Stopping is always safe: pending
//! codelets are just dropped with the coderack.
//!
//! Execution is single-threaded. A codelet runs to completion before the next
//! draw, so the salience set is never touched by two codelets at once.

use super::context::Context;
use super::continuation::{Codelet, CodeletId, Continuation, Failure, FailureRecord, Outcome, Sink, Work};
use super::matcher;
use super::metrics::RackMetrics;
use super::rule::{RuleBook, RuleId};
use super::salience::{SalienceSet, SearchQuality, check_finite};
use crate::{Error, ParsedPhrase, SearchFailure};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

#[derive(Debug)]
pub struct Coderack<'r> {
    /// Rule arena that `RuleId`s in pending work refer to.
    rules: &'r RuleBook,
    /// Pending codelet handles weighted by salience.
    pending: SalienceSet<CodeletId>,
    /// Codelet bodies by handle.
    codelets: HashMap<CodeletId, Codelet>,
    next_id: u64,
    quality: SearchQuality,
    /// Salience of the codelet currently executing.
    current_salience: f64,
    outcomes: Vec<Outcome>,
    failures: Vec<FailureRecord>,
    metrics: RackMetrics,
}

impl<'r> Coderack<'r> {
    /// Create an empty coderack over `rules`.
    pub fn new(rules: &'r RuleBook) -> Self {
        Self::with_set(rules, SalienceSet::new())
    }

    /// Create an empty coderack whose draws are reproducible.
    pub fn seeded(rules: &'r RuleBook, seed: u64) -> Self {
        Self::with_set(rules, SalienceSet::seeded(seed))
    }

    fn with_set(rules: &'r RuleBook, pending: SalienceSet<CodeletId>) -> Self {
        Coderack {
            rules,
            pending,
            codelets: HashMap::new(),
            next_id: 0,
            quality: SearchQuality::default(),
            current_salience: 0.0,
            outcomes: Vec::new(),
            failures: Vec::new(),
            metrics: RackMetrics::default(),
        }
    }

    pub fn with_quality(mut self, quality: SearchQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn quality(&self) -> SearchQuality {
        self.quality
    }

    pub fn rules(&self) -> &'r RuleBook {
        self.rules
    }

    /// Number of pending codelets.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Sum of pending saliences.
    pub fn total_salience(&self) -> f64 {
        self.pending.total_weight()
    }

    pub fn metrics(&self) -> &RackMetrics {
        &self.metrics
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn take_outcomes(&mut self) -> Vec<Outcome> {
        std::mem::take(&mut self.outcomes)
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    pub fn take_failures(&mut self) -> Vec<FailureRecord> {
        std::mem::take(&mut self.failures)
    }

    /// Register a codelet. Rejects a non-finite salience.
    pub fn enqueue(&mut self, codelet: Codelet) -> Result<CodeletId, Error> {
        check_finite(codelet.salience)?;
        Ok(self.admit(codelet))
    }

    /// Register a codelet produced during a step.
    ///
    /// A codelet that cannot be admitted is reported to its own failure
    /// continuation instead of surfacing an error mid-search. Returns the work
    /// cost of scheduling.
    pub(crate) fn schedule(&mut self, codelet: Codelet) -> usize {
        if let Err(err) = check_finite(codelet.salience) {
            warn!(target: "terraced::coderack", %err, "codelet rejected");
            let Codelet { work, failure, .. } = codelet;
            return failure.fail(self, SearchFailure::Match(err.to_string()), work.continuation());
        }
        self.admit(codelet);
        1
    }

    fn admit(&mut self, codelet: Codelet) -> CodeletId {
        let id = CodeletId(self.next_id);
        self.next_id += 1;
        trace!(target: "terraced::coderack", id = id.0, salience = codelet.salience, "enqueue");
        self.pending.push_unchecked(codelet.salience, id);
        self.codelets.insert(id, codelet);
        self.metrics.enqueued += 1;
        id
    }

    /// Draw, remove and run one codelet.
    ///
    /// Returns the work cost of the codelet, or `None` when nothing is pending.
    pub fn step(&mut self) -> Option<usize> {
        let (salience, id) = self.pending.select_salient(self.quality)?;
        self.pending.remove(salience, &id);
        let Some(codelet) = self.codelets.remove(&id) else {
            warn!(target: "terraced::coderack", id = id.0, "drawn codelet has no body");
            return Some(0);
        };

        self.metrics.steps += 1;
        self.current_salience = salience;
        trace!(target: "terraced::coderack", id = id.0, salience, step = self.metrics.steps, "execute");

        let cost = self.execute(codelet);
        self.metrics.work += cost;
        Some(cost)
    }

    fn execute(&mut self, codelet: Codelet) -> usize {
        let rules = self.rules;
        let Codelet { work, failure, .. } = codelet;
        match work {
            Work::Continue { continuation, value } => continuation.resume(self, value, &failure),
            Work::Match(state) => matcher::advance(self, state, failure),
            Work::Invoke { rule, bindings, lineage, weight, continuation } => match rules.get(rule) {
                Some(source) => source.generate_template(self, rule, bindings, lineage, continuation, failure, weight),
                None => failure.fail(self, SearchFailure::Match(format!("no rule with id {rule}")), &continuation),
            },
        }
    }

    /// Seed a match attempt of rule `id` against `input`.
    pub fn generate(
        &mut self,
        id: RuleId,
        input: &dyn ParsedPhrase,
        success: Continuation,
        failure: Failure,
        weight: f64,
    ) -> Result<usize, Error> {
        let rules = self.rules;
        let rule = rules.get(id).ok_or_else(|| Error::UnknownRule(format!("#{id}")))?;
        rule.generate(self, id, input, success, failure, weight)
    }

    /// Seed a match attempt of every rule against `input`.
    pub fn generate_all(
        &mut self,
        input: &dyn ParsedPhrase,
        success: Continuation,
        failure: Failure,
        weight: f64,
    ) -> Result<usize, Error> {
        let rules = self.rules;
        let mut cost = 0;
        for (id, rule) in rules.iter() {
            cost += rule.generate(self, id, input, success.clone(), failure, weight)?;
        }
        debug!(
            target: "terraced::coderack",
            rules = rules.len(),
            pending = self.pending(),
            "seeded all rules"
        );
        Ok(cost)
    }

    pub(crate) fn record_outcome(&mut self, sink: Sink, value: Context) {
        debug!(target: "terraced::coderack", sink = sink.0, value = %value, salience = self.current_salience, "outcome");
        self.metrics.outcomes += 1;
        self.outcomes.push(Outcome { sink, value, salience: self.current_salience, step: self.metrics.steps });
    }

    pub(crate) fn record_failure(&mut self, sink: Sink, reason: SearchFailure, continuation: String) {
        self.metrics.failures += 1;
        self.failures.push(FailureRecord { sink, reason, continuation, step: self.metrics.steps });
    }

    /// Drop all pending work, outcomes and failure records.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.codelets.clear();
        self.outcomes.clear();
        self.failures.clear();
        self.metrics = RackMetrics::default();
    }
}
