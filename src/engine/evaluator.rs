//! Template evaluation.
//!
//! An [`Evaluator`] walks a template's contents and builds the produced
//! fragments: words pass through, `*name` substitutes its binding, and `@rule`
//! suspends the walk. A suspended evaluator is cloned into an
//! [`Continuation::Evaluate`] per candidate rule and picks up after the
//! invocation once the nested result arrives.

use super::coderack::Coderack;
use super::context::Context;
use super::continuation::{Codelet, Continuation, Failure, Lineage, Work};
use super::rule::{MAX_SALIENCE, RuleId};
use crate::{Error, Fragment, SearchFailure};
use std::sync::Arc;
use tracing::trace;

/// How many fragments an evaluation may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgumentMode {
    /// Exactly one fragment.
    Single,
    /// Any sequence.
    #[default]
    Many,
}

/// A template walk in progress.
#[derive(Debug, Clone)]
pub struct Evaluator {
    salience: f64,
    mode: ArgumentMode,
    lineage: Lineage,
    template: Arc<[Fragment]>,
    cursor: usize,
    produced: Vec<Fragment>,
    context: Context,
    success: Box<Continuation>,
}

/// Evaluate `context`'s contents against its own bindings and hand the result
/// to `success`. Returns the work cost.
pub fn evaluate(
    rack: &mut Coderack<'_>,
    salience: f64,
    context: Context,
    mode: ArgumentMode,
    lineage: Lineage,
    success: Continuation,
    failure: &Failure,
) -> usize {
    let evaluator = Evaluator {
        salience,
        mode,
        lineage,
        template: context.contents().into(),
        cursor: 0,
        produced: Vec::new(),
        context,
        success: Box::new(success),
    };
    evaluator.run(rack, failure) + 1
}

impl Evaluator {
    /// Rules whose templates enclose this evaluation.
    pub fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    pub fn produced(&self) -> &[Fragment] {
        &self.produced
    }

    /// Splice a nested result in and continue the walk.
    pub(crate) fn resume(mut self, rack: &mut Coderack<'_>, value: Context, failure: &Failure) -> usize {
        self.produced.extend(value.contents().iter().cloned());
        self.run(rack, failure)
    }

    fn run(mut self, rack: &mut Coderack<'_>, failure: &Failure) -> usize {
        let mut cost = 1;
        while let Some(fragment) = self.template.get(self.cursor).cloned() {
            self.cursor += 1;
            match fragment {
                Fragment::Word(_) => self.produced.push(fragment),
                Fragment::Wildcard(name) => match self.context.get(&name) {
                    Some(value) => self.produced.extend(value.iter().cloned()),
                    None => {
                        let reason = SearchFailure::Match(Error::UnboundVariable(name).to_string());
                        return cost + failure.fail(rack, reason, &self.success);
                    }
                },
                Fragment::Invoke(name) => return cost + self.invoke(rack, &name, failure),
            }
            cost += 1;
        }
        cost + self.finish(rack, failure)
    }

    /// Schedule one invocation per rule named `name` that is not already being
    /// expanded further up the lineage.
    fn invoke(self, rack: &mut Coderack<'_>, name: &str, failure: &Failure) -> usize {
        let rules = rack.rules();
        let targets = rules.find(name);
        if targets.is_empty() {
            let reason = SearchFailure::Match(Error::UnknownRule(name.to_string()).to_string());
            return failure.fail(rack, reason, &self.success);
        }

        let open: Vec<RuleId> = targets.iter().copied().filter(|&id| !self.lineage.contains(id)).collect();
        if open.is_empty() {
            trace!(target: "terraced::evaluator", rule = name, depth = self.lineage.depth(), "cyclic expansion");
            let reason = SearchFailure::CyclicExpansion { rule: name.to_string() };
            return failure.fail(rack, reason, &self.success);
        }

        let weight = self.salience / MAX_SALIENCE;
        let mut cost = 0;
        for rule in open {
            trace!(target: "terraced::evaluator", rule = name, id = rule, weight, "invoke");
            let work = Work::Invoke {
                rule,
                bindings: self.context.clone(),
                lineage: self.lineage.clone(),
                weight,
                continuation: Continuation::Evaluate(self.clone()),
            };
            cost += rack.schedule(Codelet::new(self.salience, work, *failure));
        }
        cost
    }

    fn finish(self, rack: &mut Coderack<'_>, failure: &Failure) -> usize {
        if self.mode == ArgumentMode::Single && self.produced.len() != 1 {
            let reason = format!("expected a single fragment, produced {}", self.produced.len());
            return failure.fail(rack, SearchFailure::Match(reason), &self.success);
        }
        let value = self.context.child(self.produced).with_flags(self.context.flags());
        trace!(target: "terraced::evaluator", value = %value, "evaluated");
        self.success.resume(rack, value, failure) + 1
    }
}
