//! Production rules and the rule arena.
//!
//! A [`PatternTemplateSource`] is immutable once it is in a [`RuleBook`]. Each
//! attempt to use it gets its own [`RuleAttempt`] (rule id, salience, caller's
//! success continuation, lineage), which is what travels through the coderack.
//!
//! Two entry points:
//!
//! ```text
//! generate           input ──match pattern──▶ RuleAttempt ──full?──▶ evaluate template
//! generate_template  caller bindings ──evaluate pattern──▶ ArgumentGather ──▶ RuleAttempt ──▶ ...
//! ```

use super::coderack::Coderack;
use super::context::{Context, ContextFlags};
use super::continuation::{Continuation, Failure, Lineage};
use super::evaluator::{ArgumentMode, evaluate};
use super::matcher::match_against;
use super::salience::check_finite;
use crate::{Error, Fragment, ParsedPhrase, SearchFailure};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Salience of a rule with score 1 seeded at weight 1.
pub const MAX_SALIENCE: f64 = 100.0;

/// Fixed per-rule cost on top of pattern and template sizes.
pub const RULE_OVERHEAD: usize = 40;

/// Binding under which a template-only invocation stores its gathered
/// arguments.
pub const ARGUMENTS_BINDING: &str = "arguments";

/// Index of a rule in its [`RuleBook`].
pub type RuleId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct PatternTemplateSource {
    name: String,
    pattern: Context,
    template: Context,
    score: f64,
    source: String,
}

impl PatternTemplateSource {
    /// A rule named after its source.
    pub fn new(pattern: Context, template: Context, score: f64, source: impl Into<String>) -> Self {
        let source = source.into();
        PatternTemplateSource { name: source.clone(), pattern, template, score, source }
    }

    /// Set the name used by `@name` invocations.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &Context {
        &self.pattern
    }

    pub fn template(&self) -> &Context {
        &self.template
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Search-cost metric.
    pub fn size(&self) -> usize {
        self.pattern.size() + self.template.size() + RULE_OVERHEAD
    }

    /// Start matching this rule (arena id `id`) against `input`.
    ///
    /// Fails with `InvalidWeight` when the resulting salience is not finite or
    /// is negative.
    pub fn generate(
        &self,
        rack: &mut Coderack<'_>,
        id: RuleId,
        input: &dyn ParsedPhrase,
        success: Continuation,
        failure: Failure,
        weight: f64,
    ) -> Result<usize, Error> {
        let salience = check_finite(MAX_SALIENCE * self.score * weight)?;
        if salience < 0.0 {
            return Err(Error::InvalidWeight(salience));
        }
        trace!(target: "terraced::coderack", rule = %self.name, salience, "generate");
        let attempt = RuleAttempt { rule: id, salience, success: Box::new(success), lineage: Lineage::root() };
        Ok(match_against(rack, salience, &self.pattern, input, Context::empty(), Continuation::Match(attempt), failure))
    }

    /// Template-only entry point used by `@name` invocations.
    ///
    /// The pattern is evaluated against the caller's `bindings` to gather
    /// arguments; the gathered words are then bound and the template evaluated
    /// as if the rule had matched.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_template(
        &self,
        rack: &mut Coderack<'_>,
        id: RuleId,
        bindings: Context,
        lineage: Lineage,
        success: Continuation,
        failure: Failure,
        weight: f64,
    ) -> usize {
        let salience = MAX_SALIENCE * weight;
        trace!(target: "terraced::coderack", rule = %self.name, salience, depth = lineage.depth(), "generate template");
        let attempt = RuleAttempt { rule: id, salience, success: Box::new(success), lineage: lineage.clone() };
        let arguments = bindings.child(self.pattern.contents().to_vec());
        evaluate(
            rack,
            salience,
            arguments,
            ArgumentMode::Many,
            lineage.extended(id),
            Continuation::Gather(ArgumentGather { attempt }),
            &failure,
        )
    }
}

/// A rule bound to one attempt.
#[derive(Debug, Clone)]
pub struct RuleAttempt {
    rule: RuleId,
    salience: f64,
    success: Box<Continuation>,
    lineage: Lineage,
}

impl RuleAttempt {
    pub fn rule(&self) -> RuleId {
        self.rule
    }

    pub fn salience(&self) -> f64 {
        self.salience
    }

    /// Receive a candidate binding. Only a full match proceeds to template
    /// evaluation.
    pub(crate) fn continue_with(self, rack: &mut Coderack<'_>, context: Context, failure: &Failure) -> usize {
        if !context.is_full_match() {
            return failure.fail(rack, SearchFailure::Match("Context is not empty".to_string()), &self.success);
        }
        let rules = rack.rules();
        let Some(rule) = rules.get(self.rule) else {
            let reason = SearchFailure::Match(format!("no rule with id {}", self.rule));
            return failure.fail(rack, reason, &self.success);
        };
        let production =
            context.child(rule.template.contents().to_vec()).with_flags(context.flags() | ContextFlags::PRODUCTION);
        debug!(target: "terraced::coderack", rule = %rule.name, salience = self.salience, "rule matched");
        evaluate(
            rack,
            self.salience,
            production,
            ArgumentMode::Many,
            self.lineage.extended(self.rule),
            *self.success,
            failure,
        ) + 1
    }
}

/// Continuation of a template-only invocation: binds the gathered arguments and
/// proceeds as if the rule's pattern had matched.
#[derive(Debug, Clone)]
pub struct ArgumentGather {
    attempt: RuleAttempt,
}

impl ArgumentGather {
    pub fn rule(&self) -> RuleId {
        self.attempt.rule
    }

    pub(crate) fn resume(self, rack: &mut Coderack<'_>, value: Context, failure: &Failure) -> usize {
        let gathered: Vec<Fragment> = value.contents().to_vec();
        let arguments =
            value.child(Vec::new()).with_binding(ARGUMENTS_BINDING, gathered).with_flags(ContextFlags::ARGUMENTS);
        self.attempt.continue_with(rack, arguments, failure)
    }
}

/// Arena of rules addressed by [`RuleId`], indexed by name.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    rules: Vec<PatternTemplateSource>,
    by_name: HashMap<String, Vec<RuleId>>,
}

impl RuleBook {
    pub fn new() -> Self {
        RuleBook::default()
    }

    pub fn add(&mut self, rule: PatternTemplateSource) -> RuleId {
        let id = self.rules.len();
        self.by_name.entry(rule.name.clone()).or_default().push(id);
        self.rules.push(rule);
        id
    }

    pub fn get(&self, id: RuleId) -> Option<&PatternTemplateSource> {
        self.rules.get(id)
    }

    /// All rules sharing `name`, in insertion order.
    pub fn find(&self, name: &str) -> &[RuleId] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Like [`find`](Self::find), but an unknown name is an error.
    pub fn resolve(&self, name: &str) -> Result<&[RuleId], Error> {
        match self.find(name) {
            [] => Err(Error::UnknownRule(name.to_string())),
            ids => Ok(ids),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &PatternTemplateSource)> {
        self.rules.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn total_size(&self) -> usize {
        self.rules.iter().map(PatternTemplateSource::size).sum()
    }

    /// Check that every `@name` in a template refers to a known rule.
    pub fn validate(&self) -> Result<(), Error> {
        for rule in &self.rules {
            for fragment in rule.template.contents() {
                if let Fragment::Invoke(name) = fragment {
                    self.resolve(name)?;
                }
            }
        }
        Ok(())
    }
}

impl Extend<PatternTemplateSource> for RuleBook {
    fn extend<I: IntoIterator<Item = PatternTemplateSource>>(&mut self, iter: I) {
        for rule in iter {
            self.add(rule);
        }
    }
}

impl FromIterator<PatternTemplateSource> for RuleBook {
    fn from_iter<I: IntoIterator<Item = PatternTemplateSource>>(iter: I) -> Self {
        let mut book = RuleBook::new();
        book.extend(iter);
        book
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::continuation::Sink;
    use crate::Phrase;

    fn drive<'a>(rules: &'a RuleBook, words: &[&str]) -> Coderack<'a> {
        let mut rack = Coderack::seeded(rules, 17);
        let input = Phrase::new(words.iter().copied());
        rack.generate_all(&input, Continuation::Host(Sink(0)), Failure::Report(Sink(0)), 1.0).unwrap();
        while rack.step().is_some() {}
        rack
    }

    #[test]
    fn hello_world_produces_one_outcome() {
        let rules: RuleBook = [rule! { name: "greet", pattern: ["hello", "*x"], template: ["hi", "*x"] }]
            .into_iter()
            .collect();
        let rack = drive(&rules, &["hello", "world"]);

        assert_eq!(rack.outcomes().len(), 1);
        assert_eq!(rack.outcomes()[0].text(), "hi world");
        assert!(rack.outcomes()[0].value.is_production());
        assert_eq!(rack.pending(), 0);
    }

    #[test]
    fn salience_follows_score_and_weight() {
        let rules: RuleBook =
            [rule! { name: "greet", pattern: ["hello"], template: ["hi"], score: 0.5 }].into_iter().collect();
        let rack = drive(&rules, &["hello"]);
        assert_eq!(rack.outcomes().len(), 1);
        assert!((rack.outcomes()[0].salience - 50.0).abs() < 1e-9);
    }

    #[test]
    fn negative_score_is_rejected_at_seeding() {
        let rules: RuleBook =
            [rule! { name: "sour", pattern: ["hello"], template: ["hi"], score: -0.5 }].into_iter().collect();
        let mut rack = Coderack::seeded(&rules, 17);
        let input = Phrase::new(["hello"]);
        let result = rack.generate_all(&input, Continuation::Host(Sink(0)), Failure::Report(Sink(0)), 1.0);
        assert!(matches!(result, Err(Error::InvalidWeight(w)) if w == -50.0));
        assert_eq!(rack.pending(), 0);
    }

    #[test]
    fn partial_match_is_rejected_by_the_rule() {
        let rules: RuleBook =
            [rule! { name: "long", pattern: ["a", "b", "c"], template: ["x"] }].into_iter().collect();
        let rack = drive(&rules, &["a"]);
        assert!(rack.outcomes().is_empty());
        assert_eq!(rack.failures().len(), 1);
        assert_eq!(rack.failures()[0].reason, SearchFailure::Match("Context is not empty".into()));
        assert_eq!(rack.failures()[0].continuation, "host(0)");
    }

    #[test]
    fn direct_self_reference_is_cyclic() {
        let rules: RuleBook =
            [rule! { name: "loop", pattern: ["again"], template: ["@loop"] }].into_iter().collect();
        let rack = drive(&rules, &["again"]);
        assert!(rack.outcomes().is_empty());
        assert_eq!(rack.failures().len(), 1);
        assert_eq!(rack.failures()[0].reason, SearchFailure::CyclicExpansion { rule: "loop".into() });
        assert!(rack.is_idle());
    }

    #[test]
    fn nested_invocation_sees_caller_bindings() {
        let rules: RuleBook = [
            rule! { name: "intro", pattern: ["i", "am", "*name"], template: ["@welcome", "!"] },
            rule! { name: "welcome", pattern: ["*name"], template: ["welcome", "*name"] },
        ]
        .into_iter()
        .collect();
        let rack = drive(&rules, &["i", "am", "ada"]);

        let texts: Vec<String> = rack.outcomes().iter().map(|o| o.text()).collect();
        // `welcome` also matches the raw input directly.
        assert!(texts.contains(&"welcome ada !".to_string()), "{texts:?}");
        assert!(texts.contains(&"welcome i am ada".to_string()), "{texts:?}");
        assert_eq!(texts.len(), 2);
    }

    #[test]
    fn template_entry_binds_arguments() {
        let rules: RuleBook =
            [rule! { name: "echo", pattern: ["*what"], template: ["*arguments"] }].into_iter().collect();
        let mut rack = Coderack::seeded(&rules, 2);
        let caller = Context::builder().bind("what", fragments!["two", "words"]).build();
        let rule = rules.get(0).unwrap();
        rule.generate_template(&mut rack, 0, caller, Lineage::root(), Continuation::Host(Sink(0)), Failure::Ignore, 0.3);
        while rack.step().is_some() {}

        assert_eq!(rack.outcomes().len(), 1);
        assert_eq!(rack.outcomes()[0].text(), "two words");
    }

    #[test]
    fn size_adds_rule_overhead() {
        let rule = rule! { name: "r", pattern: ["a"], template: [] };
        assert_eq!(rule.size(), rule.pattern().size() + rule.template().size() + RULE_OVERHEAD);
        assert_eq!(rule.source(), "r");
        assert_eq!(rule.score(), 1.0);
    }

    #[test]
    fn book_lookup() {
        let mut book = RuleBook::new();
        let a = book.add(rule! { name: "x", pattern: ["a"], template: ["@y"] });
        let b = book.add(rule! { name: "x", pattern: ["b"], template: [] });
        assert_eq!(book.find("x"), &[a, b]);
        assert!(book.find("y").is_empty());
        assert!(matches!(book.validate(), Err(Error::UnknownRule(name)) if name == "y"));
        book.add(rule! { name: "y", pattern: [], template: [] });
        assert!(book.validate().is_ok());
        assert_eq!(book.len(), 3);
    }
}
