//! Pattern matching as scheduled work.
//!
//! A pattern is walked left to right against the input words. Literal words
//! must line up exactly. A wildcard in the last position absorbs whatever input
//! is left. A wildcard anywhere else is ambiguous: every extent whose following
//! literal lines up is a separate hypothesis, and all but one of them are
//! scheduled as their own [`Work::Match`] codelets instead of being explored
//! depth-first.
//!
//! Each finished binding is handed to the success continuation through a
//! scheduled codelet whose salience is scaled by match quality:
//!
//! ```text
//! quality = (1 + literals) / (1 + literals + absorbed_words)
//! ```
//!
//! so a binding that pins down more of the input by literal words is drawn
//! sooner than one that mostly swallowed words into wildcards.

use super::coderack::Coderack;
use super::context::Context;
use super::continuation::{Codelet, Continuation, Failure, Work};
use crate::{Fragment, ParsedPhrase, SearchFailure};
use std::sync::Arc;
use tracing::trace;

/// A partially matched pattern.
#[derive(Debug, Clone)]
pub struct MatchState {
    /// Salience the rule was seeded with, before quality scaling.
    salience: f64,
    pattern: Arc<[Fragment]>,
    input: Arc<[String]>,
    pattern_pos: usize,
    input_pos: usize,
    literals: usize,
    absorbed: usize,
    bound: Context,
    success: Continuation,
}

impl MatchState {
    pub fn success(&self) -> &Continuation {
        &self.success
    }

    /// Bindings collected so far.
    pub fn bound(&self) -> &Context {
        &self.bound
    }

    pub fn quality(&self) -> f64 {
        let literals = self.literals as f64;
        (1.0 + literals) / (1.0 + literals + self.absorbed as f64)
    }

    fn bind(&mut self, name: &str, end: usize) {
        let words: Vec<Fragment> = self.input[self.input_pos..end].iter().map(Fragment::word).collect();
        self.absorbed += words.len();
        self.bound = self.bound.with_binding(name, words);
        self.input_pos = end;
        self.pattern_pos += 1;
    }

    /// Whether binding `name` to `input[input_pos..end]` agrees with an
    /// earlier binding of the same name.
    fn consistent(&self, name: &str, end: usize) -> bool {
        match self.bound.get(name) {
            None => true,
            Some(existing) => {
                existing.len() == end - self.input_pos
                    && existing.iter().zip(&self.input[self.input_pos..end]).all(|(f, w)| f.as_word() == Some(w.as_str()))
            }
        }
    }
}

/// Match `pattern` against `input`, feeding every complete binding to `success`.
///
/// Returns the work cost of the part of the walk done inline; branches created
/// by ambiguous wildcards continue as scheduled codelets.
pub fn match_against(
    rack: &mut Coderack<'_>,
    salience: f64,
    pattern: &Context,
    input: &dyn ParsedPhrase,
    bound_so_far: Context,
    success: Continuation,
    failure: Failure,
) -> usize {
    let words: Vec<String> = (0..input.word_count()).filter_map(|i| input.word(i).map(str::to_string)).collect();
    let state = MatchState {
        salience,
        pattern: pattern.contents().into(),
        input: words.into(),
        pattern_pos: 0,
        input_pos: 0,
        literals: 0,
        absorbed: 0,
        bound: bound_so_far,
        success,
    };
    advance(rack, state, failure)
}

/// Continue a partial match until it is delivered, fails, or branches.
pub(crate) fn advance(rack: &mut Coderack<'_>, mut state: MatchState, failure: Failure) -> usize {
    let mut cost = 1;
    loop {
        let Some(fragment) = state.pattern.get(state.pattern_pos).cloned() else {
            if state.input_pos < state.input.len() {
                let reason = format!(
                    "unmatched input at word {}: '{}'",
                    state.input_pos, state.input[state.input_pos]
                );
                return cost + failure.fail(rack, SearchFailure::Match(reason), &state.success);
            }
            return cost + deliver(rack, state, Vec::new(), failure);
        };

        match fragment {
            Fragment::Word(expected) => match state.input.get(state.input_pos) {
                // Input ran out first: hand over what is left of the pattern.
                None => {
                    let rest = state.pattern[state.pattern_pos..].to_vec();
                    return cost + deliver(rack, state, rest, failure);
                }
                Some(found) if *found == expected => {
                    state.literals += 1;
                    state.pattern_pos += 1;
                    state.input_pos += 1;
                }
                Some(found) => {
                    let reason = format!("expected '{expected}' at word {}, found '{found}'", state.input_pos);
                    return cost + failure.fail(rack, SearchFailure::Match(reason), &state.success);
                }
            },

            Fragment::Wildcard(name) if state.pattern_pos + 1 == state.pattern.len() => {
                let end = state.input.len();
                if !state.consistent(&name, end) {
                    let reason = format!("'*{name}' is already bound to different words");
                    return cost + failure.fail(rack, SearchFailure::Match(reason), &state.success);
                }
                state.bind(&name, end);
                return cost + deliver(rack, state, vec![Fragment::Wildcard(name)], failure);
            }

            Fragment::Wildcard(name) => {
                let next = &state.pattern[state.pattern_pos + 1];
                let extents: Vec<usize> = (state.input_pos..=state.input.len())
                    .filter(|&end| aligns(next, state.input.get(end)) && state.consistent(&name, end))
                    .collect();

                let Some((&first, rest)) = extents.split_first() else {
                    let reason = format!("no extent of '*{name}' lines up with '{next}'");
                    return cost + failure.fail(rack, SearchFailure::Match(reason), &state.success);
                };

                for &end in rest {
                    let mut branch = state.clone();
                    branch.bind(&name, end);
                    let salience = branch.salience * branch.quality();
                    trace!(target: "terraced::matcher", name = %name, end, salience, "branch");
                    cost += rack.schedule(Codelet::new(salience, Work::Match(branch), failure));
                }
                state.bind(&name, first);
            }

            Fragment::Invoke(rule) => {
                let reason = format!("rule invocation '@{rule}' cannot appear in a pattern");
                return cost + failure.fail(rack, SearchFailure::Match(reason), &state.success);
            }
        }
        cost += 1;
    }
}

/// Whether a wildcard may stop right before `word`, given the fragment that
/// follows it in the pattern.
fn aligns(next: &Fragment, word: Option<&String>) -> bool {
    match next {
        Fragment::Word(expected) => word == Some(expected),
        Fragment::Wildcard(_) => true,
        Fragment::Invoke(_) => false,
    }
}

fn deliver(rack: &mut Coderack<'_>, state: MatchState, contents: Vec<Fragment>, failure: Failure) -> usize {
    let salience = state.salience * state.quality();
    let value = state.bound.child(contents);
    trace!(
        target: "terraced::matcher",
        literals = state.literals,
        absorbed = state.absorbed,
        salience,
        value = %value,
        "binding complete"
    );
    rack.schedule(Codelet::deliver(salience, state.success, value, failure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::continuation::Sink;
    use crate::{Phrase, RuleBook};

    fn run_match(pattern: Vec<Fragment>, input: &[&str]) -> (Vec<Context>, Vec<String>) {
        let rules = RuleBook::new();
        let mut rack = Coderack::seeded(&rules, 11);
        let phrase = Phrase::new(input.iter().copied());
        match_against(
            &mut rack,
            10.0,
            &Context::new(pattern),
            &phrase,
            Context::empty(),
            Continuation::Host(Sink(0)),
            Failure::Report(Sink(1)),
        );
        while rack.step().is_some() {}
        let values = rack.outcomes().iter().map(|o| o.value.clone()).collect();
        let failures = rack.failures().iter().map(|f| f.reason.to_string()).collect();
        (values, failures)
    }

    #[test]
    fn trailing_wildcard_absorbs_the_rest() {
        let (values, failures) = run_match(fragments!["a", "*rest"], &["a", "b", "c"]);
        assert!(failures.is_empty());
        assert_eq!(values.len(), 1);
        let value = &values[0];
        assert!(value.is_full_match());
        assert_eq!(value.contents(), fragments!["*rest"].as_slice());
        assert_eq!(value.get("rest"), Some(fragments!["b", "c"].as_slice()));
    }

    #[test]
    fn trailing_wildcard_may_bind_nothing() {
        let (values, _) = run_match(fragments!["a", "*rest"], &["a"]);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].get("rest"), Some(&[][..]));
    }

    #[test]
    fn literal_mismatch_fails_the_branch() {
        let (values, failures) = run_match(fragments!["a", "b"], &["a", "c"]);
        assert!(values.is_empty());
        assert_eq!(failures, vec!["expected 'b' at word 1, found 'c'".to_string()]);
    }

    #[test]
    fn leftover_input_fails() {
        let (values, failures) = run_match(fragments!["a"], &["a", "b"]);
        assert!(values.is_empty());
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn leftover_pattern_is_delivered_as_partial() {
        let (values, failures) = run_match(fragments!["a", "b", "c"], &["a"]);
        assert!(failures.is_empty());
        assert_eq!(values.len(), 1);
        assert!(!values[0].is_full_match());
        assert_eq!(values[0].to_string(), "b c");
    }

    #[test]
    fn ambiguous_wildcard_branches() {
        let (values, failures) = run_match(fragments!["*a", "and", "*b"], &["x", "and", "y", "and", "z"]);
        assert!(failures.is_empty());
        let mut splits: Vec<(String, String)> = values
            .iter()
            .map(|v| {
                let join = |name: &str| v.get(name).unwrap().iter().map(Fragment::name).collect::<Vec<_>>().join(" ");
                (join("a"), join("b"))
            })
            .collect();
        splits.sort();
        assert_eq!(
            splits,
            vec![("x".to_string(), "y and z".to_string()), ("x and y".to_string(), "z".to_string())]
        );
    }

    #[test]
    fn repeated_wildcard_must_agree() {
        let (values, _) = run_match(fragments!["*x", "is", "*x"], &["a", "is", "a"]);
        assert_eq!(values.len(), 1);
        let (values, failures) = run_match(fragments!["*x", "is", "*x"], &["a", "is", "b"]);
        assert!(values.is_empty());
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn quality_prefers_literals() {
        let rules = RuleBook::new();
        let mut rack = Coderack::seeded(&rules, 11);
        let phrase = Phrase::new(["a", "b"]);
        match_against(
            &mut rack,
            10.0,
            &Context::new(fragments!["a", "b"]),
            &phrase,
            Context::empty(),
            Continuation::Host(Sink(0)),
            Failure::Ignore,
        );
        match_against(
            &mut rack,
            10.0,
            &Context::new(fragments!["*all"]),
            &phrase,
            Context::empty(),
            Continuation::Host(Sink(0)),
            Failure::Ignore,
        );
        while rack.step().is_some() {}
        let mut saliences: Vec<f64> = rack.outcomes().iter().map(|o| o.salience).collect();
        saliences.sort_by(f64::total_cmp);
        // 10 * 1/3 for the wildcard, 10 * 3/3 for the two literals.
        assert!((saliences[0] - 10.0 / 3.0).abs() < 1e-9);
        assert!((saliences[1] - 10.0).abs() < 1e-9);
    }
}
