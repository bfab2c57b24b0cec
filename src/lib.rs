//! A salience-weighted coderack and continuation-passing rule engine.
//!
//! Production rules (`pattern => template` pairs) are matched against a parsed
//! input phrase and their templates evaluated, but instead of recursion and a
//! call stack every partial hypothesis becomes a *codelet*: a unit of deferred
//! work registered on the [`Coderack`] with a salience. The coderack draws
//! codelets at random in proportion to their salience (a parallel terraced
//! scan), so many ambiguous bindings are explored at once and the search can be
//! stopped at any step.
//!
//! ```text
//! RuleBook ──generate──▶ Matcher ──one codelet per binding──▶ Coderack
//!                                                        │
//!            ┌──────────────── step (weighted draw) ─────┘
//!            ▼
//!   RuleAttempt (full match?) ──▶ Evaluator ──@rule──▶ Invoke codelet
//!            │ no                      │
//!            ▼                         ▼
//!   Failure continuation        Host sink (Outcome)
//! ```

#[macro_use]
mod macros;
mod api;
mod engine;
mod rules;

pub use api::{Options, default_rules, respond, respond_with, run, tokenize};
pub use engine::{
    ArgumentGather, ArgumentMode, Bindings, Codelet, CodeletId, Coderack, Context, ContextBuilder, ContextFlags,
    Continuation, Evaluator, Failure, FailureRecord, Lineage, MAX_SALIENCE, MatchState, Outcome, PatternTemplateSource,
    PointerTable, RackMetrics, RuleAttempt, RuleBook, RuleId, RunMetrics, RunResult, SalienceSet, SearchQuality, Sink,
    StopReason, Work, evaluate, match_against,
};
pub use rules::loader::{parse_rule_line, parse_rules};

use std::fmt;

/// Prefix marking a fragment that captures (in a pattern) or substitutes (in a
/// template) a run of words.
pub const WILDCARD_MARKER: char = '*';

/// Prefix marking a template fragment that invokes another rule by name.
pub const INVOKE_MARKER: char = '@';

// --- Errors ------------------------------------------------------------------

/// Hard errors reported to callers of public operations.
///
/// Search-level dead ends are *not* errors; they travel through [`Failure`]
/// continuations as [`SearchFailure`]s.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid weight {0}: salience must be finite and not negative")]
    InvalidWeight(f64),

    #[error("no entry with weight {0}")]
    WeightNotFound(f64),

    #[error("unbound variable '*{0}'")]
    UnboundVariable(String),

    #[error("unknown rule '@{0}'")]
    UnknownRule(String),

    #[error("rule syntax error on line {line}: {message}")]
    RuleSyntax { line: usize, message: String },

    #[error("dangling item pointer {0}")]
    DanglingPointer(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single search branch died.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchFailure {
    /// The pattern could not be extended against the input, or a template
    /// could not be resolved.
    Match(String),
    /// Expanding `rule` would re-enter a rule already in the caller chain.
    CyclicExpansion { rule: String },
}

impl fmt::Display for SearchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchFailure::Match(reason) => f.write_str(reason),
            SearchFailure::CyclicExpansion { rule } => write!(f, "cyclic expansion of '{INVOKE_MARKER}{rule}'"),
        }
    }
}

// --- Fragments and phrases ---------------------------------------------------

/// One element of a context's contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fragment {
    /// A literal word.
    Word(String),
    /// `*name`: a captured remainder in a pattern, a substitution in a template.
    Wildcard(String),
    /// `@name`: a nested rule invocation (templates only).
    Invoke(String),
}

impl Fragment {
    /// Parse the written form of a fragment (`word`, `*name`, `@rule`).
    ///
    /// A lone `@` is a literal word; a lone `*` is an anonymous wildcard.
    pub fn parse(raw: &str) -> Fragment {
        if let Some(name) = raw.strip_prefix(WILDCARD_MARKER) {
            return Fragment::Wildcard(name.to_string());
        }
        match raw.strip_prefix(INVOKE_MARKER) {
            Some(name) if !name.is_empty() => Fragment::Invoke(name.to_string()),
            _ => Fragment::Word(raw.to_string()),
        }
    }

    pub fn word(w: impl Into<String>) -> Fragment {
        Fragment::Word(w.into())
    }

    /// Written name of the fragment, markers included.
    pub fn name(&self) -> String {
        self.to_string()
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Fragment::Wildcard(_))
    }

    pub fn as_word(&self) -> Option<&str> {
        match self {
            Fragment::Word(w) => Some(w),
            _ => None,
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Word(w) => f.write_str(w),
            Fragment::Wildcard(name) => write!(f, "{WILDCARD_MARKER}{name}"),
            Fragment::Invoke(name) => write!(f, "{INVOKE_MARKER}{name}"),
        }
    }
}

impl From<&str> for Fragment {
    fn from(raw: &str) -> Self {
        Fragment::parse(raw)
    }
}

/// Positional access to a parsed input phrase.
///
/// This is all the engine needs from whatever tokenizer or parser produced the
/// input: words by position, compared by equality.
pub trait ParsedPhrase {
    fn word_count(&self) -> usize;
    fn word(&self, index: usize) -> Option<&str>;
}

/// A flat, already tokenized phrase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Phrase {
    words: Vec<String>,
}

impl Phrase {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Phrase { words: words.into_iter().map(Into::into).collect() }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl ParsedPhrase for Phrase {
    fn word_count(&self) -> usize {
        self.words.len()
    }

    fn word(&self, index: usize) -> Option<&str> {
        self.words.get(index).map(String::as_str)
    }
}

impl fmt::Display for Phrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.words.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_parse_recognizes_markers() {
        assert_eq!(Fragment::parse("hello"), Fragment::Word("hello".into()));
        assert_eq!(Fragment::parse("*rest"), Fragment::Wildcard("rest".into()));
        assert_eq!(Fragment::parse("@greet"), Fragment::Invoke("greet".into()));
        assert_eq!(Fragment::parse("@"), Fragment::Word("@".into()));
        assert_eq!(Fragment::parse("*"), Fragment::Wildcard(String::new()));
    }

    #[test]
    fn fragment_name_keeps_marker() {
        assert_eq!(Fragment::parse("*rest").name(), "*rest");
        assert_eq!(Fragment::parse("@greet").name(), "@greet");
        assert!(Fragment::parse("*rest").is_wildcard());
        assert_eq!(Fragment::parse("hi").as_word(), Some("hi"));
    }

    #[test]
    fn phrase_positional_access() {
        let phrase = Phrase::new(["hello", "world"]);
        assert_eq!(phrase.word_count(), 2);
        assert_eq!(phrase.word(1), Some("world"));
        assert_eq!(phrase.word(2), None);
        assert_eq!(phrase.to_string(), "hello world");
    }

    #[test]
    fn search_failure_display() {
        let cyclic = SearchFailure::CyclicExpansion { rule: "loop".into() };
        assert_eq!(cyclic.to_string(), "cyclic expansion of '@loop'");
        assert_eq!(Error::UnboundVariable("name".into()).to_string(), "unbound variable '*name'");
    }
}
