use crate::engine::{Coderack, Continuation, Failure, RuleBook, RunMetrics, RunResult, SearchQuality, Sink, StopReason};
use crate::{Error, ParsedPhrase, Phrase};
use once_cell::sync::Lazy;
use std::time::{Duration, Instant};
use tracing::debug;

static DEFAULT_RULES: Lazy<RuleBook> = Lazy::new(crate::rules::greetings::get);

/// Sink that receives outcomes and failure reports of a driver run.
const HOST_SINK: Sink = Sink(0);

/// Built-in rule set used by [`respond`].
pub fn default_rules() -> &'static RuleBook {
    &DEFAULT_RULES
}

/// Options that affect a driver run.
#[derive(Debug, Clone)]
pub struct Options {
    /// How codelets are drawn from the coderack.
    pub quality: SearchQuality,
    /// Stop after this many steps. `None` runs until the coderack is empty.
    pub max_steps: Option<usize>,
    /// Stop once the search phase has taken this long.
    pub time_budget: Option<Duration>,
    /// Stop as soon as the first outcome arrives.
    pub stop_at_first: bool,
    /// Seed for reproducible draws. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Weight every rule is seeded with.
    pub weight: f64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            quality: SearchQuality::Best,
            max_steps: Some(10_000),
            time_budget: None,
            stop_at_first: false,
            seed: None,
            weight: 1.0,
        }
    }
}

/// Split `text` into lowercase words, dropping punctuation.
pub fn tokenize(text: &str) -> Phrase {
    Phrase::new(regex!(r"[\p{L}\p{N}']+").find_iter(text).map(|m| m.as_str().to_lowercase()))
}

/// Respond to `text` using the default rule set and default [`Options`].
///
/// # Example
/// ```
/// let out = terraced::respond("Hello, world!").unwrap();
/// assert_eq!(out.best().map(|o| o.text()), Some("hi world".to_string()));
/// ```
pub fn respond(text: &str) -> Result<RunResult, Error> {
    respond_with(text, &Options::default())
}

pub fn respond_with(text: &str, options: &Options) -> Result<RunResult, Error> {
    run(&DEFAULT_RULES, &tokenize(text), options)
}

/// Seed every rule in `rules` against `input` and step the coderack until it is
/// empty or a budget in `options` runs out.
///
/// Finding nothing is not an error: the result simply has no outcomes.
pub fn run(rules: &RuleBook, input: &dyn ParsedPhrase, options: &Options) -> Result<RunResult, Error> {
    let start = Instant::now();
    let rack = match options.seed {
        Some(seed) => Coderack::seeded(rules, seed),
        None => Coderack::new(rules),
    };
    let mut rack = rack.with_quality(options.quality);

    let seeding_start = Instant::now();
    rack.generate_all(input, Continuation::Host(HOST_SINK), Failure::Report(HOST_SINK), options.weight)?;
    let seeding = seeding_start.elapsed();

    let search_start = Instant::now();
    let stop = loop {
        if options.stop_at_first && !rack.outcomes().is_empty() {
            break StopReason::FirstResult;
        }
        if rack.is_idle() {
            break StopReason::Exhausted;
        }
        if options.max_steps.is_some_and(|max| rack.metrics().steps >= max) {
            break StopReason::StepBudget;
        }
        if options.time_budget.is_some_and(|budget| search_start.elapsed() >= budget) {
            break StopReason::TimeBudget;
        }
        rack.step();
    };
    let search = search_start.elapsed();

    let mut outcomes = rack.take_outcomes();
    outcomes.sort_by(|a, b| b.salience.total_cmp(&a.salience));

    let metrics = RunMetrics {
        total: start.elapsed(),
        seeding,
        search,
        rack: *rack.metrics(),
        stop,
        pending_at_stop: rack.pending(),
    };
    debug!(
        target: "terraced::run",
        %stop,
        steps = metrics.rack.steps,
        outcomes = outcomes.len(),
        pending = metrics.pending_at_stop,
        "run finished"
    );

    Ok(RunResult { outcomes, failures: rack.take_failures(), metrics })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Options {
        Options { seed: Some(7), ..Options::default() }
    }

    #[test]
    fn tokenize_lowercases_and_drops_punctuation() {
        assert_eq!(tokenize("Hello, World!").words(), &["hello", "world"]);
        assert_eq!(tokenize("  don't   stop ").words(), &["don't", "stop"]);
        assert!(tokenize("?!").is_empty());
    }

    #[test]
    fn respond_greets() {
        let res = respond_with("Hello, world!", &seeded()).unwrap();
        assert_eq!(res.texts(), vec!["hi world".to_string()]);
        assert_eq!(res.metrics.stop, StopReason::Exhausted);
        assert_eq!(res.metrics.pending_at_stop, 0);
        assert!(res.metrics.seeding <= res.metrics.total);
    }

    #[test]
    fn no_match_is_not_an_error() {
        let res = respond_with("xyzzy", &seeded()).unwrap();
        assert!(res.outcomes.is_empty());
        assert!(res.best().is_none());
        assert!(!res.failures.is_empty());
    }

    #[test]
    fn step_budget_stops_the_search() {
        let opts = Options { max_steps: Some(0), ..seeded() };
        let res = respond_with("hello world", &opts).unwrap();
        assert_eq!(res.metrics.stop, StopReason::StepBudget);
        assert!(res.outcomes.is_empty());
        assert!(res.metrics.pending_at_stop > 0);
    }

    #[test]
    fn stop_at_first_keeps_one_outcome() {
        let opts = Options { stop_at_first: true, ..seeded() };
        let res = respond_with("hello world", &opts).unwrap();
        assert_eq!(res.metrics.stop, StopReason::FirstResult);
        assert_eq!(res.outcomes.len(), 1);
    }

    #[test]
    fn non_finite_weight_is_rejected() {
        let opts = Options { weight: f64::INFINITY, ..seeded() };
        assert!(matches!(respond_with("hello", &opts), Err(Error::InvalidWeight(_))));
    }

    #[test]
    fn negative_weight_is_rejected() {
        let opts = Options { weight: -1.0, ..seeded() };
        assert!(matches!(respond_with("hello", &opts), Err(Error::InvalidWeight(_))));
    }

    #[test]
    fn outcomes_are_sorted_by_salience() {
        let rules: RuleBook = [
            rule! { name: "loose", pattern: ["*all"], template: ["loose"] },
            rule! { name: "tight", pattern: ["a", "b"], template: ["tight"] },
        ]
        .into_iter()
        .collect();
        let res = run(&rules, &Phrase::new(["a", "b"]), &seeded()).unwrap();
        assert_eq!(res.texts(), vec!["tight".to_string(), "loose".to_string()]);
    }
}
