//! Scheduling, matching and evaluation engine.
//!
//! This module is the *execution core*. Everything that a rule application does
//! is expressed as codelets on a [`Coderack`] and as explicit success/failure
//! continuations, never as native recursion or unwinding.
//!
//! ## How the parts work together
//!
//! ```text
//! PatternTemplateSource::generate            (rule.rs)
//!     │  salience = MAX_SALIENCE * score * weight
//!     ▼
//! match_against ── literal walk inline       (matcher.rs)
//!     │  one codelet per viable binding,
//!     │  salience * match quality
//!     ▼
//! Coderack::step ── weighted draw            (coderack.rs, salience.rs)
//!     │
//!     ▼
//! RuleAttempt::continue_with
//!     ├─ full match  ──▶ evaluate template   (evaluator.rs)
//!     │                    ├─ *name  substitute binding
//!     │                    └─ @rule  schedule Invoke codelet, lineage check
//!     └─ partial     ──▶ Failure::fail
//! ```
//!
//! ## Responsibilities by module
//!
//! - `salience.rs`: `SalienceSet`, the weighted multiset the coderack draws from.
//! - `persist.rs`: binary snapshots of a `SalienceSet`.
//! - `context.rs`: copy-on-write binding environments.
//! - `continuation.rs`: the closed set of continuations, failures and codelets.
//! - `coderack.rs`: the draw/remove/execute loop.
//! - `matcher.rs`: non-deterministic pattern matching.
//! - `evaluator.rs`: template evaluation and lineage tracking.
//! - `rule.rs`: production rules and the rule arena.
//! - `metrics.rs`: counters and run summaries.
//!
//! ## Debugging
//!
//! All modules emit `tracing` events under the `terraced::*` targets. The CLI
//! installs a subscriber when `TERRACED_DEBUG` is set.

#[path = "engine/coderack.rs"]
mod coderack;
#[path = "engine/context.rs"]
mod context;
#[path = "engine/continuation.rs"]
mod continuation;
#[path = "engine/evaluator.rs"]
mod evaluator;
#[path = "engine/matcher.rs"]
mod matcher;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/persist.rs"]
mod persist;
#[path = "engine/rule.rs"]
mod rule;
#[path = "engine/salience.rs"]
mod salience;

pub use coderack::Coderack;
pub use context::{Bindings, Context, ContextBuilder, ContextFlags};
pub use continuation::{Codelet, CodeletId, Continuation, Failure, FailureRecord, Lineage, Outcome, Sink, Work};
pub use evaluator::{ArgumentMode, Evaluator, evaluate};
pub use matcher::{MatchState, match_against};
pub use metrics::{RackMetrics, RunMetrics, RunResult, StopReason};
pub use persist::PointerTable;
pub use rule::{ArgumentGather, MAX_SALIENCE, PatternTemplateSource, RuleAttempt, RuleBook, RuleId};
pub use salience::{SalienceSet, SearchQuality};
