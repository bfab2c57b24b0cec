use std::collections::BTreeMap;
use terraced::{Phrase, RuleBook, RunResult};

/// What a piece of report text is, so color follows meaning.
#[derive(Clone, Copy)]
enum Role {
    Banner,
    Rule,
    Outcome,
    Salience,
    Count,
    Warning,
    Elapsed,
}

impl Role {
    fn code(self) -> &'static str {
        match self {
            Role::Banner => "\x1b[1;36m",
            Role::Rule => "\x1b[90m",
            Role::Outcome => "\x1b[1;32m",
            Role::Salience | Role::Warning => "\x1b[33m",
            Role::Count => "\x1b[34m",
            Role::Elapsed => "\x1b[32m",
        }
    }
}

const RESET: &str = "\x1b[0m";
const FAINT: &str = "\x1b[2m";

struct Style {
    color: bool,
}

impl Style {
    fn wrap(&self, code: &str, text: impl AsRef<str>) -> String {
        if !self.color {
            return text.as_ref().to_string();
        }
        format!("{code}{}{RESET}", text.as_ref())
    }

    fn role(&self, role: Role, text: impl AsRef<str>) -> String {
        self.wrap(role.code(), text)
    }

    fn faint(&self, text: impl AsRef<str>) -> String {
        self.wrap(FAINT, text)
    }

    fn section(&self, title: &str) -> String {
        self.role(Role::Rule, format!("━━━ {title} ━━━"))
    }
}

/// Failure groups printed before the rest is summarized.
const MAX_FAILURE_GROUPS: usize = 8;

pub fn print_run(input: &Phrase, rules: &RuleBook, res: &RunResult, color: bool) {
    let style = Style { color };
    println!("\n{}", style.role(Role::Banner, format!("⚙  Responding to: \"{input}\"")));
    println!("{}", style.faint(format!("   {} rules, total size {}", rules.len(), rules.total_size())));

    println!("\n{}", style.section("Outcomes"));
    if res.outcomes.is_empty() {
        println!("{}", style.faint("  No outcome produced"));
        println!("\n{}", style.role(Role::Warning, "Possible reasons:"));
        println!("  • No rule pattern matched the whole input");
        println!("  • The search stopped before a match was delivered");
        println!("\n{}", style.faint("  Tip: Set TERRACED_DEBUG=1 to trace every codelet"));
    } else {
        print_outcomes(res, &style);
    }

    if !res.failures.is_empty() {
        println!("\n{}", style.section("Failures"));
        print_failures(res, &style);
    }

    println!("\n{}", style.section("Search"));
    let rack = &res.metrics.rack;
    println!(
        "  Steps: {}  │  Enqueued: {}  │  Work: {}  │  Stopped: {}  │  Pending: {}",
        style.role(Role::Count, rack.steps.to_string()),
        style.role(Role::Count, rack.enqueued.to_string()),
        style.faint(rack.work.to_string()),
        style.role(Role::Warning, res.metrics.stop.to_string()),
        style.faint(res.metrics.pending_at_stop.to_string()),
    );

    println!("\n{}", style.section("Timing"));
    println!(
        "  Total: {}  │  Seeding: {}  │  Search: {}",
        style.role(Role::Elapsed, format!("{:?}", res.metrics.total)),
        style.faint(format!("{:?}", res.metrics.seeding)),
        style.faint(format!("{:?}", res.metrics.search)),
    );
    println!();
}

fn print_outcomes(res: &RunResult, style: &Style) {
    for (idx, outcome) in res.outcomes.iter().enumerate() {
        println!(
            "  {} {} {} {}",
            style.role(Role::Rule, format!("[{idx}]")),
            style.role(Role::Outcome, outcome.text()),
            style.faint("│"),
            style.role(Role::Salience, format!("salience {:.2}", outcome.salience)),
        );
        println!(
            "      {} {}",
            style.faint("step:"),
            style.role(Role::Count, outcome.step.to_string())
        );
    }
}

fn print_failures(res: &RunResult, style: &Style) {
    let mut groups: BTreeMap<String, usize> = BTreeMap::new();
    for failure in &res.failures {
        *groups.entry(failure.reason.to_string()).or_default() += 1;
    }

    let mut groups: Vec<(String, usize)> = groups.into_iter().collect();
    groups.sort_by(|a, b| b.1.cmp(&a.1));

    for (reason, count) in groups.iter().take(MAX_FAILURE_GROUPS) {
        println!("  {} {}", style.role(Role::Warning, format!("{count:>4}×")), reason);
    }
    if groups.len() > MAX_FAILURE_GROUPS {
        println!("  {}", style.faint(format!("... +{} more", groups.len() - MAX_FAILURE_GROUPS)));
    }
}
