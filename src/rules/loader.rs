//! Plain-text rule files.
//!
//! One rule per line:
//!
//! ```text
//! # comment
//! [name:] [[score]] pattern words => template words
//! greet: hello *rest => hi *rest
//! [0.5] *a and *b => *b and *a
//! [0.5] swap: *a or *b => *b or *a
//! ```
//!
//! The score may come before or after the name, but only once. Words are
//! lowercased to match the tokenizer. The score defaults to 1 and must lie in
//! `[0, 1]`. An unnamed rule is named after its origin and line number.

use crate::{Context, Error, Fragment, PatternTemplateSource, RuleBook};

/// Parse every rule in `text`. `origin` names the rules' source (usually a
/// file name).
///
/// Invocations are not resolved here; call [`RuleBook::validate`] once all rule
/// sources are loaded.
pub fn parse_rules(text: &str, origin: &str) -> Result<RuleBook, Error> {
    let mut book = RuleBook::new();
    for (index, line) in text.lines().enumerate() {
        if let Some(rule) = parse_rule_line(line, index + 1, origin)? {
            book.add(rule);
        }
    }
    Ok(book)
}

/// Parse a single line. Blank lines and comments yield `None`.
pub fn parse_rule_line(line: &str, line_no: usize, origin: &str) -> Result<Option<PatternTemplateSource>, Error> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let syntax = |message: String| Error::RuleSyntax { line: line_no, message };

    let caps = regex!(
        r"^(?:\[(?P<lead>[^\]]*)\]\s*)?(?:(?P<name>[\w-]+):\s+)?(?:\[(?P<score>[^\]]*)\]\s*)?(?P<pattern>.*?)\s*=>\s*(?P<template>.*)$"
    )
    .captures(line)
    .ok_or_else(|| syntax("expected 'pattern => template'".to_string()))?;

    let score = match (caps.name("lead"), caps.name("score")) {
        (Some(_), Some(_)) => return Err(syntax("score given twice".to_string())),
        (lead, trailing) => lead.or(trailing),
    };
    let score = match score {
        Some(m) => {
            let raw = m.as_str().trim();
            let score: f64 = raw.parse().map_err(|_| syntax(format!("invalid score '{raw}'")))?;
            if !(0.0..=1.0).contains(&score) {
                return Err(syntax(format!("score {score} is outside [0, 1]")));
            }
            score
        }
        None => 1.0,
    };

    let pattern = fragments_of(caps.name("pattern").map_or("", |m| m.as_str()));
    if let Some(Fragment::Invoke(name)) = pattern.iter().find(|f| matches!(f, Fragment::Invoke(_))) {
        return Err(syntax(format!("rule invocation '@{name}' cannot appear in a pattern")));
    }
    let template = fragments_of(caps.name("template").map_or("", |m| m.as_str()));

    let source = format!("{origin}:{line_no}");
    let rule = PatternTemplateSource::new(Context::new(pattern), Context::new(template), score, source);
    Ok(Some(match caps.name("name") {
        Some(name) => rule.named(name.as_str()),
        None => rule,
    }))
}

fn fragments_of(words: &str) -> Vec<Fragment> {
    words.split_whitespace().map(|w| Fragment::parse(&w.to_lowercase())).collect()
}
