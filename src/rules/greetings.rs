use crate::RuleBook;

/// The built-in conversational rule set.
pub fn get() -> RuleBook {
    [
        rule! {
            name: "greet",
            pattern: ["hello", "*rest"],
            template: ["hi", "*rest"],
        },
        rule! {
            name: "greet",
            pattern: ["hi", "*rest"],
            template: ["hello", "*rest"],
            score: 0.9,
        },
        rule! {
            name: "farewell",
            pattern: ["goodbye", "*rest"],
            template: ["see", "you", "later"],
        },
        rule! {
            name: "intro",
            pattern: ["my", "name", "is", "*name"],
            template: ["@welcome"],
        },
        rule! {
            name: "intro",
            pattern: ["i", "am", "*name"],
            template: ["@welcome"],
            score: 0.8,
        },
        // Also reachable directly: "welcome ada".
        rule! {
            name: "welcome",
            pattern: ["welcome", "*name"],
            template: ["nice", "to", "meet", "you", "*name"],
        },
        rule! {
            name: "swap",
            pattern: ["*a", "and", "*b"],
            template: ["*b", "and", "*a"],
            score: 0.5,
        },
    ]
    .into_iter()
    .collect()
}
