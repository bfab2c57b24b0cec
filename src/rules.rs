//! Rule sets and the rule-file loader.

pub mod greetings;
pub mod loader;
