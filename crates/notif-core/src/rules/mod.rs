mod engine;
mod types;

pub use engine::{load_rules_from_file, RulesEngine};
pub use types::{Condition, Op, Rule, RuleMatch};
