pub mod audit;
pub mod decision;
pub mod dedup;
pub mod error;
pub mod event;
pub mod frequency;
pub mod prioritizer;
pub mod rules;
pub mod scoring;
pub mod store;

pub use audit::{AuditLog, AuditStats};
pub use decision::{Action, Decision};
pub use dedup::DedupChecker;
pub use error::{EngineError, EngineReason, EngineResult};
pub use event::{NotificationEvent, PriorityHint};
pub use frequency::FrequencyChecker;
pub use prioritizer::Prioritizer;
pub use rules::{load_rules_from_file, Condition, Op, Rule, RuleMatch, RulesEngine};
pub use scoring::{
    AiScorer, BreakerStatus, CircuitBreaker, ContextualScorer, DeterministicScorer, ScoreResult,
    SimulatedScorer,
};
pub use store::{KvStore, SweepReport};
