use std::path::Path;
use std::sync::RwLock;

use orion_error::StructError;
use serde_json::Value;

use crate::decision::Action;
use crate::error::{EngineReason, EngineResult};
use crate::event::NotificationEvent;

use super::types::{Condition, Rule, RuleMatch};

fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "always_send_security_alerts".into(),
            priority: 100,
            conditions: vec![Condition::eq("event_type", "security_alert")],
            action: Action::Now,
            reason: "Security alerts always sent immediately".into(),
        },
        Rule {
            name: "always_send_critical".into(),
            priority: 99,
            conditions: vec![Condition::eq("priority_hint", "critical")],
            action: Action::Now,
            reason: "Critical priority always sent immediately".into(),
        },
        Rule {
            name: "suppress_promos_low_priority".into(),
            priority: 50,
            conditions: vec![
                Condition::eq("event_type", "promotion"),
                Condition::in_list("priority_hint", vec![Value::from("low"), Value::Null]),
            ],
            action: Action::Never,
            reason: "Low-priority promotions suppressed to reduce noise".into(),
        },
        Rule {
            name: "defer_updates_to_digest".into(),
            priority: 40,
            conditions: vec![Condition::eq("event_type", "update")],
            action: Action::Later,
            reason: "Updates batched into daily digest".into(),
        },
    ]
}

fn sort_by_priority(rules: &mut [Rule]) {
    rules.sort_by(|a, b| b.priority.cmp(&a.priority));
}

/// Priority-ordered declarative rule set. The four default rules are always
/// present; operators append more via [`RulesEngine::add_rule`] or a JSON
/// rules file loaded at startup. Readers take a read-lock snapshot; mutation
/// re-sorts under a write-lock, since the ruleset is shared across
/// concurrent evaluations.
pub struct RulesEngine {
    rules: RwLock<Vec<Rule>>,
}

impl RulesEngine {
    pub fn new() -> Self {
        let mut rules = default_rules();
        sort_by_priority(&mut rules);
        Self {
            rules: RwLock::new(rules),
        }
    }

    /// Builds an engine with the defaults plus `extra`, all sorted together.
    pub fn with_extra_rules(extra: Vec<Rule>) -> Self {
        let engine = Self::new();
        for rule in extra {
            engine.add_rule(rule);
        }
        engine
    }

    /// Returns the first matching rule's action/reason/name, or `None` if no
    /// rule matches.
    pub fn evaluate(&self, event: &NotificationEvent) -> Option<RuleMatch> {
        let rules = self.rules.read().expect("rules lock poisoned");
        rules.iter().find(|r| r.matches(event)).map(|r| RuleMatch {
            action: r.action,
            reason: r.reason.clone(),
            rule_name: r.name.clone(),
        })
    }

    /// Appends a rule and re-sorts by descending priority.
    pub fn add_rule(&self, rule: Rule) {
        let mut rules = self.rules.write().expect("rules lock poisoned");
        rules.push(rule);
        sort_by_priority(&mut rules);
    }

    /// Snapshot of the current priority-ordered rule set.
    pub fn list_rules(&self) -> Vec<Rule> {
        self.rules.read().expect("rules lock poisoned").clone()
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Loads a JSON array of [`Rule`] objects from `path`. Fields absent from an
/// entry fall back to their `#[serde(default)]` (currently just `priority`).
pub fn load_rules_from_file(path: impl AsRef<Path>) -> EngineResult<Vec<Rule>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        StructError::from(EngineReason::Config)
            .with_detail(format!("reading rules file {}: {e}", path.display()))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        StructError::from(EngineReason::Config)
            .with_detail(format!("parsing rules file {}: {e}", path.display()))
    })
}
