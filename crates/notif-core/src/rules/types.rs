use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decision::Action;
use crate::event::NotificationEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Eq,
    Neq,
    In,
}

/// A single predicate within a rule's `conditions` list. `field` resolves
/// against [`NotificationEvent::field`]: structural attributes first,
/// `metadata` as a fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

impl Condition {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: Op::Eq,
            value: value.into(),
        }
    }

    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            op: Op::In,
            value: Value::Array(values),
        }
    }

    fn holds(&self, event: &NotificationEvent) -> bool {
        let actual = event.field(&self.field);
        match self.op {
            Op::Eq => actual == self.value,
            Op::Neq => actual != self.value,
            Op::In => match &self.value {
                Value::Array(candidates) => candidates.iter().any(|c| *c == actual),
                other => *other == actual,
            },
        }
    }
}

/// A match/act triple: fires `action` with `reason` when every condition in
/// `conditions` holds for an event (AND semantics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub priority: i64,
    pub conditions: Vec<Condition>,
    pub action: Action,
    pub reason: String,
}

impl Rule {
    pub fn matches(&self, event: &NotificationEvent) -> bool {
        self.conditions.iter().all(|c| c.holds(event))
    }
}

/// The outcome of a successful rule match, returned by
/// [`crate::rules::RulesEngine::evaluate`].
#[derive(Debug, Clone)]
pub struct RuleMatch {
    pub action: Action,
    pub reason: String,
    pub rule_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn event(event_type: &str, priority: Option<&str>) -> NotificationEvent {
        let mut metadata = HashMap::new();
        if let Some(p) = priority {
            // only used to prove metadata never shadows a structural field
            metadata.insert("shadow".into(), Value::from(p));
        }
        NotificationEvent {
            id: Some("evt".into()),
            user_id: "u1".into(),
            channel: "push".into(),
            event_type: event_type.into(),
            priority_hint: None,
            title: None,
            message: None,
            source: None,
            timestamp: None,
            expires_at: None,
            dedupe_key: None,
            metadata,
        }
    }

    #[test]
    fn eq_condition() {
        let c = Condition::eq("event_type", "promotion");
        assert!(c.holds(&event("promotion", None)));
        assert!(!c.holds(&event("update", None)));
    }

    #[test]
    fn in_condition_matches_null_for_absent_priority() {
        let c = Condition::in_list("priority_hint", vec![Value::from("low"), Value::Null]);
        assert!(c.holds(&event("promotion", None)));
    }

    #[test]
    fn rule_requires_all_conditions() {
        let rule = Rule {
            name: "r".into(),
            priority: 1,
            conditions: vec![
                Condition::eq("event_type", "promotion"),
                Condition::in_list("priority_hint", vec![Value::from("low"), Value::Null]),
            ],
            action: Action::Never,
            reason: "test".into(),
        };
        assert!(rule.matches(&event("promotion", None)));
        assert!(!rule.matches(&event("update", None)));
    }
}
