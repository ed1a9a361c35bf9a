use tracing::{debug, info, instrument};

use crate::audit::AuditLog;
use crate::decision::{Action, Decision};
use crate::dedup::DedupChecker;
use crate::event::{NotificationEvent, PriorityHint};
use crate::frequency::FrequencyChecker;
use crate::rules::RulesEngine;
use crate::scoring::{AiScorer, BreakerStatus};
use crate::store::KvStore;

fn is_urgent(hint: Option<PriorityHint>) -> bool {
    hint.map(PriorityHint::is_urgent).unwrap_or(false)
}

/// Outcome of a non-terminal gate: a LATER rule remembered for the
/// rule/score merge in step 6.
struct PendingLaterRule {
    reason: String,
}

/// Orchestrates the full decision pipeline: expiry, dedup, rules, frequency,
/// scoring, rule/score merge, and the high-priority safety net. One
/// `Prioritizer` is shared across every concurrent evaluation; all shared
/// state lives behind the locks its components already provide.
pub struct Prioritizer {
    store: KvStore,
    dedup: DedupChecker,
    frequency: FrequencyChecker,
    rules: RulesEngine,
    scorer: AiScorer,
    audit: AuditLog,
}

impl Prioritizer {
    pub fn new(rules: RulesEngine, scorer: AiScorer) -> Self {
        Self {
            store: KvStore::new(),
            dedup: DedupChecker::new(),
            frequency: FrequencyChecker::new(),
            rules,
            scorer,
            audit: AuditLog::new(),
        }
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn rules(&self) -> &RulesEngine {
        &self.rules
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Read-only scorer health, for reporting (never mutates breaker state).
    pub fn scorer_breaker_state(&self) -> BreakerStatus {
        self.scorer.breaker_state()
    }

    pub fn scorer_ai_available(&self) -> bool {
        self.scorer.ai_available()
    }

    #[instrument(skip(self, event), fields(event_id = event.id()))]
    pub fn evaluate(&self, event: NotificationEvent) -> Decision {
        let event = event.with_generated_id();
        let urgent = is_urgent(event.priority_hint);

        let (action, score, reason, rule_matched, ai_used, fallback_mode) =
            if let Some((action, score, reason, rule_matched)) = self.gate_expiry(&event) {
                // Expiry is a temporal fact, not a suppression the safety net may
                // reverse: an expired event stays NEVER even if urgent.
                (action, score, reason, rule_matched, false, false)
            } else {
                let (action, score, reason, rule_matched, ai_used, fallback_mode) =
                    if let Some((action, score, reason, rule_matched)) = self.gate_dedup(&event) {
                        (action, score, reason, rule_matched, false, false)
                    } else {
                        self.evaluate_remaining_gates(&event, urgent)
                    };
                let (action, score, reason) = self.apply_safety_net(action, score, reason, urgent);
                (action, score, reason, rule_matched, ai_used, fallback_mode)
            };

        info!(action = %action, score, reason = %reason, "decision");

        let decision = Decision {
            event_id: event.id().to_string(),
            user_id: event.user_id.clone(),
            action,
            score,
            reason,
            rule_matched,
            ai_used,
            fallback_mode,
            decided_at: chrono::Utc::now(),
            deferred_until: None,
        };
        self.audit.record(decision.clone());
        decision
    }

    fn gate_expiry(&self, event: &NotificationEvent) -> Option<(Action, f64, String, Option<String>)> {
        if event.is_expired() {
            debug!(gate = "expiry", "event expired before processing");
            Some((
                Action::Never,
                0.0,
                "Event expired before processing".to_string(),
                None,
            ))
        } else {
            None
        }
    }

    fn gate_dedup(&self, event: &NotificationEvent) -> Option<(Action, f64, String, Option<String>)> {
        let reason = self.dedup.check(&self.store, event)?;
        debug!(gate = "dedup", %reason, "duplicate suppressed");
        Some((Action::Never, 0.0, reason, Some("dedup_check".to_string())))
    }

    /// Runs rules, frequency, scoring, and the rule/score merge. Only
    /// reached once expiry and dedup have both passed.
    fn evaluate_remaining_gates(
        &self,
        event: &NotificationEvent,
        urgent: bool,
    ) -> (Action, f64, String, Option<String>, bool, bool) {
        let mut pending_later: Option<PendingLaterRule> = None;
        let mut rule_matched = None;

        if let Some(rule_match) = self.rules.evaluate(event) {
            debug!(gate = "rules", rule = %rule_match.rule_name, action = %rule_match.action, "rule matched");
            match rule_match.action {
                Action::Now => {
                    return (
                        Action::Now,
                        1.0,
                        rule_match.reason,
                        Some(rule_match.rule_name),
                        false,
                        false,
                    );
                }
                Action::Never => {
                    return (
                        Action::Never,
                        0.0,
                        rule_match.reason,
                        Some(rule_match.rule_name),
                        false,
                        false,
                    );
                }
                Action::Later => {
                    pending_later = Some(PendingLaterRule {
                        reason: rule_match.reason,
                    });
                    rule_matched = Some(rule_match.rule_name);
                }
            }
        }

        let freq_reason = self.frequency.check_frequency(&self.store, event);
        let daily_reason = self.frequency.check_daily_cap(&self.store, event);
        debug!(gate = "frequency", freq_capped = freq_reason.is_some(), daily_capped = daily_reason.is_some());

        if !urgent {
            if let Some(reason) = &freq_reason {
                let never_types = matches!(event.event_type.as_str(), "promotion" | "system_event");
                return if never_types {
                    (Action::Never, 0.1, reason.clone(), Some("frequency_cap".to_string()), false, false)
                } else {
                    (
                        Action::Later,
                        0.3,
                        format!("{reason} — batched to digest"),
                        Some("frequency_cap".to_string()),
                        false,
                        false,
                    )
                };
            }
            if let Some(reason) = &daily_reason {
                return (
                    Action::Later,
                    0.3,
                    format!("{reason} — batched to digest"),
                    Some("daily_cap".to_string()),
                    false,
                    false,
                );
            }
        }

        let recent_count = self
            .store
            .get_count(&format!("freq:{}:{}", event.user_id, event.event_type));
        let is_quiet_hours = event.quiet_hours();

        let score = self.scorer.score(event, recent_count, is_quiet_hours);
        debug!(gate = "scoring", score = score.score, ai_used = score.ai_used, "scored");

        if let Some(pending) = pending_later {
            if score.action != Action::Later && !urgent {
                return (
                    Action::Later,
                    score.score,
                    format!("{} (overrides AI {} suggestion)", pending.reason, score.action),
                    rule_matched,
                    score.ai_used,
                    score.fallback_mode,
                );
            }
        }

        (
            score.action,
            score.score,
            score.reason,
            rule_matched,
            score.ai_used,
            score.fallback_mode,
        )
    }

    fn apply_safety_net(
        &self,
        action: Action,
        score: f64,
        reason: String,
        urgent: bool,
    ) -> (Action, f64, String) {
        if action == Action::Never && urgent {
            debug!(gate = "safety_net", "overriding suppression for urgent event");
            (
                Action::Now,
                0.9,
                format!("[SAFETY NET] High-priority event cannot be suppressed. Original: {reason}"),
            )
        } else {
            (action, score, reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::SimulatedScorer;
    use std::collections::HashMap;
    use std::time::Duration;

    fn prioritizer() -> Prioritizer {
        let scorer = AiScorer::new(
            Box::new(SimulatedScorer::new()),
            5,
            Duration::from_secs(30),
            true,
            Duration::from_millis(1500),
        );
        Prioritizer::new(RulesEngine::new(), scorer)
    }

    fn event(user_id: &str, event_type: &str, hint: Option<PriorityHint>) -> NotificationEvent {
        NotificationEvent {
            id: None,
            user_id: user_id.into(),
            channel: "push".into(),
            event_type: event_type.into(),
            priority_hint: hint,
            title: Some("t".into()),
            message: Some("m".into()),
            source: None,
            timestamp: None,
            expires_at: None,
            dedupe_key: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn expired_event_is_never_regardless_of_priority() {
        let p = prioritizer();
        let mut e = event("u1", "message", Some(PriorityHint::Critical));
        e.expires_at = Some(chrono::Utc::now() - chrono::Duration::seconds(1));
        let d = p.evaluate(e);
        assert_eq!(d.action, Action::Never);
        assert_eq!(d.reason, "Event expired before processing");
    }

    #[test]
    fn security_alert_rule_short_circuits_to_now() {
        let p = prioritizer();
        let e = event("u1", "security_alert", None);
        let d = p.evaluate(e);
        assert_eq!(d.action, Action::Now);
        assert_eq!(d.rule_matched.as_deref(), Some("always_send_security_alerts"));
    }

    #[test]
    fn urgent_event_never_ends_never_outside_expiry() {
        let p = prioritizer();
        // force a NEVER-leaning path: low recency score plus quiet hours
        let mut e = event("u1", "promotion", Some(PriorityHint::High));
        e.metadata.insert("quiet_hours".into(), serde_json::Value::Bool(true));
        let d = p.evaluate(e);
        assert_ne!(d.action, Action::Never);
    }

    #[test]
    fn audit_log_accumulates_one_entry_per_evaluation() {
        let p = prioritizer();
        for i in 0..3 {
            p.evaluate(event(&format!("u{i}"), "message", None));
        }
        assert_eq!(p.audit().get_all().len(), 3);
    }

    #[test]
    fn every_decision_has_a_nonempty_reason() {
        let p = prioritizer();
        let d = p.evaluate(event("u1", "update", None));
        assert!(!d.reason.is_empty());
    }
}
