use std::sync::Mutex;

use chrono::Utc;

use crate::decision::{Action, Decision};

/// Per-action totals and suppression/deferral rates, as returned by
/// [`AuditLog::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AuditStats {
    pub total: usize,
    pub now: usize,
    pub later: usize,
    pub never: usize,
    pub suppression_rate: f64,
    pub deferred_rate: f64,
}

/// Append-only record of every [`Decision`] the prioritizer has made.
/// Appends are serialized through a single mutex; reads take a snapshot
/// under the same lock.
pub struct AuditLog {
    decisions: Mutex<Vec<Decision>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            decisions: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, decision: Decision) {
        self.decisions
            .lock()
            .expect("audit log lock poisoned")
            .push(decision);
    }

    /// Last `limit` decisions for `user_id`, optionally filtered to a single
    /// `action`, in insertion order.
    pub fn get_user_history(
        &self,
        user_id: &str,
        action: Option<Action>,
        limit: usize,
    ) -> Vec<Decision> {
        let guard = self.decisions.lock().expect("audit log lock poisoned");
        let matches: Vec<Decision> = guard
            .iter()
            .filter(|d| d.user_id == user_id)
            .filter(|d| action.map(|a| d.action == a).unwrap_or(true))
            .cloned()
            .collect();
        let start = matches.len().saturating_sub(limit);
        matches[start..].to_vec()
    }

    pub fn get_all(&self) -> Vec<Decision> {
        self.decisions.lock().expect("audit log lock poisoned").clone()
    }

    pub fn stats(&self) -> AuditStats {
        let guard = self.decisions.lock().expect("audit log lock poisoned");
        let total = guard.len();
        let now = guard.iter().filter(|d| d.action == Action::Now).count();
        let later = guard.iter().filter(|d| d.action == Action::Later).count();
        let never = guard.iter().filter(|d| d.action == Action::Never).count();
        let denom = total.max(1) as f64;
        AuditStats {
            total,
            now,
            later,
            never,
            suppression_rate: round1(100.0 * never as f64 / denom),
            deferred_rate: round1(100.0 * later as f64 / denom),
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(user_id: &str, action: Action) -> Decision {
        Decision {
            event_id: "evt".into(),
            user_id: user_id.into(),
            action,
            score: 0.0,
            reason: "test".into(),
            rule_matched: None,
            ai_used: false,
            fallback_mode: true,
            decided_at: Utc::now(),
            deferred_until: None,
        }
    }

    #[test]
    fn history_filters_by_user_and_action() {
        let log = AuditLog::new();
        log.record(decision("u1", Action::Now));
        log.record(decision("u1", Action::Never));
        log.record(decision("u2", Action::Now));

        let u1_history = log.get_user_history("u1", None, 50);
        assert_eq!(u1_history.len(), 2);

        let u1_now_only = log.get_user_history("u1", Some(Action::Now), 50);
        assert_eq!(u1_now_only.len(), 1);
    }

    #[test]
    fn history_respects_limit_and_keeps_order() {
        let log = AuditLog::new();
        for _ in 0..5 {
            log.record(decision("u1", Action::Later));
        }
        log.record(decision("u1", Action::Now));
        let recent = log.get_user_history("u1", None, 3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent.last().unwrap().action, Action::Now);
    }

    #[test]
    fn stats_computes_rates() {
        let log = AuditLog::new();
        log.record(decision("u1", Action::Now));
        log.record(decision("u1", Action::Never));
        log.record(decision("u1", Action::Never));
        log.record(decision("u1", Action::Later));
        let stats = log.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.suppression_rate, 50.0);
        assert_eq!(stats.deferred_rate, 25.0);
    }

    #[test]
    fn stats_on_empty_log_does_not_divide_by_zero() {
        let log = AuditLog::new();
        let stats = log.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.suppression_rate, 0.0);
    }
}
