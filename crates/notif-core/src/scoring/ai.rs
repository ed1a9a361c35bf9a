use std::time::Duration;

use crate::event::{NotificationEvent, PriorityHint};

use super::breaker::{BreakerStatus, CircuitBreaker};
use super::deterministic::DeterministicScorer;
use super::types::{action_for_score, clamp_round, ScoreResult};

/// A pluggable contextual scoring backend. `SimulatedScorer` is the only
/// implementation shipped here; a real deployment swaps in an LLM-backed one
/// that respects the same contract (score/action thresholds, reason
/// conventions) without touching the breaker or fallback logic around it.
pub trait ContextualScorer: Send + Sync {
    fn score(
        &self,
        event: &NotificationEvent,
        recent_count: u64,
        is_quiet_hours: bool,
    ) -> Result<ScoreResult, String>;
}

fn type_score(event_type: &str) -> f64 {
    match event_type {
        "message" => 0.70,
        "security_alert" => 0.95,
        "alert" => 0.85,
        "reminder" => 0.55,
        "update" => 0.40,
        "promotion" => 0.20,
        "system_event" => 0.60,
        _ => 0.50,
    }
}

/// Table-driven stand-in for a real contextual model. Deterministic given
/// its inputs, same as [`DeterministicScorer`], but weighs event *type*
/// rather than caller-declared priority as its primary signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedScorer;

impl SimulatedScorer {
    pub fn new() -> Self {
        Self
    }
}

impl ContextualScorer for SimulatedScorer {
    fn score(
        &self,
        event: &NotificationEvent,
        recent_count: u64,
        is_quiet_hours: bool,
    ) -> Result<ScoreResult, String> {
        let mut base = type_score(&event.event_type);
        let mut factors = vec![format!("event_type={}:{base}", event.event_type)];

        match event.priority_hint {
            Some(PriorityHint::Critical) => {
                base = base.max(0.93);
                factors.push("priority=critical".to_string());
            }
            Some(PriorityHint::High) => {
                base = base.max(0.78);
                factors.push("priority=high".to_string());
            }
            Some(PriorityHint::Low) => {
                base = base.min(0.35);
                factors.push("priority=low".to_string());
            }
            _ => {}
        }

        if recent_count > 3 {
            let penalty = 0.12 * (recent_count - 3) as f64;
            base -= penalty;
            factors.push(format!("recency_penalty={penalty:.2}"));
        }

        let urgent = matches!(
            event.priority_hint,
            Some(PriorityHint::Critical) | Some(PriorityHint::High)
        );
        if is_quiet_hours && !urgent {
            base -= 0.18;
            factors.push("quiet_hours".to_string());
        }

        let score = clamp_round(base);
        let action = action_for_score(score);

        Ok(ScoreResult {
            score,
            action,
            reason: format!("[AI] Score {score}: {}", factors.join(", ")),
            ai_used: true,
            fallback_mode: false,
        })
    }
}

/// Breaker-protected wrapper around a [`ContextualScorer`]. Delegates to the
/// deterministic scorer whenever the AI path is disabled, breaker-tripped,
/// or the call itself fails or overruns `call_timeout`.
pub struct AiScorer {
    inner: Box<dyn ContextualScorer>,
    breaker: CircuitBreaker,
    fallback: DeterministicScorer,
    ai_available: bool,
    call_timeout: Duration,
}

impl AiScorer {
    pub fn new(
        inner: Box<dyn ContextualScorer>,
        failure_threshold: u32,
        reset_timeout: Duration,
        ai_available: bool,
        call_timeout: Duration,
    ) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(failure_threshold, reset_timeout),
            fallback: DeterministicScorer::new(),
            ai_available,
            call_timeout,
        }
    }

    /// Whether the AI path is configured on at all, independent of breaker
    /// state. Read-only, for health reporting.
    pub fn ai_available(&self) -> bool {
        self.ai_available
    }

    /// Current breaker state, read-only (does not attempt a transition).
    pub fn breaker_state(&self) -> BreakerStatus {
        self.breaker.state()
    }

    fn fallback_with_cause(
        &self,
        cause: &str,
        event: &NotificationEvent,
        recent_count: u64,
        is_quiet_hours: bool,
    ) -> ScoreResult {
        let mut result = self.fallback.score(event, recent_count, is_quiet_hours);
        result.reason = format!("[FALLBACK] {cause} — {}", result.reason);
        result
    }

    pub fn score(
        &self,
        event: &NotificationEvent,
        recent_count: u64,
        is_quiet_hours: bool,
    ) -> ScoreResult {
        if !self.ai_available {
            return self.fallback_with_cause(
                "AI scoring disabled",
                event,
                recent_count,
                is_quiet_hours,
            );
        }
        if !self.breaker.can_attempt() {
            return self.fallback_with_cause(
                "circuit breaker open",
                event,
                recent_count,
                is_quiet_hours,
            );
        }

        match self.call_with_timeout(event, recent_count, is_quiet_hours) {
            Ok(result) => {
                self.breaker.record_success();
                result
            }
            Err(cause) => {
                self.breaker.record_failure();
                self.fallback_with_cause(&cause, event, recent_count, is_quiet_hours)
            }
        }
    }

    /// Runs the contextual scorer on a worker thread bounded by
    /// `call_timeout`; a scorer that does not return in time is treated the
    /// same as one that returned an error.
    fn call_with_timeout(
        &self,
        event: &NotificationEvent,
        recent_count: u64,
        is_quiet_hours: bool,
    ) -> Result<ScoreResult, String> {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                let result = self.inner.score(event, recent_count, is_quiet_hours);
                let _ = tx.send(result);
            });
            rx.recv_timeout(self.call_timeout)
                .unwrap_or_else(|_| Err("scorer call timed out".to_string()))
                .map_err(|e| format!("scorer error: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn event(event_type: &str, hint: Option<PriorityHint>) -> NotificationEvent {
        NotificationEvent {
            id: Some("evt".into()),
            user_id: "u1".into(),
            channel: "push".into(),
            event_type: event_type.into(),
            priority_hint: hint,
            title: None,
            message: None,
            source: None,
            timestamp: None,
            expires_at: None,
            dedupe_key: None,
            metadata: HashMap::new(),
        }
    }

    struct AlwaysFails;
    impl ContextualScorer for AlwaysFails {
        fn score(
            &self,
            _event: &NotificationEvent,
            _recent_count: u64,
            _is_quiet_hours: bool,
        ) -> Result<ScoreResult, String> {
            Err("upstream unreachable".to_string())
        }
    }

    #[test]
    fn simulated_scorer_boosts_security_alert_to_now() {
        let scorer = SimulatedScorer::new();
        let r = scorer
            .score(&event("security_alert", None), 0, false)
            .unwrap();
        assert_eq!(r.action, crate::decision::Action::Now);
        assert!(r.reason.starts_with("[AI] Score"));
    }

    #[test]
    fn simulated_scorer_caps_low_priority() {
        let scorer = SimulatedScorer::new();
        let r = scorer
            .score(&event("security_alert", Some(PriorityHint::Low)), 0, false)
            .unwrap();
        assert!(r.score <= 0.35);
    }

    #[test]
    fn ai_unavailable_falls_back_with_tag() {
        let scorer = AiScorer::new(
            Box::new(SimulatedScorer::new()),
            5,
            Duration::from_secs(30),
            false,
            Duration::from_millis(1500),
        );
        let r = scorer.score(&event("message", None), 0, false);
        assert!(!r.ai_used);
        assert!(r.fallback_mode);
        assert!(r.reason.starts_with("[FALLBACK] AI scoring disabled"));
    }

    #[test]
    fn scorer_failure_trips_breaker_then_falls_back() {
        let scorer = AiScorer::new(
            Box::new(AlwaysFails),
            1,
            Duration::from_secs(30),
            true,
            Duration::from_millis(1500),
        );
        let r1 = scorer.score(&event("message", None), 0, false);
        assert!(r1.reason.starts_with("[FALLBACK] scorer error"));
        let r2 = scorer.score(&event("message", None), 0, false);
        assert!(r2.reason.starts_with("[FALLBACK] circuit breaker open"));
    }

    #[test]
    fn breaker_state_reflects_failures_without_side_effects() {
        let scorer = AiScorer::new(
            Box::new(AlwaysFails),
            1,
            Duration::from_secs(30),
            true,
            Duration::from_millis(1500),
        );
        assert_eq!(scorer.breaker_state(), BreakerStatus::Closed);
        let _ = scorer.score(&event("message", None), 0, false);
        assert_eq!(scorer.breaker_state(), BreakerStatus::Open);
        assert!(scorer.ai_available());
    }

    #[test]
    fn successful_call_uses_ai_path() {
        let scorer = AiScorer::new(
            Box::new(SimulatedScorer::new()),
            5,
            Duration::from_secs(30),
            true,
            Duration::from_millis(1500),
        );
        let r = scorer.score(&event("security_alert", None), 0, false);
        assert!(r.ai_used);
        assert!(!r.fallback_mode);
    }
}
