use crate::event::{NotificationEvent, PriorityHint};

use super::types::{action_for_score, clamp_round, ScoreResult};

fn priority_score(hint: Option<PriorityHint>) -> f64 {
    match hint {
        Some(PriorityHint::Critical) => 0.95,
        Some(PriorityHint::High) => 0.78,
        Some(PriorityHint::Medium) => 0.52,
        Some(PriorityHint::Low) => 0.22,
        None => 0.40,
    }
}

fn channel_weight(channel: &str) -> f64 {
    match channel {
        "push" => 1.0,
        "sms" => 0.9,
        "email" => 0.7,
        "in_app" => 0.5,
        _ => 0.7,
    }
}

/// Pure, dependency-free scorer. Always available, always the fallback
/// destination when the AI path is unavailable or breaker-tripped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeterministicScorer;

impl DeterministicScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(
        &self,
        event: &NotificationEvent,
        recent_count: u64,
        is_quiet_hours: bool,
    ) -> ScoreResult {
        let mut base = priority_score(event.priority_hint);

        let recency_penalty = (recent_count as f64 * 0.08).min(0.25);
        base -= recency_penalty;

        if let Some(expires_at) = event.expires_at {
            let minutes_left = (expires_at - chrono::Utc::now()).num_seconds() as f64 / 60.0;
            if minutes_left < 10.0 {
                base += 0.30;
            } else if minutes_left < 60.0 {
                base += 0.10;
            }
        }

        if is_quiet_hours {
            base -= 0.20;
        }

        base *= channel_weight(&event.channel);

        let score = clamp_round(base);
        let action = action_for_score(score);

        ScoreResult {
            score,
            action,
            reason: format!(
                "Deterministic score {score}: priority={}, recent_count={recent_count}, quiet_hours={is_quiet_hours}, channel={}",
                event
                    .priority_hint
                    .map(|p| p.as_str())
                    .unwrap_or("none"),
                event.channel,
            ),
            ai_used: false,
            fallback_mode: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn event(hint: Option<PriorityHint>, channel: &str) -> NotificationEvent {
        NotificationEvent {
            id: Some("evt".into()),
            user_id: "u1".into(),
            channel: channel.into(),
            event_type: "message".into(),
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

    #[test]
    fn critical_push_scores_now() {
        let scorer = DeterministicScorer::new();
        let r = scorer.score(&event(Some(PriorityHint::Critical), "push"), 0, false);
        assert_eq!(r.action, crate::decision::Action::Now);
        assert!(r.fallback_mode);
        assert!(!r.ai_used);
    }

    #[test]
    fn low_priority_email_scores_never() {
        let scorer = DeterministicScorer::new();
        let r = scorer.score(&event(Some(PriorityHint::Low), "email"), 0, false);
        assert_eq!(r.action, crate::decision::Action::Never);
    }

    #[test]
    fn recency_penalty_is_capped() {
        let scorer = DeterministicScorer::new();
        let low_count = scorer.score(&event(Some(PriorityHint::High), "push"), 2, false);
        let high_count = scorer.score(&event(Some(PriorityHint::High), "push"), 100, false);
        // both apply the same capped 0.25 penalty once recent_count * 0.08 exceeds it
        assert!(low_count.score > high_count.score);
        assert_eq!(high_count.score, clamp_round(0.78 - 0.25));
    }

    #[test]
    fn quiet_hours_lowers_score() {
        let scorer = DeterministicScorer::new();
        let normal = scorer.score(&event(Some(PriorityHint::Medium), "push"), 0, false);
        let quiet = scorer.score(&event(Some(PriorityHint::Medium), "push"), 0, true);
        assert!(quiet.score < normal.score);
    }

    #[test]
    fn score_is_deterministic_and_pure() {
        let scorer = DeterministicScorer::new();
        let e = event(Some(PriorityHint::Medium), "sms");
        let a = scorer.score(&e, 1, false);
        let b = scorer.score(&e, 1, false);
        assert_eq!(a.score, b.score);
        assert_eq!(a.action, b.action);
    }
}
