use std::time::Duration;

use chrono::Utc;

use crate::event::NotificationEvent;
use crate::store::KvStore;

struct TypeCap {
    max: u64,
    window: Duration,
}

fn type_cap(event_type: &str) -> TypeCap {
    let (max, window_secs) = match event_type {
        "promotion" => (2, 3_600),
        "update" => (5, 3_600),
        "reminder" => (3, 3_600),
        "message" => (20, 3_600),
        "system_event" => (10, 3_600),
        "alert" => (10, 3_600),
        _ => (8, 3_600),
    };
    TypeCap {
        max,
        window: Duration::from_secs(window_secs),
    }
}

fn channel_daily_cap(channel: &str) -> u64 {
    match channel {
        "push" => 20,
        "sms" => 5,
        "email" => 10,
        "in_app" => 50,
        _ => 20,
    }
}

/// Per-type hourly caps and per-channel daily caps, the fatigue half of the
/// pipeline. Both checks increment their counter on every call regardless of
/// whether the event is ultimately suppressed downstream. Dedup-suppressed
/// events don't consume budget because dedup runs first; rule-suppressed
/// ones still do.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrequencyChecker;

impl FrequencyChecker {
    pub fn new() -> Self {
        Self
    }

    pub fn check_frequency(&self, store: &KvStore, event: &NotificationEvent) -> Option<String> {
        let cap = type_cap(&event.event_type);
        let key = format!("freq:{}:{}", event.user_id, event.event_type);
        let count = store.incr(&key, cap.window);
        if count > cap.max {
            Some(format!(
                "Frequency cap exceeded ({count}/{} '{}' events in last hour)",
                cap.max, event.event_type
            ))
        } else {
            None
        }
    }

    pub fn check_daily_cap(&self, store: &KvStore, event: &NotificationEvent) -> Option<String> {
        let cap = channel_daily_cap(&event.channel);
        let today = Utc::now().format("%Y-%m-%d");
        let key = format!("daily_cap:{}:{}:{}", event.user_id, event.channel, today);
        let count = store.incr(&key, Duration::from_secs(86_400));
        if count > cap {
            Some(format!(
                "Daily {} cap reached ({count}/{cap})",
                event.channel
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn event(user_id: &str, event_type: &str, channel: &str) -> NotificationEvent {
        NotificationEvent {
            id: Some("evt".into()),
            user_id: user_id.into(),
            channel: channel.into(),
            event_type: event_type.into(),
            priority_hint: None,
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
    fn unknown_type_caps_at_eight_per_hour() {
        let store = KvStore::new();
        let checker = FrequencyChecker::new();
        let e = event("u1", "something_new", "push");
        for _ in 0..8 {
            assert_eq!(checker.check_frequency(&store, &e), None);
        }
        let reason = checker.check_frequency(&store, &e).expect("9th should cap");
        assert!(reason.contains("Frequency cap exceeded"));
    }

    #[test]
    fn promotion_caps_at_two_per_hour() {
        let store = KvStore::new();
        let checker = FrequencyChecker::new();
        let e = event("u1", "promotion", "push");
        assert_eq!(checker.check_frequency(&store, &e), None);
        assert_eq!(checker.check_frequency(&store, &e), None);
        assert!(checker.check_frequency(&store, &e).is_some());
    }

    #[test]
    fn daily_cap_is_per_channel() {
        let store = KvStore::new();
        let checker = FrequencyChecker::new();
        let e = event("u1", "message", "sms");
        for _ in 0..5 {
            assert_eq!(checker.check_daily_cap(&store, &e), None);
        }
        assert!(checker.check_daily_cap(&store, &e).is_some());
    }

    #[test]
    fn daily_cap_is_independent_per_user() {
        let store = KvStore::new();
        let checker = FrequencyChecker::new();
        let a = event("u1", "message", "sms");
        let b = event("u2", "message", "sms");
        for _ in 0..5 {
            assert_eq!(checker.check_daily_cap(&store, &a), None);
        }
        assert_eq!(checker.check_daily_cap(&store, &b), None);
    }
}
