use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::event::NotificationEvent;
use crate::store::KvStore;

const EXACT_TTL: Duration = Duration::from_secs(86_400);
const NEAR_TTL: Duration = Duration::from_secs(3_600);

/// Two-layer duplicate detector: an explicit caller-supplied idempotency key,
/// then a content fingerprint over normalized `event_type`/`title`/`message`.
/// Stateless itself; all state lives in the shared [`KvStore`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DedupChecker;

impl DedupChecker {
    pub fn new() -> Self {
        Self
    }

    /// Returns `Some(reason)` if the event is a duplicate, `None` otherwise.
    /// Registers the event in the store either way: even a non-duplicate
    /// call leaves both layers' keys set for future comparisons.
    pub fn check(&self, store: &KvStore, event: &NotificationEvent) -> Option<String> {
        if let Some(dedupe_key) = &event.dedupe_key {
            let key = format!("dedup:{}:{}", event.user_id, dedupe_key);
            if !store.set_nx(&key, event.id(), EXACT_TTL) {
                return Some(format!(
                    "Exact duplicate — dedupe_key '{dedupe_key}' already seen in last 24h"
                ));
            }
        }

        let fp = fingerprint(event);
        let key = format!("fingerprint:{}:{}", event.user_id, fp);
        if !store.set_nx(&key, event.id(), NEAR_TTL) {
            return Some("Near-duplicate detected — very similar content sent in last 1h".to_string());
        }

        None
    }
}

/// SHA-256 over `event_type:title:message`, normalized (lowercased, trimmed,
/// non-alphanumeric/non-whitespace characters stripped), truncated to the
/// first 16 hex characters. Must stay byte-exact across implementations,
/// since it's the only thing that makes near-dedup reproducible.
fn fingerprint(event: &NotificationEvent) -> String {
    let text = format!(
        "{}:{}:{}",
        event.event_type,
        event.title.as_deref().unwrap_or(""),
        event.message.as_deref().unwrap_or(""),
    );
    let normalized: String = text
        .to_lowercase()
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    let digest = Sha256::digest(normalized.as_bytes());
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(user: &str, event_type: &str, title: &str, message: &str) -> NotificationEvent {
        NotificationEvent {
            id: Some(format!("evt-{title}")),
            user_id: user.into(),
            channel: "push".into(),
            event_type: event_type.into(),
            priority_hint: None,
            title: Some(title.into()),
            message: Some(message.into()),
            source: None,
            timestamp: None,
            expires_at: None,
            dedupe_key: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn exact_duplicate_via_dedupe_key() {
        let store = KvStore::new();
        let checker = DedupChecker::new();
        let mut e1 = event("u1", "message", "Hi", "hello");
        e1.dedupe_key = Some("k1".into());
        let mut e2 = e1.clone();
        e2.id = Some("evt-2".into());

        assert_eq!(checker.check(&store, &e1), None);
        let reason = checker.check(&store, &e2).expect("should be a duplicate");
        assert!(reason.contains("Exact duplicate"));
        assert!(reason.contains("k1"));
    }

    #[test]
    fn near_duplicate_via_fingerprint() {
        let store = KvStore::new();
        let checker = DedupChecker::new();
        let e1 = event("u2", "message", "Sarah: Hey!", "Sarah sent you a message");
        let e2 = event("u2", "message", "Sarah Hey", "Sarah sent you a message");

        assert_eq!(checker.check(&store, &e1), None);
        let reason = checker.check(&store, &e2).expect("should be near-duplicate");
        assert!(reason.contains("Near-duplicate"));
    }

    #[test]
    fn different_users_do_not_collide() {
        let store = KvStore::new();
        let checker = DedupChecker::new();
        let mut e1 = event("u1", "message", "Hi", "hello");
        e1.dedupe_key = Some("k1".into());
        let mut e2 = e1.clone();
        e2.user_id = "u2".into();

        assert_eq!(checker.check(&store, &e1), None);
        assert_eq!(checker.check(&store, &e2), None);
    }

    #[test]
    fn fingerprint_is_stable_for_identical_normalized_content() {
        let e1 = event("u1", "message", "Hello, World!", "test");
        let e2 = event("u1", "message", "hello world", "test");
        assert_eq!(fingerprint(&e1), fingerprint(&e2));
        assert_eq!(fingerprint(&e1).len(), 16);
    }
}
