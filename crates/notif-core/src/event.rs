use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller-declared urgency of an event. `None` means the caller expressed no
/// opinion; the scorer and rules fall back to their own defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityHint {
    Critical,
    High,
    Medium,
    Low,
}

impl PriorityHint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Urgent hints bypass fatigue-based suppression and are protected by
    /// the prioritizer's safety net.
    pub fn is_urgent(self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

/// An inbound event to classify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Opaque identity. Engine-assigned via [`NotificationEvent::with_generated_id`]
    /// when the caller does not supply one.
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: String,
    pub channel: String,
    pub event_type: String,
    #[serde(default)]
    pub priority_hint: Option<PriorityHint>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dedupe_key: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl NotificationEvent {
    /// Assigns a short opaque id if the caller did not supply one.
    pub fn with_generated_id(mut self) -> Self {
        if self.id.is_none() {
            self.id = Some(uuid_like_id());
        }
        self
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => exp < Utc::now(),
            None => false,
        }
    }

    pub fn quiet_hours(&self) -> bool {
        self.metadata
            .get("quiet_hours")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Resolves a condition field name against structural event attributes
    /// first, falling back to `metadata` as the attribute-then-metadata
    /// lookup order. Known attributes always resolve
    /// here (as `Value::Null` when unset), never falling through to
    /// `metadata`, so a condition can still distinguish "explicitly absent"
    /// from "caller put something under this key in metadata".
    pub fn field(&self, name: &str) -> Value {
        match name {
            "id" => self.id.clone().map(Value::String).unwrap_or(Value::Null),
            "user_id" => Value::String(self.user_id.clone()),
            "channel" => Value::String(self.channel.clone()),
            "event_type" => Value::String(self.event_type.clone()),
            "priority_hint" => self
                .priority_hint
                .map(|p| Value::String(p.as_str().to_string()))
                .unwrap_or(Value::Null),
            "title" => self.title.clone().map(Value::String).unwrap_or(Value::Null),
            "message" => self
                .message
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
            "source" => self
                .source
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
            "dedupe_key" => self
                .dedupe_key
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
            "timestamp" => self
                .timestamp
                .map(|t| Value::String(t.to_rfc3339()))
                .unwrap_or(Value::Null),
            "expires_at" => self
                .expires_at
                .map(|t| Value::String(t.to_rfc3339()))
                .unwrap_or(Value::Null),
            _ => self.metadata.get(name).cloned().unwrap_or(Value::Null),
        }
    }
}

/// Short, non-cryptographic identifier, good enough as a local default when
/// callers don't supply an idempotency-relevant id themselves.
fn uuid_like_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("evt_{nanos:x}")
}
