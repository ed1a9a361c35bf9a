use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The engine's verdict for a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Now,
    Later,
    Never,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Now => "NOW",
            Self::Later => "LATER",
            Self::Never => "NEVER",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of running [`crate::prioritizer::Prioritizer::evaluate`] on one
/// [`crate::event::NotificationEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub event_id: String,
    pub user_id: String,
    pub action: Action,
    pub score: f64,
    pub reason: String,
    pub rule_matched: Option<String>,
    pub ai_used: bool,
    pub fallback_mode: bool,
    pub decided_at: DateTime<Utc>,
    pub deferred_until: Option<DateTime<Utc>>,
}
