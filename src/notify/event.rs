//! Notification event payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ephemeral notification payload delivered to a user's live connections
///
/// Never durably queued: with no live connection the event is dropped
/// (the platform keeps its persisted notification records separately).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Event ID (for SSE last-event-id / deduplication)
    pub id: String,

    /// Event kind discriminant ("comment", "follow", ...)
    #[serde(rename = "type")]
    pub kind: String,

    /// Human-readable message
    pub message: String,

    /// Kind-specific payload fields
    #[serde(flatten, default)]
    pub data: Map<String, Value>,

    /// Server-assigned delivery timestamp
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    /// Create a new event with a server-assigned id and timestamp
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            message: message.into(),
            data: Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach a payload field
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Someone commented on the user's article
    pub fn comment(article_id: &str, author: &str) -> Self {
        Self::new("comment", format!("{} commented on your article", author))
            .with_data("article_id", Value::String(article_id.to_string()))
            .with_data("author", Value::String(author.to_string()))
    }

    /// The user gained a follower
    pub fn follow(follower: &str) -> Self {
        Self::new("follow", format!("{} started following you", follower))
            .with_data("follower", Value::String(follower.to_string()))
    }

    /// Someone liked the user's article
    pub fn like(article_id: &str, liker: &str) -> Self {
        Self::new("like", format!("{} liked your article", liker))
            .with_data("article_id", Value::String(article_id.to_string()))
            .with_data("liker", Value::String(liker.to_string()))
    }

    /// A draft cleared moderation and went live
    pub fn published(article_id: &str, title: &str) -> Self {
        Self::new("published", format!("\"{}\" is now live", title))
            .with_data("article_id", Value::String(article_id.to_string()))
    }

    /// Moderation decision on a submitted draft
    pub fn moderation(article_id: &str, decision: &str) -> Self {
        Self::new("moderation", format!("Your draft was {}", decision))
            .with_data("article_id", Value::String(article_id.to_string()))
            .with_data("decision", Value::String(decision.to_string()))
    }
}
