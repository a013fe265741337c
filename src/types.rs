//! Core data types for the Frontpage ranking and notification service
//!
//! This module defines the content records the scoring engine operates on.
//! Only the fields the prominence/notification logic touches are modeled
//! here; the platform's full article schema lives elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for content items
///
/// Wraps a UUID to provide type safety and prevent mixing content IDs
/// with other UUID-based identifiers in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub Uuid);

impl ContentId {
    /// Create a new random content ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a content ID from a string
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ContentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Origin of a content item, which governs its base score and decay rate
///
/// User-authored articles start with a higher base weight and decay slowly;
/// auto-aggregated items start lower and fall off the frontpage fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Authored on the platform by a user
    User,
    /// Pulled in by the aggregation pipeline
    Auto,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::User => "user",
            SourceType::Auto => "auto",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(SourceType::User),
            "auto" => Some(SourceType::Auto),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Content richness counts, gathered once when an article is created
///
/// Each dimension feeds a multiplicative bonus tier in the scoring config.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RichnessCounts {
    pub words: u32,
    pub images: u32,
    pub subheadings: u32,
    pub categories: u32,
}

/// A content item as seen by the prominence engine
///
/// `prominence_score` is a derived cache: it is always recomputable from
/// `(initial_score, published_at, source_type, now)` plus the novelty
/// adjustment, and is never treated as a source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// Unique identifier
    pub id: ContentId,

    /// Article title (used only for logging and listings here)
    pub title: String,

    /// Authored vs aggregated
    pub source_type: SourceType,

    /// Base authorship weight x richness multipliers, fixed at creation
    pub initial_score: f64,

    /// Time-decayed ranking value, refreshed by the rescore job
    pub prominence_score: f64,

    /// Publication timestamp anchoring the decay curve
    pub published_at: DateTime<Utc>,

    /// Richness counts captured at creation
    #[serde(default)]
    pub richness: RichnessCounts,
}

impl ContentItem {
    /// Age of this item in hours at `now`, clamped to zero
    ///
    /// A `published_at` in the future (clock skew between the publishing
    /// host and this process) must not inflate scores.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        let secs = now.signed_duration_since(self.published_at).num_seconds();
        (secs.max(0) as f64) / 3600.0
    }
}

/// Creation-time input for a new content item
///
/// The store assigns the ID and the scoring engine derives both scores
/// before the row is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentDraft {
    pub title: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub richness: RichnessCounts,
    /// Defaults to the server clock when omitted
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}
