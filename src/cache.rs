//! Tagged in-process cache for ranked listings
//!
//! The frontpage listing is cached under a named tag and invalidated by
//! the rescore job after a successful bulk write, so the next read
//! recomputes the ranking from storage. State is per-process; a restart
//! simply starts cold.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Cache tag covering the ranked frontpage listing
pub const FRONTPAGE_TAG: &str = "frontpage";

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    cached_at: DateTime<Utc>,
}

/// Tag-keyed cache of serialized listing payloads
#[derive(Debug, Default)]
pub struct TagCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl TagCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a cached payload for a tag
    pub async fn get(&self, tag: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        entries.get(tag).map(|entry| entry.value.clone())
    }

    /// Store a payload under a tag
    pub async fn put(&self, tag: &str, value: Value) {
        let mut entries = self.entries.write().await;
        entries.insert(
            tag.to_string(),
            CacheEntry {
                value,
                cached_at: Utc::now(),
            },
        );
    }

    /// Drop a tag; returns whether an entry was present
    pub async fn invalidate(&self, tag: &str) -> bool {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(tag).is_some();
        if removed {
            tracing::debug!(tag, "cache tag invalidated");
        }
        removed
    }

    /// When the tag was last populated (for diagnostics)
    pub async fn cached_at(&self, tag: &str) -> Option<DateTime<Utc>> {
        let entries = self.entries.read().await;
        entries.get(tag).map(|entry| entry.cached_at)
    }
}
