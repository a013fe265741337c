//! Storage layer for content items
//!
//! The platform's ORM owns the full article schema; this crate only needs
//! a narrow repository surface for the fields the scoring engine touches.

pub mod libsql;

use crate::error::Result;
use crate::types::{ContentId, ContentItem, SourceType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Repository trait for the content records the scoring engine reads and writes
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a new content item (scores already computed by the caller)
    async fn insert_content(&self, item: &ContentItem) -> Result<()>;

    /// Retrieve a content item by ID
    async fn get_content(&self, id: ContentId) -> Result<ContentItem>;

    /// List items of one source type published at or after `since`,
    /// newest first, capped at `limit`
    async fn list_recent(
        &self,
        source: SourceType,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContentItem>>;

    /// Apply score updates in a single transaction
    ///
    /// Returns the number of rows written. Partial failure rolls the whole
    /// batch back and surfaces as one error.
    async fn bulk_update_scores(&self, updates: &[(ContentId, f64)]) -> Result<usize>;

    /// List items ordered by prominence, highest first
    async fn list_ranked(&self, limit: usize) -> Result<Vec<ContentItem>>;

    /// Total number of content items
    async fn count_content(&self) -> Result<usize>;
}
