//! libSQL content store implementation
//!
//! Persistent storage for scored content using libSQL, with an in-memory
//! mode for tests. Timestamps are stored as RFC 3339 UTC text so index
//! order matches chronological order.

use crate::error::{FrontpageError, Result};
use crate::storage::ContentStore;
use crate::types::{ContentId, ContentItem, RichnessCounts, SourceType};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{params, Builder, Connection, Database, Row};
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS content (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    source_type TEXT NOT NULL CHECK (source_type IN ('user', 'auto')),
    initial_score REAL NOT NULL,
    prominence_score REAL NOT NULL,
    published_at TEXT NOT NULL,
    word_count INTEGER NOT NULL DEFAULT 0,
    image_count INTEGER NOT NULL DEFAULT 0,
    subheading_count INTEGER NOT NULL DEFAULT 0,
    category_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_content_published_at ON content (published_at);
CREATE INDEX IF NOT EXISTS idx_content_prominence ON content (prominence_score DESC);
"#;

/// Database connection mode
#[derive(Debug, Clone)]
pub enum ConnectionMode {
    /// Local file-based database
    Local(String),
    /// In-memory database (for testing)
    InMemory,
}

/// libSQL content store
pub struct LibsqlContentStore {
    _db: Database,
    // A `:memory:` database is per-connection in libsql, so the schema is
    // only visible on the connection that created it; reuse one connection.
    conn: Connection,
}

impl LibsqlContentStore {
    /// Open a store and bootstrap the schema
    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        let db = match &mode {
            ConnectionMode::Local(path) => {
                info!("Opening content database at {}", path);
                Builder::new_local(path).build().await?
            }
            ConnectionMode::InMemory => {
                debug!("Opening in-memory content database");
                Builder::new_local(":memory:").build().await?
            }
        };

        let conn = db.connect()?;
        let store = Self { _db: db, conn };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open a store from a configured path (":memory:" selects in-memory)
    pub async fn from_path(path: &str) -> Result<Self> {
        let mode = if path == ":memory:" {
            ConnectionMode::InMemory
        } else {
            ConnectionMode::Local(path.to_string())
        };
        Self::new(mode).await
    }

    fn connect(&self) -> Result<Connection> {
        Ok(self.conn.clone())
    }

    /// Create tables and indexes if they do not exist
    pub async fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(SCHEMA).await?;
        debug!("Content schema ready");
        Ok(())
    }

    fn row_to_item(row: &Row) -> Result<ContentItem> {
        let id_str: String = row.get(0)?;
        let title: String = row.get(1)?;
        let source_str: String = row.get(2)?;
        let initial_score: f64 = row.get(3)?;
        let prominence_score: f64 = row.get(4)?;
        let published_str: String = row.get(5)?;
        let words: i64 = row.get(6)?;
        let images: i64 = row.get(7)?;
        let subheadings: i64 = row.get(8)?;
        let categories: i64 = row.get(9)?;

        let source_type = SourceType::from_str(&source_str).ok_or_else(|| {
            FrontpageError::Database(format!("unknown source_type '{}'", source_str))
        })?;

        let published_at = DateTime::parse_from_rfc3339(&published_str)
            .map_err(|e| {
                FrontpageError::Database(format!(
                    "bad published_at '{}': {}",
                    published_str, e
                ))
            })?
            .with_timezone(&Utc);

        Ok(ContentItem {
            id: ContentId::from_string(&id_str)?,
            title,
            source_type,
            initial_score,
            prominence_score,
            published_at,
            richness: RichnessCounts {
                words: words as u32,
                images: images as u32,
                subheadings: subheadings as u32,
                categories: categories as u32,
            },
        })
    }

    fn format_ts(ts: DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

#[async_trait]
impl ContentStore for LibsqlContentStore {
    async fn insert_content(&self, item: &ContentItem) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO content (id, title, source_type, initial_score, prominence_score,
                                  published_at, word_count, image_count, subheading_count,
                                  category_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                item.id.to_string(),
                item.title.clone(),
                item.source_type.as_str(),
                item.initial_score,
                item.prominence_score,
                Self::format_ts(item.published_at),
                item.richness.words as i64,
                item.richness.images as i64,
                item.richness.subheadings as i64,
                item.richness.categories as i64,
            ],
        )
        .await?;

        debug!("Stored content {} ({})", item.id, item.source_type);
        Ok(())
    }

    async fn get_content(&self, id: ContentId) -> Result<ContentItem> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, title, source_type, initial_score, prominence_score,
                        published_at, word_count, image_count, subheading_count,
                        category_count
                 FROM content WHERE id = ?1",
                params![id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Self::row_to_item(&row),
            None => Err(FrontpageError::ContentNotFound(id.to_string())),
        }
    }

    async fn list_recent(
        &self,
        source: SourceType,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, title, source_type, initial_score, prominence_score,
                        published_at, word_count, image_count, subheading_count,
                        category_count
                 FROM content
                 WHERE source_type = ?1 AND published_at >= ?2
                 ORDER BY published_at DESC
                 LIMIT ?3",
                params![source.as_str(), Self::format_ts(since), limit as i64],
            )
            .await?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(Self::row_to_item(&row)?);
        }
        Ok(items)
    }

    async fn bulk_update_scores(&self, updates: &[(ContentId, f64)]) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        let conn = self.connect()?;
        let tx = conn.transaction().await?;

        let mut written = 0usize;
        for (id, score) in updates {
            written += tx
                .execute(
                    "UPDATE content SET prominence_score = ?1 WHERE id = ?2",
                    params![*score, id.to_string()],
                )
                .await? as usize;
        }

        tx.commit().await?;
        debug!("Bulk score update wrote {} rows", written);
        Ok(written)
    }

    async fn list_ranked(&self, limit: usize) -> Result<Vec<ContentItem>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, title, source_type, initial_score, prominence_score,
                        published_at, word_count, image_count, subheading_count,
                        category_count
                 FROM content
                 ORDER BY prominence_score DESC
                 LIMIT ?1",
                params![limit as i64],
            )
            .await?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(Self::row_to_item(&row)?);
        }
        Ok(items)
    }

    async fn count_content(&self) -> Result<usize> {
        let conn = self.connect()?;
        let mut rows = conn.query("SELECT COUNT(*) FROM content", ()).await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| FrontpageError::Database("count query returned no row".to_string()))?;
        let count: i64 = row.get(0)?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(title: &str, source: SourceType, hours_ago: i64, prominence: f64) -> ContentItem {
        ContentItem {
            id: ContentId::new(),
            title: title.to_string(),
            source_type: source,
            initial_score: 100.0,
            prominence_score: prominence,
            published_at: Utc::now() - Duration::hours(hours_ago),
            richness: RichnessCounts {
                words: 450,
                images: 1,
                subheadings: 2,
                categories: 1,
            },
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrip() {
        let store = LibsqlContentStore::new(ConnectionMode::InMemory).await.unwrap();
        let original = item("roundtrip", SourceType::User, 4, 98.5);

        store.insert_content(&original).await.unwrap();
        let loaded = store.get_content(original.id).await.unwrap();

        assert_eq!(loaded.id, original.id);
        assert_eq!(loaded.title, "roundtrip");
        assert_eq!(loaded.source_type, SourceType::User);
        assert_eq!(loaded.richness, original.richness);
        assert!((loaded.prominence_score - 98.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = LibsqlContentStore::new(ConnectionMode::InMemory).await.unwrap();
        let result = store.get_content(ContentId::new()).await;
        assert!(matches!(result, Err(FrontpageError::ContentNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_recent_filters_source_and_window() {
        let store = LibsqlContentStore::new(ConnectionMode::InMemory).await.unwrap();

        store.insert_content(&item("fresh user", SourceType::User, 2, 90.0)).await.unwrap();
        store.insert_content(&item("fresh auto", SourceType::Auto, 2, 45.0)).await.unwrap();
        store.insert_content(&item("stale user", SourceType::User, 24 * 10, 5.0)).await.unwrap();

        let since = Utc::now() - Duration::days(7);
        let recent = store.list_recent(SourceType::User, since, 100).await.unwrap();

        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].title, "fresh user");
    }

    #[tokio::test]
    async fn test_bulk_update_scores_single_transaction() {
        let store = LibsqlContentStore::new(ConnectionMode::InMemory).await.unwrap();

        let a = item("a", SourceType::User, 1, 100.0);
        let b = item("b", SourceType::User, 2, 100.0);
        store.insert_content(&a).await.unwrap();
        store.insert_content(&b).await.unwrap();

        let written = store
            .bulk_update_scores(&[(a.id, 61.88), (b.id, 60.65)])
            .await
            .unwrap();
        assert_eq!(written, 2);

        assert!((store.get_content(a.id).await.unwrap().prominence_score - 61.88).abs() < 1e-9);
        assert!((store.get_content(b.id).await.unwrap().prominence_score - 60.65).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_bulk_update_empty_is_noop() {
        let store = LibsqlContentStore::new(ConnectionMode::InMemory).await.unwrap();
        assert_eq!(store.bulk_update_scores(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_ranked_orders_descending() {
        let store = LibsqlContentStore::new(ConnectionMode::InMemory).await.unwrap();

        store.insert_content(&item("mid", SourceType::User, 1, 50.0)).await.unwrap();
        store.insert_content(&item("top", SourceType::User, 1, 80.0)).await.unwrap();
        store.insert_content(&item("low", SourceType::Auto, 1, 10.0)).await.unwrap();

        let ranked = store.list_ranked(10).await.unwrap();
        let titles: Vec<_> = ranked.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["top", "mid", "low"]);
    }

    #[tokio::test]
    async fn test_local_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("content.db");
        let path_str = path.to_str().unwrap().to_string();

        let original = item("durable", SourceType::User, 3, 77.0);
        {
            let store = LibsqlContentStore::new(ConnectionMode::Local(path_str.clone()))
                .await
                .unwrap();
            store.insert_content(&original).await.unwrap();
        }

        let reopened = LibsqlContentStore::from_path(&path_str).await.unwrap();
        let loaded = reopened.get_content(original.id).await.unwrap();
        assert_eq!(loaded.title, "durable");
        assert!((loaded.prominence_score - 77.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_count_content() {
        let store = LibsqlContentStore::new(ConnectionMode::InMemory).await.unwrap();
        assert_eq!(store.count_content().await.unwrap(), 0);

        store.insert_content(&item("one", SourceType::User, 1, 1.0)).await.unwrap();
        assert_eq!(store.count_content().await.unwrap(), 1);
    }
}
