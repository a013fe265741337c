// Prominence Rescore Job
//
// Periodic sweep over recent user-authored content: recompute each item's
// time-decayed prominence (with novelty penalty), persist everything in
// one bulk write, then invalidate the cached frontpage listing.
//
// The sweep is a pure recomputation, not an increment, so running it
// twice in succession yields the same scores modulo the clock delta.
// Any error aborts the remaining batch; the caller (scheduler or HTTP
// trigger) owns retry and alerting.

use crate::cache::{TagCache, FRONTPAGE_TAG};
use crate::config::{RescoreConfig, ScoringConfig};
use crate::error::Result;
use crate::jobs::scheduler::{JobError, JobReport, MaintenanceJob};
use crate::scoring::{apply_novelty_penalty, compute_prominence, NoveltyDetector};
use crate::storage::ContentStore;
use crate::types::{ContentId, SourceType};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Result of one rescore sweep
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RescoreOutcome {
    pub updated_count: usize,
}

/// Batch recalculation of prominence scores
pub struct ProminenceRescorer {
    store: Arc<dyn ContentStore>,
    cache: Arc<TagCache>,
    novelty: NoveltyDetector,
    scoring: ScoringConfig,
    config: RescoreConfig,
}

impl ProminenceRescorer {
    pub fn new(
        store: Arc<dyn ContentStore>,
        cache: Arc<TagCache>,
        novelty: NoveltyDetector,
        scoring: ScoringConfig,
        config: RescoreConfig,
    ) -> Self {
        Self {
            store,
            cache,
            novelty,
            scoring,
            config,
        }
    }

    /// Rescore user-authored content published within the trailing window
    ///
    /// Only user content is swept: auto items decay fast enough that their
    /// scores are near-zero well before the window closes, and skipping
    /// them keeps the write volume down. The frontpage cache tag is
    /// invalidated only when at least one score was written; an empty
    /// candidate set returns zero and leaves the cache untouched.
    pub async fn recalculate_recent(&self, now: DateTime<Utc>) -> Result<RescoreOutcome> {
        let since = now - Duration::days(self.config.window_days as i64);
        let candidates = self
            .store
            .list_recent(SourceType::User, since, self.config.batch_size)
            .await?;

        if candidates.is_empty() {
            debug!("No recent content to rescore");
            return Ok(RescoreOutcome { updated_count: 0 });
        }

        let mut updates: Vec<(ContentId, f64)> = Vec::with_capacity(candidates.len());
        for item in &candidates {
            let decayed = compute_prominence(item, now, &self.scoring);
            let redundant = self.novelty.is_redundant(item, &candidates).await?;
            let score = apply_novelty_penalty(decayed, redundant, &self.scoring);
            updates.push((item.id, score));
        }

        let updated_count = self.store.bulk_update_scores(&updates).await?;

        if updated_count > 0 {
            self.cache.invalidate(FRONTPAGE_TAG).await;
        }

        info!(
            window_days = self.config.window_days,
            candidates = candidates.len(),
            updated_count,
            "rescore sweep complete"
        );

        Ok(RescoreOutcome { updated_count })
    }
}

#[async_trait]
impl MaintenanceJob for ProminenceRescorer {
    fn name(&self) -> &str {
        "prominence_rescore"
    }

    async fn run(&self) -> std::result::Result<JobReport, JobError> {
        let start = Instant::now();
        let outcome = self.recalculate_recent(Utc::now()).await?;

        Ok(JobReport {
            items_processed: outcome.updated_count,
            changes_made: outcome.updated_count,
            duration: start.elapsed(),
            error_message: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TagCache;
    use crate::scoring::NullSimilarity;
    use crate::storage::libsql::{ConnectionMode, LibsqlContentStore};
    use crate::types::{ContentItem, RichnessCounts};
    use serde_json::json;

    fn rescorer(
        store: Arc<dyn ContentStore>,
        cache: Arc<TagCache>,
    ) -> ProminenceRescorer {
        let scoring = ScoringConfig::default();
        let novelty = NoveltyDetector::new(Arc::new(NullSimilarity), &scoring);
        ProminenceRescorer::new(store, cache, novelty, scoring, RescoreConfig::default())
    }

    fn item(title: &str, source: SourceType, hours_ago: i64) -> ContentItem {
        ContentItem {
            id: ContentId::new(),
            title: title.to_string(),
            source_type: source,
            initial_score: 100.0,
            prominence_score: 100.0,
            published_at: Utc::now() - Duration::hours(hours_ago),
            richness: RichnessCounts::default(),
        }
    }

    #[tokio::test]
    async fn test_empty_window_returns_zero_and_keeps_cache() {
        let store = Arc::new(
            LibsqlContentStore::new(ConnectionMode::InMemory).await.unwrap(),
        );
        let cache = Arc::new(TagCache::new());
        cache.put(FRONTPAGE_TAG, json!(["warm"])).await;

        let outcome = rescorer(store, cache.clone())
            .recalculate_recent(Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome.updated_count, 0);
        assert_eq!(cache.get(FRONTPAGE_TAG).await, Some(json!(["warm"])));
    }

    #[tokio::test]
    async fn test_sweep_persists_decayed_scores_and_invalidates() {
        let store = Arc::new(
            LibsqlContentStore::new(ConnectionMode::InMemory).await.unwrap(),
        );
        let cache = Arc::new(TagCache::new());
        cache.put(FRONTPAGE_TAG, json!(["warm"])).await;

        let day_old = item("day old", SourceType::User, 24);
        store.insert_content(&day_old).await.unwrap();

        let outcome = rescorer(store.clone(), cache.clone())
            .recalculate_recent(Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.updated_count, 1);

        let reloaded = store.get_content(day_old.id).await.unwrap();
        // 100 * e^(-0.02 * 24), small tolerance for the time between
        // item creation and the sweep's `now`
        assert!((reloaded.prominence_score - 61.88).abs() < 0.1);

        assert!(cache.get(FRONTPAGE_TAG).await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_skips_auto_content() {
        let store = Arc::new(
            LibsqlContentStore::new(ConnectionMode::InMemory).await.unwrap(),
        );
        let cache = Arc::new(TagCache::new());

        store
            .insert_content(&item("aggregated", SourceType::Auto, 24))
            .await
            .unwrap();

        let outcome = rescorer(store.clone(), cache)
            .recalculate_recent(Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome.updated_count, 0);
        let ranked = store.list_ranked(10).await.unwrap();
        assert_eq!(ranked[0].prominence_score, 100.0);
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent_at_fixed_now() {
        let store = Arc::new(
            LibsqlContentStore::new(ConnectionMode::InMemory).await.unwrap(),
        );
        let cache = Arc::new(TagCache::new());

        let article = item("stable", SourceType::User, 48);
        store.insert_content(&article).await.unwrap();

        let job = rescorer(store.clone(), cache);
        let now = Utc::now();

        job.recalculate_recent(now).await.unwrap();
        let first = store.get_content(article.id).await.unwrap().prominence_score;

        job.recalculate_recent(now).await.unwrap();
        let second = store.get_content(article.id).await.unwrap().prominence_score;

        assert_eq!(first, second);
    }
}
