// Novelty / Redundancy Detection
//
// The similarity measure itself is an external collaborator (embedding
// service, title-overlap heuristic, ...). This module only defines the
// seam and applies the configured threshold: an item is redundant when
// its similarity to any *earlier-published* item in the candidate set
// exceeds the threshold, so the newer duplicate is the one penalized.

use crate::config::ScoringConfig;
use crate::error::Result;
use crate::types::ContentItem;
use async_trait::async_trait;
use std::sync::Arc;

/// Pluggable similarity oracle
///
/// Implementations return a score in `[0, 1]`: 0 means unrelated, 1 means
/// the same story. Values outside the range are clamped by the caller.
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    async fn similarity(&self, item: &ContentItem, other: &ContentItem) -> Result<f64>;
}

/// Default scorer: never flags anything as redundant
///
/// Used when no external similarity service is wired in; the penalty
/// path stays exercised through tests with stub scorers.
pub struct NullSimilarity;

#[async_trait]
impl SimilarityScorer for NullSimilarity {
    async fn similarity(&self, _item: &ContentItem, _other: &ContentItem) -> Result<f64> {
        Ok(0.0)
    }
}

/// Applies the similarity threshold over a candidate set
pub struct NoveltyDetector {
    scorer: Arc<dyn SimilarityScorer>,
    threshold: f64,
}

impl NoveltyDetector {
    pub fn new(scorer: Arc<dyn SimilarityScorer>, config: &ScoringConfig) -> Self {
        Self {
            scorer,
            threshold: config.similarity_threshold,
        }
    }

    /// Check `item` against every earlier-published peer
    ///
    /// Short-circuits on the first match above the threshold. Scorer
    /// errors propagate; the batch job surfaces them as a job failure.
    pub async fn is_redundant(&self, item: &ContentItem, peers: &[ContentItem]) -> Result<bool> {
        for peer in peers {
            if peer.id == item.id || peer.published_at >= item.published_at {
                continue;
            }

            let similarity = self.scorer.similarity(item, peer).await?.clamp(0.0, 1.0);
            if similarity > self.threshold {
                tracing::debug!(
                    item = %item.id,
                    peer = %peer.id,
                    similarity,
                    "item flagged redundant"
                );
                return Ok(true);
            }
        }

        Ok(false)
    }
}
