// Prominence Scoring
//
// Computes the ranking value used to order content on the frontpage:
// - initial score: base authorship weight x richness multipliers, fixed
//   at creation
// - prominence: initial score decayed exponentially by age in hours,
//   with the decay constant chosen by source type
// - novelty penalty: redundant items are multiplied by a sub-1 factor
//
// `now` is injected explicitly so recomputation is deterministic.

use crate::config::ScoringConfig;
use crate::types::{ContentItem, RichnessCounts, SourceType};
use chrono::{DateTime, Utc};

/// Creation-time score: `base[source] * richness multipliers`
///
/// Set once when the item is written and never recomputed; decay always
/// starts from this anchor.
pub fn initial_score(
    source: SourceType,
    richness: &RichnessCounts,
    config: &ScoringConfig,
) -> f64 {
    config.base_score(source) * config.richness.multiplier(richness)
}

/// Time-decayed prominence: `initial_score * exp(-k * age_hours)`
///
/// Age is clamped to zero, so an item published in the future (clock
/// skew) scores exactly its initial score rather than above it.
pub fn compute_prominence(
    item: &ContentItem,
    now: DateTime<Utc>,
    config: &ScoringConfig,
) -> f64 {
    let k = config.decay_per_hour(item.source_type);
    item.initial_score * (-k * item.age_hours(now)).exp()
}

/// Multiply a decayed score by the redundancy penalty when flagged
///
/// The result is never negative: penalty and score are both non-negative.
pub fn apply_novelty_penalty(score: f64, redundant: bool, config: &ScoringConfig) -> f64 {
    if redundant {
        (score * config.redundancy_penalty).max(0.0)
    } else {
        score
    }
}
