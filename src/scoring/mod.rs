//! Prominence scoring: creation-time weighting, time decay, novelty penalty

pub mod novelty;
pub mod prominence;

pub use novelty::{NoveltyDetector, NullSimilarity, SimilarityScorer};
pub use prominence::{apply_novelty_penalty, compute_prominence, initial_score};
