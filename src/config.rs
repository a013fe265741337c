// Frontpage Configuration
//
// Defines the scoring constant table, rescore job scheduling, API surface
// and database settings. The scoring table is a versioned configuration
// input rather than code so operators can retune decay and bonuses
// without a deploy.

use crate::types::{RichnessCounts, SourceType};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FrontpageConfig {
    /// Scoring constant table
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Periodic rescore job configuration
    #[serde(default)]
    pub rescore: RescoreConfig,

    /// HTTP API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// The scoring constant table (base weights, richness tiers, decay, novelty)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Base authorship weight for user-authored content
    pub base_score_user: f64,

    /// Base authorship weight for auto-aggregated content
    pub base_score_auto: f64,

    /// Per-hour exponential decay constant for user content (decays slowly)
    pub decay_per_hour_user: f64,

    /// Per-hour exponential decay constant for auto content (decays fast)
    pub decay_per_hour_auto: f64,

    /// Richness bonus tiers, one ladder per dimension
    pub richness: RichnessTiers,

    /// Similarity above this marks an item redundant
    pub similarity_threshold: f64,

    /// Multiplier applied to redundant items (< 1)
    pub redundancy_penalty: f64,
}

impl ScoringConfig {
    /// Base score for a source type
    pub fn base_score(&self, source: SourceType) -> f64 {
        match source {
            SourceType::User => self.base_score_user,
            SourceType::Auto => self.base_score_auto,
        }
    }

    /// Per-hour decay constant for a source type
    pub fn decay_per_hour(&self, source: SourceType) -> f64 {
        match source {
            SourceType::User => self.decay_per_hour_user,
            SourceType::Auto => self.decay_per_hour_auto,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_score_user: 100.0,
            base_score_auto: 50.0,
            decay_per_hour_user: 0.02,
            decay_per_hour_auto: 0.06,
            richness: RichnessTiers::default(),
            similarity_threshold: 0.6,
            redundancy_penalty: 0.4,
        }
    }
}

/// One bonus step: counts at or above `min` earn `multiplier`
///
/// Tiers within a ladder are disjoint thresholds; the highest tier whose
/// `min` is satisfied wins. Multipliers compound across dimensions by
/// simple multiplication.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BonusTier {
    pub min: u32,
    pub multiplier: f64,
}

/// Richness bonus ladders, one per content dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RichnessTiers {
    pub words: Vec<BonusTier>,
    pub images: Vec<BonusTier>,
    pub subheadings: Vec<BonusTier>,
    pub categories: Vec<BonusTier>,
}

impl RichnessTiers {
    /// Multiplier for one ladder given a count
    fn ladder_multiplier(ladder: &[BonusTier], count: u32) -> f64 {
        ladder
            .iter()
            .filter(|tier| count >= tier.min)
            .map(|tier| tier.multiplier)
            .fold(1.0, f64::max)
    }

    /// Combined multiplier for a content item's richness counts
    pub fn multiplier(&self, counts: &RichnessCounts) -> f64 {
        Self::ladder_multiplier(&self.words, counts.words)
            * Self::ladder_multiplier(&self.images, counts.images)
            * Self::ladder_multiplier(&self.subheadings, counts.subheadings)
            * Self::ladder_multiplier(&self.categories, counts.categories)
    }
}

impl Default for RichnessTiers {
    fn default() -> Self {
        Self {
            words: vec![
                BonusTier { min: 300, multiplier: 1.10 },
                BonusTier { min: 800, multiplier: 1.25 },
            ],
            images: vec![
                BonusTier { min: 1, multiplier: 1.05 },
                BonusTier { min: 3, multiplier: 1.15 },
            ],
            subheadings: vec![
                BonusTier { min: 2, multiplier: 1.05 },
                BonusTier { min: 5, multiplier: 1.10 },
            ],
            categories: vec![BonusTier { min: 2, multiplier: 1.05 }],
        }
    }
}

/// Configuration for the periodic prominence rescore job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescoreConfig {
    /// Enable/disable the in-process scheduler loop
    pub enabled: bool,

    /// Trailing window of content eligible for rescoring, in days
    pub window_days: u32,

    /// Interval between job runs (in seconds)
    #[serde(with = "serde_duration")]
    pub interval: Duration,

    /// Maximum number of items to rescore per run
    pub batch_size: usize,

    /// Maximum duration for job execution (in seconds)
    #[serde(with = "serde_duration")]
    pub max_duration: Duration,
}

impl Default for RescoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_days: 7,
            interval: Duration::from_secs(3600), // hourly
            batch_size: 2000,
            max_duration: Duration::from_secs(300), // 5 minutes
        }
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Server bind address
    pub addr: SocketAddr,

    /// Buffered events per live SSE connection
    pub event_capacity: usize,

    /// Shared secret required on internal endpoints (send, rescore, create).
    /// When unset, internal endpoints are open; production deployments
    /// must set it.
    #[serde(default)]
    pub internal_token: Option<String>,

    /// Connections without a ping for this long are swept (in seconds)
    #[serde(with = "serde_duration")]
    pub stale_after: Duration,

    /// Interval between stale-connection sweeps (in seconds)
    #[serde(with = "serde_duration")]
    pub sweep_interval: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: ([127, 0, 0, 1], 8090).into(),
            event_capacity: 64,
            internal_token: None,
            stale_after: Duration::from_secs(120),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the libSQL database file; ":memory:" for an in-memory store
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "frontpage.db".to_string(),
        }
    }
}

// Custom serde module for Duration (serialize/deserialize as seconds)
mod serde_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl FrontpageConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: FrontpageConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: FrontpageConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;

        if self.rescore.window_days == 0 || self.rescore.window_days > 90 {
            return Err(ConfigError::ValidationError(
                "rescore: window_days must be between 1 and 90".to_string(),
            ));
        }

        if self.rescore.batch_size == 0 || self.rescore.batch_size > 100_000 {
            return Err(ConfigError::ValidationError(
                "rescore: batch_size must be between 1 and 100000".to_string(),
            ));
        }

        if self.rescore.interval < Duration::from_secs(60) {
            return Err(ConfigError::ValidationError(
                "rescore: interval must be at least 1 minute".to_string(),
            ));
        }

        if self.rescore.max_duration < Duration::from_secs(10)
            || self.rescore.max_duration > Duration::from_secs(1800)
        {
            return Err(ConfigError::ValidationError(
                "rescore: max_duration must be between 10 seconds and 30 minutes".to_string(),
            ));
        }

        if self.api.event_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "api: event_capacity must be at least 1".to_string(),
            ));
        }

        if self.api.stale_after < Duration::from_secs(10) {
            return Err(ConfigError::ValidationError(
                "api: stale_after must be at least 10 seconds".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }
}

impl ScoringConfig {
    /// Validate the scoring constant table
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_score_user <= 0.0 || self.base_score_auto <= 0.0 {
            return Err(ConfigError::ValidationError(
                "scoring: base scores must be positive".to_string(),
            ));
        }

        if self.decay_per_hour_user <= 0.0 || self.decay_per_hour_auto <= 0.0 {
            return Err(ConfigError::ValidationError(
                "scoring: decay constants must be positive".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::ValidationError(
                "scoring: similarity_threshold must be within [0, 1]".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.redundancy_penalty) {
            return Err(ConfigError::ValidationError(
                "scoring: redundancy_penalty must be within [0, 1]".to_string(),
            ));
        }

        for (name, ladder) in [
            ("words", &self.richness.words),
            ("images", &self.richness.images),
            ("subheadings", &self.richness.subheadings),
            ("categories", &self.richness.categories),
        ] {
            for tier in ladder {
                if tier.multiplier < 1.0 {
                    return Err(ConfigError::ValidationError(format!(
                        "scoring: richness.{} multipliers must be >= 1",
                        name
                    )));
                }
            }
        }

        Ok(())
    }
}
