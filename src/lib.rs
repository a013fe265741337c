//! Frontpage - Content Prominence & Real-Time Notification Core
//!
//! The two algorithmic cores of a news/content platform, packaged as a
//! standalone service:
//! - Prominence scoring: config-driven base weights and richness
//!   multipliers fixed at creation, exponential time decay by source
//!   type, and a novelty penalty for redundant items, refreshed by a
//!   periodic batch job that bulk-writes scores and invalidates the
//!   cached frontpage listing.
//! - Notification fan-out: a per-process connection registry mapping
//!   users to live SSE streams and push subscriptions, with best-effort
//!   fire-and-forget delivery and automatic pruning of dead channels.
//!
//! # Architecture
//!
//! - **Types**: content records and identifiers
//! - **Scoring**: pure scoring functions and the novelty seam
//! - **Storage**: libSQL-backed content repository
//! - **Jobs**: rescore sweep and background scheduler
//! - **Notify**: connection registry and event payloads
//! - **Api**: axum HTTP surface (SSE stream, dispatch, cron trigger)
//!
//! # Example
//!
//! ```ignore
//! use frontpage_core::{FrontpageConfig, LibsqlContentStore, ProminenceRescorer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = FrontpageConfig::from_file("frontpage.toml".as_ref())?;
//!     let store = LibsqlContentStore::from_path(&config.database.path).await?;
//!     // wire the registry, rescorer and API server, then serve
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod jobs;
pub mod notify;
pub mod scoring;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use cache::{TagCache, FRONTPAGE_TAG};
pub use config::{ApiConfig, FrontpageConfig, RescoreConfig, ScoringConfig};
pub use error::{FrontpageError, Result};
pub use jobs::{BackgroundScheduler, ProminenceRescorer, RescoreOutcome};
pub use notify::{ConnectionRegistry, DeliveryReport, NotificationEvent};
pub use scoring::{NoveltyDetector, NullSimilarity, SimilarityScorer};
pub use storage::libsql::{ConnectionMode, LibsqlContentStore};
pub use storage::ContentStore;
pub use types::{ContentDraft, ContentId, ContentItem, RichnessCounts, SourceType};
