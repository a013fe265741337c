//! Frontpage service entry point
//!
//! Runs the HTTP API (SSE fan-out, dispatch, cron trigger) together with
//! the in-process rescore scheduler, or executes maintenance commands.

use clap::{Parser, Subcommand};
use frontpage_core::{
    api::ApiServer,
    jobs::MaintenanceJob,
    ConnectionRegistry, FrontpageConfig, LibsqlContentStore, NoveltyDetector, NullSimilarity,
    ProminenceRescorer, TagCache,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "frontpage")]
#[command(about = "Content prominence scoring and real-time notification fan-out")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "FRONTPAGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server and background scheduler
    Serve,
    /// Run one rescore sweep and print the report
    Rescore,
    /// Bootstrap the database schema
    Init,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<FrontpageConfig> {
    match path {
        Some(path) => Ok(FrontpageConfig::from_file(path)?),
        None => {
            let default = PathBuf::from("frontpage.toml");
            if default.exists() {
                Ok(FrontpageConfig::from_file(&default)?)
            } else {
                warn!("No config file found, using built-in defaults");
                Ok(FrontpageConfig::default())
            }
        }
    }
}

fn build_rescorer(
    config: &FrontpageConfig,
    store: Arc<LibsqlContentStore>,
    cache: Arc<TagCache>,
) -> ProminenceRescorer {
    // The similarity service is wired here once the platform exposes one;
    // the null scorer leaves every item novel.
    let novelty = NoveltyDetector::new(Arc::new(NullSimilarity), &config.scoring);
    ProminenceRescorer::new(
        store,
        cache,
        novelty,
        config.scoring.clone(),
        config.rescore.clone(),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Serve => {
            let store = Arc::new(LibsqlContentStore::from_path(&config.database.path).await?);
            let cache = Arc::new(TagCache::new());
            let registry = Arc::new(ConnectionRegistry::new());
            let rescorer =
                Arc::new(build_rescorer(&config, store.clone(), cache.clone()));

            if config.rescore.enabled {
                let mut scheduler =
                    frontpage_core::BackgroundScheduler::new(config.rescore.clone());
                scheduler.register_job(rescorer.clone());
                tokio::spawn(async move {
                    if let Err(e) = scheduler.start().await {
                        tracing::error!("Scheduler stopped: {}", e);
                    }
                });
            } else {
                info!("In-process scheduler disabled; rescoring via POST /jobs/rescore only");
            }

            if config.api.internal_token.is_none() {
                warn!("api.internal_token is unset; internal endpoints are unauthenticated");
            }

            let server = ApiServer::new(
                config.api.clone(),
                registry,
                store,
                cache,
                rescorer,
                config.scoring.clone(),
            );
            server.serve().await
        }
        Command::Rescore => {
            let store = Arc::new(LibsqlContentStore::from_path(&config.database.path).await?);
            let cache = Arc::new(TagCache::new());
            let rescorer = build_rescorer(&config, store, cache);

            let report = rescorer.run().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Init => {
            let store = LibsqlContentStore::from_path(&config.database.path).await?;
            store.init_schema().await?;
            info!("Database schema ready at {}", config.database.path);
            Ok(())
        }
    }
}
