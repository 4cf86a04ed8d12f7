//! shelfsync-engine - catalog sync and merchandising service
//!
//! Pulls the storefront catalog, merges local overrides, classifies aged
//! stock into archive categories, and serves the canonical view over HTTP.
//! A scheduler (or the optional interval tasks below) drives refresh and
//! rebalance.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use shelfsync_common::config::{
    load_toml_or_default, resolve_config_path, resolve_root_folder, LoggingConfig, RootFolderInitializer,
    ROOT_FOLDER_ENV,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shelfsync_engine::config::{resolve_ai_api_key, EngineConfig};
use shelfsync_engine::services::{
    AiClassifier, CatalogApi, CatalogFetcher, FetchOptions, HttpAiClassifier, HttpCatalogClient, RebalanceJob,
    SalesPotentialRanker, SyncOrchestrator, UnconfiguredCatalog,
};
use shelfsync_engine::AppState;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "shelfsync-engine")]
#[command(about = "Catalog sync and merchandising service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "SHELFSYNC_PORT")]
    port: Option<u16>,

    /// Root folder holding the database
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "SHELFSYNC_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let (config, config_source): (EngineConfig, _) = load_toml_or_default(config_path.as_deref());

    init_tracing(&config.logging)?;

    info!("Starting shelfsync-engine");
    config_source.log();
    info!(
        "Version: {} ({}, {} build at {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    // Root folder: CLI > ENV > TOML > OS default
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, config.root_folder.as_deref());
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db = shelfsync_engine::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Collaborators
    let catalog: Arc<dyn CatalogApi> = match HttpCatalogClient::new(&config.catalog) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Catalog client unavailable: {}. Read paths will answer 503.", e);
            Arc::new(UnconfiguredCatalog)
        }
    };
    let fetcher = CatalogFetcher::new(catalog, FetchOptions::from(&config.catalog));

    let mut sync = SyncOrchestrator::new(db.clone(), fetcher, config.sync.clone(), config.classifier.clone());
    if let Some(ai) = build_ai_classifier(&db, &config).await? {
        sync = sync.with_ai(ai);
    }
    let sync = Arc::new(sync);

    let ranker = Arc::new(SalesPotentialRanker::new(config.ranking.clone()));
    let rebalance = Arc::new(RebalanceJob::new(
        db.clone(),
        sync.clone(),
        (*ranker).clone(),
        config.rebalance.clone(),
    ));

    let shutdown = CancellationToken::new();
    spawn_interval_tasks(&config, sync.clone(), rebalance.clone(), shutdown.clone());

    let state = AppState::new(db, sync, rebalance, ranker);
    let app = shelfsync_engine::build_router(state);

    let port = args.port.unwrap_or_else(|| config.port());
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over `[logging] level`; a log file replaces stdout
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("{},tower_http=info", logging.level)));

    match &logging.file {
        Some(path) => {
            let file = open_log_file(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// AI collaborator, when both an endpoint and a key are configured
async fn build_ai_classifier(
    db: &sqlx::SqlitePool,
    config: &EngineConfig,
) -> Result<Option<Arc<dyn AiClassifier>>> {
    let Some(endpoint) = config.ai.endpoint.clone().filter(|e| !e.trim().is_empty()) else {
        info!("No AI endpoint configured; AI classification disabled");
        return Ok(None);
    };
    let Some(api_key) = resolve_ai_api_key(db, &config.ai).await? else {
        return Ok(None);
    };

    match HttpAiClassifier::new(&config.ai, endpoint, api_key) {
        Ok(client) => {
            let ai: Arc<dyn AiClassifier> = Arc::new(client);
            Ok(Some(ai))
        }
        Err(e) => {
            warn!("AI client could not be built, continuing without it: {}", e);
            Ok(None)
        }
    }
}

/// Internal refresh and rebalance schedules (interval 0 = off)
fn spawn_interval_tasks(
    config: &EngineConfig,
    sync: Arc<SyncOrchestrator>,
    rebalance: Arc<RebalanceJob>,
    shutdown: CancellationToken,
) {
    if config.sync.refresh_interval_secs > 0 {
        let period = Duration::from_secs(config.sync.refresh_interval_secs);
        let shutdown = shutdown.clone();
        info!(period_secs = period.as_secs(), "Scheduled catalog refresh enabled");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = sync.refresh(true).await {
                            warn!(error = %e, "Scheduled refresh failed");
                        }
                    }
                }
            }
        });
    }

    if config.rebalance.interval_secs > 0 {
        let period = Duration::from_secs(config.rebalance.interval_secs);
        info!(period_secs = period.as_secs(), "Scheduled rebalance enabled");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick fires immediately; let the first refresh land before rebalancing
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = rebalance.run().await {
                            warn!(error = %e, "Scheduled rebalance skipped");
                        }
                    }
                }
            }
        });
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
    shutdown.cancel();
}
