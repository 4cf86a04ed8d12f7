//! shelfsync-engine library interface
//!
//! Exposes the pipeline and the HTTP surface for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::{RebalanceJob, SalesPotentialRanker, SyncOrchestrator};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub sync: Arc<SyncOrchestrator>,
    pub rebalance: Arc<RebalanceJob>,
    pub ranker: Arc<SalesPotentialRanker>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        sync: Arc<SyncOrchestrator>,
        rebalance: Arc<RebalanceJob>,
        ranker: Arc<SalesPotentialRanker>,
    ) -> Self {
        Self {
            db,
            sync,
            rebalance,
            ranker,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::product_routes())
        .merge(api::classify_routes())
        .merge(api::override_routes())
        .merge(api::rebalance_routes())
        .merge(api::sync_routes())
        .merge(api::log_routes())
        .merge(api::brand_routes())
        .merge(api::settings_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
