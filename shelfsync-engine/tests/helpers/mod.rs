//! Test helper utilities
//!
//! Shared fixtures for the engine integration tests: an in-process catalog,
//! a fixed clock and a fully wired router over an in-memory database.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use shelfsync_common::models::ProductStatus;
use shelfsync_common::time::FixedClock;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

use shelfsync_engine::services::catalog_client::{CatalogPage, RawProduct};
use shelfsync_engine::services::{
    CatalogApi, CatalogError, CatalogFetcher, ClassifierConfig, FetchOptions, RankingConfig, RebalanceConfig,
    RebalanceJob, SalesPotentialRanker, SyncConfig, SyncOrchestrator,
};
use shelfsync_engine::{build_router, db, AppState};

/// Catalog API serving a fixed record list, paged in order
pub struct StaticCatalog {
    records: Vec<RawProduct>,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl StaticCatalog {
    pub fn new(records: Vec<RawProduct>) -> Arc<Self> {
        Arc::new(Self {
            records,
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }

    pub fn failing() -> Arc<Self> {
        let catalog = Self::new(Vec::new());
        catalog.fail.store(true, Ordering::SeqCst);
        catalog
    }
}

#[async_trait]
impl CatalogApi for StaticCatalog {
    async fn search(&self, page: u32, page_size: u32, _statuses: &[ProductStatus]) -> Result<CatalogPage, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CatalogError::Network("connection refused".to_string()));
        }
        let start = ((page - 1) * page_size) as usize;
        Ok(CatalogPage {
            contents: self.records.iter().skip(start).take(page_size as usize).cloned().collect(),
            total_elements: self.records.len() as u64,
            total_pages: None,
            malformed: 0,
        })
    }
}

/// Clock every test runs against
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// Catalog record registered `days_old` days before [`now`]
pub fn record(id: u64, name: &str, brand: &str, days_old: i64) -> RawProduct {
    let reg = (now() - ChronoDuration::days(days_old)).to_rfc3339();
    serde_json::from_value(json!({
        "originProductNo": id,
        "channelProducts": [{
            "name": name,
            "statusType": "SALE",
            "salePrice": 50000,
            "brandName": brand,
            "regDate": reg
        }]
    }))
    .unwrap()
}

/// In-memory database with the default brand table
pub async fn create_test_db() -> SqlitePool {
    let pool = db::open_in_memory().await.expect("Failed to open in-memory database");
    db::brand_tiers::seed_defaults_if_empty(&pool)
        .await
        .expect("Failed to seed brand tiers");
    pool
}

pub fn create_test_sync(pool: SqlitePool, catalog: Arc<StaticCatalog>) -> Arc<SyncOrchestrator> {
    let options = FetchOptions {
        page_size: 100,
        max_attempts: 1,
        initial_backoff: Duration::from_millis(1),
        page_timeout: Duration::from_secs(5),
        fan_out: 4,
    };
    Arc::new(
        SyncOrchestrator::new(
            pool,
            CatalogFetcher::new(catalog, options),
            SyncConfig::default(),
            ClassifierConfig::default(),
        )
        .with_clock(Arc::new(FixedClock(now()))),
    )
}

/// Wired application state
pub struct TestApp {
    pub pool: SqlitePool,
    pub state: AppState,
}

impl TestApp {
    pub async fn new(catalog: Arc<StaticCatalog>) -> Self {
        Self::with_rebalance(catalog, RebalanceConfig::default()).await
    }

    pub async fn with_rebalance(catalog: Arc<StaticCatalog>, rebalance: RebalanceConfig) -> Self {
        let pool = create_test_db().await;
        let sync = create_test_sync(pool.clone(), catalog);
        let ranker = SalesPotentialRanker::new(RankingConfig::default());
        let job = Arc::new(RebalanceJob::new(pool.clone(), sync.clone(), ranker.clone(), rebalance));
        let state = AppState::new(pool.clone(), sync, job, Arc::new(ranker));
        Self { pool, state }
    }

    /// Send one request through a fresh router, returning status and JSON body
    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = build_router(self.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, None).await
    }
}
