//! Sync orchestrator
//!
//! Owns the canonical view cache. A refresh runs fetch → override merge →
//! lifecycle + archive classification → atomic swap. Readers hold an `Arc` to
//! whichever generation they picked up, so a swap never exposes a partly
//! built view.
//!
//! At most one refresh runs at a time. Losing callers get the current view,
//! except before the first population, when they wait for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfsync_common::models::{DisplayCategory, ProductStatus};
use shelfsync_common::time::{Clock, SystemClock};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::ai_classifier::AiClassifier;
use super::archive_classifier::{ArchiveClassifier, ClassificationOutcome, ClassifierConfig};
use super::brand_tiers::BrandTierTable;
use super::catalog_fetcher::{CatalogFetcher, FetchError};
use super::keyword_tables::KeywordTable;
use super::lifecycle;
use super::name_parser::parse_product_name;
use crate::db;
use crate::models::{CanonicalView, EnrichedProduct, OverrideEntry, Product, ProductAttributes};

/// `[sync]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// A view older than this is rebuilt on the next non-forced refresh
    pub ttl_secs: u64,
    /// Budget for one refresh; on expiry the swap is skipped
    pub refresh_deadline_secs: u64,
    /// Internal refresh task period, 0 disables it
    pub refresh_interval_secs: u64,
    /// Consult the AI collaborator during refresh
    pub use_ai: bool,
    pub statuses: Vec<ProductStatus>,
    /// Concurrent classifications during refresh
    pub classify_fan_out: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 1800,
            refresh_deadline_secs: 120,
            refresh_interval_secs: 0,
            use_ai: false,
            statuses: ProductStatus::ALL.to_vec(),
            classify_fan_out: 4,
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Catalog fetch failed: {0}")]
    Fetch(#[source] FetchError),

    #[error("Refresh exceeded its {0:?} deadline")]
    DeadlineExceeded(Duration),

    #[error("Storage error: {0}")]
    Storage(#[from] shelfsync_common::Error),
}

/// Cache state for health and admin endpoints
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub generation: Option<Uuid>,
    pub built_at: Option<DateTime<Utc>>,
    pub products: usize,
    pub stale: bool,
    pub refreshing: bool,
    pub last_error: Option<String>,
}

/// Per-id result of an on-demand classification
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ClassifyItem {
    Classified(ClassificationOutcome),
    NotFound { product_id: String },
}

pub struct SyncOrchestrator {
    db: SqlitePool,
    fetcher: CatalogFetcher,
    keywords: Arc<KeywordTable>,
    classifier_config: ClassifierConfig,
    ai: Option<Arc<dyn AiClassifier>>,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    view: RwLock<Option<Arc<CanonicalView>>>,
    /// Bumped by every `invalidate`
    epoch: AtomicU64,
    /// Epoch the current view was built from
    view_epoch: AtomicU64,
    refresh_lock: Mutex<()>,
    last_error: RwLock<Option<String>>,
}

impl SyncOrchestrator {
    pub fn new(db: SqlitePool, fetcher: CatalogFetcher, config: SyncConfig, classifier_config: ClassifierConfig) -> Self {
        Self {
            db,
            fetcher,
            keywords: Arc::new(KeywordTable::default()),
            classifier_config,
            ai: None,
            config,
            clock: Arc::new(SystemClock),
            view: RwLock::new(None),
            epoch: AtomicU64::new(0),
            view_epoch: AtomicU64::new(0),
            refresh_lock: Mutex::new(()),
            last_error: RwLock::new(None),
        }
    }

    pub fn with_ai(mut self, ai: Arc<dyn AiClassifier>) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_keywords(mut self, keywords: Arc<KeywordTable>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current view regardless of age
    pub async fn current(&self) -> Option<Arc<CanonicalView>> {
        self.view.read().await.clone()
    }

    /// Mark the view stale; readers keep getting it until a rebuild lands
    pub fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Canonical view invalidated");
    }

    pub async fn status(&self) -> CacheStatus {
        let view = self.current().await;
        CacheStatus {
            generation: view.as_ref().map(|v| v.generation),
            built_at: view.as_ref().map(|v| v.built_at),
            products: view.as_ref().map(|v| v.len()).unwrap_or(0),
            stale: view.as_ref().map(|v| !self.is_fresh(v)).unwrap_or(true),
            refreshing: self.refresh_lock.try_lock().is_err(),
            last_error: self.last_error.read().await.clone(),
        }
    }

    fn is_fresh(&self, view: &CanonicalView) -> bool {
        if self.view_epoch.load(Ordering::SeqCst) != self.epoch.load(Ordering::SeqCst) {
            return false;
        }
        let age = self.clock.now().signed_duration_since(view.built_at);
        age.num_seconds() >= 0 && (age.num_seconds() as u64) < self.config.ttl_secs
    }

    async fn fresh_view(&self) -> Option<Arc<CanonicalView>> {
        self.current().await.filter(|v| self.is_fresh(v))
    }

    /// View for readers: the cached one when fresh, else a rebuild
    pub async fn refresh(&self, force: bool) -> Result<Arc<CanonicalView>, SyncError> {
        self.refresh_with_deadline(force, Duration::from_secs(self.config.refresh_deadline_secs.max(1)))
            .await
    }

    pub async fn refresh_with_deadline(&self, force: bool, deadline: Duration) -> Result<Arc<CanonicalView>, SyncError> {
        if !force {
            if let Some(view) = self.fresh_view().await {
                return Ok(view);
            }
        }

        let _guard = match self.refresh_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                if let Some(view) = self.current().await {
                    tracing::debug!("Refresh already running, serving current view");
                    return Ok(view);
                }
                let guard = self.refresh_lock.lock().await;
                if let Some(view) = self.current().await {
                    return Ok(view);
                }
                guard
            }
        };

        // Another caller may have finished a rebuild while this one waited
        if !force {
            if let Some(view) = self.fresh_view().await {
                return Ok(view);
            }
        }

        // Invalidations after this point leave the new view stale
        let started_epoch = self.epoch.load(Ordering::SeqCst);

        let cancel = CancellationToken::new();
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                cancel.cancel();
            })
        };

        let result = self.build_view(&cancel).await;
        timer.abort();

        let result = match result {
            Ok(_) if cancel.is_cancelled() => Err(SyncError::DeadlineExceeded(deadline)),
            Err(SyncError::Fetch(FetchError::Cancelled)) => Err(SyncError::DeadlineExceeded(deadline)),
            other => other,
        };

        match result {
            Ok(view) => {
                let view = Arc::new(view);
                {
                    let mut slot = self.view.write().await;
                    *slot = Some(view.clone());
                    self.view_epoch.store(started_epoch, Ordering::SeqCst);
                }
                *self.last_error.write().await = None;
                tracing::info!(
                    generation = %view.generation,
                    products = view.len(),
                    dropped = view.fetch.dropped,
                    duplicates = view.fetch.duplicates,
                    "Canonical view refreshed"
                );
                Ok(view)
            }
            Err(e) => {
                tracing::error!(error = %e, "Refresh failed, keeping previous view");
                *self.last_error.write().await = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn build_view(&self, cancel: &CancellationToken) -> Result<CanonicalView, SyncError> {
        let now = self.clock.now();

        let fetched = self
            .fetcher
            .fetch_all(&self.config.statuses, cancel)
            .await
            .map_err(SyncError::Fetch)?;

        let brands = Arc::new(BrandTierTable::new(db::brand_tiers::load_all(&self.db).await?));
        let ids: Vec<String> = fetched.products.iter().map(|p| p.id.clone()).collect();
        let overrides = db::overrides::get(&self.db, &ids).await?;

        let mut staged: Vec<Staged> = fetched
            .products
            .into_iter()
            .map(|product| stage_product(product, &overrides, &brands, now))
            .collect();

        let candidates: Vec<(Product, ProductAttributes)> = staged
            .iter()
            .filter(|s| s.lifecycle.stage.is_aged() && !s.manually_pinned())
            .map(|s| (s.product.clone(), s.attributes.clone()))
            .collect();

        let classifier = self.classifier(brands.clone());
        let outcomes = classifier
            .classify_and_log(
                &self.db,
                &candidates,
                self.config.use_ai,
                self.config.classify_fan_out,
                now,
                cancel,
            )
            .await;

        if cancel.is_cancelled() {
            tracing::warn!(
                classified = outcomes.len(),
                candidates = candidates.len(),
                "Refresh deadline hit during classification"
            );
            return Err(SyncError::Fetch(FetchError::Cancelled));
        }

        let mut by_id: HashMap<String, ClassificationOutcome> =
            outcomes.into_iter().map(|o| (o.product_id.clone(), o)).collect();

        let products = staged
            .drain(..)
            .map(|s| {
                let classification = by_id.remove(&s.product.id).map(|o| o.classification);
                s.enrich(classification)
            })
            .collect();

        Ok(CanonicalView::new(products, fetched.stats, now))
    }

    fn classifier(&self, brands: Arc<BrandTierTable>) -> ArchiveClassifier {
        let classifier = ArchiveClassifier::new(self.classifier_config.clone(), self.keywords.clone(), brands);
        match &self.ai {
            Some(ai) => classifier.with_ai(ai.clone()),
            None => classifier,
        }
    }

    /// Classify products from the current view on demand
    ///
    /// Every classified id gets a log entry; overrides are not written.
    pub async fn classify_ids(&self, ids: &[String], use_ai: bool) -> Result<Vec<ClassifyItem>, SyncError> {
        let view = match self.current().await {
            Some(view) => view,
            None => self.refresh(false).await?,
        };

        let brands = Arc::new(BrandTierTable::new(db::brand_tiers::load_all(&self.db).await?));
        let mut seen = HashSet::new();
        let unique: Vec<&String> = ids.iter().filter(|&id| seen.insert(id.as_str())).collect();
        let items: Vec<(Product, ProductAttributes)> = unique
            .iter()
            .filter_map(|id| view.get(id))
            .map(|p| (p.product.clone(), p.attributes.clone()))
            .collect();

        let outcomes = self
            .classifier(brands)
            .classify_and_log(
                &self.db,
                &items,
                use_ai,
                self.config.classify_fan_out,
                self.clock.now(),
                &CancellationToken::new(),
            )
            .await;
        let by_id: HashMap<String, ClassificationOutcome> =
            outcomes.into_iter().map(|o| (o.product_id.clone(), o)).collect();

        Ok(ids
            .iter()
            .map(|id| match by_id.get(id) {
                Some(outcome) => ClassifyItem::Classified(outcome.clone()),
                None => ClassifyItem::NotFound { product_id: id.clone() },
            })
            .collect())
    }

    /// Brand strings in the current view that the brand table does not resolve
    pub async fn unknown_brands(&self) -> Result<BTreeMap<String, usize>, SyncError> {
        let Some(view) = self.current().await else {
            return Ok(BTreeMap::new());
        };
        let brands = BrandTierTable::new(db::brand_tiers::load_all(&self.db).await?);

        let mut unknown = BTreeMap::new();
        for product in &view.products {
            let Some(brand) = product.product.brand.as_deref().or(product.attributes.brand.as_deref()) else {
                continue;
            };
            if brands.lookup(brand).is_none() {
                *unknown.entry(brand.trim().to_string()).or_insert(0) += 1;
            }
        }
        Ok(unknown)
    }
}

/// Product with everything but the archive classification resolved
struct Staged {
    product: Product,
    attributes: ProductAttributes,
    overrides: Option<OverrideEntry>,
    lifecycle: lifecycle::LifecycleAssessment,
    brand_tier: shelfsync_common::models::BrandTier,
}

impl Staged {
    fn manually_pinned(&self) -> bool {
        self.overrides.as_ref().map(|o| o.is_manually_pinned()).unwrap_or(false)
    }

    fn enrich(self, classification: Option<crate::models::ArchiveClassification>) -> EnrichedProduct {
        let pinned = self.overrides.as_ref().and_then(|o| o.pin()).map(|p| p.category);
        let display_category = pinned.unwrap_or_else(|| {
            DisplayCategory::for_stage(self.lifecycle.stage, classification.as_ref().map(|c| c.category))
        });
        let manually_pinned = self.manually_pinned();

        EnrichedProduct {
            product: self.product,
            attributes: self.attributes,
            overrides: self.overrides,
            lifecycle: self.lifecycle,
            brand_tier: self.brand_tier,
            classification,
            display_category,
            manually_pinned,
        }
    }
}

fn stage_product(
    product: Product,
    overrides: &HashMap<String, OverrideEntry>,
    brands: &BrandTierTable,
    now: DateTime<Utc>,
) -> Staged {
    let attributes = parse_product_name(&product.name);
    let overrides = overrides.get(&product.id).cloned();
    let lifecycle = lifecycle::classify(
        product.registered_at.as_deref(),
        overrides.as_ref().and_then(|o| o.override_date.as_deref()),
        now,
    );
    let brand_tier = product
        .brand
        .as_deref()
        .or(attributes.brand.as_deref())
        .map(|b| brands.tier_of(b))
        .unwrap_or_default();

    Staged {
        product,
        attributes,
        overrides,
        lifecycle,
        brand_tier,
    }
}
