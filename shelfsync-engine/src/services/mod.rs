//! Pipeline services
//!
//! Fetch → override merge → lifecycle and archive classification → cache,
//! plus the ranker and the rebalance job that read the cached view.

pub mod ai_classifier;
pub mod archive_classifier;
pub mod brand_tiers;
pub mod catalog_client;
pub mod catalog_fetcher;
pub mod keyword_tables;
pub mod lifecycle;
pub mod name_parser;
pub mod ranker;
pub mod rebalance_job;
pub mod sync_orchestrator;

pub use ai_classifier::{AiClassifier, AiConfig, AiSuggestion, HttpAiClassifier, NoSignal};
pub use archive_classifier::{ArchiveClassifier, ClassificationOutcome, ClassifierConfig};
pub use brand_tiers::{BrandTierEntry, BrandTierTable};
pub use catalog_client::{CatalogApi, CatalogConfig, CatalogError, HttpCatalogClient, UnconfiguredCatalog};
pub use catalog_fetcher::{CatalogFetcher, FetchError, FetchOptions, FetchResult};
pub use keyword_tables::KeywordTable;
pub use lifecycle::LifecycleAssessment;
pub use ranker::{RankingConfig, RankingContext, SalesPotentialRanker, ScoreBreakdown};
pub use rebalance_job::{RebalanceConfig, RebalanceError, RebalanceJob};
pub use sync_orchestrator::{SyncConfig, SyncError, SyncOrchestrator};
