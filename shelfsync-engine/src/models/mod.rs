//! Data models for the ShelfSync engine

pub mod canonical_view;
pub mod classification;
pub mod overrides;
pub mod product;
pub mod rebalance;

pub use canonical_view::{CanonicalView, EnrichedProduct, FetchStats};
pub use classification::{ArchiveClassification, ClassificationLogEntry};
pub use overrides::{CategoryPin, FieldUpdate, OverrideEntry, OverrideFields};
pub use product::{Product, ProductAttributes};
pub use rebalance::{MoveOutcome, PlannedMove, RebalanceRun, RebalanceState, RebalanceSummary};
