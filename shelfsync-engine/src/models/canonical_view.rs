//! Canonical view: the merged, classified snapshot of the whole catalog
//!
//! A view is immutable once built. The orchestrator replaces it wholesale;
//! readers hold an `Arc` to whichever generation they picked up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfsync_common::models::{
    ArchiveCategory, BrandTier, ConditionGrade, DisplayCategory, LifecycleStage, ProductStatus,
};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::{ArchiveClassification, OverrideEntry, Product, ProductAttributes};
use crate::services::lifecycle::LifecycleAssessment;

/// Product with overrides merged and derived facets attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedProduct {
    #[serde(flatten)]
    pub product: Product,
    pub attributes: ProductAttributes,
    pub overrides: Option<OverrideEntry>,
    pub lifecycle: LifecycleAssessment,
    pub brand_tier: BrandTier,
    /// Present for ARCHIVE/CLEARANCE products without a manual pin
    pub classification: Option<ArchiveClassification>,
    pub display_category: DisplayCategory,
    pub manually_pinned: bool,
}

impl EnrichedProduct {
    /// Inspection grade: override first, then whatever the name declares
    pub fn grade(&self) -> Option<ConditionGrade> {
        self.overrides
            .as_ref()
            .and_then(|o| o.condition_grade)
            .or(self.attributes.grade)
    }

    pub fn stage(&self) -> LifecycleStage {
        self.lifecycle.stage
    }

    pub fn archive_category(&self) -> Option<ArchiveCategory> {
        self.classification.as_ref().map(|c| c.category)
    }

    pub fn confidence(&self) -> u8 {
        self.classification.as_ref().map(|c| c.confidence).unwrap_or(0)
    }
}

/// Counters from the fetch that produced a view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStats {
    /// Total reported by the catalog API
    pub total_count: u64,
    /// Records dropped while decoding or mapping
    pub dropped: usize,
    /// Records collapsed by id dedup
    pub duplicates: usize,
}

/// One cache generation
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalView {
    pub generation: Uuid,
    pub built_at: DateTime<Utc>,
    pub fetch: FetchStats,
    pub status_counts: BTreeMap<ProductStatus, usize>,
    pub products: Vec<EnrichedProduct>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl CanonicalView {
    pub fn new(products: Vec<EnrichedProduct>, fetch: FetchStats, built_at: DateTime<Utc>) -> Self {
        let mut status_counts = BTreeMap::new();
        for status in ProductStatus::ALL {
            status_counts.insert(status, 0);
        }
        for product in &products {
            *status_counts.entry(product.product.status).or_insert(0) += 1;
        }

        let index = products
            .iter()
            .enumerate()
            .map(|(i, p)| (p.product.id.clone(), i))
            .collect();

        Self {
            generation: Uuid::new_v4(),
            built_at,
            fetch,
            status_counts,
            products,
            index,
        }
    }

    pub fn get(&self, id: &str) -> Option<&EnrichedProduct> {
        self.index.get(id).map(|&i| &self.products[i])
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Product count per display category
    pub fn category_counts(&self) -> BTreeMap<DisplayCategory, usize> {
        let mut counts = BTreeMap::new();
        for product in &self.products {
            *counts.entry(product.display_category).or_insert(0) += 1;
        }
        counts
    }
}
