//! Archive classification results and audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfsync_common::models::{ArchiveCategory, BrandTier, ClothingType, Gender};
use uuid::Uuid;

/// Outcome of one archive classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveClassification {
    pub category: ArchiveCategory,
    /// 0-100
    pub confidence: u8,
    pub matched_keywords: Vec<String>,
    /// Canonical brand when the lookup resolved, otherwise the raw brand
    pub brand: Option<String>,
    pub brand_tier: BrandTier,
    pub ai_consulted: bool,
    /// Human-readable evidence, in pipeline order
    pub reasons: Vec<String>,
}

impl ArchiveClassification {
    pub fn uncategorized(brand: Option<String>, brand_tier: BrandTier) -> Self {
        Self {
            category: ArchiveCategory::Uncategorized,
            confidence: 0,
            matched_keywords: Vec::new(),
            brand,
            brand_tier,
            ai_consulted: false,
            reasons: Vec::new(),
        }
    }
}

/// Append-only audit record, one per classification run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationLogEntry {
    pub id: Uuid,
    pub product_id: String,
    /// Name at the time of classification
    pub product_name: String,
    pub category: ArchiveCategory,
    pub confidence: u8,
    pub matched_keywords: Vec<String>,
    pub brand: Option<String>,
    pub brand_tier: BrandTier,
    pub gender: Gender,
    pub size: Option<String>,
    pub clothing_type: ClothingType,
    pub clothing_subtype: Option<String>,
    pub ai_consulted: bool,
    pub logged_at: DateTime<Utc>,
}
