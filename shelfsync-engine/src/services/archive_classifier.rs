//! Archive classifier
//!
//! Assigns an archive sub-category with a confidence score. Three signal
//! sources run in order and each stage stops the pipeline on a confident hit:
//!
//! 1. Keyword matcher: fixed increment per distinct keyword, capped per category
//! 2. Brand-tier signal: the brand's category affinity adds a separate contribution
//! 3. AI fallback: only below the confidence threshold, only when `use_ai`
//!
//! The result depends only on (name, brand, tables, AI answer). Prior
//! classifications are never consulted.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use shelfsync_common::models::{ArchiveCategory, BrandTier};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::ai_classifier::{AiClassifier, AiProductSnapshot, NoSignal};
use super::brand_tiers::BrandTierTable;
use super::keyword_tables::KeywordTable;
use crate::models::{ArchiveClassification, ClassificationLogEntry, Product, ProductAttributes};

/// Upper bound on log entries appended per write during batch runs
const LOG_CHUNK_SIZE: usize = 50;

/// `[classifier]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Points per distinct keyword hit
    pub keyword_increment: u32,
    /// Keyword stage maximum per category
    pub keyword_cap: u32,
    /// Points added to a brand's affinity category
    pub brand_affinity_points: u32,
    /// Maximum contribution of an AI suggestion
    pub ai_cap: u32,
    /// A stage whose best category reaches this score ends the pipeline
    pub confident_threshold: u32,
    /// Scores below this never become the final category
    pub min_category_score: u32,
    /// Tie-break order, highest priority first
    pub priority: Vec<ArchiveCategory>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            keyword_increment: 20,
            keyword_cap: 60,
            brand_affinity_points: 30,
            ai_cap: 70,
            confident_threshold: 40,
            min_category_score: 10,
            priority: ArchiveCategory::CLASSIFIED.to_vec(),
        }
    }
}

/// Classification plus the audit record it produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationOutcome {
    pub product_id: String,
    pub classification: ArchiveClassification,
    pub log_entry: ClassificationLogEntry,
}

/// Working state of one run
struct Scoring {
    scores: HashMap<ArchiveCategory, u32>,
    matched_keywords: Vec<String>,
    reasons: Vec<String>,
    ai_consulted: bool,
}

pub struct ArchiveClassifier {
    config: ClassifierConfig,
    keywords: Arc<KeywordTable>,
    brands: Arc<BrandTierTable>,
    ai: Option<Arc<dyn AiClassifier>>,
    /// Config priority followed by any category it omits
    priority: Vec<ArchiveCategory>,
}

impl ArchiveClassifier {
    pub fn new(config: ClassifierConfig, keywords: Arc<KeywordTable>, brands: Arc<BrandTierTable>) -> Self {
        let mut priority: Vec<ArchiveCategory> = Vec::new();
        for category in config
            .priority
            .iter()
            .copied()
            .chain(ArchiveCategory::CLASSIFIED)
        {
            if category.is_classified() && !priority.contains(&category) {
                priority.push(category);
            }
        }

        Self {
            config,
            keywords,
            brands,
            ai: None,
            priority,
        }
    }

    /// Attach the optional AI collaborator
    pub fn with_ai(mut self, ai: Arc<dyn AiClassifier>) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn brands(&self) -> &BrandTierTable {
        &self.brands
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one product
    pub async fn classify(
        &self,
        product: &Product,
        attributes: &ProductAttributes,
        use_ai: bool,
        now: DateTime<Utc>,
    ) -> ClassificationOutcome {
        let brand_input = product.brand.clone().or_else(|| attributes.brand.clone());
        let brand_entry = brand_input.as_deref().and_then(|b| self.brands.lookup(b));
        let brand_tier = brand_entry.map(|e| e.tier).unwrap_or(BrandTier::Other);
        let brand = brand_entry.map(|e| e.canonical.clone()).or(brand_input.clone());

        let mut scoring = Scoring {
            scores: HashMap::new(),
            matched_keywords: Vec::new(),
            reasons: Vec::new(),
            ai_consulted: false,
        };

        // Stage 1: keywords
        let haystack = format!("{} {}", product.name, brand_input.as_deref().unwrap_or("")).to_lowercase();
        for entry in self.keywords.categories() {
            let hits = entry.matches(&haystack);
            if hits.is_empty() {
                continue;
            }
            let hit_count = u32::try_from(hits.len()).unwrap_or(u32::MAX);
            let points = self.config.keyword_increment.saturating_mul(hit_count).min(self.config.keyword_cap);
            let score = scoring.scores.entry(entry.category).or_insert(0);
            *score = score.saturating_add(points);
            scoring
                .reasons
                .push(format!("keywords {} +{} ({})", entry.category, points, hits.join(", ")));
            scoring.matched_keywords.extend(hits.into_iter().map(str::to_string));
        }

        // Stage 2: brand affinity
        if !self.is_confident(&scoring.scores) {
            if let Some(entry) = brand_entry {
                if let Some(affinity) = entry.affinity.filter(|a| a.is_classified()) {
                    let score = scoring.scores.entry(affinity).or_insert(0);
                    *score = score.saturating_add(self.config.brand_affinity_points);
                    scoring.reasons.push(format!(
                        "brand {} ({}) +{} {}",
                        entry.canonical,
                        entry.tier.as_str(),
                        self.config.brand_affinity_points,
                        affinity
                    ));
                }
            }
        }

        // Stage 3: AI fallback
        if use_ai && !self.is_confident(&scoring.scores) {
            self.consult_ai(product, brand_input.clone(), &mut scoring).await;
        }

        let classification = self.decide(scoring, brand, brand_tier);
        let log_entry = ClassificationLogEntry {
            id: Uuid::new_v4(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            category: classification.category,
            confidence: classification.confidence,
            matched_keywords: classification.matched_keywords.clone(),
            brand: classification.brand.clone(),
            brand_tier: classification.brand_tier,
            gender: attributes.gender,
            size: attributes.size.clone(),
            clothing_type: attributes.clothing_type,
            clothing_subtype: attributes.clothing_subtype.clone(),
            ai_consulted: classification.ai_consulted,
            logged_at: now,
        };

        ClassificationOutcome {
            product_id: product.id.clone(),
            classification,
            log_entry,
        }
    }

    /// Classify many products with bounded concurrency, appending log entries
    /// as results arrive
    ///
    /// Stops early when `cancel` fires; entries already appended stay valid.
    /// A log write failure is logged and does not discard the results.
    pub async fn classify_and_log(
        &self,
        db: &SqlitePool,
        items: &[(Product, ProductAttributes)],
        use_ai: bool,
        fan_out: usize,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Vec<ClassificationOutcome> {
        let mut results = Vec::with_capacity(items.len());
        let pending: Vec<BoxFuture<'_, ClassificationOutcome>> = items
            .iter()
            .map(|(product, attributes)| self.classify(product, attributes, use_ai, now).boxed())
            .collect();
        let chunks = stream::iter(pending)
            .buffered(fan_out.max(1))
            .ready_chunks(LOG_CHUNK_SIZE);
        tokio::pin!(chunks);

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!(
                        completed = results.len(),
                        total = items.len(),
                        "Classification batch cancelled"
                    );
                    break;
                }
                chunk = chunks.next() => chunk,
            };
            let Some(chunk) = chunk else { break };

            let entries: Vec<ClassificationLogEntry> = chunk.iter().map(|o| o.log_entry.clone()).collect();
            if let Err(e) = crate::db::classification_log::append_batch(db, &entries).await {
                tracing::error!(error = %e, entries = entries.len(), "Failed to append classification log entries");
            }
            results.extend(chunk);
        }

        results
    }

    async fn consult_ai(&self, product: &Product, brand: Option<String>, scoring: &mut Scoring) {
        let Some(ai) = &self.ai else {
            scoring.reasons.push(format!("ai skipped: {}", NoSignal::Disabled));
            return;
        };

        scoring.ai_consulted = true;
        let snapshot = AiProductSnapshot {
            product_id: product.id.clone(),
            name: product.name.clone(),
            brand,
            price: product.price,
        };

        match ai.suggest(&snapshot).await {
            Ok(suggestion) => {
                let points = u32::from(suggestion.confidence).min(self.config.ai_cap);
                let score = scoring.scores.entry(suggestion.category).or_insert(0);
                *score = score.saturating_add(points);
                scoring.reasons.push(format!(
                    "ai {} +{}{}",
                    suggestion.category,
                    points,
                    suggestion
                        .reason
                        .map(|r| format!(" ({})", r))
                        .unwrap_or_default()
                ));
            }
            Err(no_signal) => {
                tracing::debug!(product_id = %product.id, reason = %no_signal, "No AI suggestion");
                scoring.reasons.push(format!("ai no signal: {}", no_signal));
            }
        }
    }

    fn is_confident(&self, scores: &HashMap<ArchiveCategory, u32>) -> bool {
        self.best(scores)
            .map(|(_, score)| score >= self.config.confident_threshold)
            .unwrap_or(false)
    }

    /// Highest score; ties go to the earlier category in priority order
    fn best(&self, scores: &HashMap<ArchiveCategory, u32>) -> Option<(ArchiveCategory, u32)> {
        let mut best: Option<(ArchiveCategory, u32)> = None;
        for &category in &self.priority {
            let score = scores.get(&category).copied().unwrap_or(0);
            if score == 0 {
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((category, score)),
            }
        }
        best
    }

    fn decide(&self, scoring: Scoring, brand: Option<String>, brand_tier: BrandTier) -> ArchiveClassification {
        let (category, confidence) = match self.best(&scoring.scores) {
            Some((category, score)) if score >= self.config.min_category_score => {
                (category, score.min(100) as u8)
            }
            _ => (ArchiveCategory::Uncategorized, 0),
        };

        ArchiveClassification {
            category,
            confidence,
            matched_keywords: scoring.matched_keywords,
            brand,
            brand_tier,
            ai_consulted: scoring.ai_consulted,
            reasons: scoring.reasons,
        }
    }
}
