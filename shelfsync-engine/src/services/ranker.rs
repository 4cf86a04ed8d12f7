//! Sales-potential ranker
//!
//! `score(product, context)` orders candidates for placement. Higher is
//! better; the number has no meaning outside a sort. Each component is capped
//! on its own before summing, and the function is total: missing fields fall
//! back to the lowest contribution instead of failing.
//!
//! Everything the score depends on is either in the product snapshot or in
//! the caller-supplied [`RankingContext`]; the ranker never reads the clock.

use serde::{Deserialize, Serialize};
use shelfsync_common::models::{BrandTier, ClothingType, ConditionGrade, Gender};
use std::collections::HashSet;

use crate::models::EnrichedProduct;

/// Per-clothing-type points inside one temperature band
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonBand {
    /// Band applies when temperature is below this value (°C)
    pub below_celsius: f64,
    pub outer: f64,
    pub top: f64,
    pub bottom: f64,
    pub dress: f64,
    pub other: f64,
}

impl SeasonBand {
    fn points(&self, clothing_type: ClothingType) -> f64 {
        match clothing_type {
            ClothingType::Outer => self.outer,
            ClothingType::Top => self.top,
            ClothingType::Bottom => self.bottom,
            ClothingType::Dress => self.dress,
            ClothingType::Other => self.other,
        }
    }
}

/// `[ranking]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingConfig {
    /// Segments that always score exactly 0
    pub excluded_genders: Vec<Gender>,
    pub grade_v: f64,
    pub grade_s: f64,
    pub grade_a: f64,
    pub grade_b: f64,
    pub grade_cap: f64,
    pub tier_luxury: f64,
    pub tier_premium: f64,
    pub tier_high: f64,
    pub tier_mid: f64,
    pub tier_low: f64,
    pub tier_other: f64,
    pub tier_cap: f64,
    /// Recency points at age 0
    pub recency_max: f64,
    /// Age at which recency reaches 0
    pub recency_ceiling_days: f64,
    /// Points per confidence point
    pub confidence_weight: f64,
    pub confidence_cap: f64,
    /// Temperature bands, ascending by `below_celsius`
    pub season_bands: Vec<SeasonBand>,
    /// Deducted when the product is already featured elsewhere
    pub featured_penalty: f64,
    /// Bound on the whole context term, applied symmetrically
    pub context_cap: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        let band = |below_celsius, outer, top, bottom| SeasonBand {
            below_celsius,
            outer,
            top,
            bottom,
            dress: 0.0,
            other: 0.0,
        };

        Self {
            excluded_genders: vec![Gender::Kids],
            grade_v: 60.0,
            grade_s: 50.0,
            grade_a: 40.0,
            grade_b: 20.0,
            grade_cap: 60.0,
            tier_luxury: 50.0,
            tier_premium: 45.0,
            tier_high: 40.0,
            tier_mid: 30.0,
            tier_low: 20.0,
            tier_other: 10.0,
            tier_cap: 50.0,
            recency_max: 50.0,
            recency_ceiling_days: 25.0,
            confidence_weight: 0.25,
            confidence_cap: 25.0,
            season_bands: vec![
                band(5.0, 40.0, 10.0, 0.0),
                band(12.0, 25.0, 15.0, 5.0),
                band(20.0, 10.0, 20.0, 10.0),
                band(28.0, -20.0, 20.0, 15.0),
                band(f64::INFINITY, -40.0, 25.0, 20.0),
            ],
            featured_penalty: 15.0,
            context_cap: 40.0,
        }
    }
}

/// Caller-supplied situation for one ranking pass
#[derive(Debug, Clone, Default)]
pub struct RankingContext {
    /// Current temperature (°C); ignored when absent or not finite
    pub temperature_celsius: Option<f64>,
    /// Product ids already placed on another surface
    pub already_featured: HashSet<String>,
}

/// Score split by component
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub grade: f64,
    pub brand_tier: f64,
    pub recency: f64,
    pub confidence: f64,
    pub context: f64,
    pub total: f64,
    pub excluded: bool,
}

/// Snapshot fields the ranker reads
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankInput<'a> {
    pub id: &'a str,
    pub gender: Gender,
    pub grade: Option<ConditionGrade>,
    pub brand_tier: BrandTier,
    pub age_days: i64,
    pub confidence: u8,
    pub clothing_type: ClothingType,
}

impl<'a> RankInput<'a> {
    pub fn from_enriched(product: &'a EnrichedProduct) -> Self {
        Self {
            id: &product.product.id,
            gender: product.attributes.gender,
            grade: product.grade(),
            brand_tier: product.brand_tier,
            age_days: product.lifecycle.age_days,
            confidence: product.confidence(),
            clothing_type: product.attributes.clothing_type,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SalesPotentialRanker {
    config: RankingConfig,
}

impl SalesPotentialRanker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn is_excluded(&self, gender: Gender) -> bool {
        self.config.excluded_genders.contains(&gender)
    }

    /// Ordering score for one product
    pub fn score(&self, product: &EnrichedProduct, context: &RankingContext) -> f64 {
        self.breakdown(&RankInput::from_enriched(product), context).total
    }

    pub fn breakdown(&self, input: &RankInput<'_>, context: &RankingContext) -> ScoreBreakdown {
        if self.is_excluded(input.gender) {
            return ScoreBreakdown {
                excluded: true,
                ..Default::default()
            };
        }

        let grade = self.grade_points(input.grade);
        let brand_tier = self.tier_points(input.brand_tier);
        let recency = self.recency_points(input.age_days);
        let confidence = bounded(
            f64::from(input.confidence) * self.config.confidence_weight,
            0.0,
            self.config.confidence_cap,
        );
        let context_points = self.context_points(input, context);

        ScoreBreakdown {
            grade,
            brand_tier,
            recency,
            confidence,
            context: context_points,
            total: grade + brand_tier + recency + confidence + context_points,
            excluded: false,
        }
    }

    fn grade_points(&self, grade: Option<ConditionGrade>) -> f64 {
        // Ungraded counts as the lowest grade
        let points = match grade.unwrap_or(ConditionGrade::B) {
            ConditionGrade::V => self.config.grade_v,
            ConditionGrade::S => self.config.grade_s,
            ConditionGrade::A => self.config.grade_a,
            ConditionGrade::B => self.config.grade_b,
        };
        bounded(points, 0.0, self.config.grade_cap)
    }

    fn tier_points(&self, tier: BrandTier) -> f64 {
        let points = match tier {
            BrandTier::Luxury => self.config.tier_luxury,
            BrandTier::Premium => self.config.tier_premium,
            BrandTier::High => self.config.tier_high,
            BrandTier::Mid => self.config.tier_mid,
            BrandTier::Low => self.config.tier_low,
            BrandTier::Other => self.config.tier_other,
        };
        bounded(points, 0.0, self.config.tier_cap)
    }

    /// Linear decay from `recency_max` at age 0 to 0 at the ceiling
    pub fn recency_points(&self, age_days: i64) -> f64 {
        let ceiling = self.config.recency_ceiling_days;
        if !(ceiling > 0.0) {
            return 0.0;
        }
        let age = age_days.max(0) as f64;
        bounded(
            self.config.recency_max * (1.0 - age / ceiling),
            0.0,
            self.config.recency_max.max(0.0),
        )
    }

    fn context_points(&self, input: &RankInput<'_>, context: &RankingContext) -> f64 {
        let mut points = 0.0;

        if let Some(temperature) = context.temperature_celsius.filter(|t| t.is_finite()) {
            if let Some(band) = self
                .config
                .season_bands
                .iter()
                .find(|band| temperature < band.below_celsius)
            {
                points += band.points(input.clothing_type);
            }
        }

        if context.already_featured.contains(input.id) {
            points -= self.config.featured_penalty;
        }

        let cap = self.config.context_cap.abs();
        bounded(points, -cap, cap)
    }
}

/// Clamp that never panics and maps NaN to the lower bound
fn bounded(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    value.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: &str) -> RankInput<'_> {
        RankInput {
            id,
            gender: Gender::Man,
            grade: Some(ConditionGrade::A),
            brand_tier: BrandTier::Mid,
            age_days: 5,
            confidence: 60,
            clothing_type: ClothingType::Outer,
        }
    }

    #[test]
    fn test_excluded_segment_scores_zero() {
        let ranker = SalesPotentialRanker::default();
        let mut kid = input("k1");
        kid.gender = Gender::Kids;
        kid.grade = Some(ConditionGrade::V);
        kid.brand_tier = BrandTier::Luxury;
        kid.age_days = 0;
        kid.confidence = 100;

        let context = RankingContext {
            temperature_celsius: Some(0.0),
            ..Default::default()
        };
        let breakdown = ranker.breakdown(&kid, &context);
        assert_eq!(breakdown.total, 0.0);
        assert!(breakdown.excluded);
    }

    #[test]
    fn test_components_sum() {
        let ranker = SalesPotentialRanker::default();
        let breakdown = ranker.breakdown(&input("p1"), &RankingContext::default());
        assert_eq!(breakdown.grade, 40.0);
        assert_eq!(breakdown.brand_tier, 30.0);
        assert_eq!(breakdown.recency, 40.0);
        assert_eq!(breakdown.confidence, 15.0);
        assert_eq!(breakdown.context, 0.0);
        assert_eq!(breakdown.total, 125.0);
    }

    #[test]
    fn test_recency_monotonic_in_age() {
        let ranker = SalesPotentialRanker::default();
        let mut previous = f64::INFINITY;
        for age in 0..60 {
            let points = ranker.recency_points(age);
            assert!(points <= previous, "recency rose at age {}", age);
            previous = points;
        }
        assert_eq!(ranker.recency_points(0), 50.0);
        assert_eq!(ranker.recency_points(25), 0.0);
        assert_eq!(ranker.recency_points(400), 0.0);
        assert_eq!(ranker.recency_points(-3), 50.0);
    }

    #[test]
    fn test_missing_fields_are_neutral() {
        let ranker = SalesPotentialRanker::default();
        let bare = RankInput {
            id: "bare",
            ..Default::default()
        };
        let breakdown = ranker.breakdown(&bare, &RankingContext::default());
        assert_eq!(breakdown.grade, 20.0);
        assert_eq!(breakdown.brand_tier, 10.0);
        assert_eq!(breakdown.confidence, 0.0);
        assert!(breakdown.total.is_finite());
    }

    #[test]
    fn test_component_caps() {
        let config = RankingConfig {
            grade_v: 500.0,
            confidence_weight: 10.0,
            ..Default::default()
        };
        let ranker = SalesPotentialRanker::new(config);
        let mut top = input("p1");
        top.grade = Some(ConditionGrade::V);
        top.confidence = 100;
        let breakdown = ranker.breakdown(&top, &RankingContext::default());
        assert_eq!(breakdown.grade, 60.0);
        assert_eq!(breakdown.confidence, 25.0);
    }

    #[test]
    fn test_season_fit_for_outerwear() {
        let ranker = SalesPotentialRanker::default();
        let coat = input("coat");
        let cold = RankingContext {
            temperature_celsius: Some(-2.0),
            ..Default::default()
        };
        let hot = RankingContext {
            temperature_celsius: Some(31.0),
            ..Default::default()
        };
        assert_eq!(ranker.breakdown(&coat, &cold).context, 40.0);
        assert_eq!(ranker.breakdown(&coat, &hot).context, -40.0);
        assert!(ranker.breakdown(&coat, &cold).total > ranker.breakdown(&coat, &hot).total);
    }

    #[test]
    fn test_non_finite_temperature_ignored() {
        let ranker = SalesPotentialRanker::default();
        let context = RankingContext {
            temperature_celsius: Some(f64::NAN),
            ..Default::default()
        };
        assert_eq!(ranker.breakdown(&input("p1"), &context).context, 0.0);
    }

    #[test]
    fn test_featured_penalty_and_context_cap() {
        let ranker = SalesPotentialRanker::default();
        let mut context = RankingContext {
            temperature_celsius: Some(35.0),
            ..Default::default()
        };
        context.already_featured.insert("p1".to_string());
        // -40 season, -15 featured, clamped to -40
        assert_eq!(ranker.breakdown(&input("p1"), &context).context, -40.0);

        let mut shirt = input("p1");
        shirt.clothing_type = ClothingType::Top;
        // +25 season, -15 featured
        assert_eq!(ranker.breakdown(&shirt, &context).context, 10.0);
    }

    #[test]
    fn test_deterministic() {
        let ranker = SalesPotentialRanker::default();
        let context = RankingContext {
            temperature_celsius: Some(14.0),
            ..Default::default()
        };
        assert_eq!(
            ranker.breakdown(&input("p1"), &context),
            ranker.breakdown(&input("p1"), &context)
        );
    }
}
