//! Canonical view listing
//!
//! `GET /products`: paged (100/page), filterable by lifecycle stage, display
//! category, archive category and status. `sort=score` orders by sales
//! potential, highest first, using the optional `temperature` and `featured`
//! (comma-separated ids) context.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfsync_common::models::{ArchiveCategory, DisplayCategory, LifecycleStage, ProductStatus};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

use super::readable_view;
use crate::models::EnrichedProduct;
use crate::pagination::{calculate_pagination, PAGE_SIZE};
use crate::services::{RankingContext, ScoreBreakdown};
use crate::services::ranker::RankInput;
use crate::{ApiError, ApiResult, AppState};

/// Query parameters for the listing
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    pub stage: Option<String>,
    pub category: Option<String>,
    pub archive_category: Option<String>,
    pub status: Option<String>,
    /// `score` for sales-potential order; catalog order otherwise
    pub sort: Option<String>,
    pub temperature: Option<f64>,
    pub featured: Option<String>,
}

fn default_page() -> usize {
    1
}

#[derive(Debug, Serialize)]
pub struct ListedProduct<'a> {
    #[serde(flatten)]
    pub product: &'a EnrichedProduct,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreBreakdown>,
}

#[derive(Debug, Serialize)]
pub struct ProductPage<'a> {
    pub generation: Uuid,
    pub built_at: DateTime<Utc>,
    pub stale: bool,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub status_counts: &'a BTreeMap<ProductStatus, usize>,
    pub category_counts: BTreeMap<DisplayCategory, usize>,
    pub products: &'a [ListedProduct<'a>],
}

/// Parsed filters
#[derive(Debug, Default)]
struct Filters {
    stage: Option<LifecycleStage>,
    category: Option<DisplayCategory>,
    archive_category: Option<ArchiveCategory>,
    status: Option<ProductStatus>,
}

impl Filters {
    fn from_query(query: &ProductQuery) -> ApiResult<Self> {
        Ok(Self {
            stage: parse_param("stage", query.stage.as_deref())?,
            category: parse_param("category", query.category.as_deref())?,
            archive_category: parse_param("archive_category", query.archive_category.as_deref())?,
            status: parse_param("status", query.status.as_deref())?,
        })
    }

    fn matches(&self, product: &EnrichedProduct) -> bool {
        self.stage.map_or(true, |s| product.stage() == s)
            && self.category.map_or(true, |c| product.display_category == c)
            && self
                .archive_category
                .map_or(true, |a| product.archive_category() == Some(a))
            && self.status.map_or(true, |s| product.product.status == s)
    }
}

fn parse_param<T>(name: &str, raw: Option<&str>) -> ApiResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e| ApiError::BadRequest(format!("Invalid {}: {}", name, e))),
    }
}

/// GET /products
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let filters = Filters::from_query(&query)?;
    let sort_by_score = match query.sort.as_deref() {
        None | Some("") | Some("catalog") => false,
        Some("score") => true,
        Some(other) => return Err(ApiError::BadRequest(format!("Unknown sort: {}", other))),
    };

    let view = readable_view(&state).await?;
    let stale = state.sync.status().await.stale;

    let mut listed: Vec<ListedProduct<'_>> = view
        .products
        .iter()
        .filter(|p| filters.matches(p))
        .map(|product| ListedProduct { product, score: None })
        .collect();

    if sort_by_score {
        let context = RankingContext {
            temperature_celsius: query.temperature,
            already_featured: query
                .featured
                .as_deref()
                .unwrap_or("")
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
        };
        for item in listed.iter_mut() {
            item.score = Some(state.ranker.breakdown(&RankInput::from_enriched(item.product), &context));
        }
        listed.sort_by(|a, b| {
            let a_total = a.score.map(|s| s.total).unwrap_or(0.0);
            let b_total = b.score.map(|s| s.total).unwrap_or(0.0);
            b_total
                .partial_cmp(&a_total)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.product.product.id.cmp(&b.product.product.id))
        });
    }

    let pagination = calculate_pagination(listed.len(), query.page);

    let page = ProductPage {
        generation: view.generation,
        built_at: view.built_at,
        stale,
        total: listed.len(),
        page: pagination.page,
        page_size: PAGE_SIZE,
        total_pages: pagination.total_pages,
        status_counts: &view.status_counts,
        category_counts: view.category_counts(),
        products: pagination.slice(&listed),
    };

    serde_json::to_value(&page)
        .map(Json)
        .map_err(|e| ApiError::Internal(format!("Serialize product page failed: {}", e)))
}

/// GET /products/:id
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EnrichedProduct>> {
    let view = readable_view(&state).await?;
    view.get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Product {}", id)))
}

/// Build product routes
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
}
