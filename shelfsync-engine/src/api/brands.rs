//! Brand tier administration
//!
//! Changes take effect on the next refresh; every write invalidates the view.

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;

use crate::db;
use crate::services::BrandTierEntry;
use crate::{ApiError, ApiResult, AppState};

/// GET /brands
pub async fn list_brands(State(state): State<AppState>) -> ApiResult<Json<Vec<BrandTierEntry>>> {
    Ok(Json(db::brand_tiers::load_all(&state.db).await?))
}

/// PUT /brands
///
/// Upsert by canonical name; the stored (normalized) entry is returned.
pub async fn put_brand(
    State(state): State<AppState>,
    Json(entry): Json<BrandTierEntry>,
) -> ApiResult<Json<BrandTierEntry>> {
    let saved = db::brand_tiers::upsert(&state.db, &entry).await?;
    state.sync.invalidate();
    Ok(Json(saved))
}

/// DELETE /brands/:name
pub async fn delete_brand(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if !db::brand_tiers::delete(&state.db, &name).await? {
        return Err(ApiError::NotFound(format!("Brand {}", name)));
    }
    state.sync.invalidate();
    Ok(Json(serde_json::json!({ "deleted": name })))
}

#[derive(Debug, Serialize)]
pub struct UnknownBrand {
    pub brand: String,
    pub products: usize,
}

/// GET /brands/unknown
///
/// Brands present in the current view that the table does not resolve,
/// most frequent first.
pub async fn unknown_brands(State(state): State<AppState>) -> ApiResult<Json<Vec<UnknownBrand>>> {
    let counts = state.sync.unknown_brands().await?;
    let mut brands: Vec<UnknownBrand> = counts
        .into_iter()
        .map(|(brand, products)| UnknownBrand { brand, products })
        .collect();
    brands.sort_by(|a, b| b.products.cmp(&a.products).then_with(|| a.brand.cmp(&b.brand)));
    Ok(Json(brands))
}

/// Build brand routes
pub fn brand_routes() -> Router<AppState> {
    Router::new()
        .route("/brands", get(list_brands).put(put_brand))
        .route("/brands/unknown", get(unknown_brands))
        .route("/brands/:name", delete(delete_brand))
}
