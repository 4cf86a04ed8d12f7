//! Override endpoints
//!
//! - `PUT /overrides/category`: bulk manual pin (`{ids, category}`) or unpin
//!   (`{ids, reset: true}`)
//! - `GET /overrides/:id`: stored override row
//! - `PATCH /overrides/:id`: partial write; an absent key leaves the field
//!   alone, `null` clears it
//!
//! Every write invalidates the canonical view so the change shows up on the
//! next read without waiting for the TTL.

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shelfsync_common::models::{CategorySource, DisplayCategory};

use crate::db;
use crate::models::{OverrideEntry, OverrideFields};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CategoryOverrideRequest {
    pub ids: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub reset: bool,
}

#[derive(Debug, Serialize)]
pub struct CategoryOverrideResponse {
    /// Pinned display category, absent on reset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<DisplayCategory>,
    pub updated: u64,
}

/// PUT /overrides/category
pub async fn put_category(
    State(state): State<AppState>,
    Json(request): Json<CategoryOverrideRequest>,
) -> ApiResult<Json<CategoryOverrideResponse>> {
    let ids: Vec<String> = request
        .ids
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    if ids.is_empty() {
        return Err(ApiError::BadRequest("ids must contain at least one product id".to_string()));
    }

    let now = state.sync.now();
    let response = match (request.category.as_deref(), request.reset) {
        (Some(_), true) => {
            return Err(ApiError::BadRequest("Give either category or reset, not both".to_string()))
        }
        (None, false) => return Err(ApiError::BadRequest("Missing category or reset flag".to_string())),
        (None, true) => {
            let updated = db::overrides::reset(&state.db, &ids, now).await?;
            tracing::info!(count = ids.len(), "Category pins reset");
            CategoryOverrideResponse { category: None, updated }
        }
        (Some(raw), false) => {
            let category: DisplayCategory = raw
                .parse()
                .map_err(|e| ApiError::BadRequest(format!("Invalid category: {}", e)))?;
            let fields = OverrideFields::pin(category, CategorySource::Manual);
            let updated = db::overrides::bulk_upsert(&state.db, &ids, &fields, now).await?;
            tracing::info!(count = updated, category = %category, "Category pinned manually");
            CategoryOverrideResponse {
                category: Some(category),
                updated: updated as u64,
            }
        }
    };

    state.sync.invalidate();
    Ok(Json(response))
}

/// GET /overrides/:id
pub async fn get_override(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<OverrideEntry>> {
    db::overrides::get_one(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No override for product {}", id)))
}

/// PATCH /overrides/:id
pub async fn patch_override(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(fields): Json<OverrideFields>,
) -> ApiResult<Json<Option<OverrideEntry>>> {
    if id.trim().is_empty() {
        return Err(ApiError::BadRequest("Product id is required".to_string()));
    }

    if !fields.is_empty() {
        db::overrides::upsert(&state.db, &id, &fields, state.sync.now()).await?;
        state.sync.invalidate();
    }

    Ok(Json(db::overrides::get_one(&state.db, &id).await?))
}

/// Build override routes
pub fn override_routes() -> Router<AppState> {
    Router::new()
        .route("/overrides/category", put(put_category))
        .route("/overrides/:id", get(get_override).patch(patch_override))
}
