//! On-demand archive classification
//!
//! `POST /classify` with `{"ids": [...], "use_ai": bool}`. Each id gets its own
//! result; unknown ids are reported, not fatal. Every classified product also
//! gets a classification log entry. Overrides are left untouched.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::services::sync_orchestrator::ClassifyItem;
use crate::{ApiError, ApiResult, AppState};

/// Upper bound on ids per request
pub const MAX_CLASSIFY_IDS: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub ids: Vec<String>,
    #[serde(default)]
    pub use_ai: bool,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub classified: usize,
    pub not_found: usize,
    pub results: Vec<ClassifyItem>,
}

/// POST /classify
pub async fn classify(
    State(state): State<AppState>,
    Json(request): Json<ClassifyRequest>,
) -> ApiResult<Json<ClassifyResponse>> {
    let ids: Vec<String> = request
        .ids
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();

    if ids.is_empty() {
        return Err(ApiError::BadRequest("ids must contain at least one product id".to_string()));
    }
    if ids.len() > MAX_CLASSIFY_IDS {
        return Err(ApiError::BadRequest(format!(
            "At most {} ids per request (got {})",
            MAX_CLASSIFY_IDS,
            ids.len()
        )));
    }

    let results = state.sync.classify_ids(&ids, request.use_ai).await?;
    let classified = results
        .iter()
        .filter(|r| matches!(r, ClassifyItem::Classified(_)))
        .count();

    tracing::info!(
        requested = ids.len(),
        classified,
        use_ai = request.use_ai,
        "Classified products on demand"
    );

    Ok(Json(ClassifyResponse {
        classified,
        not_found: results.len() - classified,
        results,
    }))
}

/// Build classify routes
pub fn classify_routes() -> Router<AppState> {
    Router::new().route("/classify", post(classify))
}
