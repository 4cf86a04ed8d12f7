//! Settings API endpoint
//!
//! `PUT /settings/ai_api_key` stores the AI collaborator key in the database,
//! the highest-priority source. The running AI client keeps its key until
//! restart.

use axum::{extract::State, routing::put, Json, Router};
use serde::{Deserialize, Serialize};
use shelfsync_common::config::is_valid_key;
use tracing::info;

use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SetApiKeyRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct SetApiKeyResponse {
    pub success: bool,
    pub message: String,
}

/// PUT /settings/ai_api_key
///
/// **Errors:**
/// - 400 Bad Request: empty or whitespace-only key
/// - 500 Internal Server Error: database write failure
pub async fn set_ai_api_key(
    State(state): State<AppState>,
    Json(payload): Json<SetApiKeyRequest>,
) -> ApiResult<Json<SetApiKeyResponse>> {
    if !is_valid_key(&payload.api_key) {
        return Err(ApiError::BadRequest(
            "API key cannot be empty or whitespace-only".to_string(),
        ));
    }

    crate::db::settings::set_ai_api_key(&state.db, payload.api_key.trim().to_string())
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to save API key to database: {}", e)))?;

    info!("AI API key configured via settings endpoint");

    Ok(Json(SetApiKeyResponse {
        success: true,
        message: "AI API key saved; it takes effect on the next restart".to_string(),
    }))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/settings/ai_api_key", put(set_ai_api_key))
}
