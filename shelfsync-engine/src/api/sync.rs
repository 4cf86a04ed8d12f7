//! Scheduler entry points for the canonical view cache

use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::services::sync_orchestrator::CacheStatus;
use crate::{ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub force: bool,
}

/// POST /sync/refresh?force=
///
/// Returns the cache state afterwards. A failed refresh that still left a
/// view behind is reported through `last_error`, not as an HTTP error.
pub async fn refresh(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<CacheStatus>> {
    if let Err(e) = state.sync.refresh(query.force).await {
        if state.sync.current().await.is_none() {
            return Err(e.into());
        }
    }
    Ok(Json(state.sync.status().await))
}

/// POST /sync/invalidate
pub async fn invalidate(State(state): State<AppState>) -> Json<CacheStatus> {
    state.sync.invalidate();
    Json(state.sync.status().await)
}

/// Build sync routes
pub fn sync_routes() -> Router<AppState> {
    Router::new()
        .route("/sync/refresh", post(refresh))
        .route("/sync/invalidate", post(invalidate))
}
