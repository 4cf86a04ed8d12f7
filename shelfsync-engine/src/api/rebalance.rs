//! Rebalance endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::db;
use crate::db::rebalance_moves::MoveRecord;
use crate::models::RebalanceSummary;
use crate::{ApiError, ApiResult, AppState};

/// POST /rebalance
///
/// Runs synchronously and returns the summary. 409 while another run is active.
pub async fn trigger_rebalance(State(state): State<AppState>) -> ApiResult<Json<RebalanceSummary>> {
    let summary = state.rebalance.run().await?;
    Ok(Json(summary))
}

/// GET /rebalance/:run_id/moves
pub async fn run_moves(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<Vec<MoveRecord>>> {
    let run_id = Uuid::parse_str(&run_id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid run id: {}", e)))?;
    Ok(Json(db::rebalance_moves::for_run(&state.db, run_id).await?))
}

/// Build rebalance routes
pub fn rebalance_routes() -> Router<AppState> {
    Router::new()
        .route("/rebalance", post(trigger_rebalance))
        .route("/rebalance/:run_id/moves", get(run_moves))
}
