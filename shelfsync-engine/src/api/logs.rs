//! Classification log query

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db;
use crate::models::ClassificationLogEntry;
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub product_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    /// All entries matching the filter, not just this page
    pub total: i64,
    pub entries: Vec<ClassificationLogEntry>,
}

/// GET /classification/logs?product_id=&limit=
pub async fn recent_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> ApiResult<Json<LogResponse>> {
    let product_id = query.product_id.as_deref().map(str::trim).filter(|id| !id.is_empty());

    let entries = db::classification_log::recent(&state.db, product_id, query.limit).await?;
    let total = db::classification_log::count(&state.db, product_id).await?;

    Ok(Json(LogResponse { total, entries }))
}

/// Build log routes
pub fn log_routes() -> Router<AppState> {
    Router::new().route("/classification/logs", get(recent_logs))
}
