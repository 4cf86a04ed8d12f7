//! HTTP API handlers

pub mod brands;
pub mod classify;
pub mod health;
pub mod logs;
pub mod overrides;
pub mod products;
pub mod rebalance;
pub mod settings;
pub mod sync;

pub use brands::brand_routes;
pub use classify::classify_routes;
pub use health::health_routes;
pub use logs::log_routes;
pub use overrides::override_routes;
pub use products::product_routes;
pub use rebalance::rebalance_routes;
pub use settings::settings_routes;
pub use sync::sync_routes;

use std::sync::Arc;

use crate::models::CanonicalView;
use crate::{ApiError, ApiResult, AppState};

/// View for read paths: fresh when possible, stale rather than an error
///
/// Fails only before the first successful population.
pub(crate) async fn readable_view(state: &AppState) -> ApiResult<Arc<CanonicalView>> {
    match state.sync.refresh(false).await {
        Ok(view) => Ok(view),
        Err(e) => match state.sync.current().await {
            Some(view) => {
                tracing::warn!(error = %e, "Serving stale canonical view");
                Ok(view)
            }
            None => Err(ApiError::from(e)),
        },
    }
}
