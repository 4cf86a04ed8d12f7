//! Engine configuration
//!
//! One TOML file with a table per component. Every table has per-field
//! defaults, so a partial or missing file still yields a usable config.
//!
//! Secrets resolve Database → ENV → TOML.

use serde::{Deserialize, Serialize};
use shelfsync_common::config::{is_valid_key, LoggingConfig};
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::services::{AiConfig, CatalogConfig, ClassifierConfig, RankingConfig, RebalanceConfig, SyncConfig};

/// Environment variable holding the AI collaborator key
pub const AI_API_KEY_ENV: &str = "SHELFSYNC_AI_API_KEY";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5740;

/// Top-level TOML layout
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub logging: LoggingConfig,
    pub catalog: CatalogConfig,
    pub ai: AiConfig,
    pub sync: SyncConfig,
    pub classifier: ClassifierConfig,
    pub ranking: RankingConfig,
    pub rebalance: RebalanceConfig,
}

impl EngineConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Resolve the AI collaborator key
///
/// **Priority:** Database → ENV → TOML. `None` means AI stays disabled.
pub async fn resolve_ai_api_key(
    db: &Pool<Sqlite>,
    config: &AiConfig,
) -> shelfsync_common::Result<Option<String>> {
    let db_key = crate::db::settings::get_ai_api_key(db)
        .await?
        .filter(|k| is_valid_key(k));
    let env_key = std::env::var(AI_API_KEY_ENV).ok().filter(|k| is_valid_key(k));
    let toml_key = config.api_key.clone().filter(|k| is_valid_key(k));

    let sources: Vec<&str> = [
        db_key.as_ref().map(|_| "database"),
        env_key.as_ref().map(|_| "environment"),
        toml_key.as_ref().map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.len() > 1 {
        warn!(
            "AI API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    match sources.first() {
        Some(source) => info!("AI API key loaded from {}", source),
        None => info!("No AI API key configured; AI classification disabled"),
    }

    Ok(db_key.or(env_key).or(toml_key))
}
