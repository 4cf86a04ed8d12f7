//! Database access for shelfsync-engine
//!
//! The engine owns only side tables: overrides, the classification audit
//! log, the brand tier table, settings and rebalance history. Product data
//! itself lives in the external catalog and in the in-memory canonical view.

pub mod brand_tiers;
pub mod classification_log;
pub mod overrides;
pub mod rebalance_moves;
pub mod settings;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Creates the file on first use, ensures tables exist and seeds the
/// built-in brand list when the brand table is empty.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;
    let seeded = brand_tiers::seed_defaults_if_empty(&pool).await?;
    if seeded > 0 {
        tracing::info!(brands = seeded, "Seeded default brand tier table");
    }

    Ok(pool)
}

/// Single-connection in-memory database with the schema applied
///
/// Every connection to `:memory:` is its own database, so the pool is
/// capped at one.
pub async fn open_in_memory() -> shelfsync_common::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create engine tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> shelfsync_common::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_overrides (
            id TEXT PRIMARY KEY,
            internal_category TEXT,
            category_source TEXT,
            override_date TEXT,
            condition_grade TEXT,
            ai_price INTEGER,
            ai_title TEXT,
            ai_description TEXT,
            approved INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classification_log (
            id TEXT PRIMARY KEY,
            product_id TEXT NOT NULL,
            product_name TEXT NOT NULL,
            category TEXT NOT NULL,
            confidence INTEGER NOT NULL,
            matched_keywords TEXT NOT NULL DEFAULT '[]',
            brand TEXT,
            brand_tier TEXT NOT NULL,
            gender TEXT NOT NULL,
            size TEXT,
            clothing_type TEXT NOT NULL,
            clothing_subtype TEXT,
            ai_consulted INTEGER NOT NULL DEFAULT 0,
            logged_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_classification_log_product
         ON classification_log (product_id, logged_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS brand_tiers (
            canonical TEXT PRIMARY KEY,
            aliases TEXT NOT NULL DEFAULT '[]',
            tier TEXT NOT NULL,
            affinity TEXT,
            country TEXT,
            notes TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rebalance_moves (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            from_category TEXT NOT NULL,
            to_category TEXT NOT NULL,
            score REAL NOT NULL,
            applied INTEGER NOT NULL,
            error TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_rebalance_moves_run ON rebalance_moves (run_id)")
        .execute(pool)
        .await?;

    tracing::info!(
        "Database tables initialized (settings, product_overrides, classification_log, brand_tiers, rebalance_moves)"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_tables_is_idempotent() {
        let pool = open_in_memory().await.unwrap();
        init_tables(&pool).await.unwrap();

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
             AND name IN ('settings', 'product_overrides', 'classification_log', 'brand_tiers', 'rebalance_moves')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn test_init_database_pool_seeds_brands_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("shelfsync.db");

        let pool = init_database_pool(&path).await.unwrap();
        let first = brand_tiers::load_all(&pool).await.unwrap();
        assert!(!first.is_empty());
        pool.close().await;

        let pool = init_database_pool(&path).await.unwrap();
        let second = brand_tiers::load_all(&pool).await.unwrap();
        assert_eq!(first.len(), second.len());
    }
}
