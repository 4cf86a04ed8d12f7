//! Settings database operations
//!
//! Key-value accessors over the `settings` table.

use sqlx::{Pool, Sqlite};
use shelfsync_common::{Error, Result};

const AI_API_KEY: &str = "ai_api_key";

/// AI collaborator key, if one was saved
pub async fn get_ai_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, AI_API_KEY).await
}

pub async fn set_ai_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, AI_API_KEY, key).await
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn setup_test_db() -> SqlitePool {
        crate::db::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_ai_key_roundtrip() {
        let pool = setup_test_db().await;
        assert_eq!(get_ai_api_key(&pool).await.unwrap(), None);

        set_ai_api_key(&pool, "first-key".to_string()).await.unwrap();
        set_ai_api_key(&pool, "second-key".to_string()).await.unwrap();
        assert_eq!(get_ai_api_key(&pool).await.unwrap().as_deref(), Some("second-key"));
    }

    #[tokio::test]
    async fn test_parse_failure_is_config_error() {
        let pool = setup_test_db().await;
        set_setting(&pool, "refresh_interval", "soon").await.unwrap();
        let result = get_setting::<u64>(&pool, "refresh_interval").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
