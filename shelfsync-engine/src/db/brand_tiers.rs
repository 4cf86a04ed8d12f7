//! Brand tier table persistence
//!
//! Administrators curate this table; the classifier only ever reads a
//! snapshot of it loaded at the start of a refresh.

use chrono::Utc;
use shelfsync_common::models::{ArchiveCategory, BrandTier};
use shelfsync_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::services::brand_tiers::{normalize_brand, BrandTierEntry, DEFAULT_BRANDS};

/// All entries, ordered by canonical name
pub async fn load_all(db: &SqlitePool) -> Result<Vec<BrandTierEntry>> {
    let rows = sqlx::query("SELECT * FROM brand_tiers ORDER BY canonical")
        .fetch_all(db)
        .await
        .map_err(Error::Database)?;

    rows.iter().map(entry_from_row).collect()
}

/// Insert or replace one entry (canonical name is normalized first)
pub async fn upsert(db: &SqlitePool, entry: &BrandTierEntry) -> Result<BrandTierEntry> {
    let mut entry = entry.clone();
    entry.canonical = normalize_brand(&entry.canonical);
    if entry.canonical.is_empty() {
        return Err(Error::InvalidInput("Brand name must not be empty".to_string()));
    }
    entry.aliases = entry
        .aliases
        .iter()
        .map(|a| normalize_brand(a))
        .filter(|a| !a.is_empty() && *a != entry.canonical)
        .collect();

    let aliases = serde_json::to_string(&entry.aliases)
        .map_err(|e| Error::Internal(format!("Failed to encode aliases: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO brand_tiers (canonical, aliases, tier, affinity, country, notes, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(canonical) DO UPDATE SET
            aliases = excluded.aliases,
            tier = excluded.tier,
            affinity = excluded.affinity,
            country = excluded.country,
            notes = excluded.notes,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&entry.canonical)
    .bind(aliases)
    .bind(entry.tier.as_str())
    .bind(entry.affinity.map(|a| a.as_str()))
    .bind(&entry.country)
    .bind(&entry.notes)
    .bind(Utc::now().to_rfc3339())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    tracing::info!(brand = %entry.canonical, tier = entry.tier.as_str(), "Brand tier saved");
    Ok(entry)
}

/// Delete by canonical name, returns whether a row existed
pub async fn delete(db: &SqlitePool, canonical: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM brand_tiers WHERE canonical = ?")
        .bind(normalize_brand(canonical))
        .execute(db)
        .await
        .map_err(Error::Database)?;

    Ok(result.rows_affected() > 0)
}

/// Insert the built-in brand list when the table is empty
///
/// Returns the number of entries inserted.
pub async fn seed_defaults_if_empty(db: &SqlitePool) -> Result<usize> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM brand_tiers")
        .fetch_one(db)
        .await
        .map_err(Error::Database)?;
    if count > 0 {
        return Ok(0);
    }

    for entry in DEFAULT_BRANDS.iter() {
        upsert(db, entry).await?;
    }
    Ok(DEFAULT_BRANDS.len())
}

fn entry_from_row(row: &SqliteRow) -> Result<BrandTierEntry> {
    let canonical: String = row.try_get("canonical").map_err(Error::Database)?;
    let aliases: String = row.try_get("aliases").map_err(Error::Database)?;
    let tier: String = row.try_get("tier").map_err(Error::Database)?;
    let affinity: Option<String> = row.try_get("affinity").map_err(Error::Database)?;

    Ok(BrandTierEntry {
        aliases: serde_json::from_str(&aliases).unwrap_or_default(),
        tier: tier.parse::<BrandTier>().unwrap_or_else(|_| {
            tracing::warn!(brand = %canonical, tier = %tier, "Unknown stored tier, using OTHER");
            BrandTier::Other
        }),
        affinity: affinity.and_then(|a| a.parse::<ArchiveCategory>().ok()),
        country: row.try_get("country").map_err(Error::Database)?,
        notes: row.try_get("notes").map_err(Error::Database)?,
        canonical,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test_db() -> SqlitePool {
        crate::db::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_seed_only_when_empty() {
        let pool = setup_test_db().await;
        let seeded = seed_defaults_if_empty(&pool).await.unwrap();
        assert_eq!(seeded, DEFAULT_BRANDS.len());
        assert_eq!(seed_defaults_if_empty(&pool).await.unwrap(), 0);
        assert_eq!(load_all(&pool).await.unwrap().len(), DEFAULT_BRANDS.len());
    }

    #[tokio::test]
    async fn test_upsert_normalizes_and_replaces() {
        let pool = setup_test_db().await;
        let entry = BrandTierEntry::new("kapital", BrandTier::High, Some(ArchiveCategory::JapaneseArchive))
            .with_aliases(&["캐피탈", "Kapital"]);
        let saved = upsert(&pool, &entry).await.unwrap();
        assert_eq!(saved.canonical, "KAPITAL");
        // alias equal to the canonical name is dropped
        assert_eq!(saved.aliases, vec!["캐피탈".to_string()]);

        let mut changed = saved.clone();
        changed.tier = BrandTier::Premium;
        upsert(&pool, &changed).await.unwrap();

        let all = load_all(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].tier, BrandTier::Premium);
        assert_eq!(all[0].affinity, Some(ArchiveCategory::JapaneseArchive));
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let pool = setup_test_db().await;
        let entry = BrandTierEntry::new("   ", BrandTier::Low, None);
        assert!(matches!(upsert(&pool, &entry).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let pool = setup_test_db().await;
        upsert(&pool, &BrandTierEntry::new("Filson", BrandTier::High, None))
            .await
            .unwrap();
        assert!(delete(&pool, "filson").await.unwrap());
        assert!(!delete(&pool, "filson").await.unwrap());
    }
}
