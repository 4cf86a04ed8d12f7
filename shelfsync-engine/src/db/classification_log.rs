//! Classification audit log
//!
//! Append-only. One row per classification run; earlier rows for the same
//! product are never rewritten.

use chrono::{DateTime, Utc};
use shelfsync_common::models::{ArchiveCategory, BrandTier, ClothingType, Gender};
use shelfsync_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::ClassificationLogEntry;

/// Append entries in one transaction, returns the number written
pub async fn append_batch(db: &SqlitePool, entries: &[ClassificationLogEntry]) -> Result<usize> {
    if entries.is_empty() {
        return Ok(0);
    }

    let mut tx = db.begin().await.map_err(Error::Database)?;

    for entry in entries {
        let keywords = serde_json::to_string(&entry.matched_keywords)
            .map_err(|e| Error::Internal(format!("Failed to encode keywords: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO classification_log (
                id, product_id, product_name, category, confidence, matched_keywords,
                brand, brand_tier, gender, size, clothing_type, clothing_subtype,
                ai_consulted, logged_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(&entry.product_id)
        .bind(&entry.product_name)
        .bind(entry.category.as_str())
        .bind(i64::from(entry.confidence))
        .bind(keywords)
        .bind(&entry.brand)
        .bind(entry.brand_tier.as_str())
        .bind(entry.gender.as_str())
        .bind(&entry.size)
        .bind(entry.clothing_type.as_str())
        .bind(&entry.clothing_subtype)
        .bind(entry.ai_consulted)
        .bind(entry.logged_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;
    }

    tx.commit().await.map_err(Error::Database)?;

    tracing::debug!(entries = entries.len(), "Appended classification log entries");
    Ok(entries.len())
}

/// Most recent entries first, optionally for one product
pub async fn recent(
    db: &SqlitePool,
    product_id: Option<&str>,
    limit: i64,
) -> Result<Vec<ClassificationLogEntry>> {
    let limit = limit.clamp(1, 1000);

    let rows = match product_id {
        Some(product_id) => {
            sqlx::query(
                "SELECT * FROM classification_log WHERE product_id = ?
                 ORDER BY logged_at DESC, rowid DESC LIMIT ?",
            )
            .bind(product_id)
            .bind(limit)
            .fetch_all(db)
            .await
        }
        None => {
            sqlx::query("SELECT * FROM classification_log ORDER BY logged_at DESC, rowid DESC LIMIT ?")
                .bind(limit)
                .fetch_all(db)
                .await
        }
    }
    .map_err(Error::Database)?;

    rows.iter().map(entry_from_row).collect()
}

/// Total rows, optionally for one product
pub async fn count(db: &SqlitePool, product_id: Option<&str>) -> Result<i64> {
    let (count,): (i64,) = match product_id {
        Some(product_id) => {
            sqlx::query_as("SELECT COUNT(*) FROM classification_log WHERE product_id = ?")
                .bind(product_id)
                .fetch_one(db)
                .await
        }
        None => {
            sqlx::query_as("SELECT COUNT(*) FROM classification_log")
                .fetch_one(db)
                .await
        }
    }
    .map_err(Error::Database)?;

    Ok(count)
}

fn entry_from_row(row: &SqliteRow) -> Result<ClassificationLogEntry> {
    let id: String = row.try_get("id").map_err(Error::Database)?;
    let category: String = row.try_get("category").map_err(Error::Database)?;
    let confidence: i64 = row.try_get("confidence").map_err(Error::Database)?;
    let keywords: String = row.try_get("matched_keywords").map_err(Error::Database)?;
    let brand_tier: String = row.try_get("brand_tier").map_err(Error::Database)?;
    let gender: String = row.try_get("gender").map_err(Error::Database)?;
    let clothing_type: String = row.try_get("clothing_type").map_err(Error::Database)?;
    let logged_at: String = row.try_get("logged_at").map_err(Error::Database)?;

    Ok(ClassificationLogEntry {
        id: Uuid::parse_str(&id).map_err(|e| Error::Internal(format!("Invalid log id: {}", e)))?,
        product_id: row.try_get("product_id").map_err(Error::Database)?,
        product_name: row.try_get("product_name").map_err(Error::Database)?,
        category: category.parse::<ArchiveCategory>()?,
        confidence: confidence.clamp(0, 100) as u8,
        matched_keywords: serde_json::from_str(&keywords).unwrap_or_default(),
        brand: row.try_get("brand").map_err(Error::Database)?,
        brand_tier: brand_tier.parse::<BrandTier>().unwrap_or_default(),
        gender: Gender::parse(&gender),
        size: row.try_get("size").map_err(Error::Database)?,
        clothing_type: ClothingType::parse(&clothing_type),
        clothing_subtype: row.try_get("clothing_subtype").map_err(Error::Database)?,
        ai_consulted: row.try_get("ai_consulted").map_err(Error::Database)?,
        logged_at: parse_stored_time(&logged_at)?,
    })
}

pub(crate) fn parse_stored_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    async fn setup_test_db() -> SqlitePool {
        crate::db::open_in_memory().await.unwrap()
    }

    fn entry(product_id: &str, category: ArchiveCategory, minutes: i64) -> ClassificationLogEntry {
        ClassificationLogEntry {
            id: Uuid::new_v4(),
            product_id: product_id.to_string(),
            product_name: "M-65 Field Jacket".to_string(),
            category,
            confidence: 60,
            matched_keywords: vec!["m-65".to_string(), "field jacket".to_string()],
            brand: Some("ROTHCO".to_string()),
            brand_tier: BrandTier::Mid,
            gender: Gender::Man,
            size: Some("L".to_string()),
            clothing_type: ClothingType::Outer,
            clothing_subtype: Some("jacket".to_string()),
            ai_consulted: false,
            logged_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let pool = setup_test_db().await;
        let original = entry("p1", ArchiveCategory::MilitaryArchive, 0);
        append_batch(&pool, std::slice::from_ref(&original)).await.unwrap();

        let rows = recent(&pool, Some("p1"), 10).await.unwrap();
        assert_eq!(rows, vec![original]);
    }

    #[tokio::test]
    async fn test_reclassification_appends_instead_of_rewriting() {
        let pool = setup_test_db().await;
        append_batch(&pool, &[entry("p1", ArchiveCategory::Uncategorized, 0)])
            .await
            .unwrap();
        append_batch(&pool, &[entry("p1", ArchiveCategory::MilitaryArchive, 5)])
            .await
            .unwrap();

        let rows = recent(&pool, Some("p1"), 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category, ArchiveCategory::MilitaryArchive);
        assert_eq!(rows[1].category, ArchiveCategory::Uncategorized);
        assert_eq!(count(&pool, Some("p1")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_recent_filters_and_limits() {
        let pool = setup_test_db().await;
        let entries: Vec<_> = (0..5)
            .map(|i| entry(if i % 2 == 0 { "even" } else { "odd" }, ArchiveCategory::OutdoorArchive, i))
            .collect();
        assert_eq!(append_batch(&pool, &entries).await.unwrap(), 5);

        assert_eq!(recent(&pool, Some("even"), 10).await.unwrap().len(), 3);
        assert_eq!(recent(&pool, None, 2).await.unwrap().len(), 2);
        assert_eq!(count(&pool, None).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let pool = setup_test_db().await;
        assert_eq!(append_batch(&pool, &[]).await.unwrap(), 0);
    }
}
