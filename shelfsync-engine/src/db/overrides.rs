//! Override store
//!
//! Side table of corrections keyed by product id. Writes are partial: only
//! the fields a caller touches are written, an explicit clear stores NULL and
//! everything else keeps its stored value. Rows are never deleted.
//!
//! Concurrent writers are last-write-wins per column.

use chrono::{DateTime, Utc};
use shelfsync_common::models::{CategorySource, ConditionGrade, DisplayCategory};
use shelfsync_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;

use super::classification_log::parse_stored_time;
use crate::models::{OverrideEntry, OverrideFields};
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Ids per `IN (...)` query, below SQLite's bound-parameter limit
const ID_CHUNK_SIZE: usize = 500;

/// Column value for a dynamic write
#[derive(Debug, Clone)]
enum ColumnValue {
    Text(Option<String>),
    Integer(Option<i64>),
    Flag(Option<bool>),
}

/// Touched columns in a fixed order
fn touched_columns(fields: &OverrideFields) -> Vec<(&'static str, ColumnValue)> {
    let mut columns = Vec::new();

    if let Some(pin) = fields.internal_category.as_write() {
        columns.push((
            "internal_category",
            ColumnValue::Text(pin.map(|p| p.category.as_str().to_string())),
        ));
        columns.push((
            "category_source",
            ColumnValue::Text(pin.map(|p| p.source.as_str().to_string())),
        ));
    }
    if let Some(value) = fields.override_date.as_write() {
        columns.push(("override_date", ColumnValue::Text(value.cloned())));
    }
    if let Some(value) = fields.condition_grade.as_write() {
        columns.push((
            "condition_grade",
            ColumnValue::Text(value.map(|g| g.as_str().to_string())),
        ));
    }
    if let Some(value) = fields.ai_price.as_write() {
        columns.push(("ai_price", ColumnValue::Integer(value.copied())));
    }
    if let Some(value) = fields.ai_title.as_write() {
        columns.push(("ai_title", ColumnValue::Text(value.cloned())));
    }
    if let Some(value) = fields.ai_description.as_write() {
        columns.push(("ai_description", ColumnValue::Text(value.cloned())));
    }
    if let Some(value) = fields.approved.as_write() {
        columns.push(("approved", ColumnValue::Flag(value.copied())));
    }

    columns
}

fn upsert_sql(columns: &[(&'static str, ColumnValue)]) -> String {
    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let placeholders = vec!["?"; names.len()].join(", ");
    let updates: Vec<String> = names
        .iter()
        .map(|name| format!("{name} = excluded.{name}"))
        .collect();

    format!(
        "INSERT INTO product_overrides (id, created_at, updated_at, {}) VALUES (?, ?, ?, {})
         ON CONFLICT(id) DO UPDATE SET {}, updated_at = excluded.updated_at",
        names.join(", "),
        placeholders,
        updates.join(", ")
    )
}

async fn upsert_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: &str,
    columns: &[(&'static str, ColumnValue)],
    now: DateTime<Utc>,
) -> Result<()> {
    let sql = upsert_sql(columns);
    let stamp = now.to_rfc3339();

    let mut query = sqlx::query(&sql).bind(id).bind(stamp.clone()).bind(stamp);
    for (_, value) in columns {
        query = match value {
            ColumnValue::Text(v) => query.bind(v.clone()),
            ColumnValue::Integer(v) => query.bind(*v),
            ColumnValue::Flag(v) => query.bind(*v),
        };
    }

    query.execute(&mut **tx).await.map_err(Error::Database)?;
    Ok(())
}

/// Overrides for the given ids; ids without a row are absent from the map
pub async fn get(db: &SqlitePool, ids: &[String]) -> Result<HashMap<String, OverrideEntry>> {
    let mut result = HashMap::with_capacity(ids.len());

    for chunk in ids.chunks(ID_CHUNK_SIZE) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("SELECT * FROM product_overrides WHERE id IN ({})", placeholders);

        let mut query = sqlx::query(&sql);
        for id in chunk {
            query = query.bind(id);
        }

        let rows = query.fetch_all(db).await.map_err(Error::Database)?;
        for row in &rows {
            let entry = entry_from_row(row)?;
            result.insert(entry.id.clone(), entry);
        }
    }

    Ok(result)
}

pub async fn get_one(db: &SqlitePool, id: &str) -> Result<Option<OverrideEntry>> {
    let row = sqlx::query("SELECT * FROM product_overrides WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    row.as_ref().map(entry_from_row).transpose()
}

/// Every stored override
pub async fn all(db: &SqlitePool) -> Result<HashMap<String, OverrideEntry>> {
    let rows = sqlx::query("SELECT * FROM product_overrides")
        .fetch_all(db)
        .await
        .map_err(Error::Database)?;

    let mut result = HashMap::with_capacity(rows.len());
    for row in &rows {
        let entry = entry_from_row(row)?;
        result.insert(entry.id.clone(), entry);
    }
    Ok(result)
}

/// Partial write for one id; a write that touches nothing is a no-op
pub async fn upsert(db: &SqlitePool, id: &str, fields: &OverrideFields, now: DateTime<Utc>) -> Result<()> {
    let ids = [id.to_string()];
    bulk_upsert(db, &ids, fields, now).await?;
    Ok(())
}

/// Same partial write for many ids, in one transaction
///
/// Returns the number of rows written.
pub async fn bulk_upsert(
    db: &SqlitePool,
    ids: &[String],
    fields: &OverrideFields,
    now: DateTime<Utc>,
) -> Result<usize> {
    let columns = touched_columns(fields);
    if columns.is_empty() || ids.is_empty() {
        return Ok(0);
    }

    let columns = &columns;
    retry_on_lock("override bulk upsert", DEFAULT_MAX_LOCK_WAIT_MS, move || async move {
        let mut tx = db.begin().await.map_err(Error::Database)?;
        for id in ids {
            upsert_in_tx(&mut tx, id, columns, now).await?;
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(ids.len())
    })
    .await
}

/// Clear the category pin so the classifier decides again
///
/// Idempotent; ids without a row are left alone. Returns rows touched.
pub async fn reset(db: &SqlitePool, ids: &[String], now: DateTime<Utc>) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    retry_on_lock("override reset", DEFAULT_MAX_LOCK_WAIT_MS, move || async move {
        let mut touched = 0u64;
        let mut tx = db.begin().await.map_err(Error::Database)?;
        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "UPDATE product_overrides
                 SET internal_category = NULL, category_source = NULL, updated_at = ?
                 WHERE id IN ({})",
                placeholders
            );
            let mut query = sqlx::query(&sql).bind(now.to_rfc3339());
            for id in chunk {
                query = query.bind(id);
            }
            touched += query.execute(&mut *tx).await.map_err(Error::Database)?.rows_affected();
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(touched)
    })
    .await
}

fn entry_from_row(row: &SqliteRow) -> Result<OverrideEntry> {
    let internal_category: Option<String> = row.try_get("internal_category").map_err(Error::Database)?;
    let category_source: Option<String> = row.try_get("category_source").map_err(Error::Database)?;
    let condition_grade: Option<String> = row.try_get("condition_grade").map_err(Error::Database)?;
    let created_at: String = row.try_get("created_at").map_err(Error::Database)?;
    let updated_at: String = row.try_get("updated_at").map_err(Error::Database)?;
    let id: String = row.try_get("id").map_err(Error::Database)?;

    // A stored value the current enums no longer know reads as unset
    let internal_category = internal_category.and_then(|raw| {
        raw.parse::<DisplayCategory>()
            .map_err(|e| tracing::warn!(id = %id, error = %e, "Ignoring unknown stored category"))
            .ok()
    });

    Ok(OverrideEntry {
        internal_category,
        category_source: category_source.and_then(|raw| raw.parse::<CategorySource>().ok()),
        override_date: row.try_get("override_date").map_err(Error::Database)?,
        condition_grade: condition_grade.and_then(|raw| raw.parse::<ConditionGrade>().ok()),
        ai_price: row.try_get("ai_price").map_err(Error::Database)?,
        ai_title: row.try_get("ai_title").map_err(Error::Database)?,
        ai_description: row.try_get("ai_description").map_err(Error::Database)?,
        approved: row.try_get("approved").map_err(Error::Database)?,
        created_at: parse_stored_time(&created_at)?,
        updated_at: parse_stored_time(&updated_at)?,
        id,
    })
}
