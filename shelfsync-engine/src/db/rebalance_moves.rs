//! Rebalance move log
//!
//! One row per planned move of a run, applied or not.

use chrono::{DateTime, Utc};
use serde::Serialize;
use shelfsync_common::models::DisplayCategory;
use shelfsync_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::classification_log::parse_stored_time;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveRecord {
    pub run_id: Uuid,
    pub product_id: String,
    pub from: DisplayCategory,
    pub to: DisplayCategory,
    pub score: f64,
    pub applied: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append records in one transaction
pub async fn append(db: &SqlitePool, records: &[MoveRecord]) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut tx = db.begin().await.map_err(Error::Database)?;
    for record in records {
        sqlx::query(
            r#"
            INSERT INTO rebalance_moves
                (run_id, product_id, from_category, to_category, score, applied, error, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.run_id.to_string())
        .bind(&record.product_id)
        .bind(record.from.as_str())
        .bind(record.to.as_str())
        .bind(record.score)
        .bind(record.applied)
        .bind(&record.error)
        .bind(record.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;
    }
    tx.commit().await.map_err(Error::Database)?;

    Ok(records.len())
}

/// Moves of one run in insertion order
pub async fn for_run(db: &SqlitePool, run_id: Uuid) -> Result<Vec<MoveRecord>> {
    let rows = sqlx::query("SELECT * FROM rebalance_moves WHERE run_id = ? ORDER BY id")
        .bind(run_id.to_string())
        .fetch_all(db)
        .await
        .map_err(Error::Database)?;

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        let from: String = row.try_get("from_category").map_err(Error::Database)?;
        let to: String = row.try_get("to_category").map_err(Error::Database)?;
        let created_at: String = row.try_get("created_at").map_err(Error::Database)?;

        records.push(MoveRecord {
            run_id,
            product_id: row.try_get("product_id").map_err(Error::Database)?,
            from: from.parse()?,
            to: to.parse()?,
            score: row.try_get("score").map_err(Error::Database)?,
            applied: row.try_get("applied").map_err(Error::Database)?,
            error: row.try_get("error").map_err(Error::Database)?,
            created_at: parse_stored_time(&created_at)?,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfsync_common::models::ArchiveCategory;

    #[tokio::test]
    async fn test_append_and_read_by_run() {
        let pool = crate::db::open_in_memory().await.unwrap();

        let run_a = Uuid::new_v4();
        let run_b = Uuid::new_v4();
        let record = |run_id, id: &str, applied| MoveRecord {
            run_id,
            product_id: id.to_string(),
            from: DisplayCategory::Archive(ArchiveCategory::OutdoorArchive),
            to: DisplayCategory::Clearance,
            score: 42.5,
            applied,
            error: if applied { None } else { Some("locked".to_string()) },
            created_at: Utc::now(),
        };

        append(&pool, &[record(run_a, "1", true), record(run_a, "2", false), record(run_b, "3", true)])
            .await
            .unwrap();

        let moves = for_run(&pool, run_a).await.unwrap();
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0].product_id, "1");
        assert_eq!(moves[1].error.as_deref(), Some("locked"));
        assert_eq!(moves[0].from, DisplayCategory::Archive(ArchiveCategory::OutdoorArchive));
        assert!(for_run(&pool, Uuid::new_v4()).await.unwrap().is_empty());
    }
}
