//! Conflict record reads

use fitcon_common::time::parse_timestamp;
use fitcon_common::{ConflictRecord, ResolutionStatus, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

fn row_to_conflict(row: &SqliteRow) -> Result<ConflictRecord> {
    let resolution_status: String = row.try_get("resolution_status")?;
    let created_date: String = row.try_get("created_date")?;

    Ok(ConflictRecord {
        id: row.try_get("id")?,
        part_number: row.try_get("part_number")?,
        conflict_description: row.try_get("conflict_description")?,
        resolution_status: resolution_status.parse()?,
        created_date: parse_timestamp(&created_date)?,
    })
}

/// Conflict records for a part number, oldest first
pub async fn conflicts_for_part(pool: &SqlitePool, part_number: &str) -> Result<Vec<ConflictRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, part_number, conflict_description, resolution_status, created_date
        FROM conflicting_fitments
        WHERE part_number = ?
        ORDER BY id
        "#,
    )
    .bind(part_number)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_conflict).collect()
}

/// Conflict records in a given review state, oldest first
pub async fn conflicts_by_resolution(
    pool: &SqlitePool,
    status: ResolutionStatus,
) -> Result<Vec<ConflictRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, part_number, conflict_description, resolution_status, created_date
        FROM conflicting_fitments
        WHERE resolution_status = ?
        ORDER BY created_date, id
        "#,
    )
    .bind(status.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_conflict).collect()
}

/// Observation ids linked to a conflict record
pub async fn conflict_observation_ids(pool: &SqlitePool, conflict_id: i64) -> Result<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT observation_id FROM conflict_observations WHERE conflict_id = ? ORDER BY observation_id",
    )
    .bind(conflict_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Number of conflict records awaiting review
pub async fn count_pending(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM conflicting_fitments WHERE resolution_status = 'PENDING'",
    )
    .fetch_one(pool)
    .await?;
    Ok(count)
}
