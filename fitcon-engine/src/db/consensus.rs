//! Consensus fitment reads

use fitcon_common::time::parse_timestamp;
use fitcon_common::{ConsensusFitment, FitmentSignature, FitmentStatus, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const CONSENSUS_COLUMNS: &str = r#"
    id, part_number, vehicle_year, vehicle_make, vehicle_model, vehicle_trim,
    vehicle_engine, confidence_score, supporting_observations_count,
    total_weight_score, status, last_updated
"#;

fn row_to_consensus(row: &SqliteRow) -> Result<ConsensusFitment> {
    let status: String = row.try_get("status")?;
    let last_updated: String = row.try_get("last_updated")?;

    Ok(ConsensusFitment {
        id: row.try_get("id")?,
        part_number: row.try_get("part_number")?,
        signature: FitmentSignature {
            year: row.try_get("vehicle_year")?,
            make: row.try_get("vehicle_make")?,
            model: row.try_get("vehicle_model")?,
            trim: row.try_get("vehicle_trim")?,
            engine: row.try_get("vehicle_engine")?,
        },
        confidence_score: row.try_get("confidence_score")?,
        supporting_observations_count: row.try_get("supporting_observations_count")?,
        total_weight_score: row.try_get("total_weight_score")?,
        status: status.parse()?,
        last_updated: parse_timestamp(&last_updated)?,
    })
}

/// Consensus fitments for a part number, ordered by signature
pub async fn consensus_for_part(pool: &SqlitePool, part_number: &str) -> Result<Vec<ConsensusFitment>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM consensus_fitments
        WHERE part_number = ?
        ORDER BY vehicle_year, vehicle_make, vehicle_model, vehicle_trim, vehicle_engine
        "#,
        CONSENSUS_COLUMNS
    ))
    .bind(part_number)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_consensus).collect()
}

/// Consensus fitments with a given status, best first
pub async fn consensus_by_status(pool: &SqlitePool, status: FitmentStatus) -> Result<Vec<ConsensusFitment>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM consensus_fitments
        WHERE status = ?
        ORDER BY confidence_score DESC, part_number, id
        "#,
        CONSENSUS_COLUMNS
    ))
    .bind(status.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_consensus).collect()
}

/// Observation ids currently supporting a consensus fitment
pub async fn supporting_observation_ids(pool: &SqlitePool, consensus_id: i64) -> Result<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT observation_id FROM consensus_support WHERE consensus_id = ? ORDER BY observation_id",
    )
    .bind(consensus_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Consensus record count per status
pub async fn count_by_status(pool: &SqlitePool) -> Result<Vec<(FitmentStatus, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM consensus_fitments GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(status, count)| Ok((status.parse::<FitmentStatus>()?, count)))
        .collect()
}
