//! Processing coverage

use super::Share;
use fitcon_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageAnalysis {
    pub raw_part_numbers: i64,
    /// Part numbers with at least one consensus fitment
    pub processed_part_numbers: i64,
    pub eligible_part_numbers: i64,
    /// Processed over eligible
    pub processing_rate: f64,
    /// Processed over all part numbers seen
    pub overall_coverage: f64,
    pub unprocessed_part_numbers: i64,
}

pub async fn analyze(pool: &SqlitePool, min_observations: i64) -> Result<CoverageAnalysis> {
    let raw: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT part_number) FROM observations")
        .fetch_one(pool)
        .await?;
    let processed: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT part_number) FROM consensus_fitments")
            .fetch_one(pool)
            .await?;
    let eligible: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM (
            SELECT part_number FROM observations
            GROUP BY part_number
            HAVING COUNT(*) >= ?
        )
        "#,
    )
    .bind(min_observations)
    .fetch_one(pool)
    .await?;

    Ok(CoverageAnalysis {
        raw_part_numbers: raw,
        processed_part_numbers: processed,
        eligible_part_numbers: eligible,
        processing_rate: Share::of(processed, eligible).percentage,
        overall_coverage: Share::of(processed, raw).percentage,
        unprocessed_part_numbers: (eligible - processed).max(0),
    })
}
