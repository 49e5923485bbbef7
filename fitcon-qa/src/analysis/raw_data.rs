//! Raw observation analysis

use super::Share;
use chrono::{DateTime, Duration, Utc};
use fitcon_common::time::format_timestamp;
use fitcon_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;

/// Window for the "recent observations" count
pub const RECENT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrustSignals {
    pub verified_sellers: Share,
    pub business_sellers: Share,
    pub oem_references: Share,
    pub detailed_descriptions: Share,
}

/// Observations per part number
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObservationDistribution {
    pub max_per_part: i64,
    pub min_per_part: i64,
    pub avg_per_part: f64,
    pub parts_with_single_observation: i64,
    pub parts_with_multiple_observations: i64,
}

impl ObservationDistribution {
    pub fn from_counts(counts: &[i64]) -> Self {
        if counts.is_empty() {
            return Self {
                max_per_part: 0,
                min_per_part: 0,
                avg_per_part: 0.0,
                parts_with_single_observation: 0,
                parts_with_multiple_observations: 0,
            };
        }

        let total: i64 = counts.iter().sum();
        Self {
            max_per_part: counts.iter().copied().max().unwrap_or(0),
            min_per_part: counts.iter().copied().min().unwrap_or(0),
            avg_per_part: total as f64 / counts.len() as f64,
            parts_with_single_observation: counts.iter().filter(|c| **c == 1).count() as i64,
            parts_with_multiple_observations: counts.iter().filter(|c| **c > 1).count() as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawDataAnalysis {
    pub total_observations: i64,
    pub unique_part_numbers: i64,
    pub recent_observations: i64,
    pub trust_signals: TrustSignals,
    pub distribution: ObservationDistribution,
}

pub async fn analyze(pool: &SqlitePool, now: DateTime<Utc>) -> Result<RawDataAnalysis> {
    let (total, verified, business, oem, detailed): (i64, i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(is_verified_seller), 0),
               COALESCE(SUM(seller_is_business), 0),
               COALESCE(SUM(has_oem_reference), 0),
               COALESCE(SUM(has_detailed_description), 0)
        FROM observations
        "#,
    )
    .fetch_one(pool)
    .await?;

    let recent_cutoff = format_timestamp(&(now - Duration::days(RECENT_WINDOW_DAYS)));
    let recent: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM observations WHERE extraction_date >= ?")
            .bind(recent_cutoff)
            .fetch_one(pool)
            .await?;

    let per_part: Vec<i64> =
        sqlx::query_scalar("SELECT COUNT(*) FROM observations GROUP BY part_number")
            .fetch_all(pool)
            .await?;

    Ok(RawDataAnalysis {
        total_observations: total,
        unique_part_numbers: per_part.len() as i64,
        recent_observations: recent,
        trust_signals: TrustSignals {
            verified_sellers: Share::of(verified, total),
            business_sellers: Share::of(business, total),
            oem_references: Share::of(oem, total),
            detailed_descriptions: Share::of(detailed, total),
        },
        distribution: ObservationDistribution::from_counts(&per_part),
    })
}
