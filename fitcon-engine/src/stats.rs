//! Processing statistics
//!
//! Read-only aggregation over what the engine has written.

use crate::db::{conflicts, consensus, observations};
use fitcon_common::{FitmentStatus, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

/// Snapshot of engine output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingStats {
    pub raw_total: i64,
    pub unique_part_numbers: i64,
    pub consensus_total: i64,
    /// Every status is present, zero when unused
    pub status_counts: BTreeMap<FitmentStatus, i64>,
    pub pending_conflicts: i64,
    pub high_confidence_pct: f64,
    /// HIGH_CONFIDENCE plus manually VERIFIED, over all consensus records
    pub production_ready_pct: f64,
}

impl ProcessingStats {
    pub fn count(&self, status: FitmentStatus) -> i64 {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }
}

/// Decimal places kept by the processing-statistics percentages
pub const STATS_PERCENTAGE_DECIMALS: i32 = 2;

/// Percentage rounded to `decimals` places; zero when `total` is zero
pub fn rounded_percentage(part: i64, total: i64, decimals: i32) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let scale = 10f64.powi(decimals);
    (part as f64 / total as f64 * 100.0 * scale).round() / scale
}

/// Percentage rounded to one decimal place, as shown in reports
pub fn percentage(part: i64, total: i64) -> f64 {
    rounded_percentage(part, total, 1)
}

/// Aggregate processing statistics
pub async fn get_processing_stats(pool: &SqlitePool) -> Result<ProcessingStats> {
    let raw_total = observations::count_all(pool).await?;
    let unique_part_numbers = observations::count_part_numbers(pool).await?;

    let mut status_counts: BTreeMap<FitmentStatus, i64> =
        FitmentStatus::ALL.iter().map(|status| (*status, 0)).collect();
    for (status, count) in consensus::count_by_status(pool).await? {
        status_counts.insert(status, count);
    }
    let consensus_total: i64 = status_counts.values().sum();

    let high = status_counts[&FitmentStatus::HighConfidence];
    let verified = status_counts[&FitmentStatus::Verified];

    Ok(ProcessingStats {
        raw_total,
        unique_part_numbers,
        consensus_total,
        pending_conflicts: conflicts::count_pending(pool).await?,
        high_confidence_pct: rounded_percentage(high, consensus_total, STATS_PERCENTAGE_DECIMALS),
        production_ready_pct: rounded_percentage(
            high + verified,
            consensus_total,
            STATS_PERCENTAGE_DECIMALS,
        ),
        status_counts,
    })
}
