//! Consensus fitment analysis

use super::Share;
use fitcon_common::{FitmentStatus, Result};
use fitcon_engine::consensus::scorer::HIGH_CONFIDENCE_THRESHOLD;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

/// `(label, lower bound)`, highest first; each bucket runs up to the next
/// higher bound, and the top bucket includes 100
pub const CONFIDENCE_BUCKETS: [(&str, f64); 9] = [
    ("90-100", 90.0),
    ("80-89", 80.0),
    ("70-79", 70.0),
    ("60-69", 60.0),
    ("50-59", 50.0),
    ("40-49", 40.0),
    ("30-39", 30.0),
    ("20-29", 20.0),
    ("0-19", 0.0),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusShare {
    pub status: FitmentStatus,
    pub description: String,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceBucket {
    pub range: String,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SupportStats {
    pub avg: f64,
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusAnalysis {
    pub total_consensus_fitments: i64,
    pub status_distribution: Vec<StatusShare>,
    pub confidence_distribution: Vec<ConfidenceBucket>,
    pub supporting_observations: SupportStats,
    /// HIGH_CONFIDENCE or VERIFIED with a score of at least 80
    pub production_ready: Share,
}

/// Index into `CONFIDENCE_BUCKETS` for a score
pub fn confidence_bucket(score: f64) -> usize {
    CONFIDENCE_BUCKETS
        .iter()
        .position(|(_, lower)| score >= *lower)
        .unwrap_or(CONFIDENCE_BUCKETS.len() - 1)
}

pub async fn analyze(pool: &SqlitePool) -> Result<ConsensusAnalysis> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM consensus_fitments GROUP BY status")
            .fetch_all(pool)
            .await?;
    let mut by_status: BTreeMap<FitmentStatus, i64> = BTreeMap::new();
    for (status, count) in rows {
        by_status.insert(status.parse::<FitmentStatus>()?, count);
    }
    let total: i64 = by_status.values().sum();

    let status_distribution = FitmentStatus::ALL
        .iter()
        .map(|status| {
            let share = Share::of(by_status.get(status).copied().unwrap_or(0), total);
            StatusShare {
                status: *status,
                description: status.description().to_string(),
                count: share.count,
                percentage: share.percentage,
            }
        })
        .collect();

    let scores: Vec<f64> = sqlx::query_scalar("SELECT confidence_score FROM consensus_fitments")
        .fetch_all(pool)
        .await?;
    let mut bucket_counts = [0i64; CONFIDENCE_BUCKETS.len()];
    for score in &scores {
        bucket_counts[confidence_bucket(*score)] += 1;
    }
    let confidence_distribution = CONFIDENCE_BUCKETS
        .iter()
        .zip(bucket_counts)
        .map(|((label, _), count)| {
            let share = Share::of(count, total);
            ConfidenceBucket {
                range: label.to_string(),
                count: share.count,
                percentage: share.percentage,
            }
        })
        .collect();

    let (avg, min, max): (f64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(AVG(supporting_observations_count), 0.0),
               COALESCE(MIN(supporting_observations_count), 0),
               COALESCE(MAX(supporting_observations_count), 0)
        FROM consensus_fitments
        "#,
    )
    .fetch_one(pool)
    .await?;

    let production_ready: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM consensus_fitments
        WHERE status IN ('HIGH_CONFIDENCE', 'VERIFIED') AND confidence_score >= ?
        "#,
    )
    .bind(HIGH_CONFIDENCE_THRESHOLD)
    .fetch_one(pool)
    .await?;

    Ok(ConsensusAnalysis {
        total_consensus_fitments: total,
        status_distribution,
        confidence_distribution,
        supporting_observations: SupportStats { avg, min, max },
        production_ready: Share::of(production_ready, total),
    })
}
