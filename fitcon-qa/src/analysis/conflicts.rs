//! Conflict backlog analysis

use super::Share;
use chrono::{DateTime, Utc};
use fitcon_common::time::parse_timestamp;
use fitcon_common::{ResolutionStatus, Result};
use serde::Serialize;
use sqlx::SqlitePool;

/// `(label, max age in days)` for pending conflicts; the last bucket is open
pub const PENDING_AGE_BUCKETS: [(&str, Option<i64>); 4] = [
    ("0-7 days", Some(7)),
    ("8-30 days", Some(30)),
    ("31-90 days", Some(90)),
    ("90+ days", None),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeBucket {
    pub range: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictAnalysis {
    pub total_conflicts: i64,
    pub pending: i64,
    pub resolved: i64,
    pub dismissed: i64,
    /// Resolved or dismissed, over all conflicts
    pub resolution_rate: f64,
    pub pending_age_distribution: Vec<AgeBucket>,
}

/// Index into `PENDING_AGE_BUCKETS` for an age in whole days
pub fn age_bucket(age_days: i64) -> usize {
    PENDING_AGE_BUCKETS
        .iter()
        .position(|(_, max)| max.map_or(true, |max| age_days <= max))
        .unwrap_or(PENDING_AGE_BUCKETS.len() - 1)
}

pub async fn analyze(pool: &SqlitePool, now: DateTime<Utc>) -> Result<ConflictAnalysis> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT resolution_status, COUNT(*) FROM conflicting_fitments GROUP BY resolution_status",
    )
    .fetch_all(pool)
    .await?;

    let (mut pending, mut resolved, mut dismissed) = (0, 0, 0);
    for (status, count) in rows {
        match status.parse::<ResolutionStatus>()? {
            ResolutionStatus::Pending => pending = count,
            ResolutionStatus::Resolved => resolved = count,
            ResolutionStatus::Dismissed => dismissed = count,
        }
    }
    let total = pending + resolved + dismissed;

    let created: Vec<String> = sqlx::query_scalar(
        "SELECT created_date FROM conflicting_fitments WHERE resolution_status = 'PENDING'",
    )
    .fetch_all(pool)
    .await?;

    let mut bucket_counts = [0i64; PENDING_AGE_BUCKETS.len()];
    for created_date in &created {
        let age_days = (now - parse_timestamp(created_date)?).num_days().max(0);
        bucket_counts[age_bucket(age_days)] += 1;
    }

    Ok(ConflictAnalysis {
        total_conflicts: total,
        pending,
        resolved,
        dismissed,
        resolution_rate: Share::of(resolved + dismissed, total).percentage,
        pending_age_distribution: PENDING_AGE_BUCKETS
            .iter()
            .zip(bucket_counts)
            .map(|((label, _), count)| AgeBucket {
                range: label.to_string(),
                count,
            })
            .collect(),
    })
}
