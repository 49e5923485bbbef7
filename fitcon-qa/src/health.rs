//! System health check
//!
//! Compares the current state of the tables against fixed thresholds and
//! reports critical issues and warnings. A check with no issues passes even
//! when it carries warnings.

use chrono::{DateTime, Duration, Utc};
use fitcon_common::time::format_timestamp;
use fitcon_common::Result;
use fitcon_engine::consensus::scorer::LOW_CONFIDENCE_THRESHOLD;
use fitcon_engine::stats::percentage;
use serde::Serialize;
use sqlx::SqlitePool;

pub const LOW_OBSERVATION_COUNT: i64 = 100;
pub const RECENT_DATA_DAYS: i64 = 7;
pub const LOW_RECENT_COUNT: i64 = 10;
/// Consensus fitments per observation, as a percentage
pub const CRITICAL_PROCESSING_RATE: f64 = 10.0;
pub const WARNING_PROCESSING_RATE: f64 = 30.0;
pub const OLD_CONFLICT_DAYS: i64 = 30;
pub const CRITICAL_OLD_CONFLICTS: i64 = 100;
pub const WARNING_OLD_CONFLICTS: i64 = 50;
/// Share of consensus fitments scoring below the low-confidence threshold
pub const CRITICAL_LOW_CONFIDENCE_RATE: f64 = 50.0;
pub const WARNING_LOW_CONFIDENCE_RATE: f64 = 30.0;

/// Measured values behind the verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthMetrics {
    pub observations: i64,
    pub recent_observations: i64,
    pub consensus_fitments: i64,
    pub processing_rate: f64,
    pub old_pending_conflicts: i64,
    pub low_confidence_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub metrics: HealthMetrics,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

impl HealthReport {
    /// No critical issues
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }

    /// Neither issues nor warnings
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.warnings.is_empty()
    }
}

/// Turn measured values into issues and warnings
pub fn evaluate(metrics: &HealthMetrics) -> (Vec<String>, Vec<String>) {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    if metrics.observations == 0 {
        issues.push("No observations found".to_string());
    } else if metrics.observations < LOW_OBSERVATION_COUNT {
        warnings.push(format!("Low observation count: {}", metrics.observations));
    }

    if metrics.recent_observations == 0 {
        issues.push(format!("No recent observations (last {} days)", RECENT_DATA_DAYS));
    } else if metrics.recent_observations < LOW_RECENT_COUNT {
        warnings.push(format!(
            "Low recent data: {} observations in last {} days",
            metrics.recent_observations, RECENT_DATA_DAYS
        ));
    }

    if metrics.observations > 0 {
        if metrics.processing_rate < CRITICAL_PROCESSING_RATE {
            issues.push(format!("Low processing rate: {:.1}%", metrics.processing_rate));
        } else if metrics.processing_rate < WARNING_PROCESSING_RATE {
            warnings.push(format!("Moderate processing rate: {:.1}%", metrics.processing_rate));
        }
    }

    if metrics.old_pending_conflicts > CRITICAL_OLD_CONFLICTS {
        issues.push(format!("Too many old conflicts: {}", metrics.old_pending_conflicts));
    } else if metrics.old_pending_conflicts > WARNING_OLD_CONFLICTS {
        warnings.push(format!("Many old conflicts: {}", metrics.old_pending_conflicts));
    }

    if metrics.consensus_fitments > 0 {
        if metrics.low_confidence_rate > CRITICAL_LOW_CONFIDENCE_RATE {
            issues.push(format!(
                "High low-confidence rate: {:.1}%",
                metrics.low_confidence_rate
            ));
        } else if metrics.low_confidence_rate > WARNING_LOW_CONFIDENCE_RATE {
            warnings.push(format!(
                "Moderate low-confidence rate: {:.1}%",
                metrics.low_confidence_rate
            ));
        }
    }

    (issues, warnings)
}

pub async fn run_health_check(pool: &SqlitePool, now: DateTime<Utc>) -> Result<HealthReport> {
    let observations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM observations")
        .fetch_one(pool)
        .await?;

    let recent_cutoff = format_timestamp(&(now - Duration::days(RECENT_DATA_DAYS)));
    let recent_observations: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM observations WHERE extraction_date >= ?")
            .bind(recent_cutoff)
            .fetch_one(pool)
            .await?;

    let (consensus_fitments, low_confidence): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(confidence_score < ?), 0)
        FROM consensus_fitments
        "#,
    )
    .bind(LOW_CONFIDENCE_THRESHOLD)
    .fetch_one(pool)
    .await?;

    let conflict_cutoff = format_timestamp(&(now - Duration::days(OLD_CONFLICT_DAYS)));
    let old_pending_conflicts: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM conflicting_fitments
        WHERE resolution_status = 'PENDING' AND created_date < ?
        "#,
    )
    .bind(conflict_cutoff)
    .fetch_one(pool)
    .await?;

    let metrics = HealthMetrics {
        observations,
        recent_observations,
        consensus_fitments,
        processing_rate: percentage(consensus_fitments, observations),
        old_pending_conflicts,
        low_confidence_rate: percentage(low_confidence, consensus_fitments),
    };
    let (issues, warnings) = evaluate(&metrics);

    Ok(HealthReport {
        checked_at: now,
        metrics,
        issues,
        warnings,
    })
}
