//! Consensus data quality analysis
//!
//! Every section is computed from the persisted tables only. `now` is passed
//! in so reports are reproducible.

pub mod conflicts;
pub mod consensus;
pub mod coverage;
pub mod quality;
pub mod raw_data;
pub mod trends;

use chrono::{DateTime, Utc};
use fitcon_common::Result;
use fitcon_engine::consensus::WeightPolicy;
use serde::Serialize;
use sqlx::SqlitePool;

pub use conflicts::ConflictAnalysis;
pub use consensus::ConsensusAnalysis;
pub use coverage::CoverageAnalysis;
pub use quality::QualityMetrics;
pub use raw_data::RawDataAnalysis;
pub use trends::TrendAnalysis;

/// Report parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalysisParams {
    /// Length of the daily trend window
    pub days_back: i64,
    /// Threshold used to count part numbers eligible for processing
    pub min_observations: i64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            days_back: 30,
            min_observations: 2,
        }
    }
}

/// A count and its share of some total
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Share {
    pub count: i64,
    pub percentage: f64,
}

impl Share {
    pub fn of(count: i64, total: i64) -> Self {
        Self {
            count,
            percentage: fitcon_engine::stats::percentage(count, total),
        }
    }
}

/// Full quality report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityAnalysis {
    pub generated_at: DateTime<Utc>,
    pub parameters: AnalysisParams,
    pub raw_data: RawDataAnalysis,
    pub consensus: ConsensusAnalysis,
    pub conflicts: ConflictAnalysis,
    pub coverage: CoverageAnalysis,
    pub quality_metrics: QualityMetrics,
    pub trends: TrendAnalysis,
}

/// Build the full report
pub async fn generate(
    pool: &SqlitePool,
    params: &AnalysisParams,
    weights: &WeightPolicy,
    now: DateTime<Utc>,
) -> Result<QualityAnalysis> {
    let raw_data = raw_data::analyze(pool, now).await?;
    let consensus = consensus::analyze(pool).await?;
    let quality_metrics = quality::analyze(pool, &raw_data, weights).await?;

    Ok(QualityAnalysis {
        generated_at: now,
        parameters: *params,
        conflicts: conflicts::analyze(pool, now).await?,
        coverage: coverage::analyze(pool, params.min_observations).await?,
        trends: trends::analyze(pool, params.days_back, now).await?,
        raw_data,
        consensus,
        quality_metrics,
    })
}
