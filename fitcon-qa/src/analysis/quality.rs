//! Overall quality metrics

use super::raw_data::RawDataAnalysis;
use super::Share;
use fitcon_common::Result;
use fitcon_engine::consensus::scorer::HIGH_CONFIDENCE_THRESHOLD;
use fitcon_engine::consensus::WeightPolicy;
use serde::Serialize;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityMetrics {
    /// Consensus fitments per observation, as a percentage
    pub data_efficiency: f64,
    pub average_confidence: f64,
    /// Share of consensus fitments scoring at least 80
    pub high_quality_percentage: f64,
    pub average_observation_weight: f64,
}

/// Mean quality weight over all observations
///
/// Weights are additive per signal, so the mean follows from the signal
/// counts without loading every row.
pub fn average_weight(raw: &RawDataAnalysis, weights: &WeightPolicy) -> f64 {
    let total = raw.total_observations;
    if total == 0 {
        return 0.0;
    }
    let signals = &raw.trust_signals;
    let sum = total as f64 * weights.base
        + signals.verified_sellers.count as f64 * weights.verified_seller
        + signals.business_sellers.count as f64 * weights.business_seller
        + signals.oem_references.count as f64 * weights.oem_reference
        + signals.detailed_descriptions.count as f64 * weights.detailed_description;
    sum / total as f64
}

pub async fn analyze(
    pool: &SqlitePool,
    raw: &RawDataAnalysis,
    weights: &WeightPolicy,
) -> Result<QualityMetrics> {
    let (total, average_confidence, high_quality): (i64, f64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COALESCE(AVG(confidence_score), 0.0),
               COALESCE(SUM(confidence_score >= ?), 0)
        FROM consensus_fitments
        "#,
    )
    .bind(HIGH_CONFIDENCE_THRESHOLD)
    .fetch_one(pool)
    .await?;

    Ok(QualityMetrics {
        data_efficiency: Share::of(total, raw.total_observations).percentage,
        average_confidence,
        high_quality_percentage: Share::of(high_quality, total).percentage,
        average_observation_weight: average_weight(raw, weights),
    })
}
