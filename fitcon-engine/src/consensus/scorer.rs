//! Confidence scoring
//!
//! **Algorithm:**
//! 1. `total_weight = Σ weight(o)`
//! 2. `weight_bonus = min(total_weight × 10, 40)`
//! 3. `count_bonus = min((n − 1) × 15, 30)`
//! 4. `confidence = min(20 + weight_bonus + count_bonus, 100)`
//!
//! Status thresholds: ≥80 high, ≥60 medium, ≥40 low, otherwise review.
//! Both score and weight are rounded to two decimals before the status is
//! derived, so the stored score and stored status always agree.

use super::weight::WeightPolicy;
use fitcon_common::{Error, FitmentStatus, Observation, Result};
use serde::{Deserialize, Serialize};

pub const BASE_CONFIDENCE: f64 = 20.0;
pub const WEIGHT_MULTIPLIER: f64 = 10.0;
pub const MAX_WEIGHT_BONUS: f64 = 40.0;
pub const COUNT_BONUS_STEP: f64 = 15.0;
pub const MAX_COUNT_BONUS: f64 = 30.0;
pub const MAX_CONFIDENCE: f64 = 100.0;

pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 80.0;
pub const MEDIUM_CONFIDENCE_THRESHOLD: f64 = 60.0;
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 40.0;

/// Computed consensus values for one group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsensusScore {
    pub confidence: f64,
    pub supporting_count: i64,
    pub total_weight: f64,
    pub status: FitmentStatus,
}

/// Round to the two decimal places the database stores
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Confidence for a group of `count` observations with the given total weight
pub fn confidence_score(count: usize, total_weight: f64) -> f64 {
    let weight_bonus = (total_weight.max(0.0) * WEIGHT_MULTIPLIER).min(MAX_WEIGHT_BONUS);
    let count_bonus =
        (count.saturating_sub(1) as f64 * COUNT_BONUS_STEP).min(MAX_COUNT_BONUS);
    (BASE_CONFIDENCE + weight_bonus + count_bonus).min(MAX_CONFIDENCE)
}

/// Status label for a confidence score
pub fn status_for(confidence: f64) -> FitmentStatus {
    if confidence >= HIGH_CONFIDENCE_THRESHOLD {
        FitmentStatus::HighConfidence
    } else if confidence >= MEDIUM_CONFIDENCE_THRESHOLD {
        FitmentStatus::MediumConfidence
    } else if confidence >= LOW_CONFIDENCE_THRESHOLD {
        FitmentStatus::LowConfidence
    } else {
        FitmentStatus::NeedsReview
    }
}

/// Score a non-empty group
pub fn score_group(observations: &[Observation], policy: &WeightPolicy) -> Result<ConsensusScore> {
    if observations.is_empty() {
        return Err(Error::InvalidInput("cannot score an empty group".to_string()));
    }

    // Score from the exact sum; only the stored values are rounded
    let total_weight = policy.total_weight(observations);
    let confidence = round2(confidence_score(observations.len(), total_weight));

    Ok(ConsensusScore {
        confidence,
        supporting_count: observations.len() as i64,
        total_weight: round2(total_weight),
        status: status_for(confidence),
    })
}
