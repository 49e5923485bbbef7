//! Dry-run planning
//!
//! Runs grouping, scoring and conflict detection without writing anything,
//! so operators can preview a batch.

use super::conflicts::detect_conflicts;
use super::grouper::group_by_signature;
use super::orchestrator::{validate_min_observations, ConsensusProcessor};
use super::scorer::score_group;
use crate::db::observations;
use fitcon_common::{FitmentSignature, FitmentStatus, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Width of the observation-count buckets in a batch plan
pub const DISTRIBUTION_BUCKET_WIDTH: i64 = 5;

/// Predicted consensus for one group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupPlan {
    pub signature: FitmentSignature,
    pub observation_count: usize,
    pub total_weight: f64,
    pub confidence: f64,
    pub status: FitmentStatus,
}

/// What `process_part_number` would do
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartPlan {
    pub part_number: String,
    pub observation_count: usize,
    pub would_skip: bool,
    pub groups: Vec<GroupPlan>,
    pub conflict_messages: Vec<String>,
}

/// What a batch run would pick up
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchPlan {
    pub min_observations: i64,
    pub candidate_count: usize,
    /// `(bucket label, part numbers)`, ordered by bucket start
    pub distribution: Vec<(String, usize)>,
}

impl ConsensusProcessor {
    /// Preview one part number
    pub async fn plan_part_number(&self, part_number: &str, min_observations: i64) -> Result<PartPlan> {
        validate_min_observations(min_observations)?;

        let loaded = observations::load_for_part(self.db(), part_number).await?;
        let observation_count = loaded.len();

        if (observation_count as i64) < min_observations {
            return Ok(PartPlan {
                part_number: part_number.to_string(),
                observation_count,
                would_skip: true,
                groups: Vec::new(),
                conflict_messages: Vec::new(),
            });
        }

        for observation in &loaded {
            observation.validate()?;
        }

        let groups = group_by_signature(loaded, self.config().signature_mode);
        let mut plans = Vec::with_capacity(groups.len());
        for group in &groups {
            let score = score_group(&group.observations, &self.config().weights)?;
            plans.push(GroupPlan {
                signature: group.signature.clone(),
                observation_count: group.len(),
                total_weight: score.total_weight,
                confidence: score.confidence,
                status: score.status,
            });
        }

        Ok(PartPlan {
            part_number: part_number.to_string(),
            observation_count,
            would_skip: false,
            groups: plans,
            conflict_messages: detect_conflicts(&groups),
        })
    }

    /// Preview a full batch run
    pub async fn plan_batch(&self, min_observations: i64) -> Result<BatchPlan> {
        validate_min_observations(min_observations)?;

        let counts: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM observations
            GROUP BY part_number
            HAVING COUNT(*) >= ?
            "#,
        )
        .bind(min_observations)
        .fetch_all(self.db())
        .await?;

        Ok(BatchPlan {
            min_observations,
            candidate_count: counts.len(),
            distribution: count_distribution(&counts),
        })
    }
}

/// Bucket observation counts into `0-4`, `5-9`, ... ordered numerically
pub fn count_distribution(counts: &[i64]) -> Vec<(String, usize)> {
    let mut buckets: BTreeMap<i64, usize> = BTreeMap::new();
    for count in counts {
        let start = (count / DISTRIBUTION_BUCKET_WIDTH) * DISTRIBUTION_BUCKET_WIDTH;
        *buckets.entry(start).or_default() += 1;
    }

    buckets
        .into_iter()
        .map(|(start, parts)| {
            (
                format!("{}-{}", start, start + DISTRIBUTION_BUCKET_WIDTH - 1),
                parts,
            )
        })
        .collect()
}
