//! Consensus upsert
//!
//! One transaction per group: the scalar fields and the support set are
//! written together, so readers never see a refreshed score with a stale
//! support set (or the reverse).

use super::grouper::{normalized_key, FitmentGroup, SignatureMode};
use super::scorer::ConsensusScore;
use crate::utils::retry_on_lock;
use fitcon_common::time::{format_timestamp, now};
use fitcon_common::{FitmentSignature, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Result of writing one consensus fitment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub consensus_id: i64,
    /// False when an existing record was refreshed
    pub created: bool,
}

/// Create or refresh the consensus fitment for a group
///
/// Existing records get all computed fields overwritten (including a manual
/// `VERIFIED` status) and their support set replaced with the group's
/// current members.
///
/// In `Normalized` mode a record whose signature normalizes to the group's
/// key keeps its stored spelling, so a new raw variant never forks the
/// record. Any further records with the same key are retired.
pub async fn upsert_consensus(
    pool: &SqlitePool,
    part_number: &str,
    group: &FitmentGroup,
    score: &ConsensusScore,
    mode: SignatureMode,
    max_lock_wait_ms: u64,
) -> Result<UpsertOutcome> {
    retry_on_lock("consensus upsert", max_lock_wait_ms, || {
        write_consensus(pool, part_number, group, score, mode)
    })
    .await
}

async fn write_consensus(
    pool: &SqlitePool,
    part_number: &str,
    group: &FitmentGroup,
    score: &ConsensusScore,
    mode: SignatureMode,
) -> Result<UpsertOutcome> {
    let mut tx = pool.begin().await?;

    let resolved = match mode {
        SignatureMode::Exact => group.signature.clone(),
        SignatureMode::Normalized => {
            let rows: Vec<(i64, String, String, String, String)> = sqlx::query_as(
                r#"
                SELECT id, vehicle_make, vehicle_model, vehicle_trim, vehicle_engine
                FROM consensus_fitments
                WHERE part_number = ? AND vehicle_year = ?
                ORDER BY id
                "#,
            )
            .bind(part_number)
            .bind(group.signature.year)
            .fetch_all(&mut *tx)
            .await?;

            let key = normalized_key(&group.signature);
            let mut matching = rows.into_iter().filter_map(|(id, make, model, trim, engine)| {
                let stored =
                    FitmentSignature::new(group.signature.year, &make, &model, &trim, &engine);
                (normalized_key(&stored) == key).then_some((id, stored))
            });

            let kept = matching.next();
            for (superseded_id, stored) in matching {
                debug!(
                    part_number,
                    consensus_id = superseded_id,
                    signature = %stored,
                    "Retiring superseded consensus spelling"
                );
                sqlx::query("DELETE FROM consensus_fitments WHERE id = ?")
                    .bind(superseded_id)
                    .execute(&mut *tx)
                    .await?;
            }

            kept.map(|(_, stored)| stored)
                .unwrap_or_else(|| group.signature.clone())
        }
    };
    let signature = &resolved;

    let existing: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT id FROM consensus_fitments
        WHERE part_number = ? AND vehicle_year = ? AND vehicle_make = ?
          AND vehicle_model = ? AND vehicle_trim = ? AND vehicle_engine = ?
        "#,
    )
    .bind(part_number)
    .bind(signature.year)
    .bind(&signature.make)
    .bind(&signature.model)
    .bind(&signature.trim)
    .bind(&signature.engine)
    .fetch_optional(&mut *tx)
    .await?;

    let consensus_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO consensus_fitments (
            part_number, vehicle_year, vehicle_make, vehicle_model, vehicle_trim,
            vehicle_engine, confidence_score, supporting_observations_count,
            total_weight_score, status, last_updated
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(part_number, vehicle_year, vehicle_make, vehicle_model,
                    vehicle_trim, vehicle_engine) DO UPDATE SET
            confidence_score = excluded.confidence_score,
            supporting_observations_count = excluded.supporting_observations_count,
            total_weight_score = excluded.total_weight_score,
            status = excluded.status,
            last_updated = excluded.last_updated
        RETURNING id
        "#,
    )
    .bind(part_number)
    .bind(signature.year)
    .bind(&signature.make)
    .bind(&signature.model)
    .bind(&signature.trim)
    .bind(&signature.engine)
    .bind(score.confidence)
    .bind(score.supporting_count)
    .bind(score.total_weight)
    .bind(score.status.as_str())
    .bind(format_timestamp(&now()))
    .fetch_one(&mut *tx)
    .await?;

    // Replace, never merge: the support set mirrors current membership
    sqlx::query("DELETE FROM consensus_support WHERE consensus_id = ?")
        .bind(consensus_id)
        .execute(&mut *tx)
        .await?;

    for observation_id in group.observation_ids() {
        sqlx::query("INSERT INTO consensus_support (consensus_id, observation_id) VALUES (?, ?)")
            .bind(consensus_id)
            .bind(observation_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    debug!(
        part_number,
        consensus_id,
        signature = %signature,
        confidence = score.confidence,
        status = %score.status,
        created = existing.is_none(),
        "Consensus fitment written"
    );

    Ok(UpsertOutcome {
        consensus_id,
        created: existing.is_none(),
    })
}
