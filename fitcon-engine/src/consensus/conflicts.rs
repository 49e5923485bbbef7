//! Conflict detection
//!
//! Runs over all groups of one part number after they have been scored.
//! Two heuristics, both always evaluated:
//! - **Year span:** representative years of the groups span more than
//!   `MAX_YEAR_SPAN` years (longer than a typical vehicle generation)
//! - **Platform:** more than one make, or more than `MAX_DISTINCT_MODELS`
//!   models
//!
//! Fired messages are joined with `"; "` into one description, which is the
//! identity of the conflict record for that part number.

use super::grouper::FitmentGroup;
use crate::utils::retry_on_lock;
use fitcon_common::time::{format_timestamp, now};
use fitcon_common::Result;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use tracing::info;

pub const MAX_YEAR_SPAN: i64 = 8;
pub const MAX_DISTINCT_MODELS: usize = 3;
pub const DESCRIPTION_SEPARATOR: &str = "; ";

/// Result of recording a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictOutcome {
    pub conflict_id: i64,
    /// False when the same description was already on record
    pub created: bool,
}

/// Messages from every heuristic that fired, in a fixed order
///
/// A single group cannot conflict with itself, so fewer than two groups
/// yields nothing.
pub fn detect_conflicts(groups: &[FitmentGroup]) -> Vec<String> {
    if groups.len() < 2 {
        return Vec::new();
    }

    let mut messages = Vec::new();
    messages.extend(year_span_conflict(groups));
    messages.extend(platform_conflicts(groups));
    messages
}

/// Joined description used as the conflict record identity
pub fn conflict_description(messages: &[String]) -> String {
    messages.join(DESCRIPTION_SEPARATOR)
}

fn year_span_conflict(groups: &[FitmentGroup]) -> Option<String> {
    let years = groups.iter().map(FitmentGroup::representative_year);
    let min = years.clone().min()?;
    let max = years.max()?;
    let span = max - min;

    (span > MAX_YEAR_SPAN)
        .then(|| format!("Suspicious year range: {}-{} (span: {} years)", min, max, span))
}

fn platform_conflicts(groups: &[FitmentGroup]) -> Vec<String> {
    // Sorted sets keep the description stable across runs
    let makes: BTreeSet<&str> = groups.iter().map(|g| g.signature.make.as_str()).collect();
    let models: BTreeSet<&str> = groups.iter().map(|g| g.signature.model.as_str()).collect();

    let mut messages = Vec::new();
    if makes.len() > 1 {
        messages.push(format!(
            "Cross-manufacturer fitment: {}",
            makes.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }
    if models.len() > MAX_DISTINCT_MODELS {
        messages.push(format!(
            "Multiple models: {}",
            models.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }
    messages
}

/// Get-or-create the conflict record for `(part_number, description)`
///
/// Only a newly created record is linked to observations; every observation
/// of every group is linked, not just the ones that triggered a heuristic.
/// An existing record is left untouched.
pub async fn record_conflict(
    pool: &SqlitePool,
    part_number: &str,
    groups: &[FitmentGroup],
    description: &str,
    max_lock_wait_ms: u64,
) -> Result<ConflictOutcome> {
    retry_on_lock("conflict record", max_lock_wait_ms, || {
        write_conflict(pool, part_number, groups, description)
    })
    .await
}

async fn write_conflict(
    pool: &SqlitePool,
    part_number: &str,
    groups: &[FitmentGroup],
    description: &str,
) -> Result<ConflictOutcome> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO conflicting_fitments
            (part_number, conflict_description, resolution_status, created_date)
        VALUES (?, ?, 'PENDING', ?)
        ON CONFLICT(part_number, conflict_description) DO NOTHING
        "#,
    )
    .bind(part_number)
    .bind(description)
    .bind(format_timestamp(&now()))
    .execute(&mut *tx)
    .await?;
    let created = inserted.rows_affected() == 1;

    let conflict_id: i64 = sqlx::query_scalar(
        "SELECT id FROM conflicting_fitments WHERE part_number = ? AND conflict_description = ?",
    )
    .bind(part_number)
    .bind(description)
    .fetch_one(&mut *tx)
    .await?;

    if created {
        for observation_id in groups.iter().flat_map(FitmentGroup::observation_ids) {
            sqlx::query(
                "INSERT INTO conflict_observations (conflict_id, observation_id) VALUES (?, ?)",
            )
            .bind(conflict_id)
            .bind(observation_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    if created {
        info!(part_number, conflict_id, "Created conflict record: {}", description);
    }

    Ok(ConflictOutcome {
        conflict_id,
        created,
    })
}
