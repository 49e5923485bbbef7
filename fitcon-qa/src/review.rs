//! Conflict review
//!
//! Lists conflict records for a reviewer: filtered by resolution status,
//! part number and age, with the linked observations and their quality
//! weights. Never changes a record's status.

use chrono::{DateTime, Duration, Utc};
use fitcon_common::{ConflictRecord, Error, ResolutionStatus, Result};
use fitcon_engine::consensus::WeightPolicy;
use fitcon_engine::db::{conflicts, observations};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

/// Part numbers listed in the "most conflicts" table
pub const TOP_PARTS: usize = 10;

/// Which conflict records to review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictFilter {
    pub status: ResolutionStatus,
    pub part_number: Option<String>,
    /// Only records created at least this many days ago
    pub min_age_days: Option<i64>,
    /// Records shown in detail; totals always cover every match
    pub limit: usize,
}

impl Default for ConflictFilter {
    fn default() -> Self {
        Self {
            status: ResolutionStatus::Pending,
            part_number: None,
            min_age_days: None,
            limit: 50,
        }
    }
}

/// Heuristic behind a conflict, read back from its description
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    YearRange,
    CrossManufacturer,
    MultipleModels,
    Other,
}

impl ConflictType {
    /// First matching heuristic wins when a description carries several
    pub fn classify(description: &str) -> Self {
        let lower = description.to_lowercase();
        if lower.contains("year range") {
            ConflictType::YearRange
        } else if lower.contains("cross-manufacturer") {
            ConflictType::CrossManufacturer
        } else if lower.contains("multiple models") {
            ConflictType::MultipleModels
        } else {
            ConflictType::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConflictType::YearRange => "Year Range",
            ConflictType::CrossManufacturer => "Cross-Manufacturer",
            ConflictType::MultipleModels => "Multiple Models",
            ConflictType::Other => "Other",
        }
    }
}

/// A linked observation as a reviewer sees it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictListing {
    pub observation_id: i64,
    pub vehicle_year: i64,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_trim: String,
    pub weight: f64,
    pub business_seller: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictDetail {
    pub record: ConflictRecord,
    pub conflict_type: ConflictType,
    pub age_days: i64,
    pub listings: Vec<ConflictListing>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictReview {
    pub generated_at: DateTime<Utc>,
    pub filter: ConflictFilter,
    /// Every record matching the filter
    pub total: usize,
    /// `(part number, conflicts)`, most conflicts first
    pub top_parts: Vec<(String, usize)>,
    /// Non-zero counts only, in `ConflictType` order
    pub type_counts: Vec<(ConflictType, usize)>,
    pub average_age_days: f64,
    /// Newest first, at most `filter.limit`
    pub conflicts: Vec<ConflictDetail>,
}

fn age_days(record: &ConflictRecord, now: DateTime<Utc>) -> i64 {
    (now - record.created_date).num_days().max(0)
}

/// Build the review for every record matching `filter`
pub async fn review_conflicts(
    pool: &SqlitePool,
    filter: &ConflictFilter,
    weights: &WeightPolicy,
    now: DateTime<Utc>,
) -> Result<ConflictReview> {
    if let Some(days) = filter.min_age_days {
        if days < 0 {
            return Err(Error::InvalidInput(format!(
                "age filter must not be negative, got {}",
                days
            )));
        }
    }

    let cutoff = filter.min_age_days.map(|days| now - Duration::days(days));
    let mut matching: Vec<ConflictRecord> = conflicts::conflicts_by_resolution(pool, filter.status)
        .await?
        .into_iter()
        .filter(|record| {
            filter
                .part_number
                .as_deref()
                .map_or(true, |pn| record.part_number == pn)
        })
        .filter(|record| cutoff.map_or(true, |cutoff| record.created_date <= cutoff))
        .collect();
    matching.reverse();

    let mut per_part: BTreeMap<&str, usize> = BTreeMap::new();
    let mut per_type: BTreeMap<ConflictType, usize> = BTreeMap::new();
    for record in &matching {
        *per_part.entry(record.part_number.as_str()).or_default() += 1;
        *per_type
            .entry(ConflictType::classify(&record.conflict_description))
            .or_default() += 1;
    }

    let mut top_parts: Vec<(String, usize)> = per_part
        .into_iter()
        .map(|(pn, count)| (pn.to_string(), count))
        .collect();
    // Stable sort keeps part numbers ascending within equal counts
    top_parts.sort_by(|a, b| b.1.cmp(&a.1));
    top_parts.truncate(TOP_PARTS);

    let total_age: i64 = matching.iter().map(|record| age_days(record, now)).sum();
    let average_age_days = if matching.is_empty() {
        0.0
    } else {
        total_age as f64 / matching.len() as f64
    };

    let mut details = Vec::with_capacity(filter.limit.min(matching.len()));
    for record in matching.iter().take(filter.limit) {
        let listings = observations::load_for_conflict(pool, record.id)
            .await?
            .iter()
            .map(|observation| ConflictListing {
                observation_id: observation.id,
                vehicle_year: observation.vehicle_year,
                vehicle_make: observation.vehicle_make.clone(),
                vehicle_model: observation.vehicle_model.clone(),
                vehicle_trim: observation.vehicle_trim.clone(),
                weight: weights.weight(observation),
                business_seller: observation.seller_is_business,
            })
            .collect();
        details.push(ConflictDetail {
            conflict_type: ConflictType::classify(&record.conflict_description),
            age_days: age_days(record, now),
            record: record.clone(),
            listings,
        });
    }

    Ok(ConflictReview {
        generated_at: now,
        filter: filter.clone(),
        total: matching.len(),
        top_parts,
        type_counts: per_type.into_iter().collect(),
        average_age_days,
        conflicts: details,
    })
}
