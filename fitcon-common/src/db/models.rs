//! Database models
//!
//! Observations are the raw, untrusted input; consensus fitments and conflict
//! records are what the engine writes back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Exact-match fitment key: (year, make, model, trim, engine)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FitmentSignature {
    pub year: i64,
    pub make: String,
    pub model: String,
    pub trim: String,
    pub engine: String,
}

impl FitmentSignature {
    pub fn new(year: i64, make: &str, model: &str, trim: &str, engine: &str) -> Self {
        Self {
            year,
            make: make.to_string(),
            model: model.to_string(),
            trim: trim.to_string(),
            engine: engine.to_string(),
        }
    }
}

impl fmt::Display for FitmentSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.year, self.make, self.model)?;
        if !self.trim.is_empty() {
            write!(f, " {}", self.trim)?;
        }
        if !self.engine.is_empty() {
            write!(f, " {}", self.engine)?;
        }
        Ok(())
    }
}

/// One scraped marketplace observation ("quark")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: i64,
    pub part_number: String,
    pub vehicle_year: i64,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_trim: String,
    pub vehicle_engine: String,
    pub is_verified_seller: bool,
    pub seller_is_business: bool,
    pub has_oem_reference: bool,
    pub has_detailed_description: bool,
    pub extraction_date: DateTime<Utc>,
}

impl Observation {
    /// Exact fitment signature of this observation
    pub fn signature(&self) -> FitmentSignature {
        FitmentSignature::new(
            self.vehicle_year,
            &self.vehicle_make,
            &self.vehicle_model,
            &self.vehicle_trim,
            &self.vehicle_engine,
        )
    }

    /// Reject rows the ingestion layer should never have produced
    pub fn validate(&self) -> Result<()> {
        validate_fields(
            &self.part_number,
            self.vehicle_year,
            &self.vehicle_make,
            &self.vehicle_model,
        )
        .map_err(|reason| Error::InvalidInput(format!("observation {}: {}", self.id, reason)))
    }
}

fn validate_fields(
    part_number: &str,
    year: i64,
    make: &str,
    model: &str,
) -> std::result::Result<(), String> {
    if part_number.trim().is_empty() {
        return Err("part_number is empty".to_string());
    }
    if year <= 0 {
        return Err(format!("vehicle_year {} is not a valid year", year));
    }
    if make.trim().is_empty() {
        return Err("vehicle_make is empty".to_string());
    }
    if model.trim().is_empty() {
        return Err("vehicle_model is empty".to_string());
    }
    Ok(())
}

/// Observation as produced by an ingestion adapter, before it has an id
///
/// Trust signals default to false and trim/engine to empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewObservation {
    pub part_number: String,
    pub vehicle_year: i64,
    pub vehicle_make: String,
    pub vehicle_model: String,
    #[serde(default)]
    pub vehicle_trim: String,
    #[serde(default)]
    pub vehicle_engine: String,
    #[serde(default)]
    pub is_verified_seller: bool,
    #[serde(default)]
    pub seller_is_business: bool,
    #[serde(default)]
    pub has_oem_reference: bool,
    #[serde(default)]
    pub has_detailed_description: bool,
    #[serde(default = "crate::time::now")]
    pub extraction_date: DateTime<Utc>,
}

impl NewObservation {
    pub fn new(part_number: &str, year: i64, make: &str, model: &str) -> Self {
        Self {
            part_number: part_number.to_string(),
            vehicle_year: year,
            vehicle_make: make.to_string(),
            vehicle_model: model.to_string(),
            vehicle_trim: String::new(),
            vehicle_engine: String::new(),
            is_verified_seller: false,
            seller_is_business: false,
            has_oem_reference: false,
            has_detailed_description: false,
            extraction_date: crate::time::now(),
        }
    }

    pub fn trim(mut self, trim: &str) -> Self {
        self.vehicle_trim = trim.to_string();
        self
    }

    pub fn engine(mut self, engine: &str) -> Self {
        self.vehicle_engine = engine.to_string();
        self
    }

    pub fn verified_seller(mut self, value: bool) -> Self {
        self.is_verified_seller = value;
        self
    }

    pub fn business_seller(mut self, value: bool) -> Self {
        self.seller_is_business = value;
        self
    }

    pub fn oem_reference(mut self, value: bool) -> Self {
        self.has_oem_reference = value;
        self
    }

    pub fn detailed_description(mut self, value: bool) -> Self {
        self.has_detailed_description = value;
        self
    }

    pub fn extracted_at(mut self, ts: DateTime<Utc>) -> Self {
        self.extraction_date = ts;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_fields(
            &self.part_number,
            self.vehicle_year,
            &self.vehicle_make,
            &self.vehicle_model,
        )
        .map_err(Error::InvalidInput)
    }
}

/// Consensus fitment status
///
/// Everything except `Verified` is derived from the confidence score.
/// `Verified` is set by manual curation outside the engine and is counted as
/// production ready by the stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FitmentStatus {
    HighConfidence,
    MediumConfidence,
    LowConfidence,
    NeedsReview,
    Verified,
}

impl FitmentStatus {
    pub const ALL: [FitmentStatus; 5] = [
        FitmentStatus::HighConfidence,
        FitmentStatus::MediumConfidence,
        FitmentStatus::LowConfidence,
        FitmentStatus::NeedsReview,
        FitmentStatus::Verified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FitmentStatus::HighConfidence => "HIGH_CONFIDENCE",
            FitmentStatus::MediumConfidence => "MEDIUM_CONFIDENCE",
            FitmentStatus::LowConfidence => "LOW_CONFIDENCE",
            FitmentStatus::NeedsReview => "NEEDS_REVIEW",
            FitmentStatus::Verified => "VERIFIED",
        }
    }

    /// Human readable label for reports
    pub fn description(&self) -> &'static str {
        match self {
            FitmentStatus::HighConfidence => "High Confidence",
            FitmentStatus::MediumConfidence => "Medium Confidence",
            FitmentStatus::LowConfidence => "Low Confidence",
            FitmentStatus::NeedsReview => "Needs Review",
            FitmentStatus::Verified => "Verified",
        }
    }
}

impl fmt::Display for FitmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FitmentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FitmentStatus::ALL
            .iter()
            .find(|status| status.as_str() == s)
            .copied()
            .ok_or_else(|| Error::InvalidInput(format!("Unknown fitment status: {}", s)))
    }
}

/// Review state of a conflict record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionStatus {
    Pending,
    Resolved,
    Dismissed,
}

impl ResolutionStatus {
    pub const ALL: [ResolutionStatus; 3] = [
        ResolutionStatus::Pending,
        ResolutionStatus::Resolved,
        ResolutionStatus::Dismissed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStatus::Pending => "PENDING",
            ResolutionStatus::Resolved => "RESOLVED",
            ResolutionStatus::Dismissed => "DISMISSED",
        }
    }
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ResolutionStatus::ALL
            .iter()
            .find(|status| status.as_str() == s)
            .copied()
            .ok_or_else(|| Error::InvalidInput(format!("Unknown resolution status: {}", s)))
    }
}

/// Canonical reconciled fitment ("atom")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusFitment {
    pub id: i64,
    pub part_number: String,
    pub signature: FitmentSignature,
    pub confidence_score: f64,
    pub supporting_observations_count: i64,
    pub total_weight_score: f64,
    pub status: FitmentStatus,
    pub last_updated: DateTime<Utc>,
}

/// Conflict flag for human review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub id: i64,
    pub part_number: String,
    pub conflict_description: String,
    pub resolution_status: ResolutionStatus,
    pub created_date: DateTime<Utc>,
}
