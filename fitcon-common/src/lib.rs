//! # Fitment Consensus Common Library
//!
//! Shared code for the fitcon tools including:
//! - Database initialization, schema and settings access
//! - Observation / consensus / conflict models
//! - Configuration loading and root folder resolution
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use db::models::{
    ConflictRecord, ConsensusFitment, FitmentSignature, FitmentStatus, NewObservation,
    Observation, ResolutionStatus,
};
pub use error::{Error, Result};
