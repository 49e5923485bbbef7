//! # Fitment Consensus Quality Analysis
//!
//! Read-only reporting over the tables written by fitcon-engine:
//! observation quality, consensus distribution, conflict backlog, coverage
//! and daily trends, plus conflict review and a threshold health check.

pub mod analysis;
pub mod db;
pub mod health;
pub mod report;
pub mod review;

pub use analysis::{generate, AnalysisParams, QualityAnalysis};
pub use health::{run_health_check, HealthReport};
pub use review::{review_conflicts, ConflictFilter, ConflictReview, ConflictType};
