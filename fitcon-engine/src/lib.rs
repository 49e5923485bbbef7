//! # Fitment Consensus Engine
//!
//! Reconciles scraped part-fitment observations into confidence-scored
//! consensus fitments:
//! - **consensus:** weighting, grouping, scoring, upsert, conflict
//!   detection and batch orchestration
//! - **db:** observation, consensus and conflict queries
//! - **stats:** read-only processing statistics
//! - **utils:** lock-contention retry
//! - **build_info:** commit and build stamps for the binaries' banners

pub mod build_info;
pub mod consensus;
pub mod db;
pub mod stats;
pub mod utils;

pub use consensus::{
    BatchPlan, BatchSummary, ConsensusProcessor, PartPlan, PartSummary, ProcessorConfig,
    SignatureMode, SkipReason, WeightPolicy,
};
pub use stats::{get_processing_stats, ProcessingStats};
