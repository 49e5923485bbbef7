//! Consensus reconciliation
//!
//! Per part number: group → weigh → score → upsert, then conflict
//! detection across all groups.

pub mod conflicts;
pub mod grouper;
pub mod orchestrator;
pub mod plan;
pub mod scorer;
pub mod upsert;
pub mod weight;

pub use conflicts::{detect_conflicts, record_conflict, ConflictOutcome};
pub use grouper::{group_by_signature, FitmentGroup, SignatureMode};
pub use orchestrator::{
    BatchSummary, ConsensusProcessor, PartSummary, ProcessorConfig, SkipReason,
};
pub use plan::{BatchPlan, GroupPlan, PartPlan};
pub use scorer::{score_group, status_for, ConsensusScore};
pub use upsert::{upsert_consensus, UpsertOutcome};
pub use weight::WeightPolicy;
