//! Engine database access
//!
//! Reads and ingestion-side writes. Consensus and conflict writes live with
//! the algorithms that produce them in `consensus::upsert` and
//! `consensus::conflicts`.

pub mod conflicts;
pub mod consensus;
pub mod observations;
