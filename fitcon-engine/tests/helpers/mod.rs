//! Test helper utilities
//!
//! Shared database setup and seeding for fitcon-engine integration tests

#![allow(dead_code)]

use fitcon_common::db::init_database;
use fitcon_common::NewObservation;
use fitcon_engine::db::observations::insert_observation;
use fitcon_engine::{ConsensusProcessor, ProcessorConfig};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create a temporary database with the full schema
///
/// Returns (TempDir, SqlitePool). The TempDir must outlive the test.
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("fitcon_test.db"))
        .await
        .unwrap();
    (temp_dir, pool)
}

/// Processor with default policy
pub fn processor(pool: &SqlitePool) -> ConsensusProcessor {
    ConsensusProcessor::new(pool.clone(), ProcessorConfig::default())
}

/// Insert observations, returning their ids in order
pub async fn seed(pool: &SqlitePool, observations: &[NewObservation]) -> Vec<i64> {
    let mut ids = Vec::with_capacity(observations.len());
    for observation in observations {
        ids.push(insert_observation(pool, observation).await.unwrap());
    }
    ids
}

/// The three-listing ABC-123 data set: two listings for the 2010 TL, one
/// for the 2011 TL
pub fn abc_123() -> Vec<NewObservation> {
    vec![
        NewObservation::new("ABC-123", 2010, "Acura", "TL")
            .trim("Base")
            .engine("3.5L V6")
            .verified_seller(true)
            .oem_reference(true),
        NewObservation::new("ABC-123", 2010, "Acura", "TL")
            .trim("Base")
            .engine("3.5L V6")
            .business_seller(true),
        NewObservation::new("ABC-123", 2011, "Acura", "TL")
            .trim("Base")
            .engine("3.5L V6"),
    ]
}

/// Simple listing without trim, engine or trust signals
pub fn listing(part_number: &str, year: i64, make: &str, model: &str) -> NewObservation {
    NewObservation::new(part_number, year, make, model)
}

/// Row count of a table
pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}
