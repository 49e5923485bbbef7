//! Test helper utilities
//!
//! Builds a database through the engine, then opens it the way fitcon-qa does

#![allow(dead_code)]

use fitcon_common::db::init_database;
use fitcon_common::NewObservation;
use fitcon_engine::db::observations::insert_observation;
use fitcon_engine::{ConsensusProcessor, ProcessorConfig};
use fitcon_qa::db::connect_readonly;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tempfile::TempDir;

pub const DB_FILE: &str = "fitcon_qa_test.db";

/// Writable database with the full schema
///
/// Returns (TempDir, SqlitePool). The TempDir must outlive the test.
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join(DB_FILE)).await.unwrap();
    (temp_dir, pool)
}

pub fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join(DB_FILE)
}

/// Read-only pool over the same file
pub async fn readonly(dir: &TempDir) -> SqlitePool {
    connect_readonly(&db_path(dir)).await.unwrap()
}

pub async fn seed(pool: &SqlitePool, observations: &[NewObservation]) {
    for observation in observations {
        insert_observation(pool, observation).await.unwrap();
    }
}

/// Reconcile everything with at least two observations
pub async fn process(pool: &SqlitePool) {
    ConsensusProcessor::new(pool.clone(), ProcessorConfig::default())
        .process_all_new_data(2)
        .await
        .unwrap();
}

/// Three part numbers:
/// - ABC-123: 2010 TL twice (verified+OEM, business), 2011 TL once
/// - XMAKE-1: Honda Accord and Acura TSX, a cross-manufacturer conflict
/// - LONE-1: a single listing, below the default threshold
pub fn mixed_catalog() -> Vec<NewObservation> {
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
        NewObservation::new("XMAKE-1", 2008, "Honda", "Accord"),
        NewObservation::new("XMAKE-1", 2008, "Acura", "TSX"),
        NewObservation::new("LONE-1", 2010, "Acura", "TL"),
    ]
}
