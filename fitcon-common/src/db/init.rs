//! Database initialization
//!
//! Creates the database on first run and brings the schema up to date.
//! Every statement is idempotent, so opening an existing database is safe.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// How long a connection waits on a locked database before reporting busy
pub const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Options apply to every pooled connection, unlike a one-off PRAGMA
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(16)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_tables(&pool).await?;
    crate::db::settings::init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create every table and index used by the fitcon tools
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_observations_table(pool).await?;
    create_consensus_fitments_table(pool).await?;
    create_consensus_support_table(pool).await?;
    create_conflicting_fitments_table(pool).await?;
    create_conflict_observations_table(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores policy values (quality weights, lock wait) as key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Raw marketplace observations, written by the ingestion layer
async fn create_observations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            part_number TEXT NOT NULL CHECK (length(part_number) > 0),
            vehicle_year INTEGER NOT NULL,
            vehicle_make TEXT NOT NULL,
            vehicle_model TEXT NOT NULL,
            vehicle_trim TEXT NOT NULL DEFAULT '',
            vehicle_engine TEXT NOT NULL DEFAULT '',
            is_verified_seller INTEGER NOT NULL DEFAULT 0,
            seller_is_business INTEGER NOT NULL DEFAULT 0,
            has_oem_reference INTEGER NOT NULL DEFAULT 0,
            has_detailed_description INTEGER NOT NULL DEFAULT 0,
            extraction_date TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_observations_part_number ON observations(part_number)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_observations_extraction_date ON observations(extraction_date)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Canonical reconciled fitments, one per part number + signature
async fn create_consensus_fitments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS consensus_fitments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            part_number TEXT NOT NULL,
            vehicle_year INTEGER NOT NULL,
            vehicle_make TEXT NOT NULL,
            vehicle_model TEXT NOT NULL,
            vehicle_trim TEXT NOT NULL DEFAULT '',
            vehicle_engine TEXT NOT NULL DEFAULT '',
            confidence_score REAL NOT NULL
                CHECK (confidence_score >= 0 AND confidence_score <= 100),
            supporting_observations_count INTEGER NOT NULL
                CHECK (supporting_observations_count >= 1),
            total_weight_score REAL NOT NULL CHECK (total_weight_score >= 0),
            status TEXT NOT NULL CHECK (status IN (
                'HIGH_CONFIDENCE', 'MEDIUM_CONFIDENCE', 'LOW_CONFIDENCE',
                'NEEDS_REVIEW', 'VERIFIED'
            )),
            last_updated TEXT NOT NULL,
            UNIQUE (part_number, vehicle_year, vehicle_make, vehicle_model,
                    vehicle_trim, vehicle_engine)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_consensus_status ON consensus_fitments(status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Observations currently supporting each consensus fitment
async fn create_consensus_support_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS consensus_support (
            consensus_id INTEGER NOT NULL
                REFERENCES consensus_fitments(id) ON DELETE CASCADE,
            observation_id INTEGER NOT NULL
                REFERENCES observations(id) ON DELETE CASCADE,
            PRIMARY KEY (consensus_id, observation_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Conflict flags awaiting human review
async fn create_conflicting_fitments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conflicting_fitments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            part_number TEXT NOT NULL,
            conflict_description TEXT NOT NULL,
            resolution_status TEXT NOT NULL DEFAULT 'PENDING'
                CHECK (resolution_status IN ('PENDING', 'RESOLVED', 'DISMISSED')),
            created_date TEXT NOT NULL,
            UNIQUE (part_number, conflict_description)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_conflicts_resolution ON conflicting_fitments(resolution_status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_conflict_observations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conflict_observations (
            conflict_id INTEGER NOT NULL
                REFERENCES conflicting_fitments(id) ON DELETE CASCADE,
            observation_id INTEGER NOT NULL
                REFERENCES observations(id) ON DELETE CASCADE,
            PRIMARY KEY (conflict_id, observation_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
