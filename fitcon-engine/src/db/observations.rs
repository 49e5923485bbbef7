//! Observation persistence
//!
//! The engine only reads observations. `insert_observation` exists for
//! ingestion adapters and test seeding.

use fitcon_common::time::{format_timestamp, parse_timestamp};
use fitcon_common::{NewObservation, Observation, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const OBSERVATION_COLUMNS: &str = r#"
    id, part_number, vehicle_year, vehicle_make, vehicle_model,
    vehicle_trim, vehicle_engine, is_verified_seller, seller_is_business,
    has_oem_reference, has_detailed_description, extraction_date
"#;

fn row_to_observation(row: &SqliteRow) -> Result<Observation> {
    let extraction_date: String = row.try_get("extraction_date")?;

    Ok(Observation {
        id: row.try_get("id")?,
        part_number: row.try_get("part_number")?,
        vehicle_year: row.try_get("vehicle_year")?,
        vehicle_make: row.try_get("vehicle_make")?,
        vehicle_model: row.try_get("vehicle_model")?,
        vehicle_trim: row.try_get("vehicle_trim")?,
        vehicle_engine: row.try_get("vehicle_engine")?,
        is_verified_seller: row.try_get("is_verified_seller")?,
        seller_is_business: row.try_get("seller_is_business")?,
        has_oem_reference: row.try_get("has_oem_reference")?,
        has_detailed_description: row.try_get("has_detailed_description")?,
        extraction_date: parse_timestamp(&extraction_date)?,
    })
}

/// Load every observation for a part number, in insertion order
pub async fn load_for_part(pool: &SqlitePool, part_number: &str) -> Result<Vec<Observation>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM observations WHERE part_number = ? ORDER BY id",
        OBSERVATION_COLUMNS
    ))
    .bind(part_number)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_observation).collect()
}

/// Observations linked to a conflict record, in id order
pub async fn load_for_conflict(pool: &SqlitePool, conflict_id: i64) -> Result<Vec<Observation>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM observations
        WHERE id IN (SELECT observation_id FROM conflict_observations WHERE conflict_id = ?)
        ORDER BY id
        "#,
        OBSERVATION_COLUMNS
    ))
    .bind(conflict_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_observation).collect()
}

/// Insert a new observation, returning its id
pub async fn insert_observation(pool: &SqlitePool, observation: &NewObservation) -> Result<i64> {
    observation.validate()?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO observations (
            part_number, vehicle_year, vehicle_make, vehicle_model,
            vehicle_trim, vehicle_engine, is_verified_seller, seller_is_business,
            has_oem_reference, has_detailed_description, extraction_date
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&observation.part_number)
    .bind(observation.vehicle_year)
    .bind(&observation.vehicle_make)
    .bind(&observation.vehicle_model)
    .bind(&observation.vehicle_trim)
    .bind(&observation.vehicle_engine)
    .bind(observation.is_verified_seller)
    .bind(observation.seller_is_business)
    .bind(observation.has_oem_reference)
    .bind(observation.has_detailed_description)
    .bind(format_timestamp(&observation.extraction_date))
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Number of observations recorded for a part number
pub async fn count_for_part(pool: &SqlitePool, part_number: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM observations WHERE part_number = ?")
        .bind(part_number)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Part numbers with at least `min_observations` observations, sorted
pub async fn eligible_part_numbers(pool: &SqlitePool, min_observations: i64) -> Result<Vec<String>> {
    let part_numbers: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT part_number
        FROM observations
        GROUP BY part_number
        HAVING COUNT(*) >= ?
        ORDER BY part_number
        "#,
    )
    .bind(min_observations)
    .fetch_all(pool)
    .await?;

    Ok(part_numbers)
}

/// Eligible part numbers that have never been reconciled, or whose newest
/// observation was extracted after their newest consensus update
pub async fn part_numbers_with_new_data(
    pool: &SqlitePool,
    min_observations: i64,
) -> Result<Vec<String>> {
    let part_numbers: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT o.part_number
        FROM observations o
        LEFT JOIN (
            SELECT part_number, MAX(last_updated) AS last_reconciled
            FROM consensus_fitments
            GROUP BY part_number
        ) c ON c.part_number = o.part_number
        GROUP BY o.part_number
        HAVING COUNT(*) >= ?
           AND (MAX(c.last_reconciled) IS NULL
                OR MAX(o.extraction_date) > MAX(c.last_reconciled))
        ORDER BY o.part_number
        "#,
    )
    .bind(min_observations)
    .fetch_all(pool)
    .await?;

    Ok(part_numbers)
}

/// Total observation count
pub async fn count_all(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM observations")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Number of distinct part numbers with observations
pub async fn count_part_numbers(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT part_number) FROM observations")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
