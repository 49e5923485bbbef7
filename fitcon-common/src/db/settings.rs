//! Settings database access
//!
//! Read/write settings from the settings table (key-value store).
//! Policy values that operators tune without a rebuild live here.

use crate::{Error, Result};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Quality weight: applied to every observation
pub const WEIGHT_BASE_KEY: &str = "weight_base";
/// Quality weight increment: seller is verified
pub const WEIGHT_VERIFIED_SELLER_KEY: &str = "weight_verified_seller";
/// Quality weight increment: seller is a business
pub const WEIGHT_BUSINESS_SELLER_KEY: &str = "weight_business_seller";
/// Quality weight increment: listing cites an OEM reference
pub const WEIGHT_OEM_REFERENCE_KEY: &str = "weight_oem_reference";
/// Quality weight increment: listing has a detailed description
pub const WEIGHT_DETAILED_DESCRIPTION_KEY: &str = "weight_detailed_description";
/// Upper bound on time spent retrying a write that hit lock contention
pub const MAX_LOCK_WAIT_MS_KEY: &str = "database_max_lock_wait_ms";

/// Default values written on first run
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    (WEIGHT_BASE_KEY, "1.0"),
    (WEIGHT_VERIFIED_SELLER_KEY, "1.0"),
    (WEIGHT_BUSINESS_SELLER_KEY, "0.5"),
    (WEIGHT_OEM_REFERENCE_KEY, "1.0"),
    (WEIGHT_DETAILED_DESCRIPTION_KEY, "0.5"),
    (MAX_LOCK_WAIT_MS_KEY, "5000"),
];

/// Initialize or repair default settings
///
/// Missing keys are inserted; NULL values are reset to the default.
/// Operator-edited values are left alone.
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    for (key, value) in DEFAULT_SETTINGS {
        ensure_setting(pool, key, value).await?;
    }
    Ok(())
}

/// Insert a setting if absent, or reset it if NULL
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = CURRENT_TIMESTAMP
        WHERE settings.value IS NULL
        "#,
    )
    .bind(key)
    .bind(default_value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Generic setting getter
///
/// Returns `Ok(None)` when the key is absent or NULL, and a config error when
/// the stored text does not parse as `T`.
pub async fn get_setting<T: FromStr>(pool: &SqlitePool, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match value.flatten() {
        Some(s) => match s.trim().parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
pub async fn set_setting<T: ToString>(pool: &SqlitePool, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(pool)
    .await?;

    Ok(())
}
