//! Daily trends

use chrono::{DateTime, Duration, Utc};
use fitcon_common::time::{day_key, format_timestamp};
use fitcon_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTrend {
    /// `YYYY-MM-DD` (UTC)
    pub date: String,
    pub observations: i64,
    /// Consensus fitments last touched that day
    pub consensus_updates: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendAnalysis {
    pub period_days: i64,
    /// Oldest first, ending with the day of `now`
    pub daily: Vec<DailyTrend>,
    pub total_observations_in_period: i64,
    pub total_consensus_in_period: i64,
}

async fn counts_by_day(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    since: &str,
) -> Result<HashMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(&format!(
        "SELECT substr({column}, 1, 10) AS day, COUNT(*) FROM {table} WHERE {column} >= ? GROUP BY day"
    ))
    .bind(since)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

pub async fn analyze(pool: &SqlitePool, days_back: i64, now: DateTime<Utc>) -> Result<TrendAnalysis> {
    if days_back < 1 {
        return Err(Error::InvalidInput(format!(
            "days_back must be at least 1, got {}",
            days_back
        )));
    }

    let first_day = (now - Duration::days(days_back - 1))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| Error::Internal("invalid trend window start".to_string()))?;
    let since = format_timestamp(&first_day);

    let observations = counts_by_day(pool, "observations", "extraction_date", &since).await?;
    let consensus = counts_by_day(pool, "consensus_fitments", "last_updated", &since).await?;

    let daily: Vec<DailyTrend> = (0..days_back)
        .map(|offset| {
            let date = day_key(&(first_day + Duration::days(offset)));
            DailyTrend {
                observations: observations.get(&date).copied().unwrap_or(0),
                consensus_updates: consensus.get(&date).copied().unwrap_or(0),
                date,
            }
        })
        .collect();

    Ok(TrendAnalysis {
        period_days: days_back,
        total_observations_in_period: daily.iter().map(|d| d.observations).sum(),
        total_consensus_in_period: daily.iter().map(|d| d.consensus_updates).sum(),
        daily,
    })
}
