//! Batch orchestration
//!
//! Drives grouping, scoring, upserting and conflict detection one part
//! number at a time. Part numbers share no state, so batch runs process up
//! to `workers` of them concurrently. A failure in one part number is logged
//! and counted; only a fatal storage error aborts the run.

use super::conflicts::{conflict_description, detect_conflicts, record_conflict};
use super::grouper::{group_by_signature, SignatureMode};
use super::scorer::score_group;
use super::upsert::upsert_consensus;
use super::weight::WeightPolicy;
use crate::db::observations;
use fitcon_common::config::EngineConfig;
use fitcon_common::db::settings::{get_setting, MAX_LOCK_WAIT_MS_KEY};
use fitcon_common::{Error, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Default retry budget when the setting is absent
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Why a part number was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InsufficientData,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::InsufficientData => "insufficient_data",
        }
    }
}

/// Outcome of reconciling one part number
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartSummary {
    pub part_number: String,
    /// Groups scored and written (new and refreshed alike)
    pub processed: usize,
    /// Consensus records created for the first time
    pub created: usize,
    pub skipped: usize,
    pub skip_reason: Option<SkipReason>,
    /// Conflict records newly created
    pub conflicts: usize,
    /// Heuristic messages fired, whether or not the record already existed
    pub conflict_messages: usize,
    pub total_groups: usize,
    pub total_observations: usize,
}

impl PartSummary {
    fn skipped(part_number: &str, total_observations: usize) -> Self {
        Self {
            part_number: part_number.to_string(),
            processed: 0,
            created: 0,
            skipped: 1,
            skip_reason: Some(SkipReason::InsufficientData),
            conflicts: 0,
            conflict_messages: 0,
            total_groups: 0,
            total_observations,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skip_reason.is_some()
    }
}

/// Totals for a batch run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    /// Part numbers selected for the run
    pub total_candidates: usize,
    /// Part numbers reconciled without error
    pub total_parts_processed: usize,
    /// Groups written across all part numbers
    pub total_processed: usize,
    pub total_created: usize,
    pub total_conflicts: usize,
    pub skipped_parts: usize,
    pub failed_parts: usize,
    pub failed_part_numbers: Vec<String>,
    /// True when cancellation stopped the run before every candidate ran
    pub interrupted: bool,
}

impl BatchSummary {
    fn new(run_id: Uuid, total_candidates: usize) -> Self {
        Self {
            run_id,
            total_candidates,
            total_parts_processed: 0,
            total_processed: 0,
            total_created: 0,
            total_conflicts: 0,
            skipped_parts: 0,
            failed_parts: 0,
            failed_part_numbers: Vec::new(),
            interrupted: false,
        }
    }

    fn absorb(&mut self, part: &PartSummary) {
        if part.is_skipped() {
            self.skipped_parts += 1;
            return;
        }
        self.total_parts_processed += 1;
        self.total_processed += part.processed;
        self.total_created += part.created;
        self.total_conflicts += part.conflicts;
    }
}

/// Engine tuning carried by a processor
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub weights: WeightPolicy,
    pub signature_mode: SignatureMode,
    /// Part numbers processed concurrently in batch runs
    pub workers: usize,
    pub max_lock_wait_ms: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            weights: WeightPolicy::default(),
            signature_mode: SignatureMode::Exact,
            workers: 4,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }
}

/// Consensus processor
///
/// Holds no per-run state: `min_observations` is passed into every call.
#[derive(Debug, Clone)]
pub struct ConsensusProcessor {
    db: SqlitePool,
    config: ProcessorConfig,
    cancel: CancellationToken,
}

impl ConsensusProcessor {
    pub fn new(db: SqlitePool, config: ProcessorConfig) -> Self {
        Self {
            db,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Build a processor from the settings table plus the `[engine]` config
    pub async fn from_database(db: SqlitePool, engine: &EngineConfig) -> Result<Self> {
        engine.validate()?;

        let weights = WeightPolicy::load(&db).await?;
        let max_lock_wait_ms = get_setting(&db, MAX_LOCK_WAIT_MS_KEY)
            .await?
            .unwrap_or(DEFAULT_MAX_LOCK_WAIT_MS);
        let signature_mode = if engine.normalize_signatures {
            SignatureMode::Normalized
        } else {
            SignatureMode::Exact
        };

        debug!(?weights, ?signature_mode, workers = engine.workers, "Consensus processor configured");

        Ok(Self::new(
            db,
            ProcessorConfig {
                weights,
                signature_mode,
                workers: engine.workers,
                max_lock_wait_ms,
            },
        ))
    }

    /// Stop scheduling new part numbers once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    /// Reconcile every observation of one part number
    ///
    /// Fewer than `min_observations` observations is an explicit skip with
    /// reason `insufficient_data`, not an error.
    pub async fn process_part_number(
        &self,
        part_number: &str,
        min_observations: i64,
    ) -> Result<PartSummary> {
        validate_min_observations(min_observations)?;

        let loaded = observations::load_for_part(&self.db, part_number).await?;
        let total_observations = loaded.len();

        if (total_observations as i64) < min_observations {
            debug!(
                part_number,
                observations = total_observations,
                min_observations,
                "Skipping part number: insufficient data"
            );
            return Ok(PartSummary::skipped(part_number, total_observations));
        }

        for observation in &loaded {
            observation.validate()?;
        }

        let groups = group_by_signature(loaded, self.config.signature_mode);
        let mut summary = PartSummary {
            part_number: part_number.to_string(),
            processed: 0,
            created: 0,
            skipped: 0,
            skip_reason: None,
            conflicts: 0,
            conflict_messages: 0,
            total_groups: groups.len(),
            total_observations,
        };

        for group in &groups {
            let score = score_group(&group.observations, &self.config.weights)?;
            let outcome = upsert_consensus(
                &self.db,
                part_number,
                group,
                &score,
                self.config.signature_mode,
                self.config.max_lock_wait_ms,
            )
            .await?;

            summary.processed += 1;
            if outcome.created {
                summary.created += 1;
            }
        }

        let messages = detect_conflicts(&groups);
        summary.conflict_messages = messages.len();
        if !messages.is_empty() {
            let description = conflict_description(&messages);
            let outcome = record_conflict(
                &self.db,
                part_number,
                &groups,
                &description,
                self.config.max_lock_wait_ms,
            )
            .await?;
            if outcome.created {
                summary.conflicts += 1;
            }
        }

        debug!(
            part_number,
            groups = summary.total_groups,
            created = summary.created,
            conflicts = summary.conflicts,
            "Part number reconciled"
        );

        Ok(summary)
    }

    /// Reconcile every part number with at least `min_observations`
    pub async fn process_all_new_data(&self, min_observations: i64) -> Result<BatchSummary> {
        validate_min_observations(min_observations)?;
        let candidates = observations::eligible_part_numbers(&self.db, min_observations).await?;
        self.run_batch(candidates, min_observations).await
    }

    /// Reconcile eligible part numbers with observations newer than their
    /// latest consensus update, or with no consensus yet
    pub async fn process_new_data(&self, min_observations: i64) -> Result<BatchSummary> {
        validate_min_observations(min_observations)?;
        let candidates =
            observations::part_numbers_with_new_data(&self.db, min_observations).await?;
        self.run_batch(candidates, min_observations).await
    }

    async fn run_batch(&self, candidates: Vec<String>, min_observations: i64) -> Result<BatchSummary> {
        let run_id = Uuid::new_v4();
        let mut summary = BatchSummary::new(run_id, candidates.len());
        let workers = self.config.workers.max(1);

        info!(
            %run_id,
            candidates = candidates.len(),
            min_observations,
            workers,
            "Starting consensus batch"
        );

        let results = stream::iter(candidates)
            .map(|part_number| async move {
                if self.cancel.is_cancelled() {
                    return (part_number, None);
                }
                let outcome = self.process_part_number(&part_number, min_observations).await;
                (part_number, Some(outcome))
            })
            .buffer_unordered(workers);
        futures::pin_mut!(results);

        let mut completed = 0usize;
        while let Some((part_number, outcome)) = results.next().await {
            match outcome {
                None => summary.interrupted = true,
                Some(Ok(part)) => summary.absorb(&part),
                Some(Err(e)) if e.is_fatal() => {
                    error!(%run_id, part_number = %part_number, error = %e, "Storage failure, aborting batch");
                    return Err(e);
                }
                Some(Err(e)) => {
                    error!(%run_id, part_number = %part_number, error = %e, "Part number failed");
                    summary.failed_parts += 1;
                    summary.failed_part_numbers.push(part_number);
                }
            }

            completed += 1;
            if completed % 100 == 0 {
                info!(%run_id, progress = format!("{}/{}", completed, summary.total_candidates), "Batch progress");
            }
        }

        summary.failed_part_numbers.sort();

        if summary.interrupted {
            warn!(
                %run_id,
                parts_processed = summary.total_parts_processed,
                total_candidates = summary.total_candidates,
                "Batch interrupted before all part numbers were processed"
            );
        }

        info!(
            %run_id,
            parts = summary.total_parts_processed,
            groups = summary.total_processed,
            conflicts = summary.total_conflicts,
            skipped = summary.skipped_parts,
            failed = summary.failed_parts,
            "Consensus batch complete"
        );

        Ok(summary)
    }
}

pub(crate) fn validate_min_observations(min_observations: i64) -> Result<()> {
    if min_observations < 1 {
        return Err(Error::InvalidInput(format!(
            "min_observations must be at least 1, got {}",
            min_observations
        )));
    }
    Ok(())
}
