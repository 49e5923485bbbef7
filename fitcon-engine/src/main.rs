//! fitcon-engine - Fitment consensus reconciliation
//!
//! Reconciles scraped fitment observations into consensus fitments for one
//! part number, every eligible part number, or only those with new data.
//! Intended to run on a schedule; re-running is always safe.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use fitcon_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use fitcon_common::db::init_database;
use fitcon_common::FitmentStatus;
use fitcon_engine::build_info;
use fitcon_engine::db::observations;
use fitcon_engine::{
    get_processing_stats, BatchPlan, BatchSummary, ConsensusProcessor, PartPlan, PartSummary,
    ProcessingStats,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for fitcon-engine
#[derive(Parser, Debug)]
#[command(name = "fitcon-engine")]
#[command(about = "Reconcile fitment observations into consensus fitments")]
#[command(version)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["part_number", "all", "new_data_only", "stats_only"])
))]
struct Args {
    /// Process a single part number
    #[arg(long)]
    part_number: Option<String>,

    /// Process every part number with enough observations
    #[arg(long)]
    all: bool,

    /// Process part numbers with observations newer than their consensus
    #[arg(long)]
    new_data_only: bool,

    /// Only print processing statistics
    #[arg(long)]
    stats_only: bool,

    /// Minimum observations before a part number is reconciled
    #[arg(long)]
    min_observations: Option<i64>,

    /// Show what would be processed without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Part numbers processed concurrently
    #[arg(long)]
    workers: Option<usize>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Root folder holding fitcon.db
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Explicit database file (overrides the root folder)
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing starts so `[logging] level` applies
    let (config_path, config) = match TomlConfig::load().context("Failed to load config file")? {
        Some((path, config)) => (Some(path), config),
        None => (None, TomlConfig::default()),
    };

    let default_level = if args.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("{}", build_info::banner("fitcon-engine", env!("CARGO_PKG_VERSION")));

    match &config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => warn!("No config file found, using defaults"),
    }

    let mut engine_config = config.engine.clone();
    if let Some(min) = args.min_observations {
        engine_config.min_observations = min;
    }
    if let Some(workers) = args.workers {
        engine_config.workers = workers;
    }
    engine_config.validate()?;
    let min_observations = engine_config.min_observations;

    let db_path = match &args.database {
        Some(path) => path.clone(),
        None => {
            let root_folder = RootFolderResolver::new("engine")
                .with_cli_arg(args.root_folder.as_deref())
                .with_toml(&config)
                .resolve();
            let initializer = RootFolderInitializer::new(root_folder);
            initializer.ensure_directory_exists()?;
            initializer.database_path()
        }
    };
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight part numbers");
            ctrl_c_token.cancel();
        }
    });

    let processor = ConsensusProcessor::from_database(pool.clone(), &engine_config)
        .await?
        .with_cancellation(cancel);

    if args.stats_only {
        print_stats(&get_processing_stats(&pool).await?);
    } else if let Some(part_number) = &args.part_number {
        if observations::count_for_part(&pool, part_number).await? == 0 {
            warn!(part_number = %part_number, "No observations found");
            println!("No observations found for part number {}", part_number);
        } else if args.dry_run {
            print_part_plan(&processor.plan_part_number(part_number, min_observations).await?);
        } else {
            let summary = processor
                .process_part_number(part_number, min_observations)
                .await
                .with_context(|| format!("Processing part number {} failed", part_number))?;
            print_part_summary(&summary);
        }
    } else if args.dry_run {
        print_batch_plan(&processor.plan_batch(min_observations).await?);
    } else {
        let summary = if args.new_data_only {
            processor.process_new_data(min_observations).await?
        } else {
            processor.process_all_new_data(min_observations).await?
        };
        print_batch_summary(&summary);
        print_stats(&get_processing_stats(&pool).await?);
    }

    pool.close().await;
    Ok(())
}

fn print_part_summary(summary: &PartSummary) {
    println!("Part number {}", summary.part_number);
    if let Some(reason) = summary.skip_reason {
        println!(
            "  Skipped ({}): {} observations",
            reason.as_str(),
            summary.total_observations
        );
        return;
    }
    println!("  Observations:     {}", summary.total_observations);
    println!("  Groups:           {}", summary.total_groups);
    println!("  Processed:        {} ({} new)", summary.processed, summary.created);
    println!("  Conflicts:        {} new", summary.conflicts);
}

fn print_batch_summary(summary: &BatchSummary) {
    println!("Batch {}", summary.run_id);
    println!("  Candidates:       {}", summary.total_candidates);
    println!("  Parts processed:  {}", summary.total_parts_processed);
    println!(
        "  Groups processed: {} ({} new)",
        summary.total_processed, summary.total_created
    );
    println!("  Conflicts:        {} new", summary.total_conflicts);
    println!("  Skipped:          {}", summary.skipped_parts);
    println!("  Failed:           {}", summary.failed_parts);
    for part_number in &summary.failed_part_numbers {
        println!("    - {}", part_number);
    }
    if summary.interrupted {
        println!("  Interrupted before all part numbers were processed");
    }
}

fn print_part_plan(plan: &PartPlan) {
    println!("Dry run: part number {}", plan.part_number);
    println!("  Observations: {}", plan.observation_count);
    if plan.would_skip {
        println!("  Would skip (insufficient_data)");
        return;
    }
    for group in &plan.groups {
        println!(
            "  {} [{} obs, weight {:.2}] -> {:.2} {}",
            group.signature, group.observation_count, group.total_weight, group.confidence, group.status
        );
    }
    for message in &plan.conflict_messages {
        println!("  Conflict: {}", message);
    }
}

fn print_batch_plan(plan: &BatchPlan) {
    println!("Dry run: {} part numbers with >= {} observations", plan.candidate_count, plan.min_observations);
    for (bucket, parts) in &plan.distribution {
        println!("  {:>9} observations: {} part numbers", bucket, parts);
    }
}

fn print_stats(stats: &ProcessingStats) {
    println!("Processing statistics");
    println!("  Observations:        {}", stats.raw_total);
    println!("  Part numbers:        {}", stats.unique_part_numbers);
    println!("  Consensus fitments:  {}", stats.consensus_total);
    for status in FitmentStatus::ALL {
        println!("    {:<18} {}", status.description(), stats.count(status));
    }
    println!("  Pending conflicts:   {}", stats.pending_conflicts);
    println!("  High confidence:     {:.2}%", stats.high_confidence_pct);
    println!("  Production ready:    {:.2}%", stats.production_ready_pct);
}
