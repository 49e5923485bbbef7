//! fitcon-qa - Consensus quality analysis
//!
//! Read-only reporting over the database written by fitcon-engine: the
//! quality analysis (default), conflict review and a health check. Never
//! modifies the database.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fitcon_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use fitcon_common::{time, ResolutionStatus};
use fitcon_engine::build_info;
use fitcon_engine::consensus::WeightPolicy;
use fitcon_qa::db::connect_readonly;
use fitcon_qa::{
    generate, report, review_conflicts, run_health_check, AnalysisParams, ConflictFilter,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for fitcon-qa
#[derive(Parser, Debug)]
#[command(name = "fitcon-qa")]
#[command(about = "Analyze consensus fitment data quality")]
#[command(version)]
struct Args {
    /// Show the confidence score histogram
    #[arg(long)]
    confidence_breakdown: bool,

    /// Show part number processing coverage
    #[arg(long)]
    part_coverage: bool,

    /// Show daily trends
    #[arg(long)]
    quality_trends: bool,

    /// Days covered by the trend analysis
    #[arg(long, default_value_t = 30)]
    days_back: i64,

    /// Threshold used to count eligible part numbers
    #[arg(long)]
    min_observations: Option<i64>,

    /// Write the full analysis as JSON into this directory
    #[arg(long, value_name = "DIR")]
    export_json: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Root folder holding fitcon.db
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Explicit database file (overrides the root folder)
    #[arg(long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Review conflict records
    Conflicts {
        /// Resolution status to list
        #[arg(long, default_value = "PENDING")]
        status: ResolutionStatus,

        /// Only this part number
        #[arg(long)]
        part_number: Option<String>,

        /// Only conflicts created at least N days ago
        #[arg(long)]
        age_days: Option<i64>,

        /// Conflicts shown in detail
        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Show linked observations with their weights
        #[arg(long)]
        listings: bool,

        /// Write the review as JSON into this directory
        #[arg(long, value_name = "DIR")]
        export_json: Option<PathBuf>,
    },

    /// Check the database against alert thresholds; fails on critical issues
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

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

    info!("{}", build_info::banner("fitcon-qa", env!("CARGO_PKG_VERSION")));

    match &config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => warn!("No config file found, using defaults"),
    }

    let params = AnalysisParams {
        days_back: args.days_back,
        min_observations: args
            .min_observations
            .unwrap_or(config.engine.min_observations),
    };

    let db_path = match &args.database {
        Some(path) => path.clone(),
        None => {
            let root_folder = RootFolderResolver::new("qa")
                .with_cli_arg(args.root_folder.as_deref())
                .with_toml(&config)
                .resolve();
            RootFolderInitializer::new(root_folder).database_path()
        }
    };
    info!("Database path: {}", db_path.display());

    let pool = connect_readonly(&db_path).await?;
    let weights = WeightPolicy::load(&pool).await?;
    let now = time::now();

    let result = match &args.command {
        None => run_analysis(&pool, &args, &params, &weights, now).await,
        Some(Command::Conflicts {
            status,
            part_number,
            age_days,
            limit,
            listings,
            export_json,
        }) => {
            let filter = ConflictFilter {
                status: *status,
                part_number: part_number.clone(),
                min_age_days: *age_days,
                limit: *limit,
            };
            let review = review_conflicts(&pool, &filter, &weights, now).await?;
            print!("{}", report::render_conflict_review(&review, *listings));
            if let Some(dir) = export_json {
                let name = format!(
                    "conflict_report_{}_{}.json",
                    status.as_str().to_lowercase(),
                    now.format("%Y%m%d_%H%M%S")
                );
                let path = export(&review, dir, &name)?;
                println!("\nConflict report exported to {}", path.display());
            }
            Ok(())
        }
        Some(Command::Health) => {
            let health = run_health_check(&pool, now).await?;
            print!("{}", report::render_health_check(&health));
            if health.passed() {
                Ok(())
            } else {
                Err(anyhow::anyhow!(
                    "Health check found {} critical issue(s)",
                    health.issues.len()
                ))
            }
        }
    };

    pool.close().await;
    result
}

async fn run_analysis(
    pool: &sqlx::SqlitePool,
    args: &Args,
    params: &AnalysisParams,
    weights: &WeightPolicy,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    let analysis = generate(pool, params, weights, now).await?;

    print!("{}", report::render_summary(&analysis));
    if args.confidence_breakdown {
        print!("{}", report::render_confidence_breakdown(&analysis));
    }
    if args.part_coverage {
        print!("{}", report::render_part_coverage(&analysis));
    }
    if args.quality_trends {
        print!("{}", report::render_quality_trends(&analysis));
    }

    if let Some(dir) = &args.export_json {
        let name = format!(
            "consensus_analysis_{}.json",
            analysis.generated_at.format("%Y%m%d_%H%M%S")
        );
        let path = export(&analysis, dir, &name)?;
        println!("\nAnalysis exported to {}", path.display());
    }

    Ok(())
}

/// Write `value` as pretty JSON to `dir/name`
fn export<T: Serialize>(value: &T, dir: &Path, name: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
