use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use trafikk_core::{CliOverrides, FileConfig, PipelineConfig, RunSummary};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Norwegian road traffic batch analytics", long_about = None)]
struct Cli {
    /// Observation CSV file, or a directory searched recursively for *.csv
    #[arg(long)]
    observations: Option<PathBuf>,

    /// Station metadata CSV (station_id, region, road_category)
    #[arg(long)]
    stations: Option<PathBuf>,

    /// Directory the processed artifacts are published into
    #[arg(long)]
    out: Option<PathBuf>,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rolling window in days; repeat for several windows (overrides the
    /// configuration file)
    #[arg(long)]
    window: Vec<usize>,

    /// Print the per-group monthly statistics and the impact and recovery
    /// breakdown
    #[arg(long)]
    analysis: bool,

    /// Log at debug level (RUST_LOG wins when set)
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .json()
        .init();

    let file = match &cli.config {
        Some(path) => FileConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => FileConfig::default(),
    };
    let config = PipelineConfig::resolve(
        file,
        CliOverrides {
            observations: cli.observations,
            stations: cli.stations,
            out_dir: cli.out,
            windows: cli.window,
        },
    )?;

    let summary = trafikk_core::run(&config)?;

    print_digest(&config, &summary);
    if cli.analysis {
        print_analysis(&summary);
    }

    Ok(())
}

fn print_digest(config: &PipelineConfig, summary: &RunSummary) {
    println!(
        "Kept {} of {} rows from {} files ({} rejected, {} duplicates replaced).",
        summary.load.rows_kept,
        summary.load.rows_read,
        summary.load.files_read,
        summary.load.rows_rejected,
        summary.load.duplicates_replaced
    );
    println!(
        "Stations: {} observed, {} in the metadata table, {} unresolved, {} dropped.",
        summary.stations.observed,
        summary.stations.table_rows,
        summary.stations.unresolved,
        summary.stations.dropped
    );
    if !summary.load.top_reject_reasons.is_empty() {
        println!("Top rejection reasons:");
        for entry in &summary.load.top_reject_reasons {
            println!("  {}: {}", entry.reason, entry.count);
        }
    }
    println!(
        "Published {} trend, {} impact, {} seasonal and {} monthly rows to {}.",
        summary.artifacts.trend_rows,
        summary.artifacts.impact_rows,
        summary.artifacts.seasonal_rows,
        summary.artifacts.monthly_rows,
        config.out_dir.display()
    );
}

fn print_analysis(summary: &RunSummary) {
    if !summary.statistics.is_empty() {
        println!("Monthly volume by group:");
        for entry in &summary.statistics {
            println!(
                "  {} {}: avg {}, std {}, min {}, max {}, avg growth {} over {} months",
                entry.group_kind,
                entry.group_key,
                formatted_volume(entry.avg_traffic),
                formatted_volume(entry.std_traffic),
                formatted_volume(entry.min_traffic),
                formatted_volume(entry.max_traffic),
                formatted_pct(entry.avg_growth_pct),
                entry.months_tracked
            );
        }
    }
    if summary.recovery.is_empty() {
        println!("No recovery assessments: the configured periods have no Impact/Recovery pair.");
        return;
    }
    println!("Impact and recovery by group:");
    for entry in &summary.recovery {
        let full_recovery = match entry.full_recovery {
            Some(true) => "yes",
            Some(false) => "no",
            None => "undefined",
        };
        println!(
            "  {} {}: decline {}, recovery rate {}, full recovery {}",
            entry.group_kind,
            entry.group_key,
            formatted_pct(entry.impact_decline_pct),
            formatted_pct(entry.recovery_rate_pct),
            full_recovery
        );
    }
    println!(
        "Undefined impact metrics: {} of {}.",
        summary.metrics.undefined_impact_metrics, summary.artifacts.impact_rows
    );
}

fn formatted_pct(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.1}%"),
        None => "undefined".to_string(),
    }
}

fn formatted_volume(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.1}"),
        None => "undefined".to_string(),
    }
}
