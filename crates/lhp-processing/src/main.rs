//! CLI entry point for cleaning and feature engineering.

use anyhow::{Result, anyhow};
use clap::Parser;
use lhp_processing::{CleaningConfig, CleaningReport, DataCleaner, FeatureEngineer, io};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Clean and engineer the Lisbon listings dataset",
    long_about = "Removes duplicates and degenerate columns, imputes missing values, caps \
                  outliers and appends engineered features.\n\n\
                  EXAMPLES:\n  \
                  lhp-process -i data/lisbon-houses.csv\n\n  \
                  lhp-process -i data/lisbon-houses.csv -o data/processed/out.csv --decimal-places 2"
)]
struct Args {
    /// Path to the raw CSV file
    #[arg(short, long)]
    input: PathBuf,

    /// Path of the processed CSV file
    #[arg(short, long, default_value = "data/processed/lisbon_houses_processed.csv")]
    output: PathBuf,

    /// Decimal places kept for float columns
    #[arg(long, default_value = "3")]
    decimal_places: u32,

    /// Minimum |r| between Price and Price M2 for keeping Price M2
    #[arg(long, default_value = "0.3")]
    correlation_threshold: f64,

    /// Keep duplicate rows
    #[arg(long)]
    keep_duplicates: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Print the cleaning report as JSON
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.quiet || args.json);

    let config = CleaningConfig::builder()
        .remove_duplicates(!args.keep_duplicates)
        .correlation_threshold(args.correlation_threshold)
        .decimal_places(args.decimal_places)
        .build()?;

    let raw = io::load_data(&args.input)
        .ok_or_else(|| anyhow!("Could not load dataset from {}", args.input.display()))?;

    let (cleaned, report) = DataCleaner::clean(&raw, &config)?;
    let (engineered, created) = FeatureEngineer::engineer(&cleaned)?;
    io::save_processed_data(&engineered, &args.output, config.decimal_places)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, &created, engineered.shape());
    }
    info!("Preprocessing completed successfully");
    Ok(())
}

/// Human-readable summary of a cleaning run.
fn print_summary(report: &CleaningReport, created: &[String], shape: (usize, usize)) {
    println!("\n{}", "=".repeat(60));
    println!("PREPROCESSING SUMMARY");
    println!("{}", "=".repeat(60));
    println!("  Rows: {} -> {}", report.rows_before, report.rows_after);
    println!("  Duplicates removed: {}", report.duplicates_removed);
    println!("  Columns dropped: {:?}", report.dropped_columns);
    println!("  Values capped: {}", report.total_capped());
    if let Some(r) = report.price_per_area_correlation {
        println!("  Price / Price M2 correlation: {:.3}", r);
    }
    println!("  Engineered features: {:?}", created);
    println!("  Final shape: {} rows x {} columns", shape.0, shape.1);
    println!();
    for (i, action) in report.actions.iter().enumerate() {
        println!("  {}. [{}] {}", i + 1, action.action_type.display_name(), action.description);
    }
    println!("{}", "=".repeat(60));
}
