//! `lhp`: clean, train, evaluate and predict from the command line.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use lhp_learning::{
    CategoricalEncoder, DEFAULT_EVAL_FOLDS, EnsembleResult, Evaluator, ModelFamily, ModelStore,
    ModelTrainer, PerformanceReport, Predictor, ProgressUpdate, RawInput, RunLog, TrainingConfig,
    latest_log, train_test_split,
};
use lhp_processing::{CleaningConfig, DataCleaner, FeatureEngineer, io};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_PROCESSED: &str = "data/processed/lisbon_houses_processed.csv";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Lisbon house price pipeline",
    long_about = "Cleans the listings dataset, trains six regression families, evaluates \
                  them and predicts prices with the thresholded ensemble.\n\n\
                  EXAMPLES:\n  \
                  lhp clean -i data/lisbon-houses.csv\n\n  \
                  lhp train --families ridge --families lasso\n\n  \
                  lhp predict --input-json house.json\n\n  \
                  lhp run-all -i data/lisbon-houses.csv"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean the raw CSV and append engineered features
    Clean {
        /// Path to the raw CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Path of the processed CSV file
        #[arg(short, long, default_value = DEFAULT_PROCESSED)]
        output: PathBuf,

        /// Decimal places kept for float columns
        #[arg(long, default_value = "3")]
        decimal_places: u32,
    },

    /// Grid-search, fit and save every model family
    Train {
        /// Processed CSV file
        #[arg(short, long, default_value = DEFAULT_PROCESSED)]
        data: PathBuf,

        #[command(flatten)]
        dirs: Dirs,

        /// Families to train (default: all)
        #[arg(long, value_enum)]
        families: Vec<FamilyArg>,
    },

    /// Predict a price with every saved model
    Predict {
        #[arg(short, long, default_value = "models")]
        models_dir: PathBuf,

        /// JSON file with one house; a sample house is used when omitted
        #[arg(long)]
        input_json: Option<PathBuf>,
    },

    /// Evaluate and rank every saved model
    Evaluate {
        /// Processed CSV file
        #[arg(short, long, default_value = DEFAULT_PROCESSED)]
        data: PathBuf,

        #[command(flatten)]
        dirs: Dirs,

        /// Cross-validation folds
        #[arg(long, default_value_t = DEFAULT_EVAL_FOLDS)]
        cv_folds: usize,
    },

    /// Clean, train, evaluate and predict the sample house
    RunAll {
        /// Path to the raw CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Path of the processed CSV file
        #[arg(short, long, default_value = DEFAULT_PROCESSED)]
        output: PathBuf,

        #[command(flatten)]
        dirs: Dirs,
    },

    /// Print the most recent run log
    Logs {
        #[arg(long, default_value = "logs")]
        log_dir: PathBuf,
    },
}

#[derive(clap::Args, Debug, Clone)]
struct Dirs {
    /// Directory for model artifacts
    #[arg(short, long, default_value = "models")]
    models_dir: PathBuf,

    /// Directory for run logs
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

/// Model family (CLI wrapper for [`ModelFamily`]).
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FamilyArg {
    RandomForest,
    DecisionTree,
    Ridge,
    Lasso,
    LinearRegression,
    Svr,
}

impl From<FamilyArg> for ModelFamily {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::RandomForest => ModelFamily::RandomForest,
            FamilyArg::DecisionTree => ModelFamily::DecisionTree,
            FamilyArg::Ridge => ModelFamily::Ridge,
            FamilyArg::Lasso => ModelFamily::Lasso,
            FamilyArg::LinearRegression => ModelFamily::LinearRegression,
            FamilyArg::Svr => ModelFamily::Svr,
        }
    }
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
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet);

    match cli.command {
        Command::Clean {
            input,
            output,
            decimal_places,
        } => {
            clean(&input, &output, decimal_places)?;
        }
        Command::Train {
            data,
            dirs,
            families,
        } => {
            let (result, log) = RunLog::capture(&dirs.log_dir, "Model Training", || {
                train(&data, &dirs.models_dir, &families)
            })?;
            result?;
            println!("Log saved to: {}", log.path().display());
        }
        Command::Predict {
            models_dir,
            input_json,
        } => {
            let input = match input_json {
                Some(path) => read_input(&path)?,
                None => sample_input(),
            };
            print_ensemble(&Predictor::new(ModelStore::new(models_dir)).predict_with_all_models(&input));
        }
        Command::Evaluate {
            data,
            dirs,
            cv_folds,
        } => {
            let (result, log) = RunLog::capture(&dirs.log_dir, "Model Evaluation", || {
                evaluate(&data, &dirs.models_dir, cv_folds)
            })?;
            print_report(&result?);
            println!("Log saved to: {}", log.path().display());
        }
        Command::RunAll {
            input,
            output,
            dirs,
        } => {
            let (result, log) = RunLog::capture(&dirs.log_dir, "Full Pipeline", || {
                run_all(&input, &output, &dirs.models_dir)
            })?;
            result?;
            println!("Log saved to: {}", log.path().display());
        }
        Command::Logs { log_dir } => match latest_log(&log_dir)? {
            Some(content) => print!("{}", content),
            None => println!("No log files found."),
        },
    }
    Ok(())
}

fn load(path: &Path) -> Result<DataFrame> {
    io::load_data(path).ok_or_else(|| anyhow!("Could not load dataset from {}", path.display()))
}

fn clean(input: &Path, output: &Path, decimal_places: u32) -> Result<DataFrame> {
    let config = CleaningConfig::builder()
        .decimal_places(decimal_places)
        .build()?;
    let raw = load(input)?;
    let (cleaned, report) = DataCleaner::clean(&raw, &config)?;
    let (engineered, created) = FeatureEngineer::engineer(&cleaned)?;
    io::save_processed_data(&engineered, output, config.decimal_places)?;
    info!(
        "Processed {} -> {} rows, created {:?}",
        report.rows_before, report.rows_after, created
    );
    Ok(engineered)
}

fn train(data: &Path, models_dir: &Path, families: &[FamilyArg]) -> Result<()> {
    let df = load(data)?;
    train_frame(&df, models_dir, families)
}

fn train_frame(df: &DataFrame, models_dir: &Path, families: &[FamilyArg]) -> Result<()> {
    let mut builder = TrainingConfig::builder().models_dir(models_dir);
    if !families.is_empty() {
        builder = builder.families(families.iter().copied().map(ModelFamily::from).collect());
    }
    let summary = ModelTrainer::new(builder.build()?)
        .with_progress(Arc::new(|update: ProgressUpdate| {
            debug!(
                "[{}] {:.0}% {}",
                update.stage.as_str(),
                update.progress * 100.0,
                update.message
            );
        }))
        .train_all(df)?;

    for outcome in &summary.trained {
        info!(
            "{} trained in {:.1}s with {}",
            outcome.family, outcome.training_time_secs, outcome.params
        );
    }
    for failure in &summary.failed {
        warn!("{} failed: {}", failure.family, failure.error);
    }
    info!("All models trained and saved to {}", models_dir.display());
    Ok(())
}

/// Re-create the training split and evaluate every saved model on it.
fn evaluate(data: &Path, models_dir: &Path, cv_folds: usize) -> Result<PerformanceReport> {
    let df = load(data)?;
    let config = TrainingConfig::builder().models_dir(models_dir).build()?;
    let table = CategoricalEncoder::encode_frame(&df, Some(&config.target_column))?;
    let (train, test) = train_test_split(&table, config.test_size, config.random_seed)?;

    let store = ModelStore::new(models_dir);
    let evaluations = Evaluator::evaluate_all_models(&store, &test, Some(&train), cv_folds);
    if evaluations.is_empty() {
        return Err(anyhow!(
            "No models could be evaluated in {}. You may need to train models first.",
            models_dir.display()
        ));
    }
    let report = Evaluator::build_report(evaluations)?;
    Evaluator::save_report(&store, &report)?;
    Ok(report)
}

fn run_all(input: &Path, output: &Path, models_dir: &Path) -> Result<()> {
    info!("Step 1: preprocessing");
    clean(input, output, io::DEFAULT_DECIMAL_PLACES)?;

    // Train on the saved file so training sees the rounded values.
    info!("Step 2: training");
    train(output, models_dir, &[])?;

    info!("Step 3: evaluation");
    print_report(&evaluate(output, models_dir, DEFAULT_EVAL_FOLDS)?);

    info!("Step 4: sample prediction");
    let ensemble = Predictor::new(ModelStore::new(models_dir)).predict_with_all_models(&sample_input());
    print_ensemble(&ensemble);
    Ok(())
}

fn read_input(path: &Path) -> Result<RawInput> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    match serde_json::from_str(&text)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(anyhow!("{} must contain a JSON object", path.display())),
    }
}

fn sample_input() -> RawInput {
    let mut input = RawInput::new();
    input.insert("Condition".into(), "New".into());
    input.insert("PropertyType".into(), "Homes".into());
    input.insert("PropertySubType".into(), "Apartment".into());
    input.insert("Bedrooms".into(), 3.into());
    input.insert("Bathrooms".into(), 2.into());
    input.insert("AreaNet".into(), 120.into());
    input.insert("AreaGross".into(), 240.into());
    input.insert("Parking".into(), 1.into());
    input.insert("Parish".into(), "Alvalade".into());
    input
}

fn print_ensemble(result: &EnsembleResult) {
    if result.is_empty() {
        println!("No models available for prediction. Train models first.");
        return;
    }
    println!("\n{}", "=".repeat(60));
    println!("PREDICTIONS");
    println!("{}", "=".repeat(60));
    let excluded = result.excluded_models();
    for (name, price) in &result.predictions {
        let note = if excluded.contains(&name.as_str()) {
            "  (excluded from average)"
        } else {
            ""
        };
        println!("  {:<20} €{:>14.2}{}", name, price, note);
    }
    if let Some(avg) = result.ensemble_average {
        println!("  {:<20} €{:>14.2}", "ensemble_average", avg);
    }
    println!("{}", "=".repeat(60));
}

fn print_report(report: &PerformanceReport) {
    println!("\n{}", "=".repeat(60));
    println!("MODEL PERFORMANCE");
    println!("{}", "=".repeat(60));
    println!("  {:<20} {:>12} {:>12} {:>8} {:>8}", "model", "rmse", "mae", "mape", "r2");
    for eval in &report.models {
        println!(
            "  {:<20} {:>12.2} {:>12.2} {:>7.2}% {:>8.4}",
            eval.model_name, eval.rmse, eval.mae, eval.mape, eval.r2
        );
    }
    if let Some(comparison) = &report.comparison {
        println!("\n  Best overall: {}", comparison.best_overall);
    }
    if let Some(cv) = &report.cv_comparison {
        println!("  Best by cross-validation: {}", cv.best_overall);
    }
    println!("{}", "=".repeat(60));
}
