//! `lhp-server` - serve the Lisbon house price models over HTTP.

use anyhow::Result;
use clap::Parser;
use lhp_server::{ServerConfig, run_server};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "lhp-server",
    version,
    about = "HTTP API for Lisbon house price predictions",
    after_help = "Environment:\n  \
                  LHP_HOST, LHP_PORT, LHP_MODELS_DIR and LHP_DATA_PATH set the defaults.\n  \
                  RUST_LOG overrides --log-level."
)]
struct Cli {
    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding the trained models
    #[arg(short, long)]
    models_dir: Option<PathBuf>,

    /// Processed CSV served by the data routes
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

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

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet);

    let defaults = ServerConfig::default();
    let config = ServerConfig {
        host: cli.host.unwrap_or(defaults.host),
        port: cli.port.unwrap_or(defaults.port),
        models_dir: cli.models_dir.unwrap_or(defaults.models_dir),
        data_path: cli.data.unwrap_or(defaults.data_path),
    };

    run_server(config).await
}
