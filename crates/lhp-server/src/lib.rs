//! # lhp-server
//!
//! HTTP service in front of the trained Lisbon house price models.
//!
//! Prediction routes live under `/api/predictions`, dataset and model
//! introspection under `/api/data`. When no model has been trained yet the
//! prediction routes answer with a placeholder price instead of failing.
//!
//! ```rust,ignore
//! use lhp_server::{ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server(ServerConfig::default()).await
//! }
//! ```

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, Result};
pub use routes::create_router;
pub use state::{AppState, DEFAULT_DATA_PATH, ServerConfig};

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Bind the configured address and serve until ctrl+c.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    if !config.models_dir.exists() {
        warn!(
            models_dir = %config.models_dir.display(),
            "Models directory not found, predictions will be mocked"
        );
    }
    if !config.data_path.exists() {
        warn!(
            data_path = %config.data_path.display(),
            "Processed data not found, data routes will report no_data"
        );
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = Arc::new(AppState::new(config));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Lisbon house price API listening");

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl+c: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
