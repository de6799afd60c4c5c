//! Server configuration and shared application state.

use lhp_learning::{ModelRegistry, ModelStore, Predictor};
use std::path::PathBuf;

/// Processed dataset served by the data routes.
pub const DEFAULT_DATA_PATH: &str = "data/processed/lisbon_houses_processed.csv";

/// Server configuration.
///
/// Defaults read `LHP_HOST`, `LHP_PORT`, `LHP_MODELS_DIR` and
/// `LHP_DATA_PATH` from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub models_dir: PathBuf,
    pub data_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("LHP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("LHP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5001),
            models_dir: std::env::var("LHP_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),
            data_path: std::env::var("LHP_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_PATH)),
        }
    }
}

/// State shared by every handler.
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    /// Default model for single and batch predictions.
    pub registry: ModelRegistry,
    /// Per-name and ensemble predictions straight from the store.
    pub predictor: Predictor,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let store = ModelStore::new(config.models_dir.clone());
        Self {
            registry: ModelRegistry::new(store.clone()),
            predictor: Predictor::new(store),
            config,
        }
    }

    pub fn store(&self) -> &ModelStore {
        self.registry.store()
    }
}

static_assertions::assert_impl_all!(AppState: Send, Sync);
