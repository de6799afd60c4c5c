//! On-disk model store.
//!
//! Layout of a models directory:
//!
//! ```text
//! models/
//! ├── lhp_random_forest.json           model artifact
//! ├── lhp_random_forest_features.json  its Feature Manifest
//! ├── ...
//! ├── feature_list.json                shared manifest, used as a fallback
//! └── model_performance.json           written by the evaluator
//! ```
//!
//! An artifact without any manifest is treated as unavailable.

use crate::error::{LearningError, Result};
use crate::models::RegressionModel;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const ARTIFACT_PREFIX: &str = "lhp_";
const ARTIFACT_EXT: &str = ".json";
const FEATURES_SUFFIX: &str = "_features.json";

/// Shared Feature Manifest file name.
pub const SHARED_FEATURES_FILE: &str = "feature_list.json";
/// Evaluation report file name.
pub const PERFORMANCE_FILE: &str = "model_performance.json";

/// A loaded model together with its Feature Manifest.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub name: String,
    pub model: RegressionModel,
    pub features: Vec<String>,
}

/// Reads and writes model artifacts in one directory.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", ARTIFACT_PREFIX, name, ARTIFACT_EXT))
    }

    pub fn features_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", ARTIFACT_PREFIX, name, FEATURES_SUFFIX))
    }

    pub fn shared_features_path(&self) -> PathBuf {
        self.dir.join(SHARED_FEATURES_FILE)
    }

    pub fn performance_path(&self) -> PathBuf {
        self.dir.join(PERFORMANCE_FILE)
    }

    /// Persist a fitted model and its manifest.
    pub fn save(&self, name: &str, model: &RegressionModel, features: &[String]) -> Result<()> {
        validate_name(name)?;
        fs::create_dir_all(&self.dir)?;

        let model_path = self.model_path(name);
        write_json(&model_path, model)?;
        info!("{} model saved to {}", name, model_path.display());

        let features_path = self.features_path(name);
        write_json(&features_path, &features)?;
        debug!("Feature list for {} saved to {}", name, features_path.display());
        Ok(())
    }

    /// Write the shared Feature Manifest.
    pub fn save_shared_features(&self, features: &[String]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.shared_features_path();
        write_json(&path, &features)?;
        info!("Common feature list saved to {}", path.display());
        Ok(())
    }

    /// Names of persisted models, sorted.
    ///
    /// A missing or unreadable directory yields an empty list.
    pub fn list_models(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list models in {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|file| !file.ends_with(FEATURES_SUFFIX))
            .filter_map(|file| {
                file.strip_prefix(ARTIFACT_PREFIX)
                    .and_then(|rest| rest.strip_suffix(ARTIFACT_EXT))
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        names
    }

    /// Load a model without its manifest.
    pub fn load_model(&self, name: &str) -> Result<RegressionModel> {
        validate_name(name)?;
        read_json(&self.model_path(name))
            .map_err(|e| LearningError::unavailable(name, e.to_string()))
    }

    /// Feature Manifest of `name`, falling back to the shared manifest.
    pub fn load_features(&self, name: &str) -> Result<Vec<String>> {
        validate_name(name)?;
        let own = self.features_path(name);
        let path = if own.exists() {
            own
        } else {
            self.shared_features_path()
        };
        let features: Vec<String> =
            read_json(&path).map_err(|e| LearningError::unavailable(name, e.to_string()))?;
        debug!("Feature names loaded from {}", path.display());
        Ok(features)
    }

    /// The shared Feature Manifest, if present and readable.
    pub fn load_shared_features(&self) -> Option<Vec<String>> {
        read_json(&self.shared_features_path()).ok()
    }

    /// Load a model and its manifest.
    pub fn load(&self, name: &str) -> Result<ModelArtifact> {
        let model = self.load_model(name)?;
        let features = self.load_features(name)?;
        info!("Model '{}' loaded from {}", name, self.model_path(name).display());
        Ok(ModelArtifact {
            name: name.to_string(),
            model,
            features,
        })
    }
}

/// Model names become file names; reject anything that could leave the directory.
fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(LearningError::unavailable(name, "invalid model name"))
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, value)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
