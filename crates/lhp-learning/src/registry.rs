//! Default-model registry.
//!
//! The server answers single predictions with one default model. The
//! registry loads it lazily on first use and keeps it until [`reload`] is
//! called explicitly; a failed load is not cached, so the next request
//! tries again.
//!
//! [`reload`]: ModelRegistry::reload

use crate::error::{LearningError, Result};
use crate::models::ModelFamily;
use crate::store::{ModelArtifact, ModelStore};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

/// Holder of the cached default [`ModelArtifact`].
#[derive(Debug)]
pub struct ModelRegistry {
    store: ModelStore,
    cache: RwLock<Option<Arc<ModelArtifact>>>,
}

impl ModelRegistry {
    pub fn new(store: ModelStore) -> Self {
        Self {
            store,
            cache: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Name of the model served by default: `random_forest` when present,
    /// otherwise the first persisted model.
    pub fn default_model_name(&self) -> Option<String> {
        let models = self.store.list_models();
        let preferred = ModelFamily::RandomForest.as_str();
        if models.iter().any(|m| m == preferred) {
            return Some(preferred.to_string());
        }
        models.into_iter().next()
    }

    /// The cached default model, loading it on first use.
    pub fn get(&self) -> Result<Arc<ModelArtifact>> {
        if let Some(artifact) = self.cache.read().as_ref() {
            return Ok(Arc::clone(artifact));
        }

        let mut cache = self.cache.write();
        // Another caller may have loaded it while we waited for the lock.
        if let Some(artifact) = cache.as_ref() {
            return Ok(Arc::clone(artifact));
        }

        let artifact = Arc::new(self.load_default()?);
        *cache = Some(Arc::clone(&artifact));
        Ok(artifact)
    }

    /// Drop the cached model and load the current default again.
    ///
    /// On failure the cache is left empty.
    pub fn reload(&self) -> Result<Arc<ModelArtifact>> {
        let mut cache = self.cache.write();
        *cache = None;
        let artifact = Arc::new(self.load_default()?);
        *cache = Some(Arc::clone(&artifact));
        info!("Default model reloaded: {}", artifact.name);
        Ok(artifact)
    }

    /// Whether a model is currently cached.
    pub fn is_loaded(&self) -> bool {
        self.cache.read().is_some()
    }

    fn load_default(&self) -> Result<ModelArtifact> {
        let name = self.default_model_name().ok_or_else(|| {
            LearningError::unavailable("default", format!("no models in {}", self.store.dir().display()))
        })?;
        self.store.load(&name).inspect_err(|e| {
            warn!("Failed to load default model: {}", e);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinearRegression, RegressionModel, Regressor, Ridge};
    use ndarray::array;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn save(store: &ModelStore, name: &str) {
        let mut model = RegressionModel::Ridge(Ridge::new(1.0));
        model
            .fit(&array![[1.0], [2.0], [3.0]], &array![1.0, 2.0, 3.0])
            .unwrap();
        store.save(name, &model, &["AreaNet".to_string()]).unwrap();
    }

    #[test]
    fn test_prefers_random_forest() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        save(&store, "lasso");
        save(&store, "random_forest");

        let registry = ModelRegistry::new(store);
        assert_eq!(registry.default_model_name().as_deref(), Some("random_forest"));
    }

    #[test]
    fn test_falls_back_to_first_model() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        save(&store, "svr");
        save(&store, "lasso");

        let registry = ModelRegistry::new(store);
        assert_eq!(registry.default_model_name().as_deref(), Some("lasso"));
        assert_eq!(registry.get().unwrap().name, "lasso");
    }

    #[test]
    fn test_cache_survives_new_models_until_reload() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        save(&store, "ridge");

        let registry = ModelRegistry::new(store.clone());
        assert!(!registry.is_loaded());
        let first = registry.get().unwrap();
        assert_eq!(first.name, "ridge");

        save(&store, "random_forest");
        assert_eq!(registry.get().unwrap().name, "ridge");
        assert!(Arc::ptr_eq(&first, &registry.get().unwrap()));

        assert_eq!(registry.reload().unwrap().name, "random_forest");
        assert_eq!(registry.get().unwrap().name, "random_forest");
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let registry = ModelRegistry::new(store.clone());

        let err = registry.get().unwrap_err();
        assert_eq!(err.error_code(), "MODEL_UNAVAILABLE");
        assert!(!registry.is_loaded());

        store
            .save(
                "linear_regression",
                &RegressionModel::LinearRegression(LinearRegression::new()),
                &["AreaNet".to_string()],
            )
            .unwrap();
        assert_eq!(registry.get().unwrap().name, "linear_regression");
    }
}
