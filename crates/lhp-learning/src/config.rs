//! Configuration for the training run.
//!
//! This module provides [`TrainingConfig`] and its builder.
//!
//! # Example
//!
//! ```
//! use lhp_learning::{ModelFamily, TrainingConfig};
//!
//! let config = TrainingConfig::builder()
//!     .target_column("Price")
//!     .cv_folds(5)
//!     .families(vec![ModelFamily::Ridge, ModelFamily::Lasso])
//!     .build()
//!     .expect("valid config");
//! ```

use crate::error::LearningError;
use crate::models::ModelFamily;
use std::path::PathBuf;

/// Configuration for [`ModelTrainer`](crate::ModelTrainer).
///
/// Use [`TrainingConfig::builder()`] to construct a configuration with the
/// builder pattern.
///
/// # Validation
///
/// The builder validates the following constraints on
/// [`build()`](TrainingConfigBuilder::build):
/// - `test_size` must be in range `(0.0, 1.0)` (exclusive)
/// - `cv_folds` and `svr_cv_folds` must be at least 2
/// - `families` must not be empty
/// - `target_column` must not be empty
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Name of the target column (default: `Price`).
    pub target_column: String,

    /// Fraction of rows held out for evaluation (default: 0.2).
    pub test_size: f64,

    /// Seed for the train/test shuffle (default: 42).
    pub random_seed: u64,

    /// Folds for grid search cross-validation (default: 5).
    pub cv_folds: usize,

    /// Folds for the SVR grid search (default: 2).
    ///
    /// SVR fits scale quadratically with the sample count, so its search
    /// uses fewer folds.
    pub svr_cv_folds: usize,

    /// Directory where model artifacts are written (default: `models`).
    pub models_dir: PathBuf,

    /// Families to train, in order (default: all six).
    pub families: Vec<ModelFamily>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            target_column: "Price".to_string(),
            test_size: 0.2,
            random_seed: 42,
            cv_folds: 5,
            svr_cv_folds: 2,
            models_dir: PathBuf::from("models"),
            families: ModelFamily::ALL.to_vec(),
        }
    }
}

impl TrainingConfig {
    /// Create a new builder for `TrainingConfig`.
    #[must_use]
    pub fn builder() -> TrainingConfigBuilder {
        TrainingConfigBuilder::default()
    }

    /// Folds used when grid-searching `family`.
    pub fn folds_for(&self, family: ModelFamily) -> usize {
        match family {
            ModelFamily::Svr => self.svr_cv_folds,
            _ => self.cv_folds,
        }
    }
}

/// Builder for [`TrainingConfig`].
#[derive(Debug, Clone, Default)]
pub struct TrainingConfigBuilder {
    config: TrainingConfig,
}

impl TrainingConfigBuilder {
    /// Set the target column name.
    #[must_use]
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.config.target_column = column.into();
        self
    }

    /// Set the test size fraction (default: 0.2).
    ///
    /// [`build()`](Self::build) returns an error if `size <= 0.0` or `size >= 1.0`.
    #[must_use]
    pub fn test_size(mut self, size: f64) -> Self {
        self.config.test_size = size;
        self
    }

    /// Set the random seed for the train/test split (default: 42).
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Set the number of cross-validation folds (default: 5).
    #[must_use]
    pub fn cv_folds(mut self, folds: usize) -> Self {
        self.config.cv_folds = folds;
        self
    }

    /// Set the number of folds for the SVR search (default: 2).
    #[must_use]
    pub fn svr_cv_folds(mut self, folds: usize) -> Self {
        self.config.svr_cv_folds = folds;
        self
    }

    /// Set the directory for model artifacts.
    #[must_use]
    pub fn models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.models_dir = dir.into();
        self
    }

    /// Restrict training to the given families.
    #[must_use]
    pub fn families(mut self, families: Vec<ModelFamily>) -> Self {
        self.config.families = families;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if any constraint listed on
    /// [`TrainingConfig`] is violated.
    pub fn build(self) -> Result<TrainingConfig, LearningError> {
        let config = self.config;

        if config.target_column.trim().is_empty() {
            return Err(LearningError::InvalidConfig(
                "target_column must not be empty".to_string(),
            ));
        }

        if !(config.test_size > 0.0 && config.test_size < 1.0) {
            return Err(LearningError::InvalidConfig(
                "test_size must be between 0.0 and 1.0 (exclusive)".to_string(),
            ));
        }

        if config.cv_folds < 2 {
            return Err(LearningError::InvalidConfig(
                "cv_folds must be at least 2".to_string(),
            ));
        }

        if config.svr_cv_folds < 2 {
            return Err(LearningError::InvalidConfig(
                "svr_cv_folds must be at least 2".to_string(),
            ));
        }

        if config.families.is_empty() {
            return Err(LearningError::InvalidConfig(
                "at least one model family must be selected".to_string(),
            ));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.target_column, "Price");
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.svr_cv_folds, 2);
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.families.len(), 6);
    }

    #[test]
    fn test_folds_for_svr() {
        let config = TrainingConfig::default();
        assert_eq!(config.folds_for(ModelFamily::Svr), 2);
        assert_eq!(config.folds_for(ModelFamily::Ridge), 5);
    }

    #[test]
    fn test_invalid_test_size() {
        for size in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let result = TrainingConfig::builder().test_size(size).build();
            assert!(result.unwrap_err().to_string().contains("test_size"));
        }
    }

    #[test]
    fn test_invalid_cv_folds() {
        let result = TrainingConfig::builder().cv_folds(1).build();
        assert!(result.unwrap_err().to_string().contains("cv_folds"));

        let result = TrainingConfig::builder().svr_cv_folds(0).build();
        assert!(result.unwrap_err().to_string().contains("svr_cv_folds"));
    }

    #[test]
    fn test_empty_families_rejected() {
        let result = TrainingConfig::builder().families(vec![]).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_chaining() {
        let config = TrainingConfig::builder()
            .target_column("Target")
            .test_size(0.3)
            .random_seed(7)
            .cv_folds(3)
            .svr_cv_folds(3)
            .models_dir("/tmp/models")
            .families(vec![ModelFamily::Lasso])
            .build()
            .unwrap();

        assert_eq!(config.target_column, "Target");
        assert!((config.test_size - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.random_seed, 7);
        assert_eq!(config.models_dir, PathBuf::from("/tmp/models"));
        assert_eq!(config.families, vec![ModelFamily::Lasso]);
    }
}
