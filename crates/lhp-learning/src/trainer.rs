//! Training of every model family.
//!
//! [`ModelTrainer::train_all`] encodes the cleaned frame, holds out a test
//! split, grid-searches each configured family on the training split, refits
//! the best candidate and persists it with its Feature Manifest.
//!
//! # Example
//!
//! ```no_run
//! use lhp_learning::{ModelTrainer, TrainingConfig};
//! # fn run(df: &polars::prelude::DataFrame) -> lhp_learning::Result<()> {
//! let config = TrainingConfig::builder().models_dir("models").build()?;
//! let summary = ModelTrainer::new(config).train_all(df)?;
//! for outcome in &summary.trained {
//!     println!("{}: {}", outcome.family, outcome.params);
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::TrainingConfig;
use crate::encoder::{CategoricalEncoder, EncodedTable, train_test_split};
use crate::error::{LearningError, Result};
use crate::models::{ModelFamily, RegressionModel, Regressor};
use crate::progress::{ProgressCallback, ProgressUpdate, TrainingStage};
use crate::search::{GridSearch, LASSO_FINAL_MAX_ITER, param_grid};
use crate::store::ModelStore;
use polars::prelude::DataFrame;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one successfully trained family.
#[derive(Debug, Clone, Serialize)]
pub struct TrainedFamily {
    pub family: ModelFamily,
    /// Hyperparameters of the refit model.
    pub params: serde_json::Value,
    /// Mean negative MSE of the best candidate. `None` when the family was
    /// fit without a search.
    pub cv_score: Option<f64>,
    pub training_time_secs: f64,
}

/// A family that failed to train.
#[derive(Debug, Clone, Serialize)]
pub struct FailedFamily {
    pub family: ModelFamily,
    pub error: String,
}

/// Result of [`ModelTrainer::train_all`].
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub trained: Vec<TrainedFamily>,
    pub failed: Vec<FailedFamily>,
    /// Feature Manifest shared by every model of this run.
    pub feature_names: Vec<String>,
    pub train: EncodedTable,
    /// Held-out split for the evaluator.
    pub test: EncodedTable,
    pub total_time_secs: f64,
}

impl TrainingSummary {
    /// Names of the families that were trained and saved.
    pub fn trained_names(&self) -> Vec<&'static str> {
        self.trained.iter().map(|t| t.family.as_str()).collect()
    }
}

/// Trains and persists every configured model family.
pub struct ModelTrainer {
    config: TrainingConfig,
    store: ModelStore,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for ModelTrainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelTrainer")
            .field("config", &self.config)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        let store = ModelStore::new(config.models_dir.clone());
        Self {
            config,
            store,
            progress_callback: None,
        }
    }

    /// Report progress to `callback` during [`train_all`](Self::train_all).
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Train every configured family on `df`.
    ///
    /// The frame is not modified. A family that fails is logged and recorded
    /// in [`TrainingSummary::failed`]; the others still train.
    ///
    /// # Errors
    ///
    /// - [`LearningError::TargetNotFound`] if the target column is missing
    /// - [`LearningError::InsufficientSamples`] if the training split has
    ///   fewer rows than a family's fold count
    /// - [`LearningError::TrainingFailed`] if no family could be trained
    pub fn train_all(&self, df: &DataFrame) -> Result<TrainingSummary> {
        let started = Instant::now();
        let result = self.run(df, started);
        if let Err(e) = &result {
            self.report(ProgressUpdate::new(
                TrainingStage::Failed,
                1.0,
                format!("Training failed: {}", e),
            ));
        }
        result
    }

    fn run(&self, df: &DataFrame, started: Instant) -> Result<TrainingSummary> {
        let families = &self.config.families;
        info!(
            "Training {} model families on {} rows",
            families.len(),
            df.height()
        );

        self.report(ProgressUpdate::new(
            TrainingStage::Encoding,
            0.05,
            "Encoding categorical features",
        ));
        let table = CategoricalEncoder::encode_frame(df, Some(&self.config.target_column))?;
        info!(
            "Encoded {} samples with {} features",
            table.n_samples(),
            table.n_features()
        );

        self.report(ProgressUpdate::new(
            TrainingStage::Splitting,
            0.1,
            "Splitting train and test data",
        ));
        let (train, test) =
            train_test_split(&table, self.config.test_size, self.config.random_seed)?;
        info!(
            "Training set: {} rows, test set: {} rows",
            train.n_samples(),
            test.n_samples()
        );

        let mut trained = Vec::new();
        let mut failed = Vec::new();

        for (i, family) in families.iter().copied().enumerate() {
            let mut update = ProgressUpdate::new(
                TrainingStage::Training,
                0.1 + 0.8 * i as f64 / families.len() as f64,
                format!("Training {}", family),
            );
            update.current_model = Some(family.to_string());
            update.models_completed = Some((i, families.len()));
            self.report(update);

            match self.train_family(family, &train) {
                Ok(outcome) => trained.push(outcome),
                Err(e @ LearningError::InsufficientSamples { .. }) => return Err(e),
                Err(e) => {
                    warn!("Error training {}: {}", family, e);
                    failed.push(FailedFamily {
                        family,
                        error: e.to_string(),
                    });
                }
            }
        }

        if trained.is_empty() {
            return Err(LearningError::TrainingFailed(
                "no model family could be trained".to_string(),
            ));
        }

        self.report(ProgressUpdate::new(
            TrainingStage::Saving,
            0.95,
            "Saving feature list",
        ));
        self.store.save_shared_features(&table.feature_names)?;

        let total_time_secs = started.elapsed().as_secs_f64();
        info!(
            "Trained {} of {} families in {:.1}s",
            trained.len(),
            families.len(),
            total_time_secs
        );
        self.report(ProgressUpdate::new(
            TrainingStage::Complete,
            1.0,
            "Training complete",
        ));

        Ok(TrainingSummary {
            trained,
            failed,
            feature_names: table.feature_names,
            train,
            test,
            total_time_secs,
        })
    }

    /// Search, refit and save one family.
    fn train_family(&self, family: ModelFamily, train: &EncodedTable) -> Result<TrainedFamily> {
        let started = Instant::now();
        let y = train.target()?;

        let (mut model, cv_score) = match family {
            ModelFamily::LinearRegression => (param_grid(family).remove(0), None),
            _ => {
                let folds = self.config.folds_for(family);
                info!("Grid search for {} with {}-fold CV", family, folds);
                let search = GridSearch::new(folds).run(param_grid(family), &train.features, y)?;
                (search.best, Some(search.best_score))
            }
        };

        if let RegressionModel::Lasso(lasso) = &mut model {
            lasso.max_iter = LASSO_FINAL_MAX_ITER;
        }

        model.fit(&train.features, y)?;
        let params = model.params();
        info!("Best parameters for {}: {}", family, params);
        if let Some(score) = cv_score {
            debug!("{} CV score (neg MSE): {:.4}", family, score);
        }

        self.store
            .save(family.as_str(), &model, &train.feature_names)?;

        Ok(TrainedFamily {
            family,
            params,
            cv_score,
            training_time_secs: started.elapsed().as_secs_f64(),
        })
    }

    fn report(&self, update: ProgressUpdate) {
        if let Some(callback) = &self.progress_callback {
            callback(update);
        }
    }
}
