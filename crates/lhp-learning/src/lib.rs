//! Model training, ensemble prediction and evaluation for Lisbon house prices.
//!
//! This crate takes the processed dataset from `lhp-processing` and:
//!
//! - **Encodes** it with fixed ordinal tables and one-hot indicators
//!   ([`CategoricalEncoder`])
//! - **Trains** six regression families with grid-searched hyperparameters
//!   ([`ModelTrainer`])
//! - **Persists** every model next to its Feature Manifest ([`ModelStore`])
//! - **Predicts** with one model, a batch, or the thresholded ensemble of
//!   all of them ([`Predictor`], [`ModelRegistry`])
//! - **Evaluates** and ranks the persisted models ([`Evaluator`])
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lhp_learning::{Evaluator, ModelTrainer, Predictor, TrainingConfig};
//!
//! let config = TrainingConfig::builder().models_dir("models").build()?;
//! let trainer = ModelTrainer::new(config);
//! let summary = trainer.train_all(&processed)?;
//!
//! let evaluations = Evaluator::evaluate_all_models(trainer.store(), &summary.test, Some(&summary.train), 5);
//! let report = Evaluator::build_report(evaluations)?;
//! Evaluator::save_report(trainer.store(), &report)?;
//!
//! let ensemble = Predictor::new(trainer.store().clone()).predict_with_all_models(&input);
//! println!("{:?}", ensemble.ensemble_average);
//! ```
//!
//! # Architecture
//!
//! ```text
//! DataFrame ──► CategoricalEncoder ──► EncodedTable ──► GridSearch ──► RegressionModel
//!                                                                          │
//!                                                     ModelStore ◄─────────┘
//!                                                         │
//!                         ┌───────────────────────────────┼──────────────────┐
//!                         ▼                               ▼                  ▼
//!                    Predictor                      ModelRegistry        Evaluator
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, LearningError>`](Result). Model
//! loading failures surface as [`LearningError::ModelUnavailable`] and are
//! never fatal to an ensemble prediction.

mod config;
mod cv;
mod encoder;
mod error;
mod evaluator;
pub mod models;
mod predictor;
mod progress;
mod registry;
mod run_log;
mod search;
mod store;
mod trainer;

// Configuration
pub use config::{TrainingConfig, TrainingConfigBuilder};
// Cross-validation and search
pub use cv::{FoldSplit, KFold};
pub use search::{
    GridSearch, LASSO_FINAL_MAX_ITER, LASSO_SEARCH_MAX_ITER, LASSO_TOL, SearchResult, logspace,
    param_grid,
};
// Encoding
pub use encoder::{
    CategoricalEncoder, EncodedTable, RawInput, UNKNOWN_CODE, condition_code,
    property_type_code, train_test_split,
};
// Errors
pub use error::{LearningError, Result};
// Evaluation
pub use evaluator::{
    CvMetrics, DEFAULT_EVAL_FOLDS, EVAL_SEED, Evaluator, MetricKind, MetricLeader,
    ModelComparison, ModelEvaluation, ModelRanking, PerformanceReport, mean_absolute_error,
    mean_absolute_percentage_error, mean_squared_error, r2_score, root_mean_squared_error,
};
// Models
pub use models::{ModelFamily, RegressionModel, Regressor};
// Prediction
pub use predictor::{ENSEMBLE_THRESHOLD, EnsembleResult, Predictor, ensemble_average, predict_price};
pub use registry::ModelRegistry;
// Persistence
pub use store::{ModelArtifact, ModelStore, PERFORMANCE_FILE, SHARED_FEATURES_FILE};
// Progress reporting
pub use progress::{ProgressCallback, ProgressUpdate, TrainingStage};
// Run logs
pub use run_log::{RunLog, latest_log};
// Training
pub use trainer::{FailedFamily, ModelTrainer, TrainedFamily, TrainingSummary};

static_assertions::assert_impl_all!(ModelRegistry: Send, Sync);
static_assertions::assert_impl_all!(ModelArtifact: Send, Sync, Clone);
static_assertions::assert_impl_all!(RegressionModel: Send, Sync, Clone);
static_assertions::assert_impl_all!(LearningError: Send, Sync);
