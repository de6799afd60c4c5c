//! Progress reporting for training runs.
//!
//! [`ModelTrainer`](crate::ModelTrainer) reports a [`ProgressUpdate`] as it
//! moves through the [`TrainingStage`]s, through an optional
//! [`ProgressCallback`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lhp_learning::{ProgressCallback, ProgressUpdate};
//!
//! let callback: ProgressCallback = Arc::new(|update: ProgressUpdate| {
//!     println!("[{}] {:.0}% - {}", update.stage.as_str(), update.progress * 100.0, update.message);
//! });
//! ```

use std::sync::Arc;

/// The current stage of a training run.
///
/// Stages run in order: encoding, splitting, training, saving, complete.
/// [`Complete`](Self::Complete) and [`Failed`](Self::Failed) are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TrainingStage {
    /// Validating configuration and loading data.
    #[default]
    Initializing,

    /// Ordinal and one-hot encoding of the training frame.
    Encoding,

    /// Train/test split.
    Splitting,

    /// Grid search and refit of one model family.
    Training,

    /// Writing artifacts and feature manifests.
    Saving,

    /// Training completed. Terminal.
    Complete,

    /// Training failed. Terminal.
    Failed,
}

impl TrainingStage {
    /// Snake-case name, as used in logs and JSON.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStage::Initializing => "initializing",
            TrainingStage::Encoding => "encoding",
            TrainingStage::Splitting => "splitting",
            TrainingStage::Training => "training",
            TrainingStage::Saving => "saving",
            TrainingStage::Complete => "complete",
            TrainingStage::Failed => "failed",
        }
    }

    /// Returns `true` for [`Complete`](Self::Complete) and [`Failed`](Self::Failed).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrainingStage::Complete | TrainingStage::Failed)
    }
}

/// A progress update from the trainer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressUpdate {
    /// The current training stage.
    pub stage: TrainingStage,

    /// Overall progress from 0.0 to 1.0.
    pub progress: f64,

    /// Human-readable status message.
    pub message: String,

    /// Family currently being trained, during [`TrainingStage::Training`].
    pub current_model: Option<String>,

    /// `(completed, total)` families.
    pub models_completed: Option<(usize, usize)>,
}

impl ProgressUpdate {
    pub fn new(stage: TrainingStage, progress: f64, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            current_model: None,
            models_completed: None,
        }
    }
}

/// Callback receiving [`ProgressUpdate`]s.
///
/// Must be `Send + Sync`; the trainer may call it from worker threads.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STAGES: [TrainingStage; 7] = [
        TrainingStage::Initializing,
        TrainingStage::Encoding,
        TrainingStage::Splitting,
        TrainingStage::Training,
        TrainingStage::Saving,
        TrainingStage::Complete,
        TrainingStage::Failed,
    ];

    #[test]
    fn test_training_stage_names_are_distinct() {
        let mut names: Vec<_> = ALL_STAGES.iter().map(TrainingStage::as_str).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_STAGES.len());
    }

    #[test]
    fn test_training_stage_is_terminal() {
        let terminal: Vec<_> = ALL_STAGES.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![&TrainingStage::Complete, &TrainingStage::Failed]);
    }

    #[test]
    fn test_progress_update_clamps() {
        let update = ProgressUpdate::new(TrainingStage::Training, 1.7, "done");
        assert_eq!(update.progress, 1.0);
        assert!(update.current_model.is_none());
    }

    #[test]
    fn test_progress_update_default() {
        let update = ProgressUpdate::default();
        assert_eq!(update.stage, TrainingStage::Initializing);
        assert_eq!(update.progress, 0.0);
        assert!(update.message.is_empty());
    }
}
