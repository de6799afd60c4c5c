//! Model evaluation and comparison.
//!
//! [`Evaluator::evaluate_model`] computes test-set error metrics and,
//! optionally, shuffled k-fold cross-validation metrics on the training
//! split. [`Evaluator::compare_models`] ranks models across a set of
//! [`MetricKind`]s.

use crate::cv::KFold;
use crate::encoder::EncodedTable;
use crate::error::{LearningError, Result};
use crate::models::{RegressionModel, Regressor};
use crate::store::ModelStore;
use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Default folds for evaluation cross-validation.
pub const DEFAULT_EVAL_FOLDS: usize = 5;
/// Seed for the evaluation fold shuffle.
pub const EVAL_SEED: u64 = 42;

// ============================================================================
// Metric Functions
// ============================================================================

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let diff = y_true - y_pred;
    diff.mapv(|d| d * d).mean().unwrap_or(f64::NAN)
}

pub fn root_mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    mean_squared_error(y_true, y_pred).sqrt()
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    (y_true - y_pred).mapv(f64::abs).mean().unwrap_or(f64::NAN)
}

/// Mean absolute percentage error, ×100. Zero targets are skipped.
pub fn mean_absolute_percentage_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let ratios: Vec<f64> = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, _)| **t != 0.0)
        .map(|(t, p)| ((t - p) / t).abs())
        .collect();
    if ratios.is_empty() {
        return f64::NAN;
    }
    ratios.iter().sum::<f64>() / ratios.len() as f64 * 100.0
}

/// Coefficient of determination.
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let Some(mean) = y_true.mean() else {
        return f64::NAN;
    };
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

// ============================================================================
// Result Types
// ============================================================================

/// Cross-validated metrics: mean and population standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvMetrics {
    pub cv_r2_mean: f64,
    pub cv_r2_std: f64,
    pub cv_rmse_mean: f64,
    pub cv_rmse_std: f64,
    pub cv_mae_mean: f64,
    pub cv_mae_std: f64,
}

/// Evaluation of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluation {
    pub model_name: String,
    pub rmse: f64,
    pub mae: f64,
    pub mape: f64,
    pub r2: f64,
    #[serde(flatten)]
    pub cv: Option<CvMetrics>,
    #[serde(default, skip_serializing)]
    pub predictions: Vec<f64>,
}

/// A metric that models can be ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Rmse,
    Mae,
    Mape,
    R2,
    CvR2Mean,
    CvRmseMean,
    CvMaeMean,
}

impl MetricKind {
    /// Metrics compared when none are given.
    pub const DEFAULT_COMPARISON: [MetricKind; 3] =
        [MetricKind::Rmse, MetricKind::R2, MetricKind::Mae];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Rmse => "rmse",
            MetricKind::Mae => "mae",
            MetricKind::Mape => "mape",
            MetricKind::R2 => "r2",
            MetricKind::CvR2Mean => "cv_r2_mean",
            MetricKind::CvRmseMean => "cv_rmse_mean",
            MetricKind::CvMaeMean => "cv_mae_mean",
        }
    }

    #[must_use]
    pub fn higher_is_better(&self) -> bool {
        matches!(self, MetricKind::R2 | MetricKind::CvR2Mean)
    }

    /// Value of this metric in `eval`, if present and finite.
    pub fn value(&self, eval: &ModelEvaluation) -> Option<f64> {
        let v = match self {
            MetricKind::Rmse => Some(eval.rmse),
            MetricKind::Mae => Some(eval.mae),
            MetricKind::Mape => Some(eval.mape),
            MetricKind::R2 => Some(eval.r2),
            MetricKind::CvR2Mean => eval.cv.as_ref().map(|c| c.cv_r2_mean),
            MetricKind::CvRmseMean => eval.cv.as_ref().map(|c| c.cv_rmse_mean),
            MetricKind::CvMaeMean => eval.cv.as_ref().map(|c| c.cv_mae_mean),
        };
        v.filter(|x| x.is_finite())
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = LearningError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "rmse" => Ok(MetricKind::Rmse),
            "mae" => Ok(MetricKind::Mae),
            "mape" => Ok(MetricKind::Mape),
            "r2" => Ok(MetricKind::R2),
            "cv_r2_mean" => Ok(MetricKind::CvR2Mean),
            "cv_rmse_mean" => Ok(MetricKind::CvRmseMean),
            "cv_mae_mean" => Ok(MetricKind::CvMaeMean),
            other => Err(LearningError::InvalidConfig(format!(
                "unknown metric '{}'",
                other
            ))),
        }
    }
}

/// Rank of one model across the compared metrics (1 is best).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRanking {
    pub model_name: String,
    pub ranks: BTreeMap<String, f64>,
    pub avg_rank: f64,
}

/// Best model for a single metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricLeader {
    pub model: String,
    pub value: f64,
}

/// Outcome of [`Evaluator::compare_models`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    pub metrics: Vec<MetricKind>,
    /// Models sorted by average rank, ties in input order.
    pub ranking: Vec<ModelRanking>,
    pub best_overall: String,
    pub best_by_metric: BTreeMap<String, MetricLeader>,
}

/// Contents of `model_performance.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub generated_at: String,
    pub models: Vec<ModelEvaluation>,
    pub comparison: Option<ModelComparison>,
    pub cv_comparison: Option<ModelComparison>,
}

// ============================================================================
// Evaluator
// ============================================================================

/// Evaluates fitted models.
pub struct Evaluator;

impl Evaluator {
    /// Test-set metrics, plus CV metrics when a training split is given.
    ///
    /// CV refits a clone of `model` on each fold; `model` is not modified.
    pub fn evaluate_model(
        model: &RegressionModel,
        model_name: &str,
        test: &EncodedTable,
        train: Option<&EncodedTable>,
        cv_folds: usize,
    ) -> Result<ModelEvaluation> {
        let y_test = test.target()?;
        let y_pred = model.predict(&test.features)?;

        let evaluation = ModelEvaluation {
            model_name: model_name.to_string(),
            rmse: root_mean_squared_error(y_test, &y_pred),
            mae: mean_absolute_error(y_test, &y_pred),
            mape: mean_absolute_percentage_error(y_test, &y_pred),
            r2: r2_score(y_test, &y_pred),
            cv: match train {
                Some(train) => Some(Self::cross_validate(model, train, cv_folds)?),
                None => None,
            },
            predictions: y_pred.to_vec(),
        };

        info!(
            "{} evaluation: RMSE {:.2}, MAE {:.2}, MAPE {:.2}%, R² {:.4}",
            model_name, evaluation.rmse, evaluation.mae, evaluation.mape, evaluation.r2
        );
        if let Some(cv) = &evaluation.cv {
            info!(
                "{} cross-validation ({} folds): R² {:.4} ± {:.4}, RMSE {:.2} ± {:.2}, MAE {:.2} ± {:.2}",
                model_name,
                cv_folds,
                cv.cv_r2_mean,
                cv.cv_r2_std,
                cv.cv_rmse_mean,
                cv.cv_rmse_std,
                cv.cv_mae_mean,
                cv.cv_mae_std
            );
        }
        Ok(evaluation)
    }

    /// Shuffled k-fold CV (seed 42) of `model` on `train`.
    pub fn cross_validate(
        model: &RegressionModel,
        train: &EncodedTable,
        n_folds: usize,
    ) -> Result<CvMetrics> {
        let y = train.target()?;
        let splits = KFold::shuffled(n_folds, EVAL_SEED).split(train.n_samples())?;

        let mut r2s = Vec::with_capacity(splits.len());
        let mut rmses = Vec::with_capacity(splits.len());
        let mut maes = Vec::with_capacity(splits.len());

        for split in &splits {
            let x_train = train.features.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_val = train.features.select(Axis(0), &split.test_indices);
            let y_val = y.select(Axis(0), &split.test_indices);

            let mut fold_model = model.clone();
            fold_model.fit(&x_train, &y_train)?;
            let pred = fold_model.predict(&x_val)?;

            r2s.push(r2_score(&y_val, &pred));
            rmses.push(root_mean_squared_error(&y_val, &pred));
            maes.push(mean_absolute_error(&y_val, &pred));
        }

        let (cv_r2_mean, cv_r2_std) = mean_std(&r2s);
        let (cv_rmse_mean, cv_rmse_std) = mean_std(&rmses);
        let (cv_mae_mean, cv_mae_std) = mean_std(&maes);
        Ok(CvMetrics {
            cv_r2_mean,
            cv_r2_std,
            cv_rmse_mean,
            cv_rmse_std,
            cv_mae_mean,
            cv_mae_std,
        })
    }

    /// Rank models on `metrics`.
    ///
    /// Error metrics rank ascending and R² metrics descending. Equal values
    /// share the average of their ranks; a model missing a metric ranks last
    /// for it. The best model per metric and overall is the first one
    /// encountered among equals.
    pub fn compare_models(
        results: &[ModelEvaluation],
        metrics: &[MetricKind],
    ) -> Result<ModelComparison> {
        if results.is_empty() {
            return Err(LearningError::InvalidConfig(
                "no evaluation results to compare".to_string(),
            ));
        }
        if metrics.is_empty() {
            return Err(LearningError::InvalidConfig(
                "no metrics to compare".to_string(),
            ));
        }

        let mut rankings: Vec<ModelRanking> = results
            .iter()
            .map(|r| ModelRanking {
                model_name: r.model_name.clone(),
                ranks: BTreeMap::new(),
                avg_rank: 0.0,
            })
            .collect();
        let mut best_by_metric = BTreeMap::new();

        for metric in metrics {
            let values: Vec<Option<f64>> = results.iter().map(|r| metric.value(r)).collect();
            let ranks = rank_values(&values, metric.higher_is_better());
            for (ranking, rank) in rankings.iter_mut().zip(ranks) {
                ranking.ranks.insert(metric.as_str().to_string(), rank);
            }

            let mut leader: Option<(usize, f64)> = None;
            for (i, value) in values.iter().enumerate() {
                let Some(v) = *value else { continue };
                let better = match leader {
                    None => true,
                    Some((_, best)) if metric.higher_is_better() => v > best,
                    Some((_, best)) => v < best,
                };
                if better {
                    leader = Some((i, v));
                }
            }
            if let Some((i, value)) = leader {
                best_by_metric.insert(
                    metric.as_str().to_string(),
                    MetricLeader {
                        model: results[i].model_name.clone(),
                        value,
                    },
                );
            }
        }

        for ranking in &mut rankings {
            ranking.avg_rank = ranking.ranks.values().sum::<f64>() / metrics.len() as f64;
        }
        rankings.sort_by(|a, b| a.avg_rank.total_cmp(&b.avg_rank));
        let best_overall = rankings[0].model_name.clone();

        info!("Best overall model based on ranking: {}", best_overall);
        for (metric, leader) in &best_by_metric {
            info!(
                "Best model for {}: {} with value {:.4}",
                metric, leader.model, leader.value
            );
        }

        Ok(ModelComparison {
            metrics: metrics.to_vec(),
            ranking: rankings,
            best_overall,
            best_by_metric,
        })
    }

    /// Evaluate every persisted model on `test` (and CV on `train`).
    ///
    /// Each model sees the tables reconciled to its own manifest. Models that
    /// fail to load or evaluate are skipped with a warning.
    pub fn evaluate_all_models(
        store: &ModelStore,
        test: &EncodedTable,
        train: Option<&EncodedTable>,
        cv_folds: usize,
    ) -> Vec<ModelEvaluation> {
        let names = store.list_models();
        if names.is_empty() {
            warn!("No models found in {}", store.dir().display());
        }

        let mut evaluations = Vec::with_capacity(names.len());
        for name in names {
            info!("Evaluating {} model...", name);
            let artifact = match store.load(&name) {
                Ok(a) => a,
                Err(e) => {
                    warn!("Skipping {}: {}", name, e);
                    continue;
                }
            };
            let test = test.reconcile(&artifact.features);
            let train = train.map(|t| t.reconcile(&artifact.features));

            match Self::evaluate_model(&artifact.model, &name, &test, train.as_ref(), cv_folds) {
                Ok(eval) => evaluations.push(eval),
                Err(e) => warn!("Evaluation of {} failed: {}", name, e),
            }
        }
        evaluations
    }

    /// Compare on the test metrics and, when available, the CV metrics.
    pub fn build_report(evaluations: Vec<ModelEvaluation>) -> Result<PerformanceReport> {
        let comparison = if evaluations.is_empty() {
            None
        } else {
            Some(Self::compare_models(
                &evaluations,
                &[MetricKind::Rmse, MetricKind::Mae, MetricKind::Mape, MetricKind::R2],
            )?)
        };

        let cv_comparison = if !evaluations.is_empty() && evaluations.iter().all(|e| e.cv.is_some()) {
            Some(Self::compare_models(
                &evaluations,
                &[MetricKind::CvRmseMean, MetricKind::CvMaeMean, MetricKind::CvR2Mean],
            )?)
        } else {
            None
        };

        Ok(PerformanceReport {
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            models: evaluations,
            comparison,
            cv_comparison,
        })
    }

    /// Write `report` to `model_performance.json` in the store directory.
    pub fn save_report(store: &ModelStore, report: &PerformanceReport) -> Result<PathBuf> {
        std::fs::create_dir_all(store.dir())?;
        let path = store.performance_path();
        std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
        info!("Model performance saved to {}", path.display());
        Ok(path)
    }
}

/// 1-based ranks with ties averaged; `None` ranks after every present value.
fn rank_values(values: &[Option<f64>], descending: bool) -> Vec<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let n_missing = values.len() - present.len();

    values
        .iter()
        .map(|value| match value {
            Some(v) => {
                let better = present
                    .iter()
                    .filter(|o| if descending { **o > *v } else { **o < *v })
                    .count();
                let equal = present.iter().filter(|o| **o == *v).count();
                better as f64 + (equal as f64 + 1.0) / 2.0
            }
            None => present.len() as f64 + (n_missing as f64 + 1.0) / 2.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LinearRegression;
    use ndarray::{Array2, array};
    use pretty_assertions::assert_eq;

    fn eval(name: &str, rmse: f64, r2: f64, mae: f64) -> ModelEvaluation {
        ModelEvaluation {
            model_name: name.to_string(),
            rmse,
            mae,
            mape: 0.0,
            r2,
            cv: None,
            predictions: Vec::new(),
        }
    }

    // ========================================================================
    // Metrics
    // ========================================================================

    #[test]
    fn test_basic_metrics() {
        let y = array![100.0, 200.0, 300.0];
        let p = array![110.0, 190.0, 300.0];
        assert!((mean_squared_error(&y, &p) - 200.0 / 3.0).abs() < 1e-9);
        assert!((mean_absolute_error(&y, &p) - 20.0 / 3.0).abs() < 1e-9);
        assert!((mean_absolute_percentage_error(&y, &p) - 5.0).abs() < 1e-9);
        assert!((r2_score(&y, &p) - (1.0 - 200.0 / 20000.0)).abs() < 1e-12);
    }

    #[test]
    fn test_mape_skips_zero_targets() {
        let y = array![0.0, 100.0];
        let p = array![5.0, 90.0];
        assert!((mean_absolute_percentage_error(&y, &p) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![5.0, 5.0];
        assert_eq!(r2_score(&y, &array![5.0, 5.0]), 1.0);
        assert_eq!(r2_score(&y, &array![4.0, 6.0]), 0.0);
    }

    // ========================================================================
    // Ranking
    // ========================================================================

    #[test]
    fn test_rank_values_with_ties_and_missing() {
        let ranks = rank_values(&[Some(3.0), Some(1.0), None, Some(1.0)], false);
        assert_eq!(ranks, vec![3.0, 1.5, 4.0, 1.5]);

        let ranks = rank_values(&[Some(0.5), Some(0.9)], true);
        assert_eq!(ranks, vec![2.0, 1.0]);
    }

    #[test]
    fn test_compare_models() {
        let results = vec![
            eval("ridge", 100.0, 0.80, 70.0),
            eval("random_forest", 80.0, 0.90, 60.0),
            eval("lasso", 120.0, 0.70, 50.0),
        ];
        let comparison =
            Evaluator::compare_models(&results, &MetricKind::DEFAULT_COMPARISON).unwrap();

        assert_eq!(comparison.best_overall, "random_forest");
        assert_eq!(comparison.best_by_metric["r2"].model, "random_forest");
        assert_eq!(comparison.best_by_metric["mae"].model, "lasso");
        assert_eq!(comparison.ranking[0].ranks["rmse"], 1.0);
        assert_eq!(
            comparison.ranking.iter().map(|r| r.model_name.as_str()).collect::<Vec<_>>(),
            vec!["random_forest", "ridge", "lasso"]
        );
    }

    #[test]
    fn test_compare_ties_go_to_first() {
        let results = vec![eval("a", 1.0, 0.5, 1.0), eval("b", 1.0, 0.5, 1.0)];
        let comparison =
            Evaluator::compare_models(&results, &MetricKind::DEFAULT_COMPARISON).unwrap();
        assert_eq!(comparison.best_overall, "a");
        assert_eq!(comparison.best_by_metric["rmse"].model, "a");
    }

    #[test]
    fn test_missing_cv_metric_ranks_last() {
        let mut with_cv = eval("with_cv", 1.0, 0.5, 1.0);
        with_cv.cv = Some(CvMetrics {
            cv_r2_mean: 0.1,
            cv_r2_std: 0.0,
            cv_rmse_mean: 1.0,
            cv_rmse_std: 0.0,
            cv_mae_mean: 1.0,
            cv_mae_std: 0.0,
        });
        let results = vec![eval("no_cv", 1.0, 0.5, 1.0), with_cv];
        let comparison = Evaluator::compare_models(&results, &[MetricKind::CvR2Mean]).unwrap();
        assert_eq!(comparison.best_overall, "with_cv");
    }

    #[test]
    fn test_metric_kind_parse() {
        assert_eq!("cv_r2_mean".parse::<MetricKind>().unwrap(), MetricKind::CvR2Mean);
        assert!(MetricKind::R2.higher_is_better());
        assert!(!MetricKind::CvRmseMean.higher_is_better());
        assert!("accuracy".parse::<MetricKind>().is_err());
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    #[test]
    fn test_evaluate_model_with_cv() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| 2.0 * v + 3.0);
        let table = EncodedTable {
            features: x.clone(),
            target: Some(y.clone()),
            feature_names: vec!["x".to_string()],
        };

        let mut model = RegressionModel::LinearRegression(LinearRegression::new());
        model.fit(&x, &y).unwrap();

        let eval = Evaluator::evaluate_model(&model, "linear_regression", &table, Some(&table), 5)
            .unwrap();
        assert!(eval.rmse < 1e-6);
        assert!((eval.r2 - 1.0).abs() < 1e-9);
        let cv = eval.cv.unwrap();
        assert!((cv.cv_r2_mean - 1.0).abs() < 1e-6);
        assert!(cv.cv_rmse_std < 1e-6);
    }

    #[test]
    fn test_evaluation_serializes_flat() {
        let mut e = eval("ridge", 1.0, 0.5, 1.0);
        e.predictions = vec![1.0, 2.0];
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["model_name"], "ridge");
        assert!(json.get("predictions").is_none());
        assert!(json.get("cv_r2_mean").is_none());
    }
}
