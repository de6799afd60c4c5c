//! Hyperparameter grids and exhaustive grid search.
//!
//! Candidates are scored by mean negative MSE over unshuffled k-fold splits,
//! in parallel. The first candidate with the best score wins, so the result
//! does not depend on thread scheduling.

use crate::cv::KFold;
use crate::error::{LearningError, Result};
use crate::evaluator::mean_squared_error;
use crate::models::{
    DecisionTreeRegressor, Gamma, Kernel, Lasso, LinearRegression, ModelFamily,
    RandomForestRegressor, RegressionModel, Regressor, Ridge, Svr,
};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Iteration cap for lasso candidates during the search.
pub const LASSO_SEARCH_MAX_ITER: usize = 50_000;
/// Iteration cap for the final lasso refit.
pub const LASSO_FINAL_MAX_ITER: usize = 100_000;
/// Convergence tolerance for lasso.
pub const LASSO_TOL: f64 = 0.01;

/// `num` values evenly spaced on a log10 scale from `10^start` to `10^stop`.
pub fn logspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![10f64.powf(start)],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|i| 10f64.powf(start + step * i as f64))
                .collect()
        }
    }
}

/// Unfitted candidate models for `family`.
///
/// Parameter names are iterated in alphabetical order with the last one
/// varying fastest.
pub fn param_grid(family: ModelFamily) -> Vec<RegressionModel> {
    match family {
        ModelFamily::RandomForest => {
            let mut grid = Vec::new();
            for max_depth in [None, Some(10), Some(20), Some(30)] {
                for min_samples_split in [2, 5, 10] {
                    for n_estimators in [50, 100, 200] {
                        grid.push(RegressionModel::RandomForest(RandomForestRegressor::new(
                            n_estimators,
                            max_depth,
                            min_samples_split,
                        )));
                    }
                }
            }
            grid
        }
        ModelFamily::DecisionTree => {
            let mut grid = Vec::new();
            for max_depth in [Some(3), Some(5), Some(7), Some(10), None] {
                for min_samples_split in [2, 5, 10] {
                    grid.push(RegressionModel::DecisionTree(DecisionTreeRegressor::new(
                        max_depth,
                        min_samples_split,
                    )));
                }
            }
            grid
        }
        ModelFamily::Ridge => logspace(-3.0, 3.0, 10)
            .into_iter()
            .map(|alpha| RegressionModel::Ridge(Ridge::new(alpha)))
            .collect(),
        ModelFamily::Lasso => logspace(-3.0, 3.0, 10)
            .into_iter()
            .map(|alpha| {
                RegressionModel::Lasso(
                    Lasso::new(alpha)
                        .with_max_iter(LASSO_SEARCH_MAX_ITER)
                        .with_tol(LASSO_TOL),
                )
            })
            .collect(),
        ModelFamily::LinearRegression => {
            vec![RegressionModel::LinearRegression(LinearRegression::new())]
        }
        ModelFamily::Svr => {
            let mut grid = Vec::new();
            for c in [1.0, 10.0, 100.0] {
                for epsilon in [0.01, 0.1] {
                    for gamma in [Gamma::Scale, Gamma::Value(0.1)] {
                        for kernel in [Kernel::Rbf, Kernel::Linear] {
                            grid.push(RegressionModel::Svr(Svr::new(c, epsilon, kernel, gamma)));
                        }
                    }
                }
            }
            grid
        }
    }
}

/// Outcome of a grid search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Best candidate, unfitted.
    pub best: RegressionModel,
    /// Mean negative MSE of the best candidate.
    pub best_score: f64,
    /// Mean negative MSE of every candidate, in grid order. `NaN` marks a
    /// candidate that failed to fit.
    pub scores: Vec<f64>,
}

/// Exhaustive search over a list of candidates.
#[derive(Debug, Clone, Copy)]
pub struct GridSearch {
    folds: KFold,
}

impl GridSearch {
    pub fn new(n_splits: usize) -> Self {
        Self {
            folds: KFold::new(n_splits),
        }
    }

    /// Score every candidate and return the best.
    ///
    /// # Errors
    ///
    /// [`LearningError::InsufficientSamples`] if there are fewer rows than
    /// folds; [`LearningError::TrainingFailed`] if every candidate fails.
    pub fn run(
        &self,
        candidates: Vec<RegressionModel>,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<SearchResult> {
        let splits = self.folds.split(x.nrows())?;

        let scores: Vec<f64> = candidates
            .par_iter()
            .map(|candidate| {
                let mut total = 0.0;
                for split in &splits {
                    let x_train = x.select(Axis(0), &split.train_indices);
                    let y_train = y.select(Axis(0), &split.train_indices);
                    let x_test = x.select(Axis(0), &split.test_indices);
                    let y_test = y.select(Axis(0), &split.test_indices);

                    let mut model = candidate.clone();
                    let fold_mse = model
                        .fit(&x_train, &y_train)
                        .and_then(|_| model.predict(&x_test))
                        .map(|pred| mean_squared_error(&y_test, &pred));
                    match fold_mse {
                        Ok(mse) => total += mse,
                        Err(e) => {
                            warn!(
                                "Candidate {} failed on fold {}: {}",
                                candidate.params(),
                                split.fold_idx,
                                e
                            );
                            return f64::NAN;
                        }
                    }
                }
                -total / splits.len() as f64
            })
            .collect();

        let mut best_idx: Option<usize> = None;
        for (i, score) in scores.iter().enumerate() {
            if score.is_nan() {
                continue;
            }
            if best_idx.is_none_or(|b| *score > scores[b]) {
                best_idx = Some(i);
            }
        }

        let best_idx = best_idx.ok_or_else(|| {
            LearningError::TrainingFailed("every grid search candidate failed".to_string())
        })?;
        debug!(
            "Grid search: {} candidates, best #{} with score {:.4}",
            candidates.len(),
            best_idx,
            scores[best_idx]
        );

        Ok(SearchResult {
            best: candidates[best_idx].clone(),
            best_score: scores[best_idx],
            scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_logspace_endpoints() {
        let values = logspace(-3.0, 3.0, 10);
        assert_eq!(values.len(), 10);
        assert!((values[0] - 0.001).abs() < 1e-12);
        assert!((values[9] - 1000.0).abs() < 1e-9);
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_grid_sizes() {
        assert_eq!(param_grid(ModelFamily::RandomForest).len(), 36);
        assert_eq!(param_grid(ModelFamily::DecisionTree).len(), 15);
        assert_eq!(param_grid(ModelFamily::Ridge).len(), 10);
        assert_eq!(param_grid(ModelFamily::Lasso).len(), 10);
        assert_eq!(param_grid(ModelFamily::LinearRegression).len(), 1);
        assert_eq!(param_grid(ModelFamily::Svr).len(), 24);
    }

    #[test]
    fn test_lasso_grid_uses_search_settings() {
        for candidate in param_grid(ModelFamily::Lasso) {
            let params = candidate.params();
            assert_eq!(params["max_iter"], LASSO_SEARCH_MAX_ITER);
            assert_eq!(params["tol"], LASSO_TOL);
        }
    }

    #[test]
    fn test_search_prefers_small_alpha_on_exact_data() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0], [9.0], [10.0]];
        let y = x.column(0).mapv(|v| 3.0 * v + 1.0);

        let result = GridSearch::new(5)
            .run(param_grid(ModelFamily::Ridge), &x, &y)
            .unwrap();
        let alpha = result.best.params()["alpha"].as_f64().unwrap();
        assert!((alpha - 0.001).abs() < 1e-12);
        assert!(result.best_score <= 0.0);
        assert_eq!(result.scores.len(), 10);
    }

    #[test]
    fn test_ties_go_to_first_candidate() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![5.0, 5.0, 5.0, 5.0];
        let candidates = vec![
            RegressionModel::DecisionTree(DecisionTreeRegressor::new(Some(1), 2)),
            RegressionModel::DecisionTree(DecisionTreeRegressor::new(Some(2), 2)),
        ];
        let result = GridSearch::new(2).run(candidates, &x, &y).unwrap();
        assert_eq!(result.best.params()["max_depth"], 1);
    }

    #[test]
    fn test_too_few_samples_is_fatal() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 2.0];
        let err = GridSearch::new(5)
            .run(param_grid(ModelFamily::Ridge), &x, &y)
            .unwrap_err();
        assert!(matches!(err, LearningError::InsufficientSamples { .. }));
    }
}
