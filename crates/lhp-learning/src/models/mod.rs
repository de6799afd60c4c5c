//! Regression model families.
//!
//! Every family implements [`Regressor`] and is wrapped in the serializable
//! [`RegressionModel`] enum, which is what gets persisted, cached and served.
//!
//! | Family | Type | Fitting |
//! |--------|------|---------|
//! | `linear_regression` | [`LinearRegression`] | normal equations |
//! | `ridge` | [`Ridge`] | normal equations with an L2 diagonal |
//! | `lasso` | [`Lasso`] | cyclic coordinate descent |
//! | `decision_tree` | [`DecisionTreeRegressor`] | greedy MSE splits |
//! | `random_forest` | [`RandomForestRegressor`] | bootstrapped trees |
//! | `svr` | [`Svr`] | dual coordinate descent |

mod forest;
mod linear;
mod svr;
mod tree;

pub use forest::RandomForestRegressor;
pub use linear::{Lasso, LinearRegression, Ridge};
pub use svr::{Gamma, Kernel, Svr};
pub use tree::{DecisionTreeRegressor, TreeNode};

use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A model that can be fitted on a dense feature matrix and predict a
/// continuous target.
pub trait Regressor {
    /// Fit the model, replacing any previous fit.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict one value per row of `x`.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Whether [`fit`](Self::fit) has completed successfully.
    fn is_fitted(&self) -> bool;
}

/// Validate that `x` and `y` describe the same number of samples.
pub(crate) fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(LearningError::shape(
            format!("y length = {}", x.nrows()),
            format!("y length = {}", y.len()),
        ));
    }
    if x.nrows() == 0 {
        return Err(LearningError::TrainingFailed(
            "cannot fit on an empty training set".to_string(),
        ));
    }
    Ok(())
}

/// Validate the column count of a prediction matrix.
pub(crate) fn check_features(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(LearningError::shape(
            format!("{} features", n_features),
            format!("{} features", x.ncols()),
        ));
    }
    Ok(())
}

/// The six supported model families, in training order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    RandomForest,
    DecisionTree,
    Ridge,
    Lasso,
    LinearRegression,
    Svr,
}

impl ModelFamily {
    /// All families in the order they are trained.
    pub const ALL: [ModelFamily; 6] = [
        ModelFamily::RandomForest,
        ModelFamily::DecisionTree,
        ModelFamily::Ridge,
        ModelFamily::Lasso,
        ModelFamily::LinearRegression,
        ModelFamily::Svr,
    ];

    /// Name used for persisted artifacts and API responses.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::DecisionTree => "decision_tree",
            ModelFamily::Ridge => "ridge",
            ModelFamily::Lasso => "lasso",
            ModelFamily::LinearRegression => "linear_regression",
            ModelFamily::Svr => "svr",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = LearningError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "random_forest" => Ok(ModelFamily::RandomForest),
            "decision_tree" => Ok(ModelFamily::DecisionTree),
            "ridge" => Ok(ModelFamily::Ridge),
            "lasso" => Ok(ModelFamily::Lasso),
            "linear_regression" | "linear" => Ok(ModelFamily::LinearRegression),
            "svr" => Ok(ModelFamily::Svr),
            other => Err(LearningError::InvalidConfig(format!(
                "unknown model family '{}'. Valid values are: random_forest, decision_tree, \
                 ridge, lasso, linear_regression, svr",
                other
            ))),
        }
    }
}

/// A model of any family.
///
/// Serialized with a `family` tag so persisted artifacts are self-describing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum RegressionModel {
    RandomForest(RandomForestRegressor),
    DecisionTree(DecisionTreeRegressor),
    Ridge(Ridge),
    Lasso(Lasso),
    LinearRegression(LinearRegression),
    Svr(Svr),
}

impl RegressionModel {
    pub fn family(&self) -> ModelFamily {
        match self {
            RegressionModel::RandomForest(_) => ModelFamily::RandomForest,
            RegressionModel::DecisionTree(_) => ModelFamily::DecisionTree,
            RegressionModel::Ridge(_) => ModelFamily::Ridge,
            RegressionModel::Lasso(_) => ModelFamily::Lasso,
            RegressionModel::LinearRegression(_) => ModelFamily::LinearRegression,
            RegressionModel::Svr(_) => ModelFamily::Svr,
        }
    }

    /// Hyperparameters as a JSON object, without fitted state.
    pub fn params(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            RegressionModel::RandomForest(m) => json!({
                "n_estimators": m.n_estimators,
                "max_depth": m.max_depth,
                "min_samples_split": m.min_samples_split,
                "random_state": m.random_state,
            }),
            RegressionModel::DecisionTree(m) => json!({
                "max_depth": m.max_depth,
                "min_samples_split": m.min_samples_split,
            }),
            RegressionModel::Ridge(m) => json!({ "alpha": m.alpha }),
            RegressionModel::Lasso(m) => json!({
                "alpha": m.alpha,
                "max_iter": m.max_iter,
                "tol": m.tol,
            }),
            RegressionModel::LinearRegression(_) => json!({ "fit_intercept": true }),
            RegressionModel::Svr(m) => json!({
                "C": m.c,
                "epsilon": m.epsilon,
                "kernel": m.kernel.as_str(),
                "gamma": m.gamma.to_string(),
            }),
        }
    }

    fn as_regressor(&self) -> &dyn Regressor {
        match self {
            RegressionModel::RandomForest(m) => m,
            RegressionModel::DecisionTree(m) => m,
            RegressionModel::Ridge(m) => m,
            RegressionModel::Lasso(m) => m,
            RegressionModel::LinearRegression(m) => m,
            RegressionModel::Svr(m) => m,
        }
    }

    fn as_regressor_mut(&mut self) -> &mut dyn Regressor {
        match self {
            RegressionModel::RandomForest(m) => m,
            RegressionModel::DecisionTree(m) => m,
            RegressionModel::Ridge(m) => m,
            RegressionModel::Lasso(m) => m,
            RegressionModel::LinearRegression(m) => m,
            RegressionModel::Svr(m) => m,
        }
    }
}

impl Regressor for RegressionModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.as_regressor_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_regressor().predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.as_regressor().is_fitted()
    }
}
