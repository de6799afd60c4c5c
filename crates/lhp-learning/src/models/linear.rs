//! Linear models: ordinary least squares, ridge and lasso.
//!
//! All three fit an intercept by centering `x` and `y` before solving for the
//! coefficients.

use super::{Regressor, check_features, check_xy};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

// =============================================================================
// Dense solvers
// =============================================================================

/// Cholesky factor `L` of a symmetric positive-definite matrix.
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve `L Lᵀ x = b` given the Cholesky factor.
fn cholesky_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    x
}

/// Gauss-Jordan elimination with partial pivoting on `[A | b]`.
fn gauss_jordan_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut aug = Array2::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    for col in 0..n {
        let mut pivot_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[pivot_row, col]].abs() {
                pivot_row = row;
            }
        }
        if aug[[pivot_row, col]].abs() < 1e-10 {
            return None;
        }
        if pivot_row != col {
            for j in 0..=n {
                aug.swap([col, j], [pivot_row, j]);
            }
        }

        let pivot = aug[[col, col]];
        for j in 0..=n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                if factor != 0.0 {
                    for j in 0..=n {
                        aug[[row, j]] -= factor * aug[[col, j]];
                    }
                }
            }
        }
    }

    Some(aug.column(n).to_owned())
}

/// Solve a symmetric system `A x = b`.
///
/// Tries Cholesky, then Cholesky with a tiny diagonal jitter for
/// rank-deficient designs (e.g. an indicator column that is all zeros in a
/// CV fold), then Gauss-Jordan.
pub(crate) fn solve_symmetric(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return Err(LearningError::shape(
            format!("{n}x{n} system"),
            format!("{}x{} matrix, {} rhs", a.nrows(), a.ncols(), b.len()),
        ));
    }
    if n == 0 {
        return Ok(Array1::zeros(0));
    }

    if let Some(l) = cholesky(a) {
        return Ok(cholesky_substitute(&l, b));
    }

    let mean_diag = a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64;
    let jitter = (1e-8 * mean_diag).max(1e-12);
    let mut regularized = a.clone();
    for k in 0..n {
        regularized[[k, k]] += jitter;
    }
    if let Some(l) = cholesky(&regularized) {
        return Ok(cholesky_substitute(&l, b));
    }

    gauss_jordan_solve(a, b).ok_or_else(|| {
        LearningError::TrainingFailed("normal equations are singular".to_string())
    })
}

/// Centered copies of `x` and `y` plus their means.
fn center(x: &Array2<f64>, y: &Array1<f64>) -> Result<(Array2<f64>, Array1<f64>, Array1<f64>, f64)> {
    let x_mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| LearningError::TrainingFailed("empty feature matrix".to_string()))?;
    let y_mean = y.mean().unwrap_or(0.0);
    let x_centered = x - &x_mean.view().insert_axis(Axis(0));
    let y_centered = y - y_mean;
    Ok((x_centered, y_centered, x_mean, y_mean))
}

/// Fitted state shared by the linear models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

impl LinearFit {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_features(x, self.coefficients.len())?;
        Ok(x.dot(&self.coefficients) + self.intercept)
    }
}

/// Closed-form fit of `(XᵀX + alpha·I) w = Xᵀy` on centered data.
fn fit_normal_equations(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<LinearFit> {
    check_xy(x, y)?;
    let (xc, yc, x_mean, y_mean) = center(x, y)?;

    let mut xtx = xc.t().dot(&xc);
    if alpha > 0.0 {
        for i in 0..xtx.nrows() {
            xtx[[i, i]] += alpha;
        }
    }
    let xty = xc.t().dot(&yc);
    let coefficients = solve_symmetric(&xtx, &xty)?;
    let intercept = y_mean - coefficients.dot(&x_mean);

    Ok(LinearFit {
        coefficients,
        intercept,
    })
}

// =============================================================================
// Ordinary least squares
// =============================================================================

/// Ordinary least squares with an intercept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    pub fitted: Option<LinearFit>,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fitted = Some(fit_normal_equations(x, y, 0.0)?);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(LearningError::NotFitted)?.predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

// =============================================================================
// Ridge
// =============================================================================

/// L2-regularized least squares. The intercept is not penalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ridge {
    pub alpha: f64,
    pub fitted: Option<LinearFit>,
}

impl Ridge {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            fitted: None,
        }
    }
}

impl Regressor for Ridge {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if !(self.alpha >= 0.0) {
            return Err(LearningError::InvalidConfig(format!(
                "ridge alpha must be non-negative, got {}",
                self.alpha
            )));
        }
        self.fitted = Some(fit_normal_equations(x, y, self.alpha)?);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(LearningError::NotFitted)?.predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

// =============================================================================
// Lasso
// =============================================================================

/// L1-regularized least squares fitted by cyclic coordinate descent.
///
/// Minimizes `(1 / 2n)·‖y − Xw‖² + alpha·‖w‖₁`. Iteration stops once the
/// largest coefficient update is below `tol` times the largest coefficient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lasso {
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub n_iter: usize,
    pub fitted: Option<LinearFit>,
}

impl Lasso {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            max_iter: 1000,
            tol: 1e-4,
            n_iter: 0,
            fitted: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }
}

/// Soft-threshold operator, the proximal step of the L1 penalty.
pub(crate) fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

impl Regressor for Lasso {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        if !(self.alpha >= 0.0) {
            return Err(LearningError::InvalidConfig(format!(
                "lasso alpha must be non-negative, got {}",
                self.alpha
            )));
        }

        let (xc, yc, x_mean, y_mean) = center(x, y)?;
        let n_samples = xc.nrows();
        let n_features = xc.ncols();

        let col_norms: Vec<f64> = (0..n_features)
            .map(|j| xc.column(j).mapv(|v| v * v).sum())
            .collect();
        let lambda = self.alpha * n_samples as f64;

        let mut w = Array1::<f64>::zeros(n_features);
        let mut residual = yc.clone();
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;
            let mut max_update = 0.0f64;
            let mut max_weight = 0.0f64;

            for j in 0..n_features {
                if col_norms[j] < 1e-15 {
                    w[j] = 0.0;
                    continue;
                }
                let column = xc.column(j);
                let old = w[j];
                let rho = column.dot(&residual) + col_norms[j] * old;
                let new = soft_threshold(rho, lambda) / col_norms[j];

                if new != old {
                    residual.scaled_add(old - new, &column);
                    w[j] = new;
                }
                max_update = max_update.max((new - old).abs());
                max_weight = max_weight.max(new.abs());
            }

            if max_weight == 0.0 || max_update <= self.tol * max_weight {
                break;
            }
        }

        self.n_iter = n_iter;
        let intercept = y_mean - w.dot(&x_mean);
        self.fitted = Some(LinearFit {
            coefficients: w,
            intercept,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(LearningError::NotFitted)?.predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}
