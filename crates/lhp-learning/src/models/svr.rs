//! Epsilon-insensitive support vector regression.
//!
//! Solved in the dual with cyclic coordinate descent. The bias is absorbed into
//! the kernel (`Q = K + 1`), which removes the equality constraint and leaves a
//! box-constrained problem in one coefficient per sample:
//!
//! ```text
//! min  ½ βᵀQβ − yᵀβ + ε‖β‖₁   subject to  −C ≤ βᵢ ≤ C
//! ```
//!
//! Each coordinate step is exact: a Newton step on the smooth part, a soft
//! threshold for ε, then a clip to the box.

use super::linear::soft_threshold;
use super::{Regressor, check_features, check_xy};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Kernel function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    Linear,
    Rbf,
}

impl Kernel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kernel::Linear => "linear",
            Kernel::Rbf => "rbf",
        }
    }
}

/// RBF kernel coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gamma {
    /// `1 / (n_features · Var(X))`, resolved at fit time.
    Scale,
    Value(f64),
}

impl fmt::Display for Gamma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gamma::Scale => f.write_str("scale"),
            Gamma::Value(v) => write!(f, "{}", v),
        }
    }
}

/// Fitted dual solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SvrFit {
    support_vectors: Array2<f64>,
    dual_coef: Array1<f64>,
    gamma: f64,
}

/// Support vector regressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Svr {
    /// Box constraint on the dual coefficients.
    pub c: f64,
    /// Half-width of the insensitive tube.
    pub epsilon: f64,
    pub kernel: Kernel,
    pub gamma: Gamma,
    pub max_epochs: usize,
    pub tol: f64,
    fitted: Option<SvrFit>,
    n_features: usize,
}

impl Svr {
    pub fn new(c: f64, epsilon: f64, kernel: Kernel, gamma: Gamma) -> Self {
        Self {
            c,
            epsilon,
            kernel,
            gamma,
            max_epochs: 1000,
            tol: 1e-3,
            fitted: None,
            n_features: 0,
        }
    }

    /// Number of samples with a non-zero dual coefficient.
    pub fn n_support_vectors(&self) -> usize {
        self.fitted
            .as_ref()
            .map_or(0, |f| f.support_vectors.nrows())
    }

    fn resolve_gamma(&self, x: &Array2<f64>) -> Result<f64> {
        match self.gamma {
            Gamma::Value(g) if g > 0.0 && g.is_finite() => Ok(g),
            Gamma::Value(g) => Err(LearningError::InvalidConfig(format!(
                "gamma must be positive, got {}",
                g
            ))),
            Gamma::Scale => {
                let variance = x.var(0.0);
                if variance > 0.0 {
                    Ok(1.0 / (x.ncols() as f64 * variance))
                } else {
                    Ok(1.0)
                }
            }
        }
    }
}

fn kernel_value(kernel: Kernel, gamma: f64, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    match kernel {
        Kernel::Linear => a.dot(&b),
        Kernel::Rbf => {
            let sq_dist: f64 = a.iter().zip(b.iter()).map(|(p, q)| (p - q).powi(2)).sum();
            (-gamma * sq_dist).exp()
        }
    }
}

impl Regressor for Svr {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        if !(self.c > 0.0) {
            return Err(LearningError::InvalidConfig(format!(
                "C must be positive, got {}",
                self.c
            )));
        }
        if !(self.epsilon >= 0.0) {
            return Err(LearningError::InvalidConfig(format!(
                "epsilon must be non-negative, got {}",
                self.epsilon
            )));
        }

        let n = x.nrows();
        let gamma = self.resolve_gamma(x)?;

        let mut q = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let v = kernel_value(self.kernel, gamma, x.row(i), x.row(j)) + 1.0;
                q[[i, j]] = v;
                q[[j, i]] = v;
            }
        }

        let mut beta = Array1::<f64>::zeros(n);
        // q_beta[i] = (Qβ)_i, kept in sync with beta.
        let mut q_beta = Array1::<f64>::zeros(n);
        let mut epochs = 0;

        for epoch in 0..self.max_epochs {
            epochs = epoch + 1;
            let mut max_change = 0.0_f64;

            for i in 0..n {
                let q_ii = q[[i, i]];
                if q_ii <= 0.0 {
                    continue;
                }
                let grad = q_beta[i] - y[i];
                let newton = beta[i] - grad / q_ii;
                let updated = soft_threshold(newton, self.epsilon / q_ii).clamp(-self.c, self.c);

                let delta = updated - beta[i];
                if delta != 0.0 {
                    q_beta.scaled_add(delta, &q.column(i));
                    beta[i] = updated;
                    max_change = max_change.max(delta.abs());
                }
            }

            if max_change <= self.tol {
                break;
            }
        }

        let support: Vec<usize> = (0..n).filter(|&i| beta[i] != 0.0).collect();
        debug!(
            "SVR ({}) converged after {} epochs with {} support vectors",
            self.kernel.as_str(),
            epochs,
            support.len()
        );

        self.fitted = Some(SvrFit {
            support_vectors: x.select(Axis(0), &support),
            dual_coef: beta.select(Axis(0), &support),
            gamma,
        });
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let fit = self.fitted.as_ref().ok_or(LearningError::NotFitted)?;
        check_features(x, self.n_features)?;

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                fit.support_vectors
                    .rows()
                    .into_iter()
                    .zip(fit.dual_coef.iter())
                    .map(|(sv, b)| b * (kernel_value(self.kernel, fit.gamma, sv, row) + 1.0))
                    .sum()
            })
            .collect())
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_kernel_fits_line() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 3.0, 5.0, 7.0, 9.0, 11.0];
        let mut svr = Svr::new(100.0, 0.01, Kernel::Linear, Gamma::Scale);
        svr.tol = 1e-8;
        svr.max_epochs = 20_000;
        svr.fit(&x, &y).unwrap();

        let preds = svr.predict(&array![[2.5], [6.0]]).unwrap();
        assert!((preds[0] - 6.0).abs() < 0.1, "got {}", preds[0]);
        assert!((preds[1] - 13.0).abs() < 0.2, "got {}", preds[1]);
    }

    #[test]
    fn test_rbf_kernel_interpolates() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];
        let mut svr = Svr::new(10.0, 0.01, Kernel::Rbf, Gamma::Value(5.0));
        svr.tol = 1e-8;
        svr.max_epochs = 20_000;
        svr.fit(&x, &y).unwrap();

        let preds = svr.predict(&x).unwrap();
        for (p, t) in preds.iter().zip(y.iter()) {
            assert!((p - t).abs() < 0.05, "got {} want {}", p, t);
        }
    }

    #[test]
    fn test_wide_tube_predicts_constant() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![1.0, 1.1, 0.9];
        let mut svr = Svr::new(1.0, 10.0, Kernel::Rbf, Gamma::Scale);
        svr.fit(&x, &y).unwrap();
        assert_eq!(svr.n_support_vectors(), 0);
        assert_eq!(svr.predict(&x).unwrap(), array![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_gamma_scale_resolution() {
        let x = array![[0.0, 2.0], [2.0, 0.0]];
        let svr = Svr::new(1.0, 0.1, Kernel::Rbf, Gamma::Scale);
        // Var over all entries = 1.0, two features.
        assert_eq!(svr.resolve_gamma(&x).unwrap(), 0.5);
        assert_eq!(Gamma::Scale.to_string(), "scale");
        assert_eq!(Gamma::Value(0.1).to_string(), "0.1");
    }

    #[test]
    fn test_invalid_c_rejected() {
        let mut svr = Svr::new(0.0, 0.1, Kernel::Linear, Gamma::Scale);
        assert!(svr.fit(&array![[1.0]], &array![1.0]).is_err());
    }
}
