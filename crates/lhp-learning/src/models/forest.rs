//! Random forest regressor: bootstrapped regression trees averaged together.

use super::{DecisionTreeRegressor, Regressor, check_features, check_xy};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random forest of [`DecisionTreeRegressor`]s.
///
/// Tree `i` draws its bootstrap sample from `ChaCha8Rng` seeded with
/// `random_state + i`, so a forest is reproducible regardless of how rayon
/// schedules the trees. Every split considers all features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub random_state: u64,
    trees: Vec<DecisionTreeRegressor>,
    n_features: usize,
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize, max_depth: Option<usize>, min_samples_split: usize) -> Self {
        Self {
            n_estimators,
            max_depth,
            min_samples_split,
            random_state: 42,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    /// Fitted trees; empty before fitting.
    pub fn trees(&self) -> &[DecisionTreeRegressor] {
        &self.trees
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        if self.n_estimators == 0 {
            return Err(LearningError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }

        let n_samples = x.nrows();
        let base_seed = self.random_state;
        let template = DecisionTreeRegressor::new(self.max_depth, self.min_samples_split);

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(i as u64));
                let bootstrap: Vec<usize> =
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                let mut tree = template.clone();
                tree.fit_indices(x, y, bootstrap)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Fitted random forest: {} trees on {} samples",
            trees.len(),
            n_samples
        );
        self.trees = trees;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(LearningError::NotFitted);
        }
        check_features(x, self.n_features)?;

        let mut total = Array1::<f64>::zeros(x.nrows());
        for tree in &self.trees {
            total += &tree.predict(x)?;
        }
        Ok(total / self.trees.len() as f64)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![10.0, 10.0, 10.0, 10.0, 50.0, 50.0, 50.0, 50.0];
        (x, y)
    }

    #[test]
    fn test_forest_is_reproducible() {
        let (x, y) = step_data();
        let mut a = RandomForestRegressor::new(10, None, 2);
        let mut b = RandomForestRegressor::new(10, None, 2);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.trees().len(), 10);
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_predictions_within_target_range() {
        let (x, y) = step_data();
        let mut forest = RandomForestRegressor::new(20, Some(3), 2);
        forest.fit(&x, &y).unwrap();

        let preds = forest.predict(&array![[0.0], [4.5], [100.0]]).unwrap();
        for p in preds.iter() {
            assert!(*p >= 10.0 && *p <= 50.0);
        }
        assert!(preds[0] < preds[2]);
    }

    #[test]
    fn test_seed_changes_bootstrap() {
        let (x, y) = step_data();
        let mut a = RandomForestRegressor::new(5, None, 2);
        let mut b = RandomForestRegressor::new(5, None, 2).with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert!(
            a.trees()
                .iter()
                .zip(b.trees())
                .any(|(p, q)| p.nodes() != q.nodes())
        );
    }

    #[test]
    fn test_zero_estimators_rejected() {
        let (x, y) = step_data();
        let mut forest = RandomForestRegressor::new(0, None, 2);
        assert!(matches!(
            forest.fit(&x, &y),
            Err(LearningError::InvalidConfig(_))
        ));
    }
}
