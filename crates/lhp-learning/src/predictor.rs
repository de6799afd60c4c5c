//! Single, batch and ensemble prediction.

use crate::encoder::{CategoricalEncoder, RawInput};
use crate::error::{LearningError, Result};
use crate::models::Regressor;
use crate::store::{ModelArtifact, ModelStore};
use ndarray::Axis;
use serde::Serialize;
use serde::ser::SerializeMap;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Predictions at or above this price are left out of the ensemble average.
pub const ENSEMBLE_THRESHOLD: f64 = 1_000_000.0;

/// Mean of the predictions below [`ENSEMBLE_THRESHOLD`].
///
/// Falls back to the mean of all predictions when none is below the
/// threshold; `None` only for an empty slice.
pub fn ensemble_average(predictions: &[f64]) -> Option<f64> {
    if predictions.is_empty() {
        return None;
    }
    let below: Vec<f64> = predictions
        .iter()
        .copied()
        .filter(|p| *p < ENSEMBLE_THRESHOLD)
        .collect();
    let pool = if below.is_empty() { predictions } else { &below };
    Some(pool.iter().sum::<f64>() / pool.len() as f64)
}

/// Per-model predictions plus their ensemble average.
///
/// Serializes flat: `{"lasso": 1.0, ..., "ensemble_average": 1.0}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnsembleResult {
    pub predictions: BTreeMap<String, f64>,
    pub ensemble_average: Option<f64>,
}

impl EnsembleResult {
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Models whose prediction was left out of the average.
    pub fn excluded_models(&self) -> Vec<&str> {
        if self.predictions.values().all(|p| *p >= ENSEMBLE_THRESHOLD) {
            return Vec::new();
        }
        self.predictions
            .iter()
            .filter(|(_, p)| **p >= ENSEMBLE_THRESHOLD)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl Serialize for EnsembleResult {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let len = self.predictions.len() + usize::from(self.ensemble_average.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (name, price) in &self.predictions {
            map.serialize_entry(name, price)?;
        }
        if let Some(avg) = self.ensemble_average {
            map.serialize_entry("ensemble_average", &avg)?;
        }
        map.end()
    }
}

/// Predict one price with a loaded artifact.
pub fn predict_price(artifact: &ModelArtifact, input: &RawInput) -> Result<f64> {
    let x = CategoricalEncoder::encode_record(input, &artifact.features)?.insert_axis(Axis(0));
    let prediction = artifact.model.predict(&x)?;
    prediction
        .first()
        .copied()
        .ok_or_else(|| LearningError::shape("1 prediction", "0 predictions"))
}

/// Runs predictions against the models in a [`ModelStore`].
#[derive(Debug, Clone)]
pub struct Predictor {
    store: ModelStore,
}

impl Predictor {
    pub fn new(store: ModelStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Predict with every persisted model and average the plausible ones.
    ///
    /// Models that fail to load or predict are logged and left out.
    pub fn predict_with_all_models(&self, input: &RawInput) -> EnsembleResult {
        let mut result = EnsembleResult::default();

        for name in self.store.list_models() {
            let prediction = self
                .store
                .load(&name)
                .and_then(|artifact| predict_price(&artifact, input));
            match prediction {
                Ok(price) => {
                    if price >= ENSEMBLE_THRESHOLD {
                        info!(
                            "{} prediction: €{:.2} (excluded from ensemble, above €1M)",
                            name, price
                        );
                    } else {
                        info!("{} prediction: €{:.2}", name, price);
                    }
                    result.predictions.insert(name, price);
                }
                Err(e) => warn!("Error making prediction with {}: {}", name, e),
            }
        }

        let all: Vec<f64> = result.predictions.values().copied().collect();
        result.ensemble_average = ensemble_average(&all);
        match result.ensemble_average {
            Some(avg) => {
                let excluded = result.excluded_models();
                if all.iter().all(|p| *p >= ENSEMBLE_THRESHOLD) {
                    warn!("No predictions below the €1M threshold, using overall average");
                }
                info!(
                    "Ensemble average prediction: €{:.2} (excluding {} models)",
                    avg,
                    excluded.len()
                );
            }
            None => warn!("No model produced a prediction"),
        }
        result
    }

    /// Predict a batch with one model, in input order.
    ///
    /// Returns `Ok(None)` when the model or its manifest cannot be loaded.
    /// The first failing item aborts the batch.
    pub fn predict_batch(&self, model_name: &str, inputs: &[RawInput]) -> Result<Option<Vec<f64>>> {
        let artifact = match self.store.load(model_name) {
            Ok(a) => a,
            Err(e) => {
                warn!("Batch prediction unavailable: {}", e);
                return Ok(None);
            }
        };

        let mut predictions = Vec::with_capacity(inputs.len());
        for input in inputs {
            predictions.push(predict_price(&artifact, input)?);
        }
        Ok(Some(predictions))
    }
}
