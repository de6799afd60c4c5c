//! Categorical encoding shared by training and inference.
//!
//! Both paths apply the same fixed ordinal tables to `Condition` and
//! `PropertyType` and one-hot encode every other text field as
//! `{field}_{value}`. They differ in two places:
//!
//! - The bulk training path ([`CategoricalEncoder::encode_frame`]) drops the
//!   first (lexicographically smallest) category of each one-hot field as
//!   the reference.
//! - The inference path ([`CategoricalEncoder::encode_record`]) emits every
//!   indicator it sees and then reconciles against the Feature Manifest: absent
//!   manifest columns become `0`, columns outside the manifest are dropped, and
//!   the output order is exactly the manifest order.

use crate::error::{LearningError, Result};
use lhp_processing::{DtypeCategory, columns, get_dtype_category};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// One raw prediction input: feature name to raw JSON value.
pub type RawInput = serde_json::Map<String, Value>;

/// Code assigned to `Condition`/`PropertyType` values outside the fixed tables.
pub const UNKNOWN_CODE: f64 = 0.0;

/// Ordinal code of a `Condition` value.
pub fn condition_code(value: &str) -> Option<f64> {
    match value {
        "For Refurbishment" => Some(1.0),
        "Used" => Some(2.0),
        "As New" => Some(3.0),
        "New" => Some(4.0),
        _ => None,
    }
}

/// Binary code of a `PropertyType` value.
pub fn property_type_code(value: &str) -> Option<f64> {
    match value {
        "Homes" => Some(1.0),
        "Single Habitation" => Some(2.0),
        _ => None,
    }
}

/// Ordinal code for `column`, or `None` if the column has no fixed table.
fn ordinal_code(column: &str, value: &str) -> Option<f64> {
    let code = match column {
        columns::CONDITION => condition_code(value),
        columns::PROPERTY_TYPE => property_type_code(value),
        _ => return None,
    };
    Some(code.unwrap_or_else(|| {
        warn!(
            "Unknown {} value '{}', encoding as {}",
            column, value, UNKNOWN_CODE
        );
        UNKNOWN_CODE
    }))
}

fn is_ordinal(column: &str) -> bool {
    column == columns::CONDITION || column == columns::PROPERTY_TYPE
}

/// Dense, fully numeric feature table.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTable {
    pub features: Array2<f64>,
    pub target: Option<Array1<f64>>,
    pub feature_names: Vec<String>,
}

impl EncodedTable {
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Target values, or an error if the table was encoded without one.
    pub fn target(&self) -> Result<&Array1<f64>> {
        self.target
            .as_ref()
            .ok_or_else(|| LearningError::TargetNotFound("<none>".to_string()))
    }

    /// Rows at `indices`, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> EncodedTable {
        EncodedTable {
            features: self.features.select(Axis(0), indices),
            target: self.target.as_ref().map(|t| t.select(Axis(0), indices)),
            feature_names: self.feature_names.clone(),
        }
    }

    /// Reorder columns to `manifest`, filling absent columns with zeros and
    /// dropping columns the manifest does not list.
    pub fn reconcile(&self, manifest: &[String]) -> EncodedTable {
        let positions: HashMap<&str, usize> = self
            .feature_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut features = Array2::<f64>::zeros((self.n_samples(), manifest.len()));
        for (j, name) in manifest.iter().enumerate() {
            if let Some(&src) = positions.get(name.as_str()) {
                features.column_mut(j).assign(&self.features.column(src));
            }
        }

        EncodedTable {
            features,
            target: self.target.clone(),
            feature_names: manifest.to_vec(),
        }
    }
}

/// Encoder for raw records and training frames.
pub struct CategoricalEncoder;

impl CategoricalEncoder {
    /// Encode one raw input against a Feature Manifest.
    ///
    /// The returned vector has exactly `manifest.len()` entries in manifest
    /// order. `null` values are treated as absent. A string value for a
    /// column the manifest lists as-is is parsed as a number when possible.
    pub fn encode_record(input: &RawInput, manifest: &[String]) -> Result<Array1<f64>> {
        let encoded = Self::encode_pairs(input, manifest)?;
        Ok(manifest
            .iter()
            .map(|name| encoded.get(name.as_str()).copied().unwrap_or(0.0))
            .collect())
    }

    fn encode_pairs(input: &RawInput, manifest: &[String]) -> Result<HashMap<String, f64>> {
        let mut encoded = HashMap::with_capacity(input.len());

        for (field, value) in input {
            match value {
                Value::Null => {}
                Value::Bool(b) => {
                    encoded.insert(field.clone(), if *b { 1.0 } else { 0.0 });
                }
                Value::Number(n) => {
                    let v = n.as_f64().ok_or_else(|| {
                        LearningError::Encoding(format!("'{}' is not a finite number", field))
                    })?;
                    encoded.insert(field.clone(), v);
                }
                Value::String(s) => {
                    if let Some(code) = ordinal_code(field, s) {
                        encoded.insert(field.clone(), code);
                    } else if manifest.contains(field)
                        && let Ok(v) = s.trim().parse::<f64>()
                    {
                        encoded.insert(field.clone(), v);
                    } else {
                        encoded.insert(format!("{}_{}", field, s), 1.0);
                    }
                }
                Value::Array(_) | Value::Object(_) => {
                    return Err(LearningError::Encoding(format!(
                        "field '{}' must be a number or a string",
                        field
                    )));
                }
            }
        }

        Ok(encoded)
    }

    /// Encode a training frame.
    ///
    /// When `target` is given it is split out of the features and must exist.
    /// Numeric columns are cast to `f64` and must not contain nulls. Text
    /// columns other than the ordinal ones are one-hot encoded with the
    /// first sorted category dropped; the indicators take the position of
    /// their source column.
    pub fn encode_frame(df: &DataFrame, target: Option<&str>) -> Result<EncodedTable> {
        let target_values = match target {
            Some(name) => {
                let column = df
                    .column(name)
                    .map_err(|_| LearningError::TargetNotFound(name.to_string()))?;
                Some(Array1::from(numeric_column(column.as_materialized_series())?))
            }
            None => None,
        };

        let mut feature_names: Vec<String> = Vec::new();
        let mut feature_columns: Vec<Vec<f64>> = Vec::new();

        for column in df.get_columns() {
            let name = column.name().as_str();
            if Some(name) == target {
                continue;
            }
            let series = column.as_materialized_series();

            match get_dtype_category(series.dtype()) {
                DtypeCategory::Numeric | DtypeCategory::Boolean => {
                    feature_names.push(name.to_string());
                    feature_columns.push(numeric_column(series)?);
                }
                DtypeCategory::String if is_ordinal(name) => {
                    let values = string_values(series)?;
                    let codes = values
                        .iter()
                        .map(|v| match v {
                            Some(s) => Ok(ordinal_code(name, s).unwrap_or(UNKNOWN_CODE)),
                            None => Err(LearningError::Encoding(format!(
                                "column '{}' contains missing values",
                                name
                            ))),
                        })
                        .collect::<Result<Vec<f64>>>()?;
                    feature_names.push(name.to_string());
                    feature_columns.push(codes);
                }
                DtypeCategory::String => {
                    let values = string_values(series)?;
                    let categories: BTreeSet<&str> =
                        values.iter().filter_map(|v| v.as_deref()).collect();
                    debug!(
                        "One-hot encoding '{}' ({} categories, first dropped)",
                        name,
                        categories.len()
                    );
                    for category in categories.into_iter().skip(1) {
                        feature_names.push(format!("{}_{}", name, category));
                        feature_columns.push(
                            values
                                .iter()
                                .map(|v| if v.as_deref() == Some(category) { 1.0 } else { 0.0 })
                                .collect(),
                        );
                    }
                }
                DtypeCategory::Other => {
                    return Err(LearningError::Encoding(format!(
                        "column '{}' has unsupported type {}",
                        name,
                        series.dtype()
                    )));
                }
            }
        }

        let n_rows = df.height();
        let features = Array2::from_shape_fn((n_rows, feature_columns.len()), |(i, j)| {
            feature_columns[j][i]
        });

        Ok(EncodedTable {
            features,
            target: target_values,
            feature_names,
        })
    }
}

fn numeric_column(series: &Series) -> Result<Vec<f64>> {
    let cast = series.cast(&DataType::Float64)?;
    cast.f64()?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                LearningError::Encoding(format!(
                    "column '{}' contains missing values",
                    series.name()
                ))
            })
        })
        .collect()
}

fn string_values(series: &Series) -> Result<Vec<Option<String>>> {
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Shuffle rows with a seeded `ChaCha8Rng` and hold out `ceil(n · test_size)`
/// of them. Returns `(train, test)`.
pub fn train_test_split(
    table: &EncodedTable,
    test_size: f64,
    seed: u64,
) -> Result<(EncodedTable, EncodedTable)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(LearningError::InvalidConfig(
            "test_size must be between 0.0 and 1.0 (exclusive)".to_string(),
        ));
    }

    let n = table.n_samples();
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(LearningError::InsufficientSamples {
            n_samples: n,
            n_folds: 2,
        });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok((table.select_rows(train_idx), table.select_rows(test_idx)))
}
