//! `/api/data` handlers: models on disk and the processed dataset.

use crate::error::{ApiError, Result};
use crate::routes::predictions::FALLBACK_FEATURES;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use lhp_processing::utils::numeric_values;
use lhp_processing::{DtypeCategory, ProcessingError, columns, get_dtype_category, io, quantile_linear};
use polars::prelude::*;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Columns summarised by value counts in `data-summary`.
const CATEGORICAL_SUMMARY: [&str; 4] = [
    columns::PARISH,
    columns::PROPERTY_TYPE,
    columns::PROPERTY_SUB_TYPE,
    columns::CONDITION,
];

/// `GET /api/data/model-list`
pub async fn model_list(State(state): State<Arc<AppState>>) -> Json<Value> {
    let store = state.store();
    if !store.dir().exists() {
        return Json(json!({
            "models": [],
            "count": 0,
            "status": "No models directory found",
        }));
    }

    let models = store.list_models();
    let status = if models.is_empty() {
        "No models found. You may need to train models first."
    } else {
        "success"
    };
    Json(json!({
        "count": models.len(),
        "models": models,
        "status": status,
    }))
}

/// `GET /api/data/model-features/{name}`
///
/// The model's own manifest, then the shared one, then a fixed fallback list.
pub async fn model_features(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    let store = state.store();
    if !store.dir().exists() {
        return Err(ApiError::not_found(
            "Models directory not found",
            "no_models_directory",
        ));
    }

    match store.load_features(&name) {
        Ok(features) => Ok(Json(json!({
            "model": name,
            "feature_count": features.len(),
            "features": features,
            "status": "success",
        }))),
        Err(_) => Ok(Json(json!({
            "model": name,
            "features": FALLBACK_FEATURES,
            "feature_count": FALLBACK_FEATURES.len(),
            "status": "fallback_features",
        }))),
    }
}

/// Read the processed dataset off the async runtime.
///
/// `None` when the file does not exist.
async fn read_dataset(path: PathBuf) -> Result<Option<DataFrame>> {
    if !path.exists() {
        return Ok(None);
    }
    let df = tokio::task::spawn_blocking(move || io::read_csv(&path)).await??;
    Ok(Some(df))
}

/// `GET /api/data/data-summary`
pub async fn data_summary(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let Some(df) = read_dataset(state.config.data_path.clone()).await? else {
        return Ok(Json(json!({
            "status": "no_data",
            "message": "Processed data file not found",
            "records_count": 0,
            "numeric_statistics": {},
            "categorical_summary": {},
            "columns": [],
        })));
    };

    let mut numeric = Map::new();
    for column in df.get_columns() {
        if get_dtype_category(column.dtype()) != DtypeCategory::Numeric {
            continue;
        }
        numeric.insert(
            column.name().to_string(),
            describe(column.as_materialized_series()).map_err(ProcessingError::from)?,
        );
    }

    let mut categorical = Map::new();
    for name in CATEGORICAL_SUMMARY {
        if df.column(name).is_err() {
            continue;
        }
        let counts: Map<String, Value> = value_counts(&df, name)?
            .into_iter()
            .map(|(value, count)| (value, json!(count)))
            .collect();
        categorical.insert(name.to_string(), Value::Object(counts));
    }

    let column_names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect();
    Ok(Json(json!({
        "status": "success",
        "records_count": df.height(),
        "numeric_statistics": numeric,
        "categorical_summary": categorical,
        "columns": column_names,
    })))
}

/// `GET /api/data/parish-list`
pub async fn parish_list(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let Some(df) = read_dataset(state.config.data_path.clone()).await? else {
        return Ok(Json(json!({
            "parishes": [],
            "total_count": 0,
            "status": "no_data",
            "message": "Processed data file not found",
        })));
    };

    if df.column(columns::PARISH).is_err() {
        return Err(ApiError::MissingColumn(columns::PARISH));
    }

    let parishes: Vec<Value> = value_counts(&df, columns::PARISH)?
        .into_iter()
        .map(|(name, count)| json!({"name": name, "count": count}))
        .collect();
    Ok(Json(json!({
        "total_count": parishes.len(),
        "parishes": parishes,
        "status": "success",
    })))
}

/// `GET /api/data/model-performance`
pub async fn model_performance(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let path = state.store().performance_path();
    let not_found = || {
        ApiError::not_found(
            "No performance data found. Run model evaluation first.",
            "no_data",
        )
    };
    if !path.exists() {
        return Err(not_found());
    }

    let text = tokio::task::spawn_blocking(move || std::fs::read_to_string(path))
        .await?
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let mut report: Value =
        serde_json::from_str(&text).map_err(|e| ApiError::Internal(e.to_string()))?;
    match report.as_object_mut() {
        Some(map) => {
            map.insert("status".to_string(), json!("success"));
            Ok(Json(report))
        }
        None => Err(ApiError::Internal(
            "Performance file does not hold a JSON object".to_string(),
        )),
    }
}

/// Count, mean, sample std, min, quartiles and max of a numeric column.
fn describe(series: &Series) -> PolarsResult<Value> {
    let mut values = numeric_values(series)?;
    values.sort_by(f64::total_cmp);

    let n = values.len();
    if n == 0 {
        return Ok(json!({"count": 0}));
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let std = if n > 1 {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else {
        f64::NAN
    };

    Ok(json!({
        "count": n,
        "mean": mean,
        "std": if std.is_finite() { json!(std) } else { Value::Null },
        "min": values[0],
        "25%": quantile_linear(&values, 0.25),
        "50%": quantile_linear(&values, 0.5),
        "75%": quantile_linear(&values, 0.75),
        "max": values[n - 1],
    }))
}

/// Non-null values of a text column with their counts, most frequent first.
fn value_counts(df: &DataFrame, name: &str) -> Result<Vec<(String, usize)>> {
    let series = df
        .column(name)
        .and_then(|c| c.as_materialized_series().cast(&DataType::String))
        .map_err(ProcessingError::from)?;
    let strings = series.str().map_err(ProcessingError::from)?;

    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in strings.into_iter().flatten() {
        *counts.entry(value.to_string()).or_default() += 1;
    }

    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_describe() {
        let series = Series::new(
            "Price".into(),
            &[Some(1.0), Some(2.0), None, Some(3.0), Some(4.0)],
        );
        let stats = describe(&series).unwrap();
        assert_eq!(stats["count"], 4);
        assert_eq!(stats["mean"], 2.5);
        assert_eq!(stats["min"], 1.0);
        assert_eq!(stats["max"], 4.0);
        assert_eq!(stats["50%"], 2.5);
        assert_eq!(stats["25%"], 1.75);
    }

    #[test]
    fn test_value_counts_most_frequent_first() {
        let df = df![
            "Parish" => [Some("Lumiar"), Some("Alvalade"), Some("Lumiar"), None, Some("Belém")],
        ]
        .unwrap();
        assert_eq!(
            value_counts(&df, "Parish").unwrap(),
            vec![
                ("Lumiar".to_string(), 2),
                ("Alvalade".to_string(), 1),
                ("Belém".to_string(), 1),
            ]
        );
    }
}
