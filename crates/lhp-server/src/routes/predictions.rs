//! `/api/predictions` handlers.

use crate::error::{ApiError, Result};
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use lhp_learning::{ModelArtifact, ModelFamily, RawInput, predict_price};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

const CURRENCY: &str = "EUR";

/// Features reported when no model or manifest exists.
pub const FALLBACK_FEATURES: [&str; 9] = [
    "Bedrooms",
    "Bathrooms",
    "AreaNet",
    "AreaGross",
    "Parking",
    "Condition",
    "PropertyType",
    "PropertySubType",
    "Parish",
];

/// Placeholder price used when no model is available.
///
/// `350000 + AreaNet·1000 + Bedrooms·25000`, with `AreaNet` defaulting to 80
/// and `Bedrooms` to 2.
pub fn mock_price(input: &RawInput) -> f64 {
    let field = |name: &str, default: f64| {
        input
            .get(name)
            .and_then(Value::as_f64)
            .unwrap_or(default)
    };
    350_000.0 + field("AreaNet", 80.0) * 1000.0 + field("Bedrooms", 2.0) * 25_000.0
}

/// Display name of the model type, as reported by `model-info`.
fn model_type(family: ModelFamily) -> &'static str {
    match family {
        ModelFamily::RandomForest => "RandomForestRegressor",
        ModelFamily::DecisionTree => "DecisionTreeRegressor",
        ModelFamily::Ridge => "Ridge",
        ModelFamily::Lasso => "Lasso",
        ModelFamily::LinearRegression => "LinearRegression",
        ModelFamily::Svr => "SVR",
    }
}

/// A single house: a non-empty JSON object.
fn parse_house(body: &[u8]) -> Result<RawInput> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) if !map.is_empty() => Ok(map),
        _ => Err(ApiError::bad_request("No input data provided", "missing_data")),
    }
}

/// A batch: a non-empty JSON array of objects.
fn parse_houses(body: &[u8]) -> Result<Vec<RawInput>> {
    let invalid = || ApiError::bad_request("Input must be a list of house data", "invalid_format");
    let Ok(Value::Array(items)) = serde_json::from_slice::<Value>(body) else {
        return Err(invalid());
    };
    if items.is_empty() {
        return Err(invalid());
    }
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            _ => Err(invalid()),
        })
        .collect()
}

/// The default model, or `None` when it cannot be loaded.
async fn default_model(state: &Arc<AppState>) -> Result<Option<Arc<ModelArtifact>>> {
    let state = Arc::clone(state);
    let loaded = tokio::task::spawn_blocking(move || state.registry.get()).await?;
    Ok(loaded
        .inspect_err(|e| warn!("No model available, using mock predictions: {}", e))
        .ok())
}

/// `POST /api/predictions/predict`
pub async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>> {
    let input = parse_house(&body)?;

    let Some(artifact) = default_model(&state).await? else {
        return Ok(Json(json!({
            "predicted_price": mock_price(&input),
            "currency": CURRENCY,
            "status": "mock_prediction",
            "message": "Model not available, using mock prediction",
        })));
    };

    let name = artifact.name.clone();
    let price = tokio::task::spawn_blocking(move || predict_price(&artifact, &input))
        .await??;
    info!("Predicted €{:.2} with {}", price, name);

    Ok(Json(json!({
        "predicted_price": price,
        "currency": CURRENCY,
        "status": "success",
        "model": name,
    })))
}

#[derive(Debug, Deserialize)]
pub struct BatchParams {
    /// Predict with this model instead of the default one.
    pub model: Option<String>,
}

/// `POST /api/predictions/batch-predict[?model=name]`
pub async fn batch_predict(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BatchParams>,
    body: Bytes,
) -> Result<Json<Value>> {
    let inputs = parse_houses(&body)?;

    if let Some(name) = params.model {
        let worker = Arc::clone(&state);
        let batch = inputs.clone();
        let lookup = name.clone();
        let prices = tokio::task::spawn_blocking(move || {
            worker.predictor.predict_batch(&lookup, &batch)
        })
        .await??
        .ok_or_else(|| {
            ApiError::not_found(format!("Model '{}' is not available", name), "model_not_found")
        })?;
        return Ok(Json(json!({
            "predictions": prediction_items(inputs, &prices, false),
            "status": "success",
            "model": name,
        })));
    }

    let Some(artifact) = default_model(&state).await? else {
        let prices: Vec<f64> = inputs.iter().map(mock_price).collect();
        return Ok(Json(json!({
            "predictions": prediction_items(inputs, &prices, true),
            "status": "mock_prediction",
            "message": "Model not available, using mock predictions",
        })));
    };

    let name = artifact.name.clone();
    let batch = inputs.clone();
    let prices = tokio::task::spawn_blocking(move || {
        batch
            .iter()
            .map(|input| predict_price(&artifact, input))
            .collect::<lhp_learning::Result<Vec<f64>>>()
    })
    .await??;

    Ok(Json(json!({
        "predictions": prediction_items(inputs, &prices, false),
        "status": "success",
        "model": name,
    })))
}

fn prediction_items(inputs: Vec<RawInput>, prices: &[f64], is_mock: bool) -> Vec<Value> {
    inputs
        .into_iter()
        .zip(prices)
        .enumerate()
        .map(|(index, (input, price))| {
            let mut item = json!({
                "index": index,
                "input": input,
                "predicted_price": price,
                "currency": CURRENCY,
            });
            if is_mock {
                item["is_mock"] = Value::Bool(true);
            }
            item
        })
        .collect()
}

/// `POST /api/predictions/ensemble`
///
/// Predicts with every saved model and averages the ones below the
/// ensemble threshold.
pub async fn ensemble(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>> {
    let input = parse_house(&body)?;

    let worker = Arc::clone(&state);
    let house = input.clone();
    let result =
        tokio::task::spawn_blocking(move || worker.predictor.predict_with_all_models(&house))
            .await?;

    if result.is_empty() {
        return Ok(Json(json!({
            "predicted_price": mock_price(&input),
            "currency": CURRENCY,
            "status": "mock_prediction",
            "message": "No models available, using mock prediction",
        })));
    }

    let excluded: Vec<String> = result
        .excluded_models()
        .into_iter()
        .map(str::to_string)
        .collect();
    Ok(Json(json!({
        "predictions": result.predictions,
        "ensemble_average": result.ensemble_average,
        "excluded_models": excluded,
        "currency": CURRENCY,
        "status": "success",
    })))
}

/// `GET /api/predictions/model-info`
pub async fn model_info(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    if let Some(artifact) = default_model(&state).await? {
        return Ok(Json(json!({
            "model": artifact.name,
            "model_type": model_type(artifact.model.family()),
            "parameters": artifact.model.params(),
            "features": artifact.features,
            "feature_count": artifact.features.len(),
            "status": "success",
        })));
    }

    let features: Vec<String> = state
        .store()
        .load_shared_features()
        .unwrap_or_else(|| FALLBACK_FEATURES.iter().map(|f| f.to_string()).collect());
    Ok(Json(json!({
        "model_type": "RandomForestRegressor",
        "parameters": {
            "n_estimators": 100,
            "max_depth": 10,
            "min_samples_split": 2,
            "min_samples_leaf": 1,
        },
        "feature_count": features.len(),
        "features": features,
        "status": "mock_info",
        "message": "Model not available, showing mock information",
    })))
}

/// `POST /api/predictions/reload-model`
pub async fn reload_model(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let worker = Arc::clone(&state);
    let artifact = tokio::task::spawn_blocking(move || worker.registry.reload())
        .await?
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;

    Ok(Json(json!({
        "model": artifact.name,
        "feature_count": artifact.features.len(),
        "status": "success",
        "message": "Model reloaded",
    })))
}
