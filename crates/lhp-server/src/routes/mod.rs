//! Route table and the top-level handlers.

pub mod data;
pub mod predictions;

use crate::state::AppState;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let predictions = Router::new()
        .route("/predict", post(predictions::predict))
        .route("/batch-predict", post(predictions::batch_predict))
        .route("/ensemble", post(predictions::ensemble))
        .route("/model-info", get(predictions::model_info))
        .route("/reload-model", post(predictions::reload_model));

    let data = Router::new()
        .route("/model-list", get(data::model_list))
        .route("/model-features/:name", get(data::model_features))
        .route("/data-summary", get(data::data_summary))
        .route("/parish-list", get(data::parish_list))
        .route("/model-performance", get(data::model_performance));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/healthcheck", get(healthcheck))
        .nest("/api/predictions", predictions)
        .nest("/api/data", data)
        .fallback(not_found)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn root() -> Json<Value> {
    Json(json!({
        "status": "online",
        "message": "Lisbon House Price Prediction API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "predictions": [
                "POST /api/predictions/predict",
                "POST /api/predictions/batch-predict",
                "POST /api/predictions/ensemble",
                "GET /api/predictions/model-info",
                "POST /api/predictions/reload-model",
            ],
            "data": [
                "GET /api/data/model-list",
                "GET /api/data/model-features/{name}",
                "GET /api/data/data-summary",
                "GET /api/data/parish-list",
                "GET /api/data/model-performance",
            ],
            "health": "GET /healthcheck",
        },
    }))
}

async fn healthcheck(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "lisbon-house-price-api",
        "model_loaded": state.registry.is_loaded(),
    }))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found",
            "message": "The requested resource was not found on the server.",
            "path": uri.path(),
        })),
    )
}
