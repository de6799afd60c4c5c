//! HTTP tests for the prediction and data routes.
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`,
//! against temporary model and data directories.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use lhp_learning::{ModelFamily, ModelTrainer, PERFORMANCE_FILE, TrainingConfig};
use lhp_processing::{CleaningConfig, DataCleaner, FeatureEngineer, io};
use lhp_server::{AppState, ServerConfig, create_router};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tempfile::{TempDir, tempdir};
use tower::ServiceExt;

// ============================================================================
// Helper Functions
// ============================================================================

const PARISHES: [&str; 3] = ["Alvalade", "Estrela", "Lumiar"];

fn listings(n: usize) -> DataFrame {
    let area_net: Vec<f64> = (0..n).map(|i| 60.0 + ((i * 29) % 120) as f64).collect();
    let bedrooms: Vec<i64> = (0..n).map(|i| 1 + (i % 4) as i64).collect();
    let price: Vec<f64> = (0..n)
        .map(|i| 3000.0 * area_net[i] + 20_000.0 * bedrooms[i] as f64 + 500.0 * (i % 7) as f64)
        .collect();

    df![
        "Price" => price,
        "AreaNet" => area_net.clone(),
        "AreaGross" => area_net.iter().map(|a| a * 1.25).collect::<Vec<_>>(),
        "Bedrooms" => bedrooms,
        "Bathrooms" => (0..n).map(|i| 1 + (i % 2) as i64).collect::<Vec<_>>(),
        "Parking" => (0..n).map(|i| (i % 3) as i64).collect::<Vec<_>>(),
        "Condition" => (0..n).map(|i| if i % 2 == 0 { "Used" } else { "New" }).collect::<Vec<_>>(),
        "PropertyType" => (0..n)
            .map(|i| if i % 5 == 0 { "Single Habitation" } else { "Homes" })
            .collect::<Vec<_>>(),
        "PropertySubType" => (0..n)
            .map(|i| if i % 3 == 0 { "House" } else { "Apartment" })
            .collect::<Vec<_>>(),
        // Lumiar twice as often as the others
        "Parish" => (0..n).map(|i| PARISHES[(i % 4).min(2)]).collect::<Vec<_>>(),
    ]
    .unwrap()
}

fn processed(n: usize) -> DataFrame {
    let (cleaned, _) = DataCleaner::clean(&listings(n), &CleaningConfig::default()).unwrap();
    let (engineered, _) = FeatureEngineer::engineer(&cleaned).unwrap();
    engineered
}

fn train(models_dir: &Path) {
    let config = TrainingConfig::builder()
        .models_dir(models_dir)
        .families(vec![ModelFamily::DecisionTree, ModelFamily::Ridge])
        .build()
        .unwrap();
    ModelTrainer::new(config).train_all(&processed(40)).unwrap();
}

/// Temporary workspace: `models/` and `processed.csv` live inside it but
/// are only created when a test asks for them.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
        }
    }

    fn models_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("models")
    }

    fn data_path(&self) -> std::path::PathBuf {
        self.dir.path().join("processed.csv")
    }

    fn with_models(self) -> Self {
        train(&self.models_dir());
        self
    }

    fn with_data(self) -> Self {
        io::save_processed_data(&processed(40), self.data_path(), 3).unwrap();
        self
    }

    fn app(&self) -> Router {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            models_dir: self.models_dir(),
            data_path: self.data_path(),
        };
        create_router(Arc::new(AppState::new(config)))
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

fn house(parish: &str) -> Value {
    json!({
        "Condition": "New",
        "PropertyType": "Homes",
        "PropertySubType": "Apartment",
        "Bedrooms": 3,
        "Bathrooms": 2,
        "AreaNet": 120,
        "AreaGross": 150,
        "Parking": 1,
        "Parish": parish,
    })
}

// ============================================================================
// Root, Health and Fallback
// ============================================================================

#[tokio::test]
async fn test_root_lists_endpoints() {
    let (status, body) = get(Fixture::new().app(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
    assert!(body["endpoints"]["predictions"].as_array().unwrap().len() >= 4);
}

#[tokio::test]
async fn test_healthcheck_before_any_prediction() {
    let (status, body) = get(Fixture::new().app(), "/healthcheck").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], false);
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let (status, body) = get(Fixture::new().app(), "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
    assert_eq!(body["path"], "/api/nope");
}

// ============================================================================
// Predictions Without Models
// ============================================================================

#[tokio::test]
async fn test_predict_rejects_empty_body() {
    let (status, body) = post(Fixture::new().app(), "/api/predictions/predict", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "missing_data");
    assert_eq!(body["error"], "No input data provided");
}

#[tokio::test]
async fn test_predict_mock_without_models() {
    let (status, body) = post(
        Fixture::new().app(),
        "/api/predictions/predict",
        json!({"AreaNet": 100, "Bedrooms": 2}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "mock_prediction");
    assert_eq!(body["currency"], "EUR");
    assert_eq!(body["predicted_price"], 500_000.0);
}

#[tokio::test]
async fn test_batch_predict_requires_list() {
    let (status, body) = post(
        Fixture::new().app(),
        "/api/predictions/batch-predict",
        house("Lumiar"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "invalid_format");
}

#[tokio::test]
async fn test_batch_predict_mock_items() {
    let (status, body) = post(
        Fixture::new().app(),
        "/api/predictions/batch-predict",
        json!([{"AreaNet": 50}, {"Bedrooms": 4}]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "mock_prediction");

    let items = body["predictions"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["index"], 0);
    assert_eq!(items[0]["predicted_price"], 450_000.0);
    assert_eq!(items[1]["predicted_price"], 530_000.0);
    assert_eq!(items[1]["is_mock"], true);
}

#[tokio::test]
async fn test_model_info_mock_uses_fallback_features() {
    let (status, body) = get(Fixture::new().app(), "/api/predictions/model-info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "mock_info");
    assert_eq!(body["feature_count"], 9);
    assert_eq!(body["features"][0], "Bedrooms");
}

#[tokio::test]
async fn test_reload_without_models_is_unavailable() {
    let (status, body) = post(
        Fixture::new().app(),
        "/api/predictions/reload-model",
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "model_unavailable");
}

#[tokio::test]
async fn test_ensemble_mock_without_models() {
    let (status, body) = post(
        Fixture::new().app(),
        "/api/predictions/ensemble",
        house("Lumiar"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "mock_prediction");
}

// ============================================================================
// Predictions With Trained Models
// ============================================================================

#[tokio::test]
async fn test_predict_with_trained_model() {
    let fixture = Fixture::new().with_models();
    let app = fixture.app();

    let (status, body) = post(app.clone(), "/api/predictions/predict", house("Estrela")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["model"], "decision_tree");
    assert!(body["predicted_price"].as_f64().unwrap().is_finite());

    let (_, health) = get(app, "/healthcheck").await;
    assert_eq!(health["model_loaded"], true);
}

#[tokio::test]
async fn test_batch_predict_named_model_keeps_order() {
    let fixture = Fixture::new().with_models();
    let app = fixture.app();

    let mut singles = Vec::new();
    for parish in PARISHES {
        let (_, body) = post(
            app.clone(),
            "/api/predictions/batch-predict?model=ridge",
            json!([house(parish)]),
        )
        .await;
        singles.push(body["predictions"][0]["predicted_price"].clone());
    }

    let batch: Vec<Value> = PARISHES.iter().map(|p| house(p)).collect();
    let (status, body) = post(
        app,
        "/api/predictions/batch-predict?model=ridge",
        Value::Array(batch),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"], "ridge");
    let prices: Vec<Value> = body["predictions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["predicted_price"].clone())
        .collect();
    assert_eq!(prices, singles);
}

#[tokio::test]
async fn test_batch_predict_unknown_model() {
    let fixture = Fixture::new().with_models();
    let (status, body) = post(
        fixture.app(),
        "/api/predictions/batch-predict?model=svr",
        json!([house("Lumiar")]),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "model_not_found");
}

#[tokio::test]
async fn test_ensemble_reports_every_model() {
    let fixture = Fixture::new().with_models();
    let (status, body) = post(fixture.app(), "/api/predictions/ensemble", house("Lumiar")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let predictions = body["predictions"].as_object().unwrap();
    assert_eq!(
        predictions.keys().collect::<Vec<_>>(),
        vec!["decision_tree", "ridge"]
    );
    assert!(body["ensemble_average"].as_f64().unwrap().is_finite());
}

#[tokio::test]
async fn test_model_info_and_reload() {
    let fixture = Fixture::new().with_models();
    let app = fixture.app();

    let (_, info) = get(app.clone(), "/api/predictions/model-info").await;
    assert_eq!(info["status"], "success");
    assert_eq!(info["model_type"], "DecisionTreeRegressor");
    assert_eq!(
        info["feature_count"].as_u64().unwrap() as usize,
        info["features"].as_array().unwrap().len()
    );

    let (status, reloaded) = post(app, "/api/predictions/reload-model", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reloaded["model"], "decision_tree");
    assert_eq!(reloaded["feature_count"], info["feature_count"]);
}

// ============================================================================
// Data Routes
// ============================================================================

#[tokio::test]
async fn test_model_list_states() {
    let fixture = Fixture::new();
    let (_, body) = get(fixture.app(), "/api/data/model-list").await;
    assert_eq!(body["status"], "No models directory found");

    std::fs::create_dir_all(fixture.models_dir()).unwrap();
    let (_, body) = get(fixture.app(), "/api/data/model-list").await;
    assert_eq!(body["count"], 0);

    let fixture = fixture.with_models();
    let (_, body) = get(fixture.app(), "/api/data/model-list").await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["models"], json!(["decision_tree", "ridge"]));
}

#[tokio::test]
async fn test_model_features_fallback_and_manifest() {
    let fixture = Fixture::new();
    let (status, body) = get(fixture.app(), "/api/data/model-features/ridge").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "no_models_directory");

    std::fs::create_dir_all(fixture.models_dir()).unwrap();
    let (_, body) = get(fixture.app(), "/api/data/model-features/ridge").await;
    assert_eq!(body["status"], "fallback_features");
    assert_eq!(body["feature_count"], 9);

    let fixture = fixture.with_models();
    let (_, body) = get(fixture.app(), "/api/data/model-features/ridge").await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["model"], "ridge");
}

#[tokio::test]
async fn test_data_routes_without_data() {
    let fixture = Fixture::new();
    let (status, summary) = get(fixture.app(), "/api/data/data-summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["status"], "no_data");

    let (_, parishes) = get(fixture.app(), "/api/data/parish-list").await;
    assert_eq!(parishes["status"], "no_data");
    assert_eq!(parishes["parishes"], json!([]));
}

#[tokio::test]
async fn test_data_summary() {
    let fixture = Fixture::new().with_data();
    let (status, body) = get(fixture.app(), "/api/data/data-summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["records_count"], 40);

    let price = &body["numeric_statistics"]["Price"];
    assert_eq!(price["count"], 40);
    assert!(price["min"].as_f64().unwrap() <= price["50%"].as_f64().unwrap());
    assert!(price["50%"].as_f64().unwrap() <= price["max"].as_f64().unwrap());

    let parishes = body["categorical_summary"]["Parish"].as_object().unwrap();
    assert_eq!(parishes["Lumiar"], 20);
    assert_eq!(parishes["Alvalade"], 10);
}

#[tokio::test]
async fn test_parish_list_sorted_by_count() {
    let fixture = Fixture::new().with_data();
    let (_, body) = get(fixture.app(), "/api/data/parish-list").await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["total_count"], 3);
    assert_eq!(
        body["parishes"],
        json!([
            {"name": "Lumiar", "count": 20},
            {"name": "Alvalade", "count": 10},
            {"name": "Estrela", "count": 10},
        ])
    );
}

#[tokio::test]
async fn test_parish_list_missing_column() {
    let fixture = Fixture::new();
    let mut df = df!["Price" => [1.0, 2.0]].unwrap();
    CsvWriter::new(std::fs::File::create(fixture.data_path()).unwrap())
        .finish(&mut df)
        .unwrap();

    let (status, body) = get(fixture.app(), "/api/data/parish-list").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "missing_column");
}

#[tokio::test]
async fn test_model_performance() {
    let fixture = Fixture::new();
    let (status, body) = get(fixture.app(), "/api/data/model-performance").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "no_data");

    std::fs::create_dir_all(fixture.models_dir()).unwrap();
    std::fs::write(
        fixture.models_dir().join(PERFORMANCE_FILE),
        json!({"best_model": "ridge"}).to_string(),
    )
    .unwrap();
    let (status, body) = get(fixture.app(), "/api/data/model-performance").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["best_model"], "ridge");
    assert_eq!(body["status"], "success");
}
