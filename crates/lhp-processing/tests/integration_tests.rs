//! Integration tests for cleaning, feature engineering and CSV I/O.
//!
//! These tests run the full processing flow the way the `lhp-process`
//! binary does and check the dataset-level properties that must hold.

use lhp_processing::{
    CleaningConfig, DataCleaner, FeatureEngineer, OutlierHandler, ProcessingError, io,
};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

// ============================================================================
// Helper Functions
// ============================================================================

fn raw_listings() -> DataFrame {
    df![
        "Id" => [1i64, 2, 3, 4, 5, 5, 6, 7, 8, 9],
        "Country" => ["Portugal"; 10],
        "Price" => [
            Some(300_000.0), Some(450_000.0), Some(600_000.0), Some(250_000.0), None,
            None, Some(380_000.0), Some(9_500_000.0), Some(410_000.0), Some(295_000.0),
        ],
        "Price M2" => [
            3750.0, 3730.0, 3990.0, 3570.0, 3990.0, 3990.0, 4000.0, 9000.0, 4100.0, 3100.0,
        ],
        "AreaNet" => [
            Some(80.5), Some(120.7), Some(150.3), Some(70.1), Some(95.2),
            Some(95.2), None, Some(300.0), Some(100.0), Some(95.0),
        ],
        "AreaGross" => [100.2, 140.8, 180.5, 90.3, 115.7, 115.7, 120.0, 0.0, 125.0, 110.0],
        "Bedrooms" => [2i64, 3, 4, 1, 2, 2, 0, 6, 3, 2],
        "Bathrooms" => [1i64, 2, 2, 1, 1, 1, 1, 4, 2, 1],
        "Parking" => [1i64, 1, 2, 0, 1, 1, 0, 3, 1, 0],
        "Condition" => [
            Some("Used"), Some("New"), Some("As New"), Some("Used"), None,
            None, Some("For Refurbishment"), Some("New"), Some("Used"), Some("Used"),
        ],
        "PropertyType" => ["Homes", "Homes", "Single Habitation", "Homes", "Homes", "Homes", "Homes", "Single Habitation", "Homes", "Homes"],
        "PropertySubType" => ["Apartment", "Apartment", "House", "Studio", "Apartment", "Apartment", "Apartment", "House", "Duplex", "Apartment"],
        "Parish" => ["Alvalade", "Areeiro", "Alvalade", "Benfica", "Lumiar", "Lumiar", "Alvalade", "Estrela", "Areeiro", "Benfica"],
    ]
    .unwrap()
}

fn column_f64(df: &DataFrame, name: &str) -> Vec<f64> {
    df.column(name)
        .unwrap()
        .as_materialized_series()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .flatten()
        .collect()
}

// ============================================================================
// Cleaning
// ============================================================================

#[test]
fn test_cleaning_invariants() {
    let (cleaned, report) = DataCleaner::clean(&raw_listings(), &CleaningConfig::default()).unwrap();

    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(cleaned.height(), 9);
    assert!(cleaned.column("Id").is_err());
    assert!(cleaned.column("Country").is_err());

    for col in cleaned.get_columns() {
        assert_eq!(col.null_count(), 0, "{} has nulls", col.name());
        let distinct = col.as_materialized_series().n_unique().unwrap();
        assert!(distinct > 1, "{} is single-valued", col.name());
    }
}

#[test]
fn test_cleaning_is_idempotent() {
    let config = CleaningConfig::default();
    let (once, _) = DataCleaner::clean(&raw_listings(), &config).unwrap();
    let (twice, second) = DataCleaner::clean(&once, &config).unwrap();

    assert!(once.equals_missing(&twice));
    assert_eq!(second.duplicates_removed, 0);
    assert!(second.dropped_columns.is_empty());
}

#[test]
fn test_outlier_bound_uses_pre_clip_fence() {
    let raw = raw_listings();
    let config = CleaningConfig::default();

    // Fence on the imputed but unclipped distribution.
    let mut imputed = raw.unique_stable(None, UniqueKeepStrategy::First, None).unwrap();
    let mut scratch = lhp_processing::CleaningReport::new();
    lhp_processing::StatisticalImputer::impute_all(&mut imputed, &mut scratch).unwrap();
    let fence = OutlierHandler::fence(&imputed, "AreaNet", config.iqr_multiplier)
        .unwrap()
        .unwrap();

    let (cleaned, _) = DataCleaner::clean(&raw, &config).unwrap();
    for v in column_f64(&cleaned, "AreaNet") {
        assert!(v >= fence.lower && v <= fence.upper);
    }
}

#[test]
fn test_schema_error_for_required_column() {
    let err = lhp_processing::OperationSchema::train_test_split("Price")
        .check(&df!["AreaNet" => [1.0]].unwrap())
        .unwrap_err();
    assert!(matches!(err, ProcessingError::MissingColumn { .. }));
    assert!(err.is_schema_mismatch());
}

// ============================================================================
// Feature Engineering
// ============================================================================

#[test]
fn test_feature_guard_zero_bedrooms() {
    let df = df![
        "Price" => [300_000.0],
        "Bedrooms" => [0i64],
    ]
    .unwrap();
    let (engineered, _) = FeatureEngineer::engineer(&df).unwrap();
    assert_eq!(column_f64(&engineered, "PricePerBedroom"), vec![300_000.0]);
}

#[test]
fn test_full_processing_flow() {
    let (cleaned, _) = DataCleaner::clean(&raw_listings(), &CleaningConfig::default()).unwrap();
    let (engineered, created) = FeatureEngineer::engineer(&cleaned).unwrap();

    assert_eq!(
        created,
        vec![
            "PricePerBedroom",
            "BathroomToBedroom",
            "AreaUtilizationRatio",
            "PropertyCategory"
        ]
    );
    assert_eq!(engineered.width(), cleaned.width() + 4);
    for name in &created[..3] {
        assert!(column_f64(&engineered, name).iter().all(|v| v.is_finite()));
    }
}

// ============================================================================
// CSV I/O
// ============================================================================

#[test]
fn test_round_trip_limits_decimals() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("processed/lisbon_houses_processed.csv");

    let (cleaned, _) = DataCleaner::clean(&raw_listings(), &CleaningConfig::default()).unwrap();
    let (engineered, _) = FeatureEngineer::engineer(&cleaned).unwrap();
    io::save_processed_data(&engineered, &path, 2).unwrap();

    let reloaded = io::load_data(&path).unwrap();
    assert_eq!(reloaded.shape(), engineered.shape());

    for col in reloaded.get_columns() {
        if col.dtype() != &DataType::Float64 {
            continue;
        }
        for v in column_f64(&reloaded, col.name()) {
            let scaled = v * 100.0;
            assert!((scaled - scaled.round()).abs() < 1e-6, "{} has more than 2 decimals", v);
        }
    }
}

#[test]
fn test_load_missing_file_is_none() {
    let dir = tempdir().unwrap();
    assert!(io::load_data(dir.path().join("lisbon-houses.csv")).is_none());
}
