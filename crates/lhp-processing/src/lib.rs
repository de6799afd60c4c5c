//! Data processing for the Lisbon house price pipeline.
//!
//! This crate turns the raw listings CSV into a model-ready dataset:
//!
//! - **Cleaning**: duplicate removal, degenerate and identifier column
//!   removal, median/mode imputation, IQR outlier capping and the
//!   price-per-area correlation check ([`DataCleaner`])
//! - **Feature engineering**: ratio and composite columns with division
//!   guards ([`FeatureEngineer`])
//! - **I/O**: CSV loading and rounded saving ([`io`])
//! - **Schema**: required and optional columns per operation ([`schema`])
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lhp_processing::{io, CleaningConfig, DataCleaner, FeatureEngineer};
//!
//! let raw = io::load_data("data/lisbon-houses.csv").expect("dataset");
//! let (cleaned, report) = DataCleaner::clean(&raw, &CleaningConfig::default())?;
//! let (engineered, created) = FeatureEngineer::engineer(&cleaned)?;
//!
//! println!("{} duplicates removed, created {:?}", report.duplicates_removed, created);
//! io::save_processed_data(&engineered, "data/processed/lisbon_houses_processed.csv", 3)?;
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod features;
pub mod imputers;
pub mod io;
pub mod schema;
pub mod types;
pub mod utils;

pub use cleaner::{DataCleaner, OutlierHandler};
pub use config::{CleaningConfig, CleaningConfigBuilder, ConfigValidationError};
pub use error::{ProcessingError, Result as ProcessingResult, ResultExt};
pub use features::FeatureEngineer;
pub use imputers::StatisticalImputer;
pub use schema::{columns, OperationSchema, SchemaCheck};
pub use types::{ActionType, CleaningAction, CleaningReport, OutlierCap};
pub use utils::{
    DtypeCategory, fill_numeric_nulls, fill_string_nulls, get_dtype_category, is_numeric_dtype,
    pearson_correlation, quantile_linear,
};

static_assertions::assert_impl_all!(CleaningConfig: Send, Sync, Clone);
static_assertions::assert_impl_all!(CleaningReport: Send, Sync, Clone);
static_assertions::assert_impl_all!(ProcessingError: Send, Sync);
