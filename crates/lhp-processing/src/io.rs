//! CSV loading and saving.
//!
//! [`load_data`] is the data-access boundary: a missing or unreadable file is
//! logged and turned into `None` so callers can fall back gracefully.

use crate::error::{ProcessingError, Result};
use crate::utils::round_float_series;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Decimal places used when none are requested.
pub const DEFAULT_DECIMAL_PLACES: u32 = 3;

/// Read a CSV file with a header row.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(ProcessingError::DataAccess {
            path: path.display().to_string(),
            reason: "file not found".to_string(),
        });
    }

    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()?;
    Ok(df)
}

/// Load a dataset, returning `None` when it cannot be read.
pub fn load_data(path: impl AsRef<Path>) -> Option<DataFrame> {
    let path = path.as_ref();
    match read_csv(path) {
        Ok(df) => {
            info!(
                "Data loaded from {} with {} rows and {} columns",
                path.display(),
                df.height(),
                df.width()
            );
            Some(df)
        }
        Err(e) => {
            warn!("Error loading data from {}: {}", path.display(), e);
            None
        }
    }
}

/// Round float columns to `decimal_places`, leaving other columns as-is.
pub fn round_floats(df: &DataFrame, decimal_places: u32) -> Result<DataFrame> {
    let columns = df
        .get_columns()
        .iter()
        .map(|col| round_float_series(col.as_materialized_series(), decimal_places).map(Column::from))
        .collect::<PolarsResult<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

/// Save a dataset as CSV with float columns rounded to `decimal_places`.
///
/// Parent directories are created as needed.
pub fn save_processed_data(df: &DataFrame, path: impl AsRef<Path>, decimal_places: u32) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut rounded = round_floats(df, decimal_places)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .with_float_precision(Some(decimal_places as usize))
        .finish(&mut rounded)?;

    info!(
        "Processed data saved to {} with {} decimal places",
        path.display(),
        decimal_places
    );
    Ok(())
}
