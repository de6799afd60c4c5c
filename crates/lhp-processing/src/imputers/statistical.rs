//! Statistical imputation methods.
//!
//! Median for numeric columns, mode for string columns.

use crate::error::Result;
use crate::types::{ActionType, CleaningAction, CleaningReport};
use crate::utils::{fill_numeric_nulls, fill_string_nulls, get_dtype_category, string_mode, DtypeCategory};
use polars::prelude::*;
use tracing::debug;

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill every column that has nulls using the strategy for its dtype.
    ///
    /// Numeric columns are handled before string columns. Columns of other
    /// dtypes are left untouched.
    pub fn impute_all(df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let mut numeric = Vec::new();
        let mut strings = Vec::new();
        for col in df.get_columns() {
            if col.null_count() == 0 {
                continue;
            }
            match get_dtype_category(col.dtype()) {
                DtypeCategory::Numeric => numeric.push(col.name().to_string()),
                DtypeCategory::String => strings.push(col.name().to_string()),
                _ => {}
            }
        }

        for col_name in &numeric {
            Self::apply_numeric_median(df, col_name, report)?;
        }
        for col_name in &strings {
            Self::apply_mode_imputation(df, col_name, report)?;
        }
        Ok(())
    }

    /// Apply median imputation for a numeric column.
    pub fn apply_numeric_median(
        df: &mut DataFrame,
        col_name: &str,
        report: &mut CleaningReport,
    ) -> Result<()> {
        let (median, filled, missing) = match df.column(col_name) {
            Ok(col) => {
                let series = col.as_materialized_series();
                match series.median() {
                    Some(median) => (median, fill_numeric_nulls(series, median)?, series.null_count()),
                    None => return Ok(()),
                }
            }
            Err(_) => return Ok(()),
        };

        df.replace(col_name, filled)?;
        debug!("Filled {} missing values in '{}' with median {:.3}", missing, col_name, median);
        report.add_action(
            CleaningAction::new(
                ActionType::ValueImputed,
                col_name,
                format!("Filled '{}' with median: {:.2}", col_name, median),
            )
            .with_details(format!("{} values", missing)),
        );
        Ok(())
    }

    /// Apply mode imputation for a string column.
    pub fn apply_mode_imputation(
        df: &mut DataFrame,
        col_name: &str,
        report: &mut CleaningReport,
    ) -> Result<()> {
        let (mode, filled, missing) = match df.column(col_name) {
            Ok(col) => {
                let series = col.as_materialized_series();
                match string_mode(series) {
                    Some(mode) => {
                        let filled = fill_string_nulls(series, &mode)?;
                        (mode, filled, series.null_count())
                    }
                    None => return Ok(()),
                }
            }
            Err(_) => return Ok(()),
        };

        df.replace(col_name, filled)?;
        debug!("Filled {} missing values in '{}' with mode '{}'", missing, col_name, mode);
        report.add_action(
            CleaningAction::new(
                ActionType::ValueImputed,
                col_name,
                format!("Filled '{}' with mode: '{}'", col_name, mode),
            )
            .with_details(format!("{} values", missing)),
        );
        Ok(())
    }
}
