//! Outlier handling module.
//!
//! Clips values of sensitive numeric columns to the Tukey fence
//! `[Q1 - k*IQR, Q3 + k*IQR]`. Rows are never removed.

use crate::error::Result;
use crate::types::{ActionType, CleaningAction, CleaningReport, OutlierCap};
use crate::utils::{is_numeric_dtype, numeric_values, quantile_linear};
use polars::prelude::*;
use tracing::{debug, warn};

/// Handles outlier detection and treatment.
pub struct OutlierHandler;

impl OutlierHandler {
    /// Compute the fence for a column without modifying it.
    ///
    /// Returns `None` for missing, non-numeric or all-null columns.
    pub fn fence(df: &DataFrame, col_name: &str, multiplier: f64) -> Result<Option<OutlierCap>> {
        let Ok(col) = df.column(col_name) else {
            return Ok(None);
        };
        if !is_numeric_dtype(col.dtype()) {
            return Ok(None);
        }

        let mut values = numeric_values(col.as_materialized_series())?;
        values.sort_by(|a, b| a.total_cmp(b));
        let (Some(q1), Some(q3)) = (quantile_linear(&values, 0.25), quantile_linear(&values, 0.75))
        else {
            return Ok(None);
        };

        let iqr = q3 - q1;
        let lower = q1 - multiplier * iqr;
        let upper = q3 + multiplier * iqr;
        let capped = values.iter().filter(|v| **v < lower || **v > upper).count();

        Ok(Some(OutlierCap {
            column: col_name.to_string(),
            q1,
            q3,
            lower,
            upper,
            capped,
        }))
    }

    /// Clip each listed column present in `df` to its IQR fence.
    pub fn cap_outliers(
        df: &mut DataFrame,
        columns: &[String],
        multiplier: f64,
        report: &mut CleaningReport,
    ) -> Result<()> {
        let mut outliers_capped = 0;

        for col_name in columns {
            let Some(cap) = Self::fence(df, col_name, multiplier)? else {
                continue;
            };

            let float_series = df.column(col_name)?.as_materialized_series().cast(&DataType::Float64)?;
            let clipped = float_series
                .f64()?
                .apply(|v| v.map(|val| val.clamp(cap.lower, cap.upper)));

            if let Err(e) = df.replace(col_name, clipped.into_series()) {
                warn!("Failed to cap outliers in {}: {}", col_name, e);
                continue;
            }

            outliers_capped += cap.capped;
            report.add_action(
                CleaningAction::new(
                    ActionType::OutliersCapped,
                    col_name.as_str(),
                    format!("Capped {} outliers in {} at IQR fence", cap.capped, col_name),
                )
                .with_details(format!("[{:.2}, {:.2}]", cap.lower, cap.upper)),
            );
            report.outlier_caps.push(cap);
        }

        debug!("Capped {} outliers at IQR fences", outliers_capped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fence_uses_linear_quantiles() {
        let df = df!["Price" => [1.0, 2.0, 3.0, 4.0]].unwrap();
        let cap = OutlierHandler::fence(&df, "Price", 1.5).unwrap().unwrap();
        assert_eq!(cap.q1, 1.75);
        assert_eq!(cap.q3, 3.25);
        assert_eq!(cap.lower, 1.75 - 1.5 * 1.5);
        assert_eq!(cap.upper, 3.25 + 1.5 * 1.5);
        assert_eq!(cap.capped, 0);
    }

    #[test]
    fn test_cap_outliers_with_extreme_values() {
        let mut df = df![
            "Price" => [100.0, 110.0, 120.0, 130.0, 140.0, 10_000.0],
        ]
        .unwrap();
        let mut report = CleaningReport::new();

        OutlierHandler::cap_outliers(&mut df, &cols(&["Price"]), 1.5, &mut report).unwrap();

        let cap = &report.outlier_caps[0];
        assert_eq!(cap.capped, 1);
        let max = df.column("Price").unwrap().as_materialized_series().max::<f64>().unwrap().unwrap();
        assert_eq!(max, cap.upper);
        assert_eq!(df.height(), 6);
    }

    #[test]
    fn test_cap_outliers_low_side() {
        let mut df = df!["AreaNet" => [-500.0, 50.0, 55.0, 60.0, 65.0, 70.0]].unwrap();
        let mut report = CleaningReport::new();

        OutlierHandler::cap_outliers(&mut df, &cols(&["AreaNet"]), 1.5, &mut report).unwrap();

        let min = df.column("AreaNet").unwrap().as_materialized_series().min::<f64>().unwrap().unwrap();
        assert_eq!(min, report.outlier_caps[0].lower);
    }

    #[test]
    fn test_cap_outliers_column_not_in_df() {
        let mut df = df!["Other" => [1.0, 2.0, 3.0]].unwrap();
        let mut report = CleaningReport::new();

        OutlierHandler::cap_outliers(&mut df, &cols(&["Price"]), 1.5, &mut report).unwrap();

        assert!(report.outlier_caps.is_empty());
        assert!(report.actions.is_empty());
    }

    #[test]
    fn test_cap_outliers_non_numeric_column_skipped() {
        let mut df = df!["Price" => ["a", "b", "c"]].unwrap();
        let mut report = CleaningReport::new();

        OutlierHandler::cap_outliers(&mut df, &cols(&["Price"]), 1.5, &mut report).unwrap();
        assert!(report.outlier_caps.is_empty());
    }

    #[test]
    fn test_cap_outliers_iqr_zero() {
        let mut df = df!["AreaGross" => [5.0, 5.0, 5.0, 5.0, 9.0]].unwrap();
        let mut report = CleaningReport::new();

        OutlierHandler::cap_outliers(&mut df, &cols(&["AreaGross"]), 1.5, &mut report).unwrap();

        let values: Vec<f64> = df
            .column("AreaGross")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(values, vec![5.0; 5]);
    }
}
