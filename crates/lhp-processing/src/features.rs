//! Derived feature columns.
//!
//! Each derivation runs only when all of its inputs are present, and every
//! division falls back to a fixed value instead of producing NaN or infinity.

use crate::error::Result;
use crate::schema::{columns, OperationSchema};
use polars::prelude::*;
use tracing::{debug, info};

/// Appends engineered columns to a cleaned dataset.
pub struct FeatureEngineer;

impl FeatureEngineer {
    /// Append every derived column whose inputs exist.
    ///
    /// Returns the engineered frame and the names of the columns created.
    pub fn engineer(df: &DataFrame) -> Result<(DataFrame, Vec<String>)> {
        let check = OperationSchema::feature_engineering().check(df)?;
        let mut out = df.clone();
        let mut created = Vec::new();

        if check.has_all(&[columns::PRICE, columns::BEDROOMS]) {
            let series = guarded_ratio(
                df,
                columns::PRICE,
                columns::BEDROOMS,
                columns::PRICE_PER_BEDROOM,
                |price, _| price,
            )?;
            out.with_column(series)?;
            created.push(columns::PRICE_PER_BEDROOM.to_string());
        }

        if check.has_all(&[columns::BATHROOMS, columns::BEDROOMS]) {
            let series = guarded_ratio(
                df,
                columns::BATHROOMS,
                columns::BEDROOMS,
                columns::BATHROOM_TO_BEDROOM,
                |bathrooms, _| bathrooms,
            )?;
            out.with_column(series)?;
            created.push(columns::BATHROOM_TO_BEDROOM.to_string());
        }

        if check.has_all(&[columns::AREA_NET, columns::AREA_GROSS]) {
            let series = guarded_ratio(
                df,
                columns::AREA_NET,
                columns::AREA_GROSS,
                columns::AREA_UTILIZATION_RATIO,
                |_, _| 0.0,
            )?;
            out.with_column(series)?;
            created.push(columns::AREA_UTILIZATION_RATIO.to_string());
        }

        if check.has_all(&[columns::PROPERTY_TYPE, columns::PROPERTY_SUB_TYPE]) {
            let series = joined_category(
                df,
                columns::PROPERTY_TYPE,
                columns::PROPERTY_SUB_TYPE,
                columns::PROPERTY_CATEGORY,
            )?;
            out.with_column(series)?;
            created.push(columns::PROPERTY_CATEGORY.to_string());
        }

        if !check.missing.is_empty() {
            debug!("Feature inputs not present: {:?}", check.missing);
        }
        info!("Created {} engineered features: {:?}", created.len(), created);
        Ok((out, created))
    }
}

/// `numerator / denominator` row by row, or `fallback(numerator, denominator)`
/// when the denominator is not positive.
fn guarded_ratio(
    df: &DataFrame,
    numerator: &str,
    denominator: &str,
    name: &str,
    fallback: impl Fn(f64, f64) -> f64,
) -> Result<Series> {
    let num = df.column(numerator)?.as_materialized_series().cast(&DataType::Float64)?;
    let den = df.column(denominator)?.as_materialized_series().cast(&DataType::Float64)?;

    let values: Float64Chunked = num
        .f64()?
        .into_iter()
        .zip(den.f64()?.into_iter())
        .map(|(n, d)| match (n, d) {
            (Some(n), Some(d)) if d > 0.0 => Some(n / d),
            (Some(n), Some(d)) => Some(fallback(n, d)),
            _ => None,
        })
        .collect();

    Ok(values.with_name(name.into()).into_series())
}

/// `left + "_" + right` row by row.
fn joined_category(df: &DataFrame, left: &str, right: &str, name: &str) -> Result<Series> {
    let l = df.column(left)?.as_materialized_series().cast(&DataType::String)?;
    let r = df.column(right)?.as_materialized_series().cast(&DataType::String)?;

    let values: StringChunked = l
        .str()?
        .into_iter()
        .zip(r.str()?.into_iter())
        .map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => Some(format!("{}_{}", a, b)),
            _ => None,
        })
        .collect();

    Ok(values.with_name(name.into()).into_series())
}
