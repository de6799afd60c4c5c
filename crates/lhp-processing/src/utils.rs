//! Shared utilities for cleaning and feature engineering.
//!
//! Series-level helpers used by more than one module: dtype checks, null
//! filling, the mode of a string column and the numeric statistics the
//! cleaner relies on.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for processing purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Boolean type
    Boolean,
    /// String/text type
    String,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a float.
#[inline]
pub fn is_float_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// Series Statistics Utilities
// =============================================================================

/// Most frequent value of a string Series.
///
/// Ties resolve to the value that appears first in the column.
pub fn string_mode(series: &Series) -> Option<String> {
    let str_series = series.cast(&DataType::String).ok()?;
    let str_chunked = str_series.str().ok()?;

    // (value, count) in first-seen order
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for val in str_chunked.into_iter().flatten() {
        match index.get(val) {
            Some(&pos) => counts[pos].1 += 1,
            None => {
                index.insert(val.to_string(), counts.len());
                counts.push((val.to_string(), 1));
            }
        }
    }

    let mut best: Option<(String, usize)> = None;
    for (val, count) in counts {
        if best.as_ref().is_none_or(|(_, best_count)| count > *best_count) {
            best = Some((val, count));
        }
    }
    best.map(|(val, _)| val)
}

/// Non-null values of a numeric Series as `f64`.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<f64>> {
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().flatten().collect())
}

/// Quantile with linear interpolation between closest ranks.
///
/// `sorted` must be ascending; returns `None` when empty.
pub fn quantile_linear(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Pearson correlation over rows where both values are present.
///
/// Returns `None` for fewer than two pairs or a zero-variance input.
pub fn pearson_correlation(a: &Series, b: &Series) -> PolarsResult<Option<f64>> {
    let a = a.cast(&DataType::Float64)?;
    let b = b.cast(&DataType::Float64)?;
    let pairs: Vec<(f64, f64)> = a
        .f64()?
        .into_iter()
        .zip(b.f64()?)
        .filter_map(|(x, y)| Some((x?, y?)))
        .collect();

    if pairs.len() < 2 {
        return Ok(None);
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return Ok(None);
    }
    Ok(Some(cov / (var_x.sqrt() * var_y.sqrt())))
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Fill null values in a numeric Series with a specific value.
///
/// The result is always `Float64`.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<Series> {
    let cast = series.cast(&DataType::Float64)?;
    let filled: Float64Chunked = cast
        .f64()?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill_value)))
        .collect();
    Ok(filled.with_name(series.name().clone()).into_series())
}

/// Fill null values in a string Series with a specific value.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<Series> {
    let cast = series.cast(&DataType::String)?;
    let filled: StringChunked = cast
        .str()?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill_value)))
        .collect();
    Ok(filled.with_name(series.name().clone()).into_series())
}

/// Round a float Series to `decimals` places, leaving other dtypes untouched.
pub fn round_float_series(series: &Series, decimals: u32) -> PolarsResult<Series> {
    if !is_float_dtype(series.dtype()) {
        return Ok(series.clone());
    }
    let factor = 10f64.powi(decimals as i32);
    let cast = series.cast(&DataType::Float64)?;
    let rounded = cast
        .f64()?
        .apply(|v| v.map(|val| (val * factor).round() / factor));
    Ok(rounded.with_name(series.name().clone()).into_series())
}

// =============================================================================
// Tests
// =============================================================================
