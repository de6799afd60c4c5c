//! Data cleaning for raw listings.
//!
//! The steps always run in the same order:
//! 1. Remove duplicate rows
//! 2. Drop columns carrying at most one distinct value
//! 3. Drop the identifier column
//! 4. Median-fill numeric columns, mode-fill string columns
//! 5. Clip sensitive numeric columns to their IQR fence
//! 6. Drop the price-per-area column when it barely tracks the price
//!
//! Columns that are absent are skipped at every step.

mod outliers;

pub use outliers::OutlierHandler;

use crate::config::CleaningConfig;
use crate::error::Result;
use crate::imputers::StatisticalImputer;
use crate::schema::OperationSchema;
use crate::types::{ActionType, CleaningAction, CleaningReport};
use crate::utils::pearson_correlation;
use polars::prelude::*;
use tracing::{debug, info};

/// Data cleaner for the listings dataset.
pub struct DataCleaner;

impl DataCleaner {
    /// Columns the cleaner uses when present.
    pub fn schema(config: &CleaningConfig) -> OperationSchema {
        let mut optional = vec![
            config.id_column.clone(),
            config.target_column.clone(),
            config.price_per_area_column.clone(),
        ];
        for col in &config.outlier_columns {
            if !optional.contains(col) {
                optional.push(col.clone());
            }
        }
        OperationSchema::new("cleaning").optional(optional)
    }

    /// Clean a dataset.
    ///
    /// The input frame is left untouched; the cleaned copy is returned with a
    /// report of every action taken.
    pub fn clean(df: &DataFrame, config: &CleaningConfig) -> Result<(DataFrame, CleaningReport)> {
        let mut report = CleaningReport::new();
        report.rows_before = df.height();
        report.columns_before = df.width();

        info!("Cleaning dataset with shape {:?}", df.shape());
        let mut df = df.clone();

        if config.remove_duplicates {
            Self::remove_duplicates(&mut df, &mut report)?;
        }
        Self::drop_constant_columns(&mut df, &mut report)?;

        let check = Self::schema(config).check(&df)?;
        if check.has(&config.id_column) {
            df = df.drop(&config.id_column)?;
            report.record_drop(
                &config.id_column,
                format!("Dropped identifier column '{}'", config.id_column),
            );
            debug!("Dropped identifier column '{}'", config.id_column);
        }

        StatisticalImputer::impute_all(&mut df, &mut report)?;
        OutlierHandler::cap_outliers(
            &mut df,
            &config.outlier_columns,
            config.iqr_multiplier,
            &mut report,
        )?;
        Self::drop_weak_price_per_area(&mut df, config, &mut report)?;

        report.rows_after = df.height();
        report.columns_after = df.width();
        info!(
            "Cleaning complete: {} -> {} rows, {} -> {} columns",
            report.rows_before, report.rows_after, report.columns_before, report.columns_after
        );
        Ok((df, report))
    }

    /// Remove exact duplicate rows, keeping the first occurrence in order.
    fn remove_duplicates(df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let before = df.height();
        *df = df.unique_stable(None, UniqueKeepStrategy::First, None)?;
        let removed = before - df.height();
        report.duplicates_removed = removed;

        if removed > 0 {
            let pct = (removed as f64 / before as f64) * 100.0;
            report.add_action(CleaningAction::new(
                ActionType::DuplicatesRemoved,
                "dataset",
                format!("Removed {} duplicate rows ({:.1}%)", removed, pct),
            ));
            debug!("Removed {} duplicate rows", removed);
        } else {
            debug!("No duplicate rows found");
        }
        Ok(())
    }

    /// Drop columns with at most one distinct non-null value.
    fn drop_constant_columns(df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let mut constant = Vec::new();
        for col in df.get_columns() {
            let distinct = col.as_materialized_series().drop_nulls().n_unique()?;
            if distinct <= 1 {
                constant.push(col.name().to_string());
            }
        }

        if constant.is_empty() {
            return Ok(());
        }

        let names: Vec<PlSmallStr> = constant.iter().map(|s| s.as_str().into()).collect();
        *df = df.drop_many(names);
        for col in &constant {
            report.record_drop(col, format!("Dropped single-valued column '{}'", col));
        }
        debug!("Dropped {} single-valued columns: {:?}", constant.len(), constant);
        Ok(())
    }

    /// Drop the price-per-area column when its correlation with price is weak.
    fn drop_weak_price_per_area(
        df: &mut DataFrame,
        config: &CleaningConfig,
        report: &mut CleaningReport,
    ) -> Result<()> {
        let target = config.target_column.as_str();
        let per_area = config.price_per_area_column.as_str();
        let check = Self::schema(config).check(df)?;
        if !check.has_all(&[target, per_area]) {
            return Ok(());
        }

        let corr = pearson_correlation(
            df.column(target)?.as_materialized_series(),
            df.column(per_area)?.as_materialized_series(),
        )?;
        report.price_per_area_correlation = corr;

        let Some(r) = corr else {
            debug!("Correlation between '{}' and '{}' is undefined", target, per_area);
            return Ok(());
        };

        report.add_action(CleaningAction::new(
            ActionType::CorrelationChecked,
            per_area,
            format!("Correlation between '{}' and '{}': {:.3}", target, per_area, r),
        ));

        if r.abs() < config.correlation_threshold {
            *df = df.drop(per_area)?;
            report.record_drop(
                per_area,
                format!(
                    "Dropped '{}' (|r| = {:.3} < {})",
                    per_area,
                    r.abs(),
                    config.correlation_threshold
                ),
            );
            info!("Dropped weakly correlated column '{}'", per_area);
        }
        Ok(())
    }
}
