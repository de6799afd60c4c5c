//! Configuration for the cleaning stage.
//!
//! The defaults describe the Lisbon listings dataset. Use
//! [`CleaningConfig::builder()`] to override individual settings.

use serde::{Deserialize, Serialize};

use crate::schema::columns;

/// Configuration for [`DataCleaner`](crate::DataCleaner).
///
/// # Example
///
/// ```rust,ignore
/// use lhp_processing::CleaningConfig;
///
/// let config = CleaningConfig::builder()
///     .correlation_threshold(0.25)
///     .decimal_places(2)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// Whether to remove exact duplicate rows.
    /// Default: true
    pub remove_duplicates: bool,

    /// Identifier column dropped before imputation.
    /// Default: "Id"
    pub id_column: String,

    /// Price column used as the correlation reference.
    /// Default: "Price"
    pub target_column: String,

    /// Price-per-area column, dropped when weakly correlated with the target.
    /// Default: "Price M2"
    pub price_per_area_column: String,

    /// Columns whose values are clipped to the Tukey fence.
    /// Default: Price, Price M2, AreaNet, AreaGross
    pub outlier_columns: Vec<String>,

    /// Fence width as a multiple of the IQR.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Minimum absolute Pearson correlation for keeping the price-per-area column.
    /// Default: 0.3
    pub correlation_threshold: f64,

    /// Decimal places kept for float columns when writing the processed CSV.
    /// Default: 3
    pub decimal_places: u32,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            remove_duplicates: true,
            id_column: columns::ID.to_string(),
            target_column: columns::PRICE.to_string(),
            price_per_area_column: columns::PRICE_M2.to_string(),
            outlier_columns: default_outlier_columns(),
            iqr_multiplier: 1.5,
            correlation_threshold: 0.3,
            decimal_places: 3,
        }
    }
}

fn default_outlier_columns() -> Vec<String> {
    [
        columns::PRICE,
        columns::PRICE_M2,
        columns::AREA_NET,
        columns::AREA_GROSS,
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

impl CleaningConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CleaningConfigBuilder {
        CleaningConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier < 0.0 {
            return Err(ConfigValidationError::InvalidIqrMultiplier(
                self.iqr_multiplier,
            ));
        }

        if !(0.0..=1.0).contains(&self.correlation_threshold) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "correlation_threshold".to_string(),
                value: self.correlation_threshold,
            });
        }

        if self.decimal_places > 15 {
            return Err(ConfigValidationError::InvalidDecimalPlaces(
                self.decimal_places,
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid IQR multiplier: {0} (must be a finite, non-negative number)")]
    InvalidIqrMultiplier(f64),

    #[error("Invalid decimal places: {0} (must be at most 15)")]
    InvalidDecimalPlaces(u32),
}

impl From<ConfigValidationError> for crate::error::ProcessingError {
    fn from(err: ConfigValidationError) -> Self {
        crate::error::ProcessingError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`CleaningConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct CleaningConfigBuilder {
    remove_duplicates: Option<bool>,
    id_column: Option<String>,
    target_column: Option<String>,
    price_per_area_column: Option<String>,
    outlier_columns: Option<Vec<String>>,
    iqr_multiplier: Option<f64>,
    correlation_threshold: Option<f64>,
    decimal_places: Option<u32>,
}

impl CleaningConfigBuilder {
    /// Enable or disable duplicate row removal.
    pub fn remove_duplicates(mut self, remove: bool) -> Self {
        self.remove_duplicates = Some(remove);
        self
    }

    /// Set the identifier column name.
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    /// Set the price column name.
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    /// Set the price-per-area column name.
    pub fn price_per_area_column(mut self, column: impl Into<String>) -> Self {
        self.price_per_area_column = Some(column.into());
        self
    }

    /// Replace the set of outlier-capped columns.
    pub fn outlier_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outlier_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the fence width multiplier.
    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    /// Set the minimum absolute correlation for keeping the price-per-area column.
    ///
    /// # Arguments
    /// * `threshold` - Value between 0.0 and 1.0
    pub fn correlation_threshold(mut self, threshold: f64) -> Self {
        self.correlation_threshold = Some(threshold);
        self
    }

    /// Set the decimal places used when saving the processed dataset.
    pub fn decimal_places(mut self, places: u32) -> Self {
        self.decimal_places = Some(places);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `CleaningConfig` or an error if validation fails.
    pub fn build(self) -> Result<CleaningConfig, ConfigValidationError> {
        let defaults = CleaningConfig::default();
        let config = CleaningConfig {
            remove_duplicates: self.remove_duplicates.unwrap_or(defaults.remove_duplicates),
            id_column: self.id_column.unwrap_or(defaults.id_column),
            target_column: self.target_column.unwrap_or(defaults.target_column),
            price_per_area_column: self
                .price_per_area_column
                .unwrap_or(defaults.price_per_area_column),
            outlier_columns: self.outlier_columns.unwrap_or(defaults.outlier_columns),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            correlation_threshold: self
                .correlation_threshold
                .unwrap_or(defaults.correlation_threshold),
            decimal_places: self.decimal_places.unwrap_or(defaults.decimal_places),
        };

        config.validate()?;
        Ok(config)
    }
}
