//! Column schema for each pipeline operation.
//!
//! Every operation declares which columns it cannot run without and which
//! ones it uses when present. [`OperationSchema::check`] is called once at the
//! operation boundary; the operation then works from the returned
//! [`SchemaCheck`] instead of probing the frame column by column.

use polars::prelude::*;
use serde::Serialize;

use crate::error::{ProcessingError, Result};

/// Column names of the Lisbon listings dataset.
pub mod columns {
    pub const ID: &str = "Id";
    pub const PRICE: &str = "Price";
    pub const PRICE_M2: &str = "Price M2";
    pub const AREA_NET: &str = "AreaNet";
    pub const AREA_GROSS: &str = "AreaGross";
    pub const BEDROOMS: &str = "Bedrooms";
    pub const BATHROOMS: &str = "Bathrooms";
    pub const PARKING: &str = "Parking";
    pub const CONDITION: &str = "Condition";
    pub const PROPERTY_TYPE: &str = "PropertyType";
    pub const PROPERTY_SUB_TYPE: &str = "PropertySubType";
    pub const PARISH: &str = "Parish";

    pub const PRICE_PER_BEDROOM: &str = "PricePerBedroom";
    pub const BATHROOM_TO_BEDROOM: &str = "BathroomToBedroom";
    pub const AREA_UTILIZATION_RATIO: &str = "AreaUtilizationRatio";
    pub const PROPERTY_CATEGORY: &str = "PropertyCategory";
}

/// Required and optional columns of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationSchema {
    pub operation: &'static str,
    pub required: Vec<String>,
    pub optional: Vec<String>,
}

/// Outcome of checking a frame against an [`OperationSchema`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaCheck {
    /// Optional columns present in the frame, in schema order.
    pub present: Vec<String>,
    /// Optional columns absent from the frame, in schema order.
    pub missing: Vec<String>,
}

impl SchemaCheck {
    pub fn has(&self, column: &str) -> bool {
        self.present.iter().any(|c| c == column)
    }

    pub fn has_all(&self, columns: &[&str]) -> bool {
        columns.iter().all(|c| self.has(c))
    }
}

impl OperationSchema {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            required: Vec::new(),
            optional: Vec::new(),
        }
    }

    pub fn require(mut self, column: impl Into<String>) -> Self {
        self.required.push(column.into());
        self
    }

    pub fn optional<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Check the frame's columns.
    ///
    /// Fails with [`ProcessingError::MissingColumn`] on the first absent
    /// required column; absent optional columns are only reported.
    pub fn check(&self, df: &DataFrame) -> Result<SchemaCheck> {
        self.check_names(&column_names(df))
    }

    /// Same as [`check`](Self::check) for a plain list of column names.
    pub fn check_names(&self, names: &[String]) -> Result<SchemaCheck> {
        if let Some(column) = self.required.iter().find(|c| !names.contains(c)) {
            return Err(ProcessingError::MissingColumn {
                column: column.clone(),
                operation: self.operation.to_string(),
            });
        }

        let (present, missing): (Vec<String>, Vec<String>) = self
            .optional
            .iter()
            .cloned()
            .partition(|c| names.contains(c));

        Ok(SchemaCheck { present, missing })
    }

    /// Columns the feature engineer reads.
    pub fn feature_engineering() -> Self {
        Self::new("feature engineering").optional([
            columns::PRICE,
            columns::BEDROOMS,
            columns::BATHROOMS,
            columns::AREA_NET,
            columns::AREA_GROSS,
            columns::PROPERTY_TYPE,
            columns::PROPERTY_SUB_TYPE,
        ])
    }

    /// Columns needed to split a frame into features and target.
    pub fn train_test_split(target: &str) -> Self {
        Self::new("train/test split").require(target)
    }
}

/// Column names of a frame as owned strings.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_reports_present_and_missing() {
        let df = df![
            "Price" => [1.0, 2.0],
            "Bedrooms" => [1i64, 2],
        ]
        .unwrap();

        let check = OperationSchema::feature_engineering().check(&df).unwrap();
        assert!(check.has("Price"));
        assert!(check.has_all(&["Price", "Bedrooms"]));
        assert!(!check.has("AreaNet"));
        assert!(check.missing.contains(&"AreaGross".to_string()));
    }

    #[test]
    fn test_missing_required_column_is_an_error() {
        let df = df!["AreaNet" => [50.0]].unwrap();
        let err = OperationSchema::train_test_split("Price")
            .check(&df)
            .unwrap_err();
        assert!(err.is_schema_mismatch());
        assert!(err.to_string().contains("Price"));
    }

    #[test]
    fn test_check_names() {
        let schema = OperationSchema::new("demo")
            .require("a")
            .optional(["b", "c"]);
        let check = schema
            .check_names(&["a".to_string(), "c".to_string()])
            .unwrap();
        assert_eq!(check.present, vec!["c"]);
        assert_eq!(check.missing, vec!["b"]);
    }
}
