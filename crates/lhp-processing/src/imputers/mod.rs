//! Missing value imputation.
//!
//! Numeric columns are filled with their median, string columns with their
//! most frequent value.

mod statistical;

pub use statistical::StatisticalImputer;
