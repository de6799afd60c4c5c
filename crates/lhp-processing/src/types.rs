use serde::{Deserialize, Serialize};

/// Audit trail of one [`DataCleaner::clean`](crate::DataCleaner::clean) run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    /// Number of rows before cleaning.
    pub rows_before: usize,
    /// Number of rows after cleaning.
    pub rows_after: usize,
    /// Exact duplicate rows removed.
    pub duplicates_removed: usize,

    /// Number of columns before cleaning.
    pub columns_before: usize,
    /// Number of columns after cleaning.
    pub columns_after: usize,
    /// Columns removed, in removal order.
    pub dropped_columns: Vec<String>,

    /// Fence applied to each capped column.
    pub outlier_caps: Vec<OutlierCap>,

    /// Pearson correlation between price and price-per-area, when computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_area_correlation: Option<f64>,

    /// Actions taken, in order.
    pub actions: Vec<CleaningAction>,
}

impl CleaningReport {
    /// Create a new empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action to the report.
    pub fn add_action(&mut self, action: CleaningAction) {
        self.actions.push(action);
    }

    /// Record a dropped column together with its action.
    pub fn record_drop(&mut self, column: &str, reason: impl Into<String>) {
        self.dropped_columns.push(column.to_string());
        self.add_action(CleaningAction::new(
            ActionType::ColumnRemoved,
            column,
            reason,
        ));
    }

    /// Total number of values clipped to a fence.
    pub fn total_capped(&self) -> usize {
        self.outlier_caps.iter().map(|c| c.capped).sum()
    }
}

/// Tukey fence applied to one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierCap {
    pub column: String,
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
    /// Values clipped to either bound.
    pub capped: usize,
}

/// A single action taken during cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningAction {
    /// Type of action performed.
    pub action_type: ActionType,
    /// Target of the action (column name or "dataset").
    pub target: String,
    /// Human-readable description of the action.
    pub description: String,
    /// Additional details (e.g., fill value, fence).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CleaningAction {
    pub fn new(
        action_type: ActionType,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            target: target.into(),
            description: description.into(),
            details: None,
        }
    }

    /// Add details to the action.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Types of actions taken while cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Duplicate rows were removed.
    DuplicatesRemoved,
    /// A column was removed from the dataset.
    ColumnRemoved,
    /// Missing values were imputed.
    ValueImputed,
    /// Values were clipped to the IQR fence.
    OutliersCapped,
    /// The price/price-per-area correlation was evaluated.
    CorrelationChecked,
}

impl ActionType {
    /// Get a human-readable display name for the action type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::DuplicatesRemoved => "Duplicates Removed",
            Self::ColumnRemoved => "Column Removed",
            Self::ValueImputed => "Value Imputed",
            Self::OutliersCapped => "Outliers Capped",
            Self::CorrelationChecked => "Correlation Checked",
        }
    }
}
