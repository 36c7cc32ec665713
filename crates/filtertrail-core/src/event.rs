// ABOUTME: Defines the FilterEvent record and its parts, the unit of the durable filter trail.
// ABOUTME: Also holds the reserved step labels shared by the diff engine, relabeling, and the views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label of the synthetic origin node and of the session's first event.
pub const ALL_DATA: &str = "All Data";
/// Label used when a session starts with filters already applied but none can be named.
pub const INITIAL_STATE: &str = "Initial State";
/// Label for a step where the row count moved without any predicate change.
pub const ROW_COUNT_CHANGE: &str = "Row Count Change";
/// Label for a step where the row count moved and no filter remains.
pub const NO_FILTERS: &str = "No Filters";
/// Generic fallback label.
pub const FILTER_CHANGE: &str = "Filter Change";

/// Labels a user may never rename.
pub const PROTECTED_LABELS: [&str; 2] = [ALL_DATA, INITIAL_STATE];

/// Labels that describe a kind of step rather than a column.
pub const GENERIC_LABELS: [&str; 4] = [ALL_DATA, NO_FILTERS, INITIAL_STATE, ROW_COUNT_CHANGE];

const REMOVE_PREFIX: &str = "Remove ";

/// Display label for a column whose filter was cleared.
pub fn removal_label(column: &str) -> String {
    format!("{}{}", REMOVE_PREFIX, column)
}

pub fn is_protected_label(label: &str) -> bool {
    PROTECTED_LABELS.contains(&label)
}

/// What kind of observation produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterAction {
    InitialConnection,
    InitialState,
    FilterChange,
}

/// One column's predicate as recorded in `added_filters` or `removed_filters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterEntry {
    pub column: String,
    pub values: Vec<String>,
    pub column_index: usize,
}

/// A single durable entry in the filter trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterEvent {
    pub timestamp: DateTime<Utc>,
    pub action: FilterAction,
    pub added_filters: Vec<FilterEntry>,
    pub removed_filters: Vec<FilterEntry>,
    pub previous_row_count: u64,
    pub current_row_count: u64,
    pub total_rows: u64,
    pub filter_column: String,
    pub filter_columns: Vec<String>,
    #[serde(default)]
    pub active_filters: Vec<String>,
}

impl FilterEvent {
    /// The event recorded when monitoring attaches to a source with no prior history.
    pub fn initial_connection(total_rows: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            action: FilterAction::InitialConnection,
            added_filters: Vec::new(),
            removed_filters: Vec::new(),
            previous_row_count: total_rows,
            current_row_count: total_rows,
            total_rows,
            filter_column: ALL_DATA.to_string(),
            filter_columns: Vec::new(),
            active_filters: Vec::new(),
        }
    }

    /// Share of the total row count still visible after this event, in [0, 1].
    /// Returns 0 when the total is unknown.
    pub fn visible_ratio(&self) -> f64 {
        if self.total_rows == 0 {
            return 0.0;
        }
        self.current_row_count as f64 / self.total_rows as f64
    }

    pub fn percent_of_total(&self) -> f64 {
        self.visible_ratio() * 100.0
    }
}
