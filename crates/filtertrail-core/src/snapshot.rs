// ABOUTME: Defines Snapshot and FilterPredicate, one poll's worth of data read from the monitored source.
// ABOUTME: Snapshots are ephemeral; they are fed to the reconciler and the diff engine and dropped.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The set of values a column is currently filtered to include.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub values: Vec<String>,
    pub column_index: usize,
    pub detected_at: DateTime<Utc>,
}

impl FilterPredicate {
    pub fn new(values: Vec<String>, column_index: usize) -> Self {
        Self {
            values,
            column_index,
            detected_at: Utc::now(),
        }
    }

    /// Predicates compare by their values only; detection time and index are metadata.
    pub fn same_values(&self, other: &FilterPredicate) -> bool {
        self.values == other.values
    }
}

/// Active predicates keyed by column display name.
pub type FilterMap = BTreeMap<String, FilterPredicate>;

/// A point-in-time read of the monitored source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// 1-based column index to header text.
    pub headers: BTreeMap<usize, String>,
    pub filters: FilterMap,
    /// One entry per measurement method that produced a value.
    pub row_count_estimates: Vec<u64>,
    /// Total non-empty rows in the primary key column, when the source can tell.
    pub total_rows: Option<u64>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, column: &str, column_index: usize, values: &[&str]) -> Self {
        self.filters.insert(
            column.to_string(),
            FilterPredicate::new(values.iter().map(|v| v.to_string()).collect(), column_index),
        );
        self
    }

    pub fn with_estimates(mut self, estimates: &[u64]) -> Self {
        self.row_count_estimates = estimates.to_vec();
        self
    }

    pub fn with_total(mut self, total_rows: u64) -> Self {
        self.total_rows = Some(total_rows);
        self
    }

    pub fn with_headers(mut self, names: &[&str]) -> Self {
        self.headers = names
            .iter()
            .enumerate()
            .map(|(i, name)| (i + 1, name.to_string()))
            .collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_compare_by_values() {
        let a = FilterPredicate::new(vec!["East".to_string()], 2);
        let mut b = FilterPredicate::new(vec!["East".to_string()], 7);
        assert!(a.same_values(&b));
        b.values.push("West".to_string());
        assert!(!a.same_values(&b));
    }

    #[test]
    fn builder_fills_one_based_headers() {
        let snap = Snapshot::new()
            .with_headers(&["Id", "Region"])
            .with_filter("Region", 2, &["East"])
            .with_estimates(&[40, 41]);
        assert_eq!(snap.headers.get(&1).map(String::as_str), Some("Id"));
        assert_eq!(snap.headers.get(&2).map(String::as_str), Some("Region"));
        assert_eq!(snap.filters["Region"].values, vec!["East".to_string()]);
        assert_eq!(snap.row_count_estimates, vec![40, 41]);
        assert!(snap.total_rows.is_none());
    }
}
