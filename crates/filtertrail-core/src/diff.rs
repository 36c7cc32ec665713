// ABOUTME: Filter diff engine comparing consecutive predicate maps and row counts.
// ABOUTME: Classifies columns as added or removed, applies the significance gate, and picks display labels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{
    FILTER_CHANGE, FilterAction, FilterEntry, FilterEvent, NO_FILTERS, ROW_COUNT_CHANGE,
    removal_label,
};
use crate::snapshot::{FilterMap, FilterPredicate};

/// Tunable noise thresholds for change detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiffThresholds {
    /// A row count move of at most this many rows is jitter.
    pub jitter_rows: u64,
    /// Count-only changes must exceed this fraction of the total to be recorded.
    pub significance_ratio: f64,
}

impl DiffThresholds {
    pub const DEFAULT_JITTER_ROWS: u64 = 2;
    pub const DEFAULT_SIGNIFICANCE_RATIO: f64 = 0.001;
}

impl Default for DiffThresholds {
    fn default() -> Self {
        Self {
            jitter_rows: Self::DEFAULT_JITTER_ROWS,
            significance_ratio: Self::DEFAULT_SIGNIFICANCE_RATIO,
        }
    }
}

/// Row counts either side of a candidate change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountChange {
    pub previous: u64,
    pub current: u64,
    pub total: u64,
}

impl CountChange {
    pub fn delta(&self) -> u64 {
        self.previous.abs_diff(self.current)
    }
}

/// Build a filter entry list sorted by column index, then name.
fn entries<'a>(
    items: impl Iterator<Item = (&'a String, &'a FilterPredicate)>,
) -> Vec<FilterEntry> {
    let mut out: Vec<FilterEntry> = items
        .map(|(column, predicate)| FilterEntry {
            column: column.clone(),
            values: predicate.values.clone(),
            column_index: predicate.column_index,
        })
        .collect();
    out.sort_by(|a, b| {
        a.column_index
            .cmp(&b.column_index)
            .then_with(|| a.column.cmp(&b.column))
    });
    out
}

/// Columns new or modified in `current`, and columns present only in `previous`.
/// A column never appears in both lists.
pub fn diff_filters(previous: &FilterMap, current: &FilterMap) -> (Vec<FilterEntry>, Vec<FilterEntry>) {
    let added = entries(current.iter().filter(|(column, predicate)| {
        previous
            .get(*column)
            .is_none_or(|before| !before.same_values(predicate))
    }));
    let removed = entries(
        previous
            .iter()
            .filter(|(column, _)| !current.contains_key(*column)),
    );
    (added, removed)
}

/// The predicate-level result of comparing two ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDiff {
    pub added: Vec<FilterEntry>,
    pub removed: Vec<FilterEntry>,
    pub row_count_changed: bool,
    /// Whether the current map has no predicates at all.
    pub current_empty: bool,
}

impl FilterDiff {
    pub fn filter_state_changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// The single column held responsible for this step.
    pub fn display_column(&self) -> String {
        if let Some(first) = self.added.first() {
            return first.column.clone();
        }
        if let Some(first) = self.removed.first() {
            return removal_label(&first.column);
        }
        if self.row_count_changed && !self.filter_state_changed() {
            return ROW_COUNT_CHANGE.to_string();
        }
        if self.current_empty && self.row_count_changed {
            return NO_FILTERS.to_string();
        }
        FILTER_CHANGE.to_string()
    }

    /// Every column touched by this step, without duplicates. When only the
    /// count moved, every still-active column is implicated.
    pub fn implicated_columns(&self, current: &FilterMap) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        let mut push = |name: String| {
            if !columns.contains(&name) {
                columns.push(name);
            }
        };

        if self.filter_state_changed() {
            for entry in &self.added {
                push(entry.column.clone());
            }
            for entry in &self.removed {
                push(removal_label(&entry.column));
            }
        } else if current.is_empty() {
            push(ROW_COUNT_CHANGE.to_string());
        } else {
            for entry in entries(current.iter()) {
                push(entry.column);
            }
        }
        columns
    }
}

/// What one tick amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffOutcome {
    /// No predicate change and the count stayed within jitter.
    Unchanged,
    /// A change was seen but failed the significance gate.
    Suppressed(FilterDiff),
    Event(Box<FilterEvent>),
}

impl DiffOutcome {
    /// Whether the diff baseline should move to the current tick.
    pub fn advances_baseline(&self) -> bool {
        !matches!(self, DiffOutcome::Unchanged)
    }

    pub fn into_event(self) -> Option<FilterEvent> {
        match self {
            DiffOutcome::Event(event) => Some(*event),
            _ => None,
        }
    }
}

/// Compare two ticks and decide whether they produce an event.
pub fn detect_change(
    previous: &FilterMap,
    current: &FilterMap,
    counts: CountChange,
    thresholds: &DiffThresholds,
    timestamp: DateTime<Utc>,
) -> DiffOutcome {
    let (added, removed) = diff_filters(previous, current);
    let diff = FilterDiff {
        added,
        removed,
        row_count_changed: counts.delta() > thresholds.jitter_rows,
        current_empty: current.is_empty(),
    };

    if !diff.filter_state_changed() && !diff.row_count_changed {
        return DiffOutcome::Unchanged;
    }

    let significant = diff.filter_state_changed()
        || counts.delta() as f64 > counts.total as f64 * thresholds.significance_ratio;
    if !significant {
        return DiffOutcome::Suppressed(diff);
    }

    let filter_column = diff.display_column();
    let filter_columns = diff.implicated_columns(current);
    let event = FilterEvent {
        timestamp,
        action: FilterAction::FilterChange,
        added_filters: diff.added,
        removed_filters: diff.removed,
        previous_row_count: counts.previous,
        current_row_count: counts.current,
        total_rows: counts.total,
        filter_column,
        filter_columns,
        active_filters: current.keys().cloned().collect(),
    };
    DiffOutcome::Event(Box::new(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;

    fn filters(snapshot: Snapshot) -> FilterMap {
        snapshot.filters
    }

    fn counts(previous: u64, current: u64, total: u64) -> CountChange {
        CountChange {
            previous,
            current,
            total,
        }
    }

    fn event(outcome: DiffOutcome) -> FilterEvent {
        outcome.into_event().expect("expected an event")
    }

    #[test]
    fn equal_maps_within_jitter_are_unchanged() {
        let map = filters(Snapshot::new().with_filter("Region", 2, &["East"]));
        for current in [98, 100, 102] {
            let outcome = detect_change(
                &map,
                &map,
                counts(100, current, 100),
                &DiffThresholds::default(),
                Utc::now(),
            );
            assert_eq!(outcome, DiffOutcome::Unchanged);
        }
    }

    #[test]
    fn added_filter_labels_by_column() {
        let prev = FilterMap::new();
        let curr = filters(Snapshot::new().with_filter("Region", 2, &["East"]));
        let e = event(detect_change(
            &prev,
            &curr,
            counts(100, 40, 100),
            &DiffThresholds::default(),
            Utc::now(),
        ));
        assert_eq!(e.filter_column, "Region");
        assert_eq!(e.filter_columns, vec!["Region".to_string()]);
        assert_eq!(e.added_filters.len(), 1);
        assert_eq!(e.added_filters[0].values, vec!["East".to_string()]);
        assert!(e.removed_filters.is_empty());
        assert_eq!(e.active_filters, vec!["Region".to_string()]);
        assert_eq!(e.action, FilterAction::FilterChange);
    }

    #[test]
    fn modified_filter_counts_as_added_not_removed() {
        let prev = filters(Snapshot::new().with_filter("Region", 2, &["East"]));
        let curr = filters(Snapshot::new().with_filter("Region", 2, &["East", "West"]));
        let (added, removed) = diff_filters(&prev, &curr);
        assert_eq!(added.len(), 1);
        assert!(removed.is_empty());
    }

    #[test]
    fn removed_filter_gets_remove_label() {
        let prev = filters(Snapshot::new().with_filter("Region", 2, &["East"]));
        let curr = FilterMap::new();
        let e = event(detect_change(
            &prev,
            &curr,
            counts(40, 100, 100),
            &DiffThresholds::default(),
            Utc::now(),
        ));
        assert_eq!(e.filter_column, "Remove Region");
        assert_eq!(e.filter_columns, vec!["Remove Region".to_string()]);
        assert!(e.active_filters.is_empty());
    }

    #[test]
    fn added_entries_order_by_column_index() {
        let prev = FilterMap::new();
        let curr = filters(
            Snapshot::new()
                .with_filter("Alpha", 9, &["a"])
                .with_filter("Zulu", 3, &["z"]),
        );
        let e = event(detect_change(
            &prev,
            &curr,
            counts(100, 10, 100),
            &DiffThresholds::default(),
            Utc::now(),
        ));
        assert_eq!(e.filter_column, "Zulu");
        assert_eq!(e.filter_columns, vec!["Zulu".to_string(), "Alpha".to_string()]);
    }

    #[test]
    fn count_only_change_implicates_active_columns() {
        let map = filters(
            Snapshot::new()
                .with_filter("Region", 2, &["East"])
                .with_filter("Year", 4, &["2024"]),
        );
        let e = event(detect_change(
            &map,
            &map,
            counts(40, 30, 100),
            &DiffThresholds::default(),
            Utc::now(),
        ));
        assert_eq!(e.filter_column, "Row Count Change");
        assert_eq!(e.filter_columns, vec!["Region".to_string(), "Year".to_string()]);
        assert!(e.added_filters.is_empty() && e.removed_filters.is_empty());
    }

    #[test]
    fn count_only_change_without_filters() {
        let empty = FilterMap::new();
        let e = event(detect_change(
            &empty,
            &empty,
            counts(100, 90, 100),
            &DiffThresholds::default(),
            Utc::now(),
        ));
        assert_eq!(e.filter_column, "Row Count Change");
        assert_eq!(e.filter_columns, vec!["Row Count Change".to_string()]);
    }

    #[test]
    fn small_count_changes_on_large_totals_are_suppressed() {
        let map = FilterMap::new();
        // 5 rows moved out of 1,000,000: past jitter but under 0.1%.
        let outcome = detect_change(
            &map,
            &map,
            counts(1_000_000, 999_995, 1_000_000),
            &DiffThresholds::default(),
            Utc::now(),
        );
        assert!(matches!(outcome, DiffOutcome::Suppressed(_)));
        assert!(outcome.advances_baseline());
        assert!(outcome.into_event().is_none());
    }

    #[test]
    fn predicate_changes_bypass_significance_gate() {
        let prev = FilterMap::new();
        let curr = filters(Snapshot::new().with_filter("Region", 2, &["East"]));
        let outcome = detect_change(
            &prev,
            &curr,
            counts(1_000_000, 1_000_000, 1_000_000),
            &DiffThresholds::default(),
            Utc::now(),
        );
        assert!(matches!(outcome, DiffOutcome::Event(_)));
    }

    #[test]
    fn thresholds_are_overridable() {
        let map = FilterMap::new();
        let loose = DiffThresholds {
            jitter_rows: 10,
            significance_ratio: 0.001,
        };
        let outcome = detect_change(&map, &map, counts(100, 95, 100), &loose, Utc::now());
        assert_eq!(outcome, DiffOutcome::Unchanged);
    }

    #[test]
    fn fallback_label_when_nothing_identifies_a_column() {
        let diff = FilterDiff {
            added: Vec::new(),
            removed: Vec::new(),
            row_count_changed: false,
            current_empty: true,
        };
        assert_eq!(diff.display_column(), "Filter Change");
    }

    #[test]
    fn added_never_also_removed() {
        let prev = filters(
            Snapshot::new()
                .with_filter("A", 1, &["x"])
                .with_filter("B", 2, &["y"]),
        );
        let curr = filters(
            Snapshot::new()
                .with_filter("B", 2, &["z"])
                .with_filter("C", 3, &["w"]),
        );
        let (added, removed) = diff_filters(&prev, &curr);
        for entry in &added {
            assert!(!removed.iter().any(|r| r.column == entry.column));
        }
        assert_eq!(added.iter().map(|e| e.column.as_str()).collect::<Vec<_>>(), ["B", "C"]);
        assert_eq!(removed.iter().map(|e| e.column.as_str()).collect::<Vec<_>>(), ["A"]);
    }
}
