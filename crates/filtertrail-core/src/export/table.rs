// ABOUTME: Table projection of the event log, one row per event with active filter values per column.
// ABOUTME: Active values are rebuilt by replaying added and removed filters from the start of the log.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::event::FilterEvent;
use crate::snapshot::FilterMap;
use crate::state::apply_filter_event;

pub const STEP_COLUMN: &str = "Step";
pub const TIMESTAMP_COLUMN: &str = "Timestamp";
pub const ROW_COUNT_COLUMN: &str = "Rows";
pub const PERCENT_COLUMN: &str = "% of Total";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableColumn {
    pub name: String,
    /// Only the step column accepts edits, which become step renames.
    pub editable: bool,
    /// Filter columns, as opposed to the four fixed ones.
    pub dynamic: bool,
}

impl TableColumn {
    fn fixed(name: &str, editable: bool) -> Self {
        Self {
            name: name.to_string(),
            editable,
            dynamic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub event_index: usize,
    pub step: String,
    pub timestamp: String,
    pub row_count: u64,
    pub percent_of_total: String,
    /// Comma-joined active values per dynamic column; empty when unfiltered.
    pub filters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterTable {
    pub columns: Vec<TableColumn>,
    pub rows: Vec<TableRow>,
}

impl FilterTable {
    pub fn dynamic_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.dynamic)
            .map(|c| c.name.as_str())
    }
}

/// Every column named by an added or removed filter anywhere in the log, sorted.
pub fn touched_columns(events: &[FilterEvent]) -> BTreeSet<String> {
    events
        .iter()
        .flat_map(|e| e.added_filters.iter().chain(e.removed_filters.iter()))
        .map(|entry| entry.column.clone())
        .collect()
}

/// Project the log into a table. Rows are emitted for events at
/// `display_from` and later; replay always starts at the first event.
pub fn build_filter_table(events: &[FilterEvent], display_from: usize) -> FilterTable {
    let dynamic = touched_columns(events);

    let mut columns = vec![
        TableColumn::fixed(STEP_COLUMN, true),
        TableColumn::fixed(TIMESTAMP_COLUMN, false),
        TableColumn::fixed(ROW_COUNT_COLUMN, false),
        TableColumn::fixed(PERCENT_COLUMN, false),
    ];
    columns.extend(dynamic.iter().map(|name| TableColumn {
        name: name.clone(),
        editable: false,
        dynamic: true,
    }));

    let mut active = FilterMap::new();
    let mut rows = Vec::with_capacity(events.len().saturating_sub(display_from));

    for (i, event) in events.iter().enumerate() {
        apply_filter_event(&mut active, event);

        if i < display_from {
            continue;
        }

        let filters = dynamic
            .iter()
            .map(|column| {
                let cell = active
                    .get(column.as_str())
                    .map(|predicate| predicate.values.join(", "))
                    .unwrap_or_default();
                (column.clone(), cell)
            })
            .collect();

        let step = if event.filter_column.is_empty() {
            format!("Step {}", i + 1)
        } else {
            event.filter_column.clone()
        };

        rows.push(TableRow {
            event_index: i,
            step,
            timestamp: event.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            row_count: event.current_row_count,
            percent_of_total: format!("{:.1}%", event.percent_of_total()),
            filters,
        });
    }

    FilterTable { columns, rows }
}
