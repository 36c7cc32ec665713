// ABOUTME: Normalizes stored event logs, including older shapes, into canonical FilterEvents.
// ABOUTME: Accepts list, nested or scalar filter values, naive timestamps, and missing derived fields.

use chrono::{DateTime, NaiveDateTime, Utc};
use filtertrail_core::event::{FilterAction, FilterEntry, FilterEvent, removal_label};
use serde::Deserialize;
use serde_json::Value;

const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    column: Option<String>,
    #[serde(default)]
    values: Value,
    #[serde(default)]
    column_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    added_filters: Option<Vec<RawEntry>>,
    #[serde(default)]
    removed_filters: Option<Vec<RawEntry>>,
    #[serde(default)]
    previous_row_count: Option<i64>,
    #[serde(default)]
    current_row_count: Option<i64>,
    #[serde(default)]
    total_rows: Option<i64>,
    #[serde(default)]
    filter_column: Option<String>,
    #[serde(default)]
    filter_columns: Option<Vec<String>>,
    #[serde(default)]
    active_filters: Option<Vec<String>>,
}

/// Canonical events plus how many of them needed repair.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeReport {
    pub events: Vec<FilterEvent>,
    pub repaired: usize,
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Filter values as a list, as `{values, column_index}`, or as a single scalar.
fn normalize_values(value: &Value) -> (Vec<String>, Option<usize>, bool) {
    match value {
        Value::Array(items) => (items.iter().filter_map(scalar_text).collect(), None, false),
        Value::Object(map) => {
            let values = map
                .get("values")
                .map(|inner| normalize_values(inner).0)
                .unwrap_or_default();
            let column_index = map
                .get("column_index")
                .and_then(Value::as_u64)
                .map(|i| i as usize);
            (values, column_index, true)
        }
        Value::Null => (Vec::new(), None, true),
        other => (scalar_text(other).into_iter().collect(), None, true),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, NAIVE_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_action(raw: Option<&str>) -> (FilterAction, bool) {
    match raw {
        Some("initial_connection") => (FilterAction::InitialConnection, false),
        Some("initial_state") => (FilterAction::InitialState, false),
        Some("filter_change") => (FilterAction::FilterChange, false),
        _ => (FilterAction::FilterChange, true),
    }
}

fn count(raw: Option<i64>) -> (u64, bool) {
    match raw {
        Some(n) if n >= 0 => (n as u64, false),
        _ => (0, true),
    }
}

fn entries(raw: Option<Vec<RawEntry>>, repaired: &mut bool) -> Vec<FilterEntry> {
    raw.unwrap_or_default()
        .into_iter()
        .map(|entry| {
            let (values, nested_index, reshaped) = normalize_values(&entry.values);
            *repaired |= reshaped || entry.column.is_none();
            FilterEntry {
                column: entry.column.unwrap_or_else(|| "Unknown".to_string()),
                values,
                column_index: entry.column_index.or(nested_index).unwrap_or(0),
            }
        })
        .collect()
}

/// Parse a stored log. Fails only when the document is not a JSON array of objects.
pub fn normalize_events(json: &str) -> Result<NormalizeReport, serde_json::Error> {
    let raw: Vec<RawEvent> = serde_json::from_str(json)?;

    let established_total = raw
        .iter()
        .filter_map(|e| e.total_rows)
        .find(|total| *total > 0)
        .map_or(0, |total| total as u64);

    let mut events: Vec<FilterEvent> = Vec::with_capacity(raw.len());
    let mut repaired = 0;

    for (i, raw_event) in raw.into_iter().enumerate() {
        let mut fixed = false;

        let timestamp = match raw_event.timestamp.as_deref().and_then(parse_timestamp) {
            Some(ts) => ts,
            None => {
                fixed = true;
                events
                    .last()
                    .map_or_else(DateTime::<Utc>::default, |prev| prev.timestamp)
            }
        };

        let (action, action_fixed) = parse_action(raw_event.action.as_deref());
        let added_filters = entries(raw_event.added_filters, &mut fixed);
        let removed_filters = entries(raw_event.removed_filters, &mut fixed);
        let (previous_row_count, prev_fixed) = count(raw_event.previous_row_count);
        let (current_row_count, curr_fixed) = count(raw_event.current_row_count);
        let total_rows = match raw_event.total_rows {
            Some(total) if total > 0 => total as u64,
            _ => {
                fixed = true;
                established_total
            }
        };
        fixed |= action_fixed || prev_fixed || curr_fixed;

        let filter_column = match raw_event.filter_column.filter(|c| !c.is_empty()) {
            Some(column) => column,
            None => {
                fixed = true;
                if let Some(first) = added_filters.first() {
                    first.column.clone()
                } else if let Some(first) = removed_filters.first() {
                    removal_label(&first.column)
                } else {
                    format!("Step {}", i + 1)
                }
            }
        };

        let filter_columns = match raw_event.filter_columns {
            Some(columns) => columns,
            None => {
                fixed = true;
                let mut columns: Vec<String> = Vec::new();
                let touched = added_filters
                    .iter()
                    .map(|e| e.column.clone())
                    .chain(removed_filters.iter().map(|e| removal_label(&e.column)));
                for name in touched {
                    if !columns.contains(&name) {
                        columns.push(name);
                    }
                }
                columns
            }
        };

        if fixed {
            repaired += 1;
        }

        events.push(FilterEvent {
            timestamp,
            action,
            added_filters,
            removed_filters,
            previous_row_count,
            current_row_count,
            total_rows,
            filter_column,
            filter_columns,
            active_filters: raw_event.active_filters.unwrap_or_default(),
        });
    }

    Ok(NormalizeReport { events, repaired })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn canonical_log_round_trips_unrepaired() {
        let events = vec![FilterEvent::initial_connection(
            100,
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        )];
        let json = serde_json::to_string_pretty(&events).unwrap();
        let report = normalize_events(&json).unwrap();
        assert_eq!(report.events, events);
        assert_eq!(report.repaired, 0);
    }

    #[test]
    fn legacy_shapes_are_normalized() {
        let json = r#"[
            {
                "timestamp": "2024-03-01 09:00:00",
                "action": "initial_connection",
                "added_filters": [],
                "removed_filters": [],
                "previous_row_count": 100,
                "current_row_count": 100,
                "total_rows": 100,
                "filter_column": "All Data",
                "filter_columns": []
            },
            {
                "timestamp": "2024-03-01 09:01:00",
                "action": "filter_change",
                "added_filters": [
                    {"column": "Region", "values": {"values": ["East", "West"], "column_index": 2}},
                    {"column": "Year", "values": 2024}
                ],
                "removed_filters": [],
                "previous_row_count": 100,
                "current_row_count": 30
            },
            {
                "timestamp": "2024-03-01 09:02:00",
                "removed_filters": [{"column": "Year", "values": ["2024"], "column_index": 4}],
                "previous_row_count": 30,
                "current_row_count": 60
            }
        ]"#;
        let report = normalize_events(json).unwrap();
        assert_eq!(report.events.len(), 3);
        assert_eq!(report.repaired, 2);

        let first = &report.events[0];
        assert_eq!(first.timestamp, Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());

        let added = &report.events[1];
        assert_eq!(added.added_filters[0].values, vec!["East", "West"]);
        assert_eq!(added.added_filters[0].column_index, 2);
        assert_eq!(added.added_filters[1].values, vec!["2024"]);
        assert_eq!(added.filter_column, "Region");
        assert_eq!(added.filter_columns, vec!["Region", "Year"]);
        assert_eq!(added.total_rows, 100);
        assert!(added.active_filters.is_empty());

        let removed = &report.events[2];
        assert_eq!(removed.filter_column, "Remove Year");
        assert_eq!(removed.action, FilterAction::FilterChange);
    }

    #[test]
    fn missing_labels_fall_back_to_step_number() {
        let json = r#"[{"timestamp": "2024-03-01T09:00:00Z", "current_row_count": 5}]"#;
        let report = normalize_events(json).unwrap();
        assert_eq!(report.events[0].filter_column, "Step 1");
    }

    #[test]
    fn unparseable_timestamps_inherit_the_previous_one() {
        let json = r#"[
            {"timestamp": "2024-03-01T09:00:00Z", "filter_column": "All Data"},
            {"timestamp": "yesterday", "filter_column": "Region"}
        ]"#;
        let report = normalize_events(json).unwrap();
        assert_eq!(report.events[1].timestamp, report.events[0].timestamp);
    }

    #[test]
    fn non_array_documents_are_rejected() {
        assert!(normalize_events(r#"{"events": []}"#).is_err());
        assert!(normalize_events("not json").is_err());
    }
}
