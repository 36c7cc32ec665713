// ABOUTME: Relabel propagation for user renames of step labels and whole columns.
// ABOUTME: Rewrites names across the event log, the header cache, and the tracked filter map.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::event::{FilterEvent, GENERIC_LABELS, is_protected_label, removal_label};
use crate::headers::HeaderCache;
use crate::snapshot::FilterMap;

/// Reasons a rename request is rejected. The log is untouched in every case.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelabelError {
    #[error("event not found: index {index} (log has {len} events)")]
    EventNotFound { index: usize, len: usize },

    #[error("label '{0}' is protected and cannot be renamed")]
    ProtectedLabel(String),

    #[error("new name must not be empty")]
    EmptyName,
}

/// Result of renaming one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRename {
    pub event_index: usize,
    pub original_name: String,
    pub new_name: String,
    pub header_updates: usize,
}

fn validated_name(new_name: &str) -> Result<String, RelabelError> {
    let trimmed = new_name.trim();
    if trimmed.is_empty() {
        return Err(RelabelError::EmptyName);
    }
    Ok(trimmed.to_string())
}

/// Substitute `original` with `new_name` in every name field of one event.
/// Returns the number of fields changed.
fn rename_in_event(event: &mut FilterEvent, original: &str, new_name: &str) -> usize {
    let mut changed = 0;
    if event.filter_column == original {
        event.filter_column = new_name.to_string();
        changed += 1;
    }
    for column in event.filter_columns.iter_mut() {
        if column == original {
            *column = new_name.to_string();
            changed += 1;
        }
    }
    for entry in event
        .added_filters
        .iter_mut()
        .chain(event.removed_filters.iter_mut())
    {
        if entry.column == original {
            entry.column = new_name.to_string();
            changed += 1;
        }
    }
    for column in event.active_filters.iter_mut() {
        if column == original {
            *column = new_name.to_string();
        }
    }
    changed
}

/// Move the tracked predicate for `original` under `new_name` so the next
/// tick does not see a remove plus an add.
fn rename_tracked(tracked: &mut FilterMap, original: &str, new_name: &str) {
    if original == new_name {
        return;
    }
    if let Some(predicate) = tracked.remove(original) {
        tracked.insert(new_name.to_string(), predicate);
    }
}

/// Rename the label of the step at `event_index`.
pub fn rename_step(
    events: &mut [FilterEvent],
    headers: &mut HeaderCache,
    tracked: &mut FilterMap,
    event_index: usize,
    new_name: &str,
) -> Result<StepRename, RelabelError> {
    let new_name = validated_name(new_name)?;
    let len = events.len();
    let event = events
        .get_mut(event_index)
        .ok_or(RelabelError::EventNotFound {
            index: event_index,
            len,
        })?;

    let original_name = event.filter_column.clone();
    if is_protected_label(&original_name) {
        return Err(RelabelError::ProtectedLabel(original_name));
    }

    rename_in_event(event, &original_name, &new_name);
    let header_updates = headers.rename(&original_name, &new_name);
    rename_tracked(tracked, &original_name, &new_name);

    Ok(StepRename {
        event_index,
        original_name,
        new_name,
        header_updates,
    })
}

/// Rename `original_name` across every event and the header cache, including
/// the derived "Remove <name>" labels. Returns the number of occurrences
/// changed, header entries included.
pub fn rename_column(
    events: &mut [FilterEvent],
    headers: &mut HeaderCache,
    tracked: &mut FilterMap,
    original_name: &str,
    new_name: &str,
) -> Result<usize, RelabelError> {
    let new_name = validated_name(new_name)?;
    if is_protected_label(original_name) {
        return Err(RelabelError::ProtectedLabel(original_name.to_string()));
    }

    let original_removal = removal_label(original_name);
    let new_removal = removal_label(&new_name);
    let mut occurrences = headers.rename(original_name, &new_name);
    for event in events.iter_mut() {
        occurrences += rename_in_event(event, original_name, &new_name);
        occurrences += rename_in_event(event, &original_removal, &new_removal);
    }
    rename_tracked(tracked, original_name, &new_name);
    Ok(occurrences)
}

/// Names a user may pick as the source of a whole-column rename.
pub fn rename_candidates(events: &[FilterEvent], headers: &HeaderCache) -> Vec<String> {
    let mut names: BTreeSet<String> = headers.iter().map(|(_, name)| name.to_string()).collect();
    for event in events {
        names.insert(event.filter_column.clone());
        names.extend(event.filter_columns.iter().cloned());
    }
    names
        .into_iter()
        .filter(|name| !GENERIC_LABELS.contains(&name.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{FilterAction, FilterEntry};
    use crate::snapshot::FilterPredicate;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn region_event(filter_column: &str) -> FilterEvent {
        FilterEvent {
            timestamp: Utc::now(),
            action: FilterAction::FilterChange,
            added_filters: vec![FilterEntry {
                column: "Region".to_string(),
                values: vec!["East".to_string()],
                column_index: 2,
            }],
            removed_filters: Vec::new(),
            previous_row_count: 100,
            current_row_count: 40,
            total_rows: 100,
            filter_column: filter_column.to_string(),
            filter_columns: vec!["Region".to_string()],
            active_filters: vec!["Region".to_string()],
        }
    }

    fn fixture() -> (Vec<FilterEvent>, HeaderCache, FilterMap) {
        let events = vec![
            FilterEvent::initial_connection(100, Utc::now()),
            region_event("Region"),
            region_event("Region"),
        ];
        let raw: BTreeMap<usize, String> =
            [(1, "Id".to_string()), (2, "Region".to_string())].into_iter().collect();
        let headers = HeaderCache::from_headers(&raw, 200);
        let mut tracked = FilterMap::new();
        tracked.insert(
            "Region".to_string(),
            FilterPredicate::new(vec!["East".to_string()], 2),
        );
        (events, headers, tracked)
    }

    #[test]
    fn step_rename_touches_one_event_and_the_header() {
        let (mut events, mut headers, mut tracked) = fixture();
        let result = rename_step(&mut events, &mut headers, &mut tracked, 1, "Area").unwrap();
        assert_eq!(result.original_name, "Region");
        assert_eq!(result.header_updates, 1);

        assert_eq!(events[1].filter_column, "Area");
        assert_eq!(events[1].filter_columns, vec!["Area".to_string()]);
        assert_eq!(events[1].added_filters[0].column, "Area");
        assert_eq!(events[2].filter_column, "Region");
        assert_eq!(headers.get(2), Some("Area"));
        assert!(tracked.contains_key("Area"));
        assert!(!tracked.contains_key("Region"));
    }

    #[test]
    fn step_rename_is_idempotent() {
        let (mut events, mut headers, mut tracked) = fixture();
        rename_step(&mut events, &mut headers, &mut tracked, 1, "Area").unwrap();
        let snapshot = (events.clone(), headers.clone());
        rename_step(&mut events, &mut headers, &mut tracked, 1, "Area").unwrap();
        assert_eq!((events, headers), snapshot);
    }

    #[test]
    fn step_rename_rejects_protected_and_bad_input() {
        let (mut events, mut headers, mut tracked) = fixture();
        let before = events.clone();
        assert_eq!(
            rename_step(&mut events, &mut headers, &mut tracked, 0, "Start"),
            Err(RelabelError::ProtectedLabel("All Data".to_string()))
        );
        assert_eq!(
            rename_step(&mut events, &mut headers, &mut tracked, 1, "   "),
            Err(RelabelError::EmptyName)
        );
        assert_eq!(
            rename_step(&mut events, &mut headers, &mut tracked, 9, "Area"),
            Err(RelabelError::EventNotFound { index: 9, len: 3 })
        );
        assert_eq!(events, before);
    }

    #[test]
    fn column_rename_counts_every_occurrence() {
        let (mut events, mut headers, mut tracked) = fixture();
        let count = rename_column(&mut events, &mut headers, &mut tracked, "Region", "Area").unwrap();
        // header + 2 events x (filter_column, filter_columns, added entry)
        assert_eq!(count, 7);
        assert!(events.iter().skip(1).all(|e| e.filter_column == "Area"));
        assert_eq!(events[2].active_filters, vec!["Area".to_string()]);
        assert_eq!(events[0].filter_column, "All Data");
    }

    #[test]
    fn column_rename_carries_removal_labels() {
        let (mut events, mut headers, mut tracked) = fixture();
        let mut removal = region_event("Remove Region");
        removal.removed_filters = std::mem::take(&mut removal.added_filters);
        removal.filter_columns = vec!["Remove Region".to_string()];
        removal.active_filters.clear();
        events.push(removal);

        let count = rename_column(&mut events, &mut headers, &mut tracked, "Region", "Area").unwrap();
        // 7 as above + removal filter_column, filter_columns and removed entry
        assert_eq!(count, 10);
        assert_eq!(events[3].filter_column, "Remove Area");
        assert_eq!(events[3].filter_columns, vec!["Remove Area".to_string()]);
        assert_eq!(events[3].removed_filters[0].column, "Area");
    }

    #[test]
    fn column_rename_of_protected_label_is_rejected() {
        let (mut events, mut headers, mut tracked) = fixture();
        assert!(matches!(
            rename_column(&mut events, &mut headers, &mut tracked, "Initial State", "X"),
            Err(RelabelError::ProtectedLabel(_))
        ));
    }

    #[test]
    fn candidates_skip_generic_labels() {
        let (mut events, headers, _) = fixture();
        let mut count_only = region_event("Row Count Change");
        count_only.filter_columns = vec!["Row Count Change".to_string()];
        events.push(count_only);
        let mut removal = region_event("Remove Region");
        removal.filter_columns = vec!["Remove Region".to_string()];
        events.push(removal);
        assert_eq!(
            rename_candidates(&events, &headers),
            vec!["Id".to_string(), "Region".to_string(), "Remove Region".to_string()]
        );
    }
}
