// ABOUTME: TrailState, the single owned state behind the trail actor.
// ABOUTME: Holds the event log, header cache, diff baseline and reconciler memory, and turns snapshots into events.

use chrono::{DateTime, Utc};

use crate::diff::{CountChange, DiffThresholds, detect_change};
use crate::event::{FilterAction, FilterEntry, FilterEvent, INITIAL_STATE};
use crate::headers::{DEFAULT_MAX_COLUMNS, HeaderCache};
use crate::reconcile::RowCountReconciler;
use crate::relabel::{self, RelabelError, StepRename};
use crate::snapshot::{FilterMap, FilterPredicate, Snapshot};

/// Default number of most recent events shown by the views.
pub const DEFAULT_HISTORY_CAP: usize = 100;

/// Apply one event to a replayed predicate map: removals first, then
/// additions, so a column present in both ends up with its added values.
pub fn apply_filter_event(active: &mut FilterMap, event: &FilterEvent) {
    for entry in &event.removed_filters {
        active.remove(&entry.column);
    }
    for entry in &event.added_filters {
        let mut predicate = FilterPredicate::new(entry.values.clone(), entry.column_index);
        predicate.detected_at = event.timestamp;
        active.insert(entry.column.clone(), predicate);
    }
}

/// Rebuild the active predicate map at the end of `events` by replaying
/// added and removed filters in order.
pub fn replay_active_filters(events: &[FilterEvent]) -> FilterMap {
    let mut active = FilterMap::new();
    for event in events {
        apply_filter_event(&mut active, event);
    }
    active
}

/// Everything the trail actor owns.
#[derive(Debug, Clone)]
pub struct TrailState {
    pub events: Vec<FilterEvent>,
    pub headers: HeaderCache,
    /// Predicates seen at the last change, keyed by display name.
    pub last_filters: FilterMap,
    /// Row count the next tick is compared against.
    pub baseline_row_count: u64,
    reconciler: RowCountReconciler,
    /// Total observed when the current session started, used while the log is empty.
    session_total: u64,
    pub thresholds: DiffThresholds,
    pub history_cap: usize,
    pub max_columns: usize,
}

impl Default for TrailState {
    fn default() -> Self {
        Self::new()
    }
}

impl TrailState {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            headers: HeaderCache::new(),
            last_filters: FilterMap::new(),
            baseline_row_count: 0,
            reconciler: RowCountReconciler::default(),
            session_total: 0,
            thresholds: DiffThresholds::default(),
            history_cap: DEFAULT_HISTORY_CAP,
            max_columns: DEFAULT_MAX_COLUMNS,
        }
    }

    /// State resumed from a previously persisted log.
    pub fn with_events(events: Vec<FilterEvent>) -> Self {
        let mut state = Self::new();
        state.events = events;
        state.resume_from_log();
        state
    }

    pub fn with_thresholds(mut self, thresholds: DiffThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_history_cap(mut self, history_cap: usize) -> Self {
        self.history_cap = history_cap.max(1);
        self
    }

    pub fn with_max_columns(mut self, max_columns: usize) -> Self {
        self.max_columns = max_columns;
        self
    }

    fn resume_from_log(&mut self) {
        let last_count = self.events.last().map_or(0, |e| e.current_row_count);
        self.baseline_row_count = last_count;
        self.reconciler = RowCountReconciler::new(last_count);
        self.last_filters = replay_active_filters(&self.events);
    }

    /// The log's total row count: the first positive `total_rows` recorded.
    pub fn total_rows(&self) -> u64 {
        self.events
            .iter()
            .map(|e| e.total_rows)
            .find(|total| *total > 0)
            .unwrap_or(self.session_total)
    }

    /// A log is established when it knows its total and last saw visible rows.
    pub fn has_established_history(&self) -> bool {
        let known_total = self.events.iter().any(|e| e.total_rows > 0);
        let last_visible = self.events.last().is_some_and(|e| e.current_row_count > 0);
        known_total && last_visible
    }

    /// Index of the first event in the display window.
    pub fn window_offset(&self) -> usize {
        self.events.len().saturating_sub(self.history_cap)
    }

    /// The most recent events, at most `history_cap` of them.
    pub fn display_window(&self) -> &[FilterEvent] {
        &self.events[self.window_offset()..]
    }

    /// Re-key source predicates by their current display names.
    pub fn label_filters(&self, filters: &FilterMap) -> FilterMap {
        filters
            .iter()
            .map(|(source_name, predicate)| {
                (
                    self.headers.label(predicate.column_index, source_name),
                    predicate.clone(),
                )
            })
            .collect()
    }

    pub fn refresh_headers(&mut self, headers: &std::collections::BTreeMap<usize, String>) {
        if !headers.is_empty() {
            self.headers.replace(headers, self.max_columns);
        }
    }

    /// Start a monitoring session against the first snapshot of the source.
    /// Returns the events appended (zero, one or two).
    pub fn begin_session(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<FilterEvent> {
        self.refresh_headers(&snapshot.headers);
        let mut appended = Vec::new();

        if self.has_established_history() {
            self.resume_from_log();
            // Diff against the live predicates so renamed log labels never read as changes.
            self.last_filters = self.label_filters(&snapshot.filters);
            tracing::info!(
                events = self.events.len(),
                total_rows = self.total_rows(),
                resume_count = self.baseline_row_count,
                "resuming filter trail"
            );
            return appended;
        }

        let visible = self.reconciler.observe(&snapshot.row_count_estimates);
        let total = match snapshot.total_rows.filter(|t| *t > 0) {
            Some(total) => total,
            None if self.total_rows() > 0 => self.total_rows(),
            None => visible,
        };
        self.session_total = total;

        appended.push(self.push(FilterEvent::initial_connection(total, now)));

        let current = self.label_filters(&snapshot.filters);
        let visible = if snapshot.row_count_estimates.is_empty() {
            total
        } else {
            visible
        };
        if !current.is_empty() && visible < total {
            appended.push(self.push(initial_state_event(&current, visible, total, now)));
        }

        self.last_filters = current;
        self.baseline_row_count = visible;
        self.reconciler = RowCountReconciler::new(visible);
        tracing::info!(
            total_rows = total,
            visible_rows = visible,
            active_filters = self.last_filters.len(),
            "started filter trail session"
        );
        appended
    }

    /// Feed one tick's snapshot through the reconciler and diff engine.
    /// Returns the events appended. An empty log starts a new session first.
    pub fn observe(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<FilterEvent> {
        if self.events.is_empty() {
            return self.begin_session(snapshot, now);
        }

        let current_count = self.reconciler.observe(&snapshot.row_count_estimates);
        let current = self.label_filters(&snapshot.filters);
        let counts = CountChange {
            previous: self.baseline_row_count,
            current: current_count,
            total: self.total_rows(),
        };

        let outcome = detect_change(&self.last_filters, &current, counts, &self.thresholds, now);
        if outcome.advances_baseline() {
            self.last_filters = current;
            self.baseline_row_count = current_count;
        }

        match outcome.into_event() {
            Some(event) => {
                let event = self.push(event);
                tracing::info!(
                    filter_column = %event.filter_column,
                    previous = event.previous_row_count,
                    current = event.current_row_count,
                    total = event.total_rows,
                    "filter change detected"
                );
                vec![event]
            }
            None => Vec::new(),
        }
    }

    /// Append an event, clamping its timestamp to keep the log ordered and
    /// stamping the established total. Returns a copy of what was stored.
    pub fn push(&mut self, mut event: FilterEvent) -> FilterEvent {
        if let Some(last) = self.events.last()
            && event.timestamp < last.timestamp
        {
            event.timestamp = last.timestamp;
        }
        let total = self.total_rows();
        if total > 0 {
            event.total_rows = total;
        }
        self.events.push(event.clone());
        event
    }

    /// Empty the log. The diff baseline is kept so a running session does
    /// not report the current predicates again.
    pub fn reset(&mut self) {
        self.events.clear();
        self.session_total = 0;
    }

    pub fn rename_step(&mut self, event_index: usize, new_name: &str) -> Result<StepRename, RelabelError> {
        relabel::rename_step(
            &mut self.events,
            &mut self.headers,
            &mut self.last_filters,
            event_index,
            new_name,
        )
    }

    pub fn rename_column(&mut self, original_name: &str, new_name: &str) -> Result<usize, RelabelError> {
        relabel::rename_column(
            &mut self.events,
            &mut self.headers,
            &mut self.last_filters,
            original_name,
            new_name,
        )
    }

    pub fn rename_candidates(&self) -> Vec<String> {
        relabel::rename_candidates(&self.events, &self.headers)
    }
}

fn initial_state_event(current: &FilterMap, visible: u64, total: u64, now: DateTime<Utc>) -> FilterEvent {
    let mut added: Vec<FilterEntry> = current
        .iter()
        .map(|(column, predicate)| FilterEntry {
            column: column.clone(),
            values: predicate.values.clone(),
            column_index: predicate.column_index,
        })
        .collect();
    added.sort_by(|a, b| {
        a.column_index
            .cmp(&b.column_index)
            .then_with(|| a.column.cmp(&b.column))
    });
    let filter_columns: Vec<String> = added.iter().map(|e| e.column.clone()).collect();

    FilterEvent {
        timestamp: now,
        action: FilterAction::InitialState,
        filter_column: filter_columns
            .first()
            .cloned()
            .unwrap_or_else(|| INITIAL_STATE.to_string()),
        filter_columns,
        added_filters: added,
        removed_filters: Vec::new(),
        previous_row_count: total,
        current_row_count: visible,
        total_rows: total,
        active_filters: current.keys().cloned().collect(),
    }
}
