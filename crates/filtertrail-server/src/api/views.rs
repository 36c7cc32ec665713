// ABOUTME: Read-only API handlers for the flow graph, table projection, event log, headers, and status.
// ABOUTME: Graph and table cover the display window; the events endpoint returns the whole log.

use axum::Json;
use axum::extract::State;
use filtertrail_core::export::{FilterTable, FlowGraph, build_filter_table, build_flow_graph};
use filtertrail_core::event::FilterEvent;
use serde::Serialize;

use crate::app_state::SharedState;

#[derive(Debug, Serialize)]
pub struct EventsView {
    pub events: Vec<FilterEvent>,
    pub total_rows: u64,
    /// Absolute index of the first event inside the display window.
    pub window_offset: usize,
}

#[derive(Debug, Serialize)]
pub struct HeaderEntry {
    pub index: usize,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct HeadersView {
    pub headers: Vec<HeaderEntry>,
    pub primary_key_column: usize,
    pub primary_key_name: String,
    pub rename_candidates: Vec<String>,
}

/// GET /api/graph
pub async fn get_graph(State(state): State<SharedState>) -> Json<FlowGraph> {
    let trail = state.trail.read_state().await;
    Json(build_flow_graph(
        trail.display_window(),
        trail.window_offset(),
        &trail.headers.primary_key_name(),
    ))
}

/// GET /api/table
pub async fn get_table(State(state): State<SharedState>) -> Json<FilterTable> {
    let trail = state.trail.read_state().await;
    Json(build_filter_table(&trail.events, trail.window_offset()))
}

/// GET /api/events
pub async fn get_events(State(state): State<SharedState>) -> Json<EventsView> {
    let trail = state.trail.read_state().await;
    Json(EventsView {
        events: trail.events.clone(),
        total_rows: trail.total_rows(),
        window_offset: trail.window_offset(),
    })
}

/// GET /api/headers
pub async fn get_headers(State(state): State<SharedState>) -> Json<HeadersView> {
    let trail = state.trail.read_state().await;
    Json(HeadersView {
        headers: trail
            .headers
            .iter()
            .map(|(index, name)| HeaderEntry {
                index,
                name: name.to_string(),
            })
            .collect(),
        primary_key_column: trail.headers.primary_key_column(),
        primary_key_name: trail.headers.primary_key_name(),
        rename_candidates: trail.rename_candidates(),
    })
}

/// GET /api/status
pub async fn get_status(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let status = state.monitor_status.borrow().clone();
    Json(serde_json::json!({
        "message": status.message(),
        "status": status,
    }))
}
