// ABOUTME: Route definitions for the filtertrail HTTP API.
// ABOUTME: Assembles view, command, and stream handlers into one Axum Router with tracing and CORS layers.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;

/// Build the complete Axum router with all routes and shared state.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/graph", get(api::views::get_graph))
        .route("/api/table", get(api::views::get_table))
        .route("/api/events", get(api::views::get_events))
        .route("/api/events/stream", get(api::stream::event_stream))
        .route("/api/headers", get(api::views::get_headers))
        .route("/api/status", get(api::views::get_status))
        .route("/api/steps/{index}/rename", post(api::commands::rename_step))
        .route("/api/columns/rename", post(api::commands::rename_column))
        .route("/api/primary-key", post(api::commands::set_primary_key))
        .route("/api/primary-key/rename", post(api::commands::rename_primary_key))
        .route("/api/reset", post(api::commands::reset))
        .route("/api/exports", post(api::commands::write_exports))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler. Returns 200 OK with a simple JSON body.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
