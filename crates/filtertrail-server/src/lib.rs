// ABOUTME: HTTP server for filtertrail, serving the flow graph, table, and event log as JSON.
// ABOUTME: Uses Axum with the shared trail actor handle for renames, resets, exports, and SSE updates.

pub mod api;
pub mod app_state;
pub mod config;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use config::{ConfigError, TrailConfig};
pub use routes::create_router;
