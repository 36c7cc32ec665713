// ABOUTME: Mutating API handlers: step and column renames, primary key changes, reset, and report exports.
// ABOUTME: Each handler forwards one command to the trail actor and maps actor errors to HTTP statuses.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use filtertrail_core::{ActorError, Command, RelabelError};
use serde::Deserialize;

use crate::app_state::SharedState;

#[derive(Debug, Deserialize)]
pub struct RenameStepRequest {
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameColumnRequest {
    pub original_name: String,
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct PrimaryKeyRequest {
    pub column_index: usize,
}

fn error_response(err: ActorError) -> Response {
    let status = match &err {
        ActorError::Relabel(RelabelError::EventNotFound { .. }) => StatusCode::NOT_FOUND,
        ActorError::Relabel(_) | ActorError::InvalidPrimaryKey(_) => StatusCode::BAD_REQUEST,
        ActorError::ChannelClosed => {
            tracing::error!("trail actor is not running");
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    (
        status,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}

async fn dispatch(state: &SharedState, cmd: Command) -> Response {
    match state.trail.send_command(cmd).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/steps/{index}/rename - Relabel a single step.
pub async fn rename_step(
    State(state): State<SharedState>,
    Path(index): Path<usize>,
    Json(req): Json<RenameStepRequest>,
) -> Response {
    dispatch(
        &state,
        Command::RenameStep {
            event_index: index,
            new_name: req.new_name,
        },
    )
    .await
}

/// POST /api/columns/rename - Rename a column everywhere in the log.
pub async fn rename_column(
    State(state): State<SharedState>,
    Json(req): Json<RenameColumnRequest>,
) -> Response {
    dispatch(
        &state,
        Command::RenameColumn {
            original_name: req.original_name,
            new_name: req.new_name,
        },
    )
    .await
}

/// POST /api/primary-key - Choose the column whose non-empty cells count as rows.
pub async fn set_primary_key(
    State(state): State<SharedState>,
    Json(req): Json<PrimaryKeyRequest>,
) -> Response {
    dispatch(
        &state,
        Command::SetPrimaryKey {
            column_index: req.column_index,
        },
    )
    .await
}

/// POST /api/primary-key/rename
pub async fn rename_primary_key(
    State(state): State<SharedState>,
    Json(req): Json<RenameStepRequest>,
) -> Response {
    dispatch(
        &state,
        Command::RenamePrimaryKey {
            new_name: req.new_name,
        },
    )
    .await
}

/// POST /api/reset - Discard the whole trail.
pub async fn reset(State(state): State<SharedState>) -> Response {
    dispatch(&state, Command::Reset).await
}

/// POST /api/exports - Write flow.dot, flow.json and table.md under the exports directory.
pub async fn write_exports(State(state): State<SharedState>) -> Response {
    let trail = state.trail.read_state().await;
    match state.storage.write_exports(&trail) {
        Ok(paths) => (StatusCode::OK, Json(paths)).into_response(),
        Err(e) => {
            tracing::error!("failed to write exports: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("failed to write exports: {}", e) })),
            )
                .into_response()
        }
    }
}
