// ABOUTME: SSE handler streaming trail notices (appends, renames, header changes, resets) to the front end.
// ABOUTME: Subscribes to the trail actor's broadcast channel; lagged notices are dropped.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use filtertrail_core::TrailNotice;
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use crate::app_state::SharedState;

/// SSE event name for a notice, matching its serde tag.
fn notice_type_name(notice: &TrailNotice) -> &'static str {
    match notice {
        TrailNotice::Appended { .. } => "appended",
        TrailNotice::StepRenamed { .. } => "step_renamed",
        TrailNotice::ColumnRenamed { .. } => "column_renamed",
        TrailNotice::HeadersChanged => "headers_changed",
        TrailNotice::Reset => "reset",
    }
}

fn notice_stream_from_receiver(
    rx: tokio::sync::broadcast::Receiver<TrailNotice>,
) -> impl Stream<Item = Result<SseEvent, axum::Error>> {
    BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(notice) => {
                let data = serde_json::to_string(&notice).ok()?;
                Some(Ok(SseEvent::default()
                    .event(notice_type_name(&notice))
                    .data(data)))
            }
            Err(e) => {
                tracing::debug!(error = %e, "sse subscriber lagged");
                None
            }
        }
    })
}

/// GET /api/events/stream
pub async fn event_stream(State(state): State<SharedState>) -> impl IntoResponse {
    let stream = notice_stream_from_receiver(state.trail.subscribe());
    Sse::new(stream).keep_alive(KeepAlive::default())
}
