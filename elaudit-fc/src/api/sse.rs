//! SSE stream of engine events for connected UIs

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use crate::AppState;

/// GET /api/events
///
/// Streams [`elaudit_common::events::AuditEvent`] as SSE so the UI can show
/// remote edits, queue drains and connectivity flips as they happen.
pub async fn events_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.engine.events().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(audit_event) => Event::default()
                .event("audit")
                .json_data(&audit_event)
                .ok()
                .map(Ok),
            Err(e) => {
                // Lagging subscriber dropped events; keep the stream alive
                tracing::warn!("SSE subscriber lagged: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
