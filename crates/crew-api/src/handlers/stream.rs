//! Streaming crew handler (server-sent events).

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    http::{header::HeaderName, HeaderValue},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crew_runtime::RunEvent;

use crate::error::Result;
use crate::state::AppState;
use crate::types::{CrewChatRequest, CrewResponse, StreamFrame};

/// Data of the frame that ends a successful stream.
pub const DONE_MARKER: &str = "[DONE]";

const EVENT_BUFFER: usize = 64;

/// Aborts the run task when the stream is dropped.
///
/// Aborting drops the worker's process handle, which kills the worker.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if !self.0.is_finished() {
            debug!("stream dropped before the run finished, aborting");
        }
        self.0.abort();
    }
}

/// POST /api/crew/stream - Run the crew and stream progress as SSE.
///
/// Frames: `connected`, then progress and stage frames as they happen, then
/// either `result` followed by `[DONE]`, or one `error` frame.
pub async fn stream_crew(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CrewChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = payload?;
    let request = req.into_worker_request();
    info!(placeholder = request.is_placeholder(), "streaming crew request");

    let (tx, mut rx) = mpsc::channel::<RunEvent>(EVENT_BUFFER);
    let runner = Arc::clone(&state.runner);
    let task = tokio::spawn(async move { runner.run_with_events(request, Some(tx)).await });
    let guard = AbortOnDrop(task.abort_handle());

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok::<Event, Infallible>(frame(&StreamFrame::Connected));

        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::Progress(progress) => {
                    yield Ok(frame(&progress));
                }
                RunEvent::StageChanged { current_agent, completed_agents } => {
                    yield Ok(frame(&StreamFrame::Stage { current_agent, completed_agents }));
                }
                RunEvent::Launched { run_id, pid } => {
                    debug!(run_id = %run_id, pid = ?pid, "stream attached to worker");
                }
                RunEvent::PhaseChanged(phase) => debug!(phase = %phase, "stream phase"),
            }
        }

        match task.await {
            Ok(Ok(outcome)) => {
                yield Ok(frame(&StreamFrame::Result(CrewResponse::from(outcome))));
                yield Ok(Event::default().data(DONE_MARKER));
            }
            Ok(Err(err)) => {
                yield Ok(frame(&StreamFrame::Error { error: err.to_string() }));
            }
            Err(err) => {
                warn!(error = %err, "crew task failed");
                yield Ok(frame(&StreamFrame::Error { error: format!("crew task failed: {}", err) }));
            }
        }
    };

    Ok((
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    ))
}

fn frame<T: Serialize>(value: &T) -> Event {
    match Event::default().json_data(value) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "failed to encode stream frame");
            Event::default().data(r#"{"type":"error","error":"failed to encode frame"}"#)
        }
    }
}
