//! Buffered crew handlers.

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use tracing::{error, info};

use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::types::{CrewChatRequest, CrewResponse, CrewStatusResponse};

/// GET /api/crew - Status probe.
pub async fn crew_status(State(state): State<AppState>) -> Json<CrewStatusResponse> {
    Json(CrewStatusResponse {
        status: "ok".to_string(),
        message: "Crew API is ready. POST a message to run the crew.".to_string(),
        stages: state.runner.config().stages.stages().to_vec(),
    })
}

/// POST /api/crew - Run the crew and reply with the final result.
///
/// Unless `kill_on_disconnect` is set, the worker runs in its own task and
/// finishes even if the client goes away.
pub async fn run_crew(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CrewChatRequest>, JsonRejection>,
) -> Result<Json<CrewResponse>> {
    let Json(req) = payload?;
    let request = req.into_worker_request();
    info!(placeholder = request.is_placeholder(), "buffered crew request");

    let outcome = if state.runner.config().kill_on_disconnect {
        state.runner.run(request).await?
    } else {
        let runner = Arc::clone(&state.runner);
        tokio::spawn(async move { runner.run(request).await })
            .await
            .map_err(|e| {
                error!(error = %e, "crew task failed");
                ApiError::Internal(format!("crew task failed: {}", e))
            })??
    };

    Ok(Json(CrewResponse::from(outcome)))
}
