//! Response DTOs for the API.

use serde::Serialize;

use crew_models::{AgentProgress, CompletedRun, StageSpec};
use crew_runtime::RunOutcome;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Crew endpoint status probe.
#[derive(Debug, Clone, Serialize)]
pub struct CrewStatusResponse {
    /// Always "ok".
    pub status: String,
    /// Human-readable note.
    pub message: String,
    /// Configured pipeline stages, in order.
    pub stages: Vec<StageSpec>,
}

/// Successful crew run.
///
/// Serializes as `{"status":"complete", output?, task_outputs?, progress?, agents?}`.
#[derive(Debug, Clone, Serialize)]
pub struct CrewResponse {
    /// Always "complete".
    pub status: String,
    /// Worker result fields.
    #[serde(flatten)]
    pub run: CompletedRun,
    /// Pipeline progress; omitted when no agent reported anything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents: Option<AgentProgress>,
}

impl From<RunOutcome> for CrewResponse {
    fn from(outcome: RunOutcome) -> Self {
        let agents = Some(outcome.progress).filter(|p| !p.timeline.is_empty());
        Self {
            status: "complete".to_string(),
            run: outcome.result,
            agents,
        }
    }
}

/// One SSE frame other than a progress event.
///
/// Progress events are sent as-is; they already carry `"type":"progress"`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    /// First frame of every stream.
    Connected,
    /// The current agent changed.
    Stage {
        /// New current agent; null once every stage is done.
        current_agent: Option<String>,
        /// Completed stages in pipeline order.
        completed_agents: Vec<String>,
    },
    /// Terminal success.
    Result(CrewResponse),
    /// Terminal failure.
    Error {
        /// Error message.
        error: String,
    },
}
