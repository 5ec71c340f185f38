//! Progress events emitted by the worker on stderr.

use serde::{Deserialize, Serialize};

/// Discriminator carried in the `type` field of every progress line.
///
/// Having a single-variant enum here means a line whose `type` is anything
/// other than `"progress"` fails to deserialize and is treated as log noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProgressTag {
    #[default]
    Progress,
}

/// An incremental status update from one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Always `"progress"` on the wire.
    #[serde(rename = "type")]
    pub kind: ProgressTag,

    /// Name of the agent that made progress (e.g. "Content Planner").
    pub agent: String,

    /// Task the agent is working on.
    pub task: String,

    /// ISO-8601 timestamp as reported by the worker. Passed through opaque.
    pub timestamp: String,

    /// Output produced so far, if the worker included it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ProgressEvent {
    /// Creates a new progress event.
    pub fn new(
        agent: impl Into<String>,
        task: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            kind: ProgressTag::Progress,
            agent: agent.into(),
            task: task.into(),
            timestamp: timestamp.into(),
            output: None,
        }
    }

    /// Attaches output text.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Parses one stderr line.
    ///
    /// Returns `None` for anything that is not a JSON progress object.
    pub fn from_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            return None;
        }
        serde_json::from_str(trimmed).ok()
    }
}
