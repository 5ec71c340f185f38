//! Final worker result read from stdout.
//!
//! The wire shape is `{"status":"complete"|"error", ...}`. It is validated
//! into [`WorkerResult`], a tagged type, at the parse boundary so nothing
//! downstream handles untyped JSON.

use serde::{Deserialize, Serialize};

use crate::progress::ProgressEvent;

/// Message used when the worker reports `status: "error"` without text.
pub const UNKNOWN_WORKER_ERROR: &str = "Unknown worker error";

/// Output of a single task in the final result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Task name (e.g. "create_content_plan").
    pub task: String,

    /// Agent that ran the task, when the worker says so.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    /// Task output text.
    #[serde(default)]
    pub output: String,
}

impl TaskOutput {
    /// Creates a task output without an explicit agent.
    pub fn new(task: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            agent: None,
            output: output.into(),
        }
    }

    /// Sets the agent.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }
}

/// Body of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedRun {
    /// Final crew output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Per-task outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_outputs: Option<Vec<TaskOutput>>,

    /// Progress events, either reported by the worker or merged in later.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Vec<ProgressEvent>>,
}

impl CompletedRun {
    /// Returns true if the run produced neither output nor task outputs.
    pub fn is_empty(&self) -> bool {
        self.output.as_deref().map_or(true, str::is_empty)
            && self.task_outputs.as_ref().map_or(true, Vec::is_empty)
    }

    /// Appends progress events the result does not already carry.
    ///
    /// Events the worker included itself are never replaced or reordered.
    pub fn merge_progress(&mut self, events: &[ProgressEvent]) {
        if events.is_empty() {
            return;
        }
        let progress = self.progress.get_or_insert_with(Vec::new);
        for event in events {
            if !progress.contains(event) {
                progress.push(event.clone());
            }
        }
    }
}

/// Terminal result of one worker run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", from = "RawResult")]
pub enum WorkerResult {
    /// The crew finished.
    Complete(CompletedRun),
    /// The crew reported a failure. `error` is never empty.
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<Vec<ProgressEvent>>,
    },
}

impl WorkerResult {
    /// Parses the worker's stdout document.
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Returns true for `status: "error"`.
    pub fn is_error(&self) -> bool {
        matches!(self, WorkerResult::Error { .. })
    }
}

/// Wire form accepted from the worker before validation.
#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum RawResult {
    Complete(CompletedRun),
    Error {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        progress: Option<Vec<ProgressEvent>>,
    },
}

impl From<RawResult> for WorkerResult {
    fn from(raw: RawResult) -> Self {
        match raw {
            RawResult::Complete(run) => WorkerResult::Complete(run),
            RawResult::Error { error, progress } => WorkerResult::Error {
                error: error
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| UNKNOWN_WORKER_ERROR.to_string()),
                progress,
            },
        }
    }
}
