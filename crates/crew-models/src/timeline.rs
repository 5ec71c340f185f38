//! Derived per-agent timeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What one agent did for one task during a run.
///
/// `start_time` is when the agent was first seen; `end_time` is when its
/// latest output for this task was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTimelineEntry {
    /// Agent name.
    pub agent: String,
    /// Task name.
    pub task: String,
    /// Latest output text (empty until the agent reports some).
    pub output: String,
    /// First time the agent was seen in this run.
    pub start_time: DateTime<Utc>,
    /// Time the latest update for this task was observed.
    pub end_time: DateTime<Utc>,
    /// `end_time - start_time` in milliseconds.
    pub duration_ms: i64,
}

impl AgentTimelineEntry {
    /// Creates an entry spanning `start_time..end_time`.
    pub fn new(
        agent: impl Into<String>,
        task: impl Into<String>,
        output: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            agent: agent.into(),
            task: task.into(),
            output: output.into(),
            start_time,
            end_time,
            duration_ms: (end_time - start_time).num_milliseconds().max(0),
        }
    }

    /// Moves the end of the entry to `end_time`.
    pub fn touch(&mut self, end_time: DateTime<Utc>) {
        self.end_time = end_time;
        self.duration_ms = (end_time - self.start_time).num_milliseconds().max(0);
    }

    /// Returns true if this entry is for the given agent and task.
    pub fn is_for(&self, agent: &str, task: &str) -> bool {
        self.agent == agent && self.task == task
    }
}

/// Snapshot of pipeline progress for clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProgress {
    /// First stage that has not produced output yet, if any.
    pub current_agent: Option<String>,
    /// Stages that produced output, in pipeline order.
    pub completed_agents: Vec<String>,
    /// Timeline entries in first-seen order.
    pub timeline: Vec<AgentTimelineEntry>,
}
