//! Core data models for the crew service.
//!
//! This crate provides the types that cross the worker process boundary
//! (requests written to stdin, progress lines read from stderr, the final
//! result read from stdout) together with the derived per-agent timeline
//! and the static stage table of the content pipeline.

pub mod progress;
pub mod request;
pub mod result;
pub mod stage;
pub mod timeline;

// Re-export main types
pub use progress::{ProgressEvent, ProgressTag};
pub use request::{WorkerRequest, DEFAULT_OUTPUT_LANGUAGE, PLACEHOLDER_MESSAGE};
pub use result::{CompletedRun, TaskOutput, WorkerResult, UNKNOWN_WORKER_ERROR};
pub use stage::{Stage, StagePlan, StageSpec};
pub use timeline::{AgentProgress, AgentTimelineEntry};
