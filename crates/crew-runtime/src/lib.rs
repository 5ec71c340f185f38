//! Worker process orchestration for the crew service.
//!
//! One run spawns one worker process, writes a request to its stdin, and
//! watches its two output streams:
//! - stderr carries diagnostic logs and line-delimited progress events
//! - stdout carries a single JSON document with the final result
//!
//! Progress is aggregated into a per-agent timeline as it arrives, and the
//! exit code, captured output and observed progress are reconciled into one
//! terminal outcome. Transports subscribe to [`RunEvent`]s to relay progress.
//!
//! # Example
//!
//! ```ignore
//! use crew_models::WorkerRequest;
//! use crew_runtime::{CrewRunner, WorkerConfig};
//!
//! let runner = CrewRunner::new(WorkerConfig::new().with_working_dir("/srv/crew"));
//! let outcome = runner
//!     .run(WorkerRequest::new(Some("Plan a launch".into())))
//!     .await?;
//! println!("{:?}", outcome.result.output);
//! ```

pub mod aggregator;
pub mod config;
pub mod demux;
pub mod error;
pub mod event;
pub mod launcher;
pub mod reconciler;
pub mod runner;
pub mod state;

pub use aggregator::{ProgressAggregator, StageTransition};
pub use config::{clean_api_key, ProviderEnv, WorkerConfig, DEFAULT_TIMEOUT};
pub use demux::{strip_ansi, CapturedOutput, Demultiplexer, LineSplitter};
pub use error::{CrewError, Result};
pub use event::RunEvent;
pub use launcher::SpawnedWorker;
pub use reconciler::reconcile;
pub use runner::{CrewRunner, RunOutcome};
pub use state::{InvalidTransition, Outcome, RunPhase, RunState};
