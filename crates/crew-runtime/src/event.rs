//! Run events.
//!
//! The runner publishes these as the run advances. Transports subscribe to
//! them; the runner knows nothing about how they are delivered.

use crew_models::ProgressEvent;

use crate::state::RunPhase;

/// Events emitted during one worker run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// The worker process was spawned.
    Launched {
        /// Run identifier used in logs.
        run_id: String,
        /// OS process ID, if still known.
        pid: Option<u32>,
    },
    /// A progress event arrived on stderr.
    Progress(ProgressEvent),
    /// The current agent changed.
    StageChanged {
        /// New current agent; `None` once every stage is done.
        current_agent: Option<String>,
        /// Completed stages in plan order.
        completed_agents: Vec<String>,
    },
    /// The run entered a new lifecycle phase.
    PhaseChanged(RunPhase),
}

impl RunEvent {
    /// Returns true if this is a progress event.
    pub fn is_progress(&self) -> bool {
        matches!(self, RunEvent::Progress(_))
    }
}
