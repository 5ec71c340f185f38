//! Run lifecycle state machine.
//!
//! `idle → launched → streaming_progress* → terminal(success|error) → closed`
//!
//! There is no way back out of a terminal state, and `closed` is entered
//! exactly once.

use std::fmt;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The worker produced a usable result.
    Success,
    /// The run failed.
    Error,
}

/// Lifecycle phase of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunPhase {
    /// Nothing spawned yet.
    #[default]
    Idle,
    /// Worker process spawned, no progress seen.
    Launched,
    /// At least one progress event delivered.
    StreamingProgress,
    /// Final result or error decided.
    Terminal(Outcome),
    /// Delivered to the client; nothing further happens.
    Closed,
}

impl RunPhase {
    /// Returns true if `next` is a legal successor of this phase.
    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Idle, Launched)
                | (Idle, Terminal(_))
                | (Launched, StreamingProgress)
                | (Launched, Terminal(_))
                | (StreamingProgress, StreamingProgress)
                | (StreamingProgress, Terminal(_))
                | (Terminal(_), Closed)
        )
    }

    /// Returns true for terminal and closed phases.
    pub fn is_finished(&self) -> bool {
        matches!(self, RunPhase::Terminal(_) | RunPhase::Closed)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Launched => "launched",
            RunPhase::StreamingProgress => "streaming_progress",
            RunPhase::Terminal(Outcome::Success) => "terminal(success)",
            RunPhase::Terminal(Outcome::Error) => "terminal(error)",
            RunPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Rejected transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid run transition {from} -> {to}")]
pub struct InvalidTransition {
    /// Phase before the attempt.
    pub from: RunPhase,
    /// Requested phase.
    pub to: RunPhase,
}

/// Tracks the phase of a run and enforces legal transitions.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    phase: RunPhase,
}

impl RunState {
    /// Creates a run in the idle phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Moves to `next` if legal.
    pub fn advance(&mut self, next: RunPhase) -> std::result::Result<(), InvalidTransition> {
        if !self.phase.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }
}
