//! Error types for the runtime crate.

use std::time::Duration;

use thiserror::Error;

/// Remediation hint attached to authentication failures.
pub const AUTH_HINT: &str =
    "set a valid OPENROUTER_API_KEY (or OPENAI_API_KEY) in .env and restart the server";

/// Errors that end a worker run. None of them are retried by the runtime.
#[derive(Debug, Error)]
pub enum CrewError {
    /// The interpreter could not be found or executed.
    #[error("failed to launch worker `{program}`: {source}")]
    Launch {
        /// Program that failed to start.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The worker ran past the wall-clock budget and was killed.
    #[error("worker timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The worker exited non-zero without printing a result.
    #[error("worker exited with {} and no output: {stderr}", describe_exit(.code))]
    WorkerExit {
        /// Exit code, `None` if killed by a signal.
        code: Option<i32>,
        /// Captured stderr for diagnostics.
        stderr: String,
    },

    /// The provider rejected the API key.
    #[error("provider rejected the API key: {}", AUTH_HINT)]
    Auth,

    /// stdout was not a valid result document.
    #[error("worker produced malformed output: {snippet}")]
    MalformedOutput {
        /// First 200 characters of stdout.
        snippet: String,
    },

    /// The worker reported `status: "error"`.
    #[error("{0}")]
    WorkerReported(String),

    /// Pipe I/O failed after the worker started.
    #[error("worker I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request could not be serialized.
    #[error("failed to encode worker request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CrewError {
    /// Short name of the error class, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CrewError::Launch { .. } => "LaunchError",
            CrewError::Timeout(_) => "TimeoutError",
            CrewError::WorkerExit { .. } => "WorkerExitError",
            CrewError::Auth => "AuthError",
            CrewError::MalformedOutput { .. } => "MalformedOutputError",
            CrewError::WorkerReported(_) => "WorkerReportedError",
            CrewError::Io(_) => "IoError",
            CrewError::Encode(_) => "EncodeError",
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, CrewError>;
