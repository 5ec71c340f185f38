//! Result reconciliation.
//!
//! Turns the captured output and exit code of a finished worker into either
//! a [`CompletedRun`] or a classified [`CrewError`]. This is a pure function
//! of its inputs.

use crew_models::{CompletedRun, ProgressEvent, WorkerResult};

use crate::demux::{strip_ansi, CapturedOutput};
use crate::error::{CrewError, Result};

/// Characters of stdout kept in a malformed-output error.
pub const MALFORMED_SNIPPET_CHARS: usize = 200;

/// Lowercase phrases that identify a rejected provider API key.
pub const AUTH_SIGNATURES: &[&str] = &[
    "incorrect api key",
    "invalid api key",
    "invalid_api_key",
    "api key not valid",
    "no auth credentials found",
    "authenticationerror",
];

/// Reconciles a finished worker's output into a final result.
///
/// `progress` holds the events observed on stderr during the run; they are
/// merged into the result without replacing events the worker reported.
pub fn reconcile(
    captured: &CapturedOutput,
    exit_code: Option<i32>,
    progress: &[ProgressEvent],
) -> Result<CompletedRun> {
    let stdout = strip_ansi(&captured.stdout);
    let stdout = stdout.trim();

    if stdout.is_empty() {
        if exit_code != Some(0) {
            return Err(CrewError::WorkerExit {
                code: exit_code,
                stderr: captured.stderr.trim().to_string(),
            });
        }
        let mut run = CompletedRun::default();
        run.merge_progress(progress);
        return Ok(run);
    }

    let result = match WorkerResult::from_json(stdout) {
        Ok(result) => result,
        Err(_) if is_auth_failure(stdout, &captured.stderr) => return Err(CrewError::Auth),
        Err(_) => {
            return Err(CrewError::MalformedOutput {
                snippet: stdout.chars().take(MALFORMED_SNIPPET_CHARS).collect(),
            })
        }
    };

    match result {
        WorkerResult::Error { error, .. } => Err(CrewError::WorkerReported(error)),
        WorkerResult::Complete(mut run) => {
            run.merge_progress(progress);
            Ok(run)
        }
    }
}

/// Returns true if the combined output carries an auth failure signature.
pub fn is_auth_failure(stdout: &str, stderr: &str) -> bool {
    let combined = format!("{}\n{}", stdout, stderr).to_lowercase();
    AUTH_SIGNATURES.iter().any(|sig| combined.contains(sig))
}
