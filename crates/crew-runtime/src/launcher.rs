//! Worker process launcher.

use std::io;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crew_models::WorkerRequest;

use crate::config::WorkerConfig;
use crate::error::{CrewError, Result};

/// A spawned worker whose request is being written to stdin.
#[derive(Debug)]
pub struct SpawnedWorker {
    /// Run identifier used in logs.
    pub run_id: String,
    /// The worker process. Killed if dropped while running.
    pub child: Child,
    /// Task writing the request to stdin.
    pub stdin_writer: JoinHandle<()>,
}

impl SpawnedWorker {
    /// OS process ID, if the process has not been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

/// Builds the worker command from the config.
pub fn build_command(config: &WorkerConfig) -> Command {
    let mut cmd = Command::new(&config.interpreter);
    cmd.args(&config.args)
        .current_dir(&config.working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if !config.inherit_env {
        cmd.env_clear();
    }
    cmd.envs(&config.env);
    cmd
}

/// Spawns a worker and starts writing `request` to its stdin.
///
/// The request is written as one UTF-8 JSON document, then stdin is closed.
/// A worker that cannot be started fails with [`CrewError::Launch`].
pub fn spawn(config: &WorkerConfig, request: &WorkerRequest) -> Result<SpawnedWorker> {
    let payload = request.to_json()?;
    let run_id = uuid::Uuid::new_v4().to_string();

    debug!(
        run_id = %run_id,
        interpreter = %config.interpreter,
        args = ?config.args,
        working_dir = %config.working_dir.display(),
        env_overrides = config.env.len(),
        "spawning worker"
    );

    let mut child = build_command(config)
        .spawn()
        .map_err(|source| CrewError::Launch {
            program: config.interpreter.clone(),
            source,
        })?;

    let stdin = child.stdin.take().ok_or_else(|| {
        CrewError::Io(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "worker stdin was not captured",
        ))
    })?;

    info!(
        run_id = %run_id,
        pid = ?child.id(),
        placeholder = request.is_placeholder(),
        "worker spawned"
    );

    let stdin_writer = tokio::spawn(write_request(stdin, payload, run_id.clone()));

    Ok(SpawnedWorker {
        run_id,
        child,
        stdin_writer,
    })
}

/// Kills the worker and reaps it.
pub async fn terminate(child: &mut Child, run_id: &str) {
    match child.kill().await {
        Ok(()) => info!(run_id = %run_id, "worker terminated"),
        Err(e) => warn!(run_id = %run_id, error = %e, "failed to terminate worker"),
    }
}

async fn write_request(mut stdin: ChildStdin, payload: String, run_id: String) {
    if let Err(e) = stdin.write_all(payload.as_bytes()).await {
        // A worker that exits without reading stdin closes the pipe; its
        // exit status decides the outcome.
        warn!(run_id = %run_id, error = %e, "failed to write worker request");
        return;
    }
    if let Err(e) = stdin.shutdown().await {
        warn!(run_id = %run_id, error = %e, "failed to close worker stdin");
    }
    debug!(run_id = %run_id, bytes = payload.len(), "worker request written");
}
