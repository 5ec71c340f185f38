//! Crew runner: drives one worker from spawn to terminal result.

use std::sync::Arc;

use chrono::Utc;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crew_models::{AgentProgress, CompletedRun, ProgressEvent, WorkerRequest};

use crate::aggregator::{ProgressAggregator, StageTransition};
use crate::config::WorkerConfig;
use crate::demux::Demultiplexer;
use crate::error::{CrewError, Result};
use crate::event::RunEvent;
use crate::launcher::{self, SpawnedWorker};
use crate::reconciler;
use crate::state::{Outcome, RunPhase, RunState};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Successful result of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Run identifier used in logs.
    pub run_id: String,
    /// Reconciled worker result.
    pub result: CompletedRun,
    /// Final pipeline progress.
    pub progress: AgentProgress,
}

/// Runs crew workers, one process per call.
///
/// Cheap to clone; holds no per-run state.
#[derive(Debug, Clone)]
pub struct CrewRunner {
    config: Arc<WorkerConfig>,
}

impl CrewRunner {
    /// Creates a runner with the given configuration.
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Runs a worker to completion without publishing events.
    pub async fn run(&self, request: WorkerRequest) -> Result<RunOutcome> {
        self.run_with_events(request, None).await
    }

    /// Runs a worker to completion, publishing [`RunEvent`]s to `events`.
    ///
    /// Dropping the returned future kills the worker.
    pub async fn run_with_events(
        &self,
        request: WorkerRequest,
        events: Option<mpsc::Sender<RunEvent>>,
    ) -> Result<RunOutcome> {
        let mut ctx = RunContext::new(&self.config, events);

        let result = match launcher::spawn(&self.config, &request) {
            Ok(worker) => {
                ctx.run_id = worker.run_id.clone();
                ctx.advance(RunPhase::Launched).await;
                ctx.emit(RunEvent::Launched {
                    run_id: worker.run_id.clone(),
                    pid: worker.pid(),
                })
                .await;
                self.drive(worker, &mut ctx).await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => ctx.advance(RunPhase::Terminal(Outcome::Success)).await,
            Err(e) => {
                warn!(run_id = %ctx.run_id, kind = e.kind(), error = %e, "worker run failed");
                ctx.advance(RunPhase::Terminal(Outcome::Error)).await;
            }
        }
        ctx.advance(RunPhase::Closed).await;

        result.map(|result| RunOutcome {
            run_id: ctx.run_id.clone(),
            result,
            progress: ctx.aggregator.snapshot(),
        })
    }

    async fn drive(&self, mut worker: SpawnedWorker, ctx: &mut RunContext) -> Result<CompletedRun> {
        let io_error = |what: &str| {
            CrewError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                format!("worker {} was not captured", what),
            ))
        };
        let mut stdout = worker.child.stdout.take().ok_or_else(|| io_error("stdout"))?;
        let mut stderr = worker.child.stderr.take().ok_or_else(|| io_error("stderr"))?;

        let timeout = self.config.timeout;
        let deadline = tokio::time::sleep_until(ctx.deadline);
        tokio::pin!(deadline);

        let mut demux = Demultiplexer::new(self.config.stderr_limit);
        let mut out_buf = vec![0u8; READ_BUFFER_SIZE];
        let mut err_buf = vec![0u8; READ_BUFFER_SIZE];
        let mut stdout_open = true;
        let mut stderr_open = true;

        while stdout_open || stderr_open {
            tokio::select! {
                read = stdout.read(&mut out_buf), if stdout_open => match read {
                    Ok(0) => stdout_open = false,
                    Ok(n) => demux.on_stdout(&out_buf[..n]),
                    Err(e) => {
                        warn!(run_id = %ctx.run_id, error = %e, "stdout read failed");
                        stdout_open = false;
                    }
                },
                read = stderr.read(&mut err_buf), if stderr_open => match read {
                    Ok(0) => stderr_open = false,
                    Ok(n) => {
                        for event in demux.on_stderr(&err_buf[..n]) {
                            ctx.observe(event).await;
                        }
                    }
                    Err(e) => {
                        warn!(run_id = %ctx.run_id, error = %e, "stderr read failed");
                        stderr_open = false;
                    }
                },
                _ = &mut deadline => {
                    launcher::terminate(&mut worker.child, &ctx.run_id).await;
                    return Err(CrewError::Timeout(timeout));
                }
            }
        }

        let (last, captured) = demux.finish();
        if let Some(event) = last {
            ctx.observe(event).await;
        }

        let status = tokio::select! {
            status = worker.child.wait() => status?,
            _ = &mut deadline => {
                launcher::terminate(&mut worker.child, &ctx.run_id).await;
                return Err(CrewError::Timeout(timeout));
            }
        };

        info!(
            run_id = %ctx.run_id,
            exit_code = ?status.code(),
            stdout_bytes = captured.stdout.len(),
            progress_events = ctx.aggregator.events().len(),
            "worker exited"
        );

        let run = reconciler::reconcile(&captured, status.code(), ctx.aggregator.events())?;

        let now = Utc::now();
        for output in run.task_outputs.iter().flatten() {
            let transition = ctx.aggregator.record_task_output(output, now);
            ctx.stage_changed(transition).await;
        }

        Ok(run)
    }
}

/// Per-run state owned by a single call.
///
/// `deadline` bounds both the worker and event delivery, so a subscriber
/// that stops reading cannot hold the run past its timeout.
struct RunContext {
    run_id: String,
    deadline: Instant,
    state: RunState,
    aggregator: ProgressAggregator,
    events: Option<mpsc::Sender<RunEvent>>,
}

impl RunContext {
    fn new(config: &WorkerConfig, events: Option<mpsc::Sender<RunEvent>>) -> Self {
        Self {
            run_id: String::from("-"),
            deadline: Instant::now() + config.timeout,
            state: RunState::new(),
            aggregator: ProgressAggregator::new(config.stages.clone()),
            events,
        }
    }

    async fn emit(&mut self, event: RunEvent) {
        let Some(tx) = &self.events else {
            return;
        };
        let sent = tokio::time::timeout_at(self.deadline, tx.send(event)).await;
        match sent {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                debug!(run_id = %self.run_id, "event subscriber went away");
                self.events = None;
            }
            Err(_) => warn!(run_id = %self.run_id, "event subscriber stalled, event dropped"),
        }
    }

    async fn advance(&mut self, phase: RunPhase) {
        if self.state.phase() == phase {
            return;
        }
        match self.state.advance(phase) {
            Ok(()) => {
                debug!(run_id = %self.run_id, phase = %phase, "run phase changed");
                self.emit(RunEvent::PhaseChanged(phase)).await;
            }
            Err(e) => warn!(run_id = %self.run_id, error = %e, "ignoring run transition"),
        }
    }

    async fn observe(&mut self, event: ProgressEvent) {
        debug!(
            run_id = %self.run_id,
            agent = %event.agent,
            task = %event.task,
            "progress"
        );
        let transition = self.aggregator.record_progress(event.clone(), Utc::now());
        self.advance(RunPhase::StreamingProgress).await;
        self.emit(RunEvent::Progress(event)).await;
        self.stage_changed(transition).await;
    }

    async fn stage_changed(&mut self, transition: Option<StageTransition>) {
        if let Some(transition) = transition {
            let completed_agents = self.aggregator.completed_agents();
            self.emit(RunEvent::StageChanged {
                current_agent: transition.current,
                completed_agents,
            })
            .await;
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    const PLANNER_PROGRESS: &str = r#"{"type":"progress","agent":"Content Planner","task":"create_content_plan","timestamp":"2024-01-01T00:00:00Z"}"#;

    fn worker(dir: &Path, script: &str) -> CrewRunner {
        let path = dir.join("worker.sh");
        std::fs::write(&path, script).unwrap();
        CrewRunner::new(
            WorkerConfig::new()
                .with_interpreter("sh")
                .with_args([path.to_string_lossy().into_owned()])
                .with_working_dir(dir)
                .with_timeout(Duration::from_secs(10)),
        )
    }

    fn request() -> WorkerRequest {
        WorkerRequest::new(Some("Create a content plan for a product launch".into()))
    }

    #[tokio::test]
    async fn test_plain_output() {
        let dir = tempdir().unwrap();
        let runner = worker(
            dir.path(),
            "cat > /dev/null\nprintf '%s' '{\"status\":\"complete\",\"output\":\"Hello\"}'\n",
        );

        let outcome = runner.run(request()).await.unwrap();
        assert_eq!(outcome.result.output.as_deref(), Some("Hello"));
        assert!(outcome.result.progress.is_none());
        assert!(outcome.progress.timeline.is_empty());
        assert_eq!(outcome.progress.current_agent.as_deref(), Some("Content Planner"));
    }

    #[tokio::test]
    async fn test_progress_and_task_outputs() {
        let dir = tempdir().unwrap();
        let script = format!(
            "cat > /dev/null\necho 'crew starting' >&2\necho '{}' >&2\necho '{}'\n",
            PLANNER_PROGRESS,
            r#"{"status":"complete","task_outputs":[{"task":"create_content_plan","output":"Plan text"}]}"#
        );
        let runner = worker(dir.path(), &script);

        let outcome = runner.run(request()).await.unwrap();
        let progress = outcome.result.progress.unwrap();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].agent, "Content Planner");

        let timeline = &outcome.progress.timeline;
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].agent, "Content Planner");
        assert_eq!(timeline[0].output, "Plan text");
        assert_eq!(outcome.progress.completed_agents, vec!["Content Planner"]);
    }

    #[tokio::test]
    async fn test_progress_line_split_across_writes() {
        let dir = tempdir().unwrap();
        let script = concat!(
            "cat > /dev/null\n",
            "printf '%s' '{\"type\":\"progress\",\"agent\":\"Trend Researcher\",' >&2\n",
            "sleep 0.2\n",
            "printf '%s\\n' '\"task\":\"research_trends\",\"timestamp\":\"t\"}' >&2\n",
            "printf '%s' '{\"status\":\"complete\",\"output\":\"ok\"}'\n",
        );
        let runner = worker(dir.path(), script);

        let outcome = runner.run(request()).await.unwrap();
        let progress = outcome.result.progress.unwrap();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].task, "research_trends");
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_output() {
        let dir = tempdir().unwrap();
        let runner = worker(
            dir.path(),
            "cat > /dev/null\necho 'Traceback (most recent call last):' >&2\necho 'ValueError: boom' >&2\nexit 1\n",
        );

        match runner.run(request()).await.unwrap_err() {
            CrewError::WorkerExit { code, stderr } => {
                assert_eq!(code, Some(1));
                assert!(stderr.contains("Traceback"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let dir = tempdir().unwrap();
        let runner = worker(
            dir.path(),
            "cat > /dev/null\necho 'not json'\necho 'Error code: 401 - Incorrect API key provided' >&2\nexit 1\n",
        );

        let err = runner.run(request()).await.unwrap_err();
        assert!(matches!(err, CrewError::Auth), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_worker_reported_error() {
        let dir = tempdir().unwrap();
        let runner = worker(
            dir.path(),
            "cat > /dev/null\necho '{\"status\":\"error\",\"error\":\"Config missing\"}'\n",
        );

        match runner.run(request()).await.unwrap_err() {
            CrewError::WorkerReported(msg) => assert_eq!(msg, "Config missing"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_worker() {
        let dir = tempdir().unwrap();
        let pid_file = dir.path().join("worker.pid");
        let script = format!("echo $$ > '{}'\nexec sleep 30\n", pid_file.display());
        let path = dir.path().join("worker.sh");
        std::fs::write(&path, script).unwrap();

        let runner = CrewRunner::new(
            WorkerConfig::new()
                .with_interpreter("sh")
                .with_args([path.to_string_lossy().into_owned()])
                .with_timeout(Duration::from_millis(500)),
        );

        let started = std::time::Instant::now();
        let err = runner.run(request()).await.unwrap_err();
        assert!(matches!(err, CrewError::Timeout(_)), "got {:?}", err);
        assert!(started.elapsed() < Duration::from_secs(10));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let alive = std::process::Command::new("kill")
            .args(["-0", pid.trim()])
            .status()
            .unwrap();
        assert!(!alive.success(), "worker {} still exists", pid.trim());
    }

    #[tokio::test]
    async fn test_launch_error() {
        let runner = CrewRunner::new(WorkerConfig::new().with_interpreter("crew-no-such-python"));
        let err = runner.run(request()).await.unwrap_err();
        assert_eq!(err.kind(), "LaunchError");
    }

    #[tokio::test]
    async fn test_events_published_in_order() {
        let dir = tempdir().unwrap();
        let sentiment = PLANNER_PROGRESS
            .replace("Content Planner", "Sentiment Analyst")
            .replace("create_content_plan", "analyze_sentiment");
        let script = format!(
            "cat > /dev/null\necho '{}' >&2\necho '{}' >&2\necho '{}'\n",
            PLANNER_PROGRESS,
            sentiment,
            r#"{"status":"complete","task_outputs":[{"task":"research_trends","output":"Trends"}]}"#
        );
        let runner = worker(dir.path(), &script);
        let (tx, mut rx) = mpsc::channel(64);

        let outcome = runner.run_with_events(request(), Some(tx)).await.unwrap();
        assert!(outcome.progress.current_agent.is_none());

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert_eq!(events[0], RunEvent::PhaseChanged(RunPhase::Launched));
        assert!(matches!(events[1], RunEvent::Launched { .. }));
        assert_eq!(events[2], RunEvent::PhaseChanged(RunPhase::StreamingProgress));

        let agents: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                RunEvent::Progress(p) => Some(p.agent.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(agents, vec!["Content Planner", "Sentiment Analyst"]);

        let stages: Vec<Option<String>> = events
            .iter()
            .filter_map(|e| match e {
                RunEvent::StageChanged { current_agent, .. } => Some(current_agent.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            stages,
            vec![
                Some("Sentiment Analyst".to_string()),
                Some("Trend Researcher".to_string()),
                None
            ]
        );

        let n = events.len();
        assert_eq!(events[n - 2], RunEvent::PhaseChanged(RunPhase::Terminal(Outcome::Success)));
        assert_eq!(events[n - 1], RunEvent::PhaseChanged(RunPhase::Closed));
    }

    #[tokio::test]
    async fn test_failed_run_still_closes() {
        let runner = CrewRunner::new(WorkerConfig::new().with_interpreter("crew-no-such-python"));
        let (tx, mut rx) = mpsc::channel(16);

        assert!(runner.run_with_events(request(), Some(tx)).await.is_err());

        let mut phases = Vec::new();
        while let Ok(RunEvent::PhaseChanged(phase)) = rx.try_recv() {
            phases.push(phase);
        }
        assert_eq!(
            phases,
            vec![RunPhase::Terminal(Outcome::Error), RunPhase::Closed]
        );
    }

    #[tokio::test]
    async fn test_stalled_subscriber_does_not_block_timeout() {
        let dir = tempdir().unwrap();
        let pid_file = dir.path().join("worker.pid");
        let script = format!(
            "for i in 1 2 3 4 5 6 7 8; do echo '{}' >&2; done\necho $$ > '{}'\nexec sleep 30\n",
            PLANNER_PROGRESS,
            pid_file.display()
        );
        let runner = CrewRunner::new(
            worker(dir.path(), &script)
                .config()
                .clone()
                .with_timeout(Duration::from_millis(500)),
        );

        // Subscriber stays alive but never reads.
        let (tx, _rx) = mpsc::channel(2);
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            runner.run_with_events(request(), Some(tx)),
        )
        .await
        .expect("run hung behind a stalled subscriber");

        let err = result.unwrap_err();
        assert!(matches!(err, CrewError::Timeout(_)), "got {:?}", err);

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let alive = std::process::Command::new("kill")
            .args(["-0", pid.trim()])
            .status()
            .unwrap();
        assert!(!alive.success(), "worker {} still exists", pid.trim());
    }
}
