//! Progress aggregation for one run.
//!
//! Progress events (stderr) and task outputs (stdout) may describe the same
//! agent. Both feed the same timeline: one entry per (agent, task) pair,
//! most recent update wins. The current agent is the first stage of the
//! plan that has not produced output yet.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crew_models::{AgentProgress, AgentTimelineEntry, ProgressEvent, StagePlan, TaskOutput};

/// Change in the pipeline position caused by one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTransition {
    /// Current agent before the update.
    pub previous: Option<String>,
    /// Current agent after the update; `None` once every stage is done.
    pub current: Option<String>,
}

/// Accumulates progress for a single worker run.
#[derive(Debug)]
pub struct ProgressAggregator {
    plan: StagePlan,
    first_seen: Vec<(String, DateTime<Utc>)>,
    completed: HashSet<String>,
    timeline: Vec<AgentTimelineEntry>,
    events: Vec<ProgressEvent>,
    current: Option<String>,
}

impl ProgressAggregator {
    /// Creates an aggregator for the given stage plan.
    pub fn new(plan: StagePlan) -> Self {
        let current = plan.agents().next().map(str::to_string);
        Self {
            plan,
            first_seen: Vec::new(),
            completed: HashSet::new(),
            timeline: Vec::new(),
            events: Vec::new(),
            current,
        }
    }

    /// Records a progress event observed at `at`.
    ///
    /// Returns the transition if the current agent changed.
    pub fn record_progress(
        &mut self,
        event: ProgressEvent,
        at: DateTime<Utc>,
    ) -> Option<StageTransition> {
        let agent = self.resolve_agent(&event.agent, &event.task);
        self.upsert(&agent, &event.task, event.output.as_deref(), at);
        self.events.push(event);
        self.mark_complete(&agent)
    }

    /// Records a task output from the final result.
    ///
    /// The agent comes from the output itself or the plan's task table.
    /// Unmapped tasks are ignored. For an agent that is already complete
    /// only the stored output text changes.
    pub fn record_task_output(
        &mut self,
        output: &TaskOutput,
        at: DateTime<Utc>,
    ) -> Option<StageTransition> {
        let agent = match output.agent.as_deref() {
            Some(agent) if !agent.is_empty() => self.resolve_agent(agent, &output.task),
            _ => match self.plan.agent_for_task(&output.task) {
                Some(agent) => agent.to_string(),
                None => {
                    debug!(task = %output.task, "task output not mapped to any agent");
                    return None;
                }
            },
        };
        self.upsert(&agent, &output.task, Some(&output.output), at);
        self.mark_complete(&agent)
    }

    /// First stage without output, or `None` when all stages are done.
    pub fn current_agent(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Completed stages in plan order.
    pub fn completed_agents(&self) -> Vec<String> {
        self.plan
            .agents()
            .filter(|a| self.completed.contains(*a))
            .map(str::to_string)
            .collect()
    }

    /// Returns true once every stage of the plan has produced output.
    pub fn is_finished(&self) -> bool {
        self.current.is_none()
    }

    /// Timeline entries in first-seen order.
    pub fn timeline(&self) -> &[AgentTimelineEntry] {
        &self.timeline
    }

    /// All progress events in arrival order.
    pub fn events(&self) -> &[ProgressEvent] {
        &self.events
    }

    /// When `agent` was first seen.
    pub fn first_seen(&self, agent: &str) -> Option<DateTime<Utc>> {
        self.first_seen
            .iter()
            .find(|(a, _)| a == agent)
            .map(|(_, at)| *at)
    }

    /// Snapshot for clients.
    pub fn snapshot(&self) -> AgentProgress {
        AgentProgress {
            current_agent: self.current.clone(),
            completed_agents: self.completed_agents(),
            timeline: self.timeline.clone(),
        }
    }

    /// Prefers a plan agent: the reported name if it is one, else whatever
    /// the task maps to, else the reported name as-is.
    fn resolve_agent(&self, agent: &str, task: &str) -> String {
        if self.plan.contains_agent(agent) {
            return agent.to_string();
        }
        self.plan
            .agent_for_task(task)
            .unwrap_or(agent)
            .to_string()
    }

    fn upsert(&mut self, agent: &str, task: &str, output: Option<&str>, at: DateTime<Utc>) {
        let start = match self.first_seen(agent) {
            Some(start) => start,
            None => {
                self.first_seen.push((agent.to_string(), at));
                at
            }
        };

        match self.timeline.iter_mut().find(|e| e.is_for(agent, task)) {
            Some(entry) => {
                if let Some(output) = output {
                    entry.output = output.to_string();
                }
                entry.touch(at);
            }
            None => self.timeline.push(AgentTimelineEntry::new(
                agent,
                task,
                output.unwrap_or_default(),
                start,
                at,
            )),
        }
    }

    fn mark_complete(&mut self, agent: &str) -> Option<StageTransition> {
        if !self.plan.contains_agent(agent) || !self.completed.insert(agent.to_string()) {
            return None;
        }

        let next = self
            .plan
            .agents()
            .find(|a| !self.completed.contains(*a))
            .map(str::to_string);
        if next == self.current {
            return None;
        }

        let previous = std::mem::replace(&mut self.current, next.clone());
        debug!(
            previous = ?previous,
            current = ?next,
            "current agent changed"
        );
        Some(StageTransition {
            previous,
            current: next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn progress(agent: &str, task: &str) -> ProgressEvent {
        ProgressEvent::new(agent, task, "2024-01-01T00:00:00Z")
    }

    #[test]
    fn test_initial_state() {
        let agg = ProgressAggregator::new(StagePlan::content_pipeline());
        assert_eq!(agg.current_agent(), Some("Content Planner"));
        assert!(agg.completed_agents().is_empty());
        assert!(agg.timeline().is_empty());
        assert!(!agg.is_finished());
    }

    #[test]
    fn test_empty_plan_is_finished() {
        let agg = ProgressAggregator::new(StagePlan::new(Vec::new()));
        assert!(agg.current_agent().is_none());
        assert!(agg.is_finished());
    }

    #[test]
    fn test_forward_scan() {
        let mut agg = ProgressAggregator::new(StagePlan::content_pipeline());
        let now = Utc::now();

        let t = agg
            .record_progress(progress("Content Planner", "create_content_plan"), now)
            .unwrap();
        assert_eq!(t.previous.as_deref(), Some("Content Planner"));
        assert_eq!(t.current.as_deref(), Some("Sentiment Analyst"));

        // Out of order: trends before sentiment leaves sentiment current.
        assert!(agg
            .record_progress(progress("Trend Researcher", "research_trends"), now)
            .is_none());
        assert_eq!(agg.current_agent(), Some("Sentiment Analyst"));

        let t = agg
            .record_progress(progress("Sentiment Analyst", "analyze_sentiment"), now)
            .unwrap();
        assert!(t.current.is_none());
        assert!(agg.is_finished());
        assert_eq!(
            agg.completed_agents(),
            vec!["Content Planner", "Sentiment Analyst", "Trend Researcher"]
        );
    }

    #[test]
    fn test_current_agent_always_in_plan() {
        let plan = StagePlan::content_pipeline();
        let mut agg = ProgressAggregator::new(plan.clone());
        let now = Utc::now();

        for (agent, task) in [
            ("Ghost Writer", "write_copy"),
            ("Trend Researcher", "research_trends"),
            ("", ""),
            ("Content Planner", "create_content_plan"),
            ("Content Planner", "create_content_plan"),
            ("Sentiment Analyst", "analyze_sentiment"),
        ] {
            agg.record_progress(progress(agent, task), now);
            if let Some(current) = agg.current_agent() {
                assert!(plan.contains_agent(current));
            }
        }
        assert!(agg.current_agent().is_none());
    }

    #[test]
    fn test_repeated_updates_replace_entry() {
        let mut agg = ProgressAggregator::new(StagePlan::content_pipeline());
        let start = Utc::now();
        let later = start + Duration::seconds(2);

        agg.record_progress(
            progress("Content Planner", "create_content_plan").with_output("draft"),
            start,
        );
        let second = agg.record_progress(
            progress("Content Planner", "create_content_plan").with_output("final"),
            later,
        );

        assert!(second.is_none());
        assert_eq!(agg.timeline().len(), 1);
        let entry = &agg.timeline()[0];
        assert_eq!(entry.output, "final");
        assert_eq!(entry.start_time, start);
        assert_eq!(entry.end_time, later);
        assert_eq!(entry.duration_ms, 2000);
        assert_eq!(agg.events().len(), 2);
    }

    #[test]
    fn test_progress_without_output_keeps_previous_text() {
        let mut agg = ProgressAggregator::new(StagePlan::content_pipeline());
        let now = Utc::now();

        agg.record_progress(
            progress("Content Planner", "create_content_plan").with_output("draft"),
            now,
        );
        agg.record_progress(progress("Content Planner", "create_content_plan"), now);

        assert_eq!(agg.timeline()[0].output, "draft");
    }

    #[test]
    fn test_task_output_after_progress() {
        let mut agg = ProgressAggregator::new(StagePlan::content_pipeline());
        let now = Utc::now();

        agg.record_progress(progress("Content Planner", "create_content_plan"), now);
        let change = agg.record_task_output(&TaskOutput::new("create_content_plan", "Plan text"), now);

        assert!(change.is_none());
        assert_eq!(agg.timeline().len(), 1);
        assert_eq!(agg.timeline()[0].agent, "Content Planner");
        assert_eq!(agg.timeline()[0].output, "Plan text");
        assert_eq!(agg.completed_agents(), vec!["Content Planner"]);
    }

    #[test]
    fn test_task_output_without_progress() {
        let mut agg = ProgressAggregator::new(StagePlan::content_pipeline());
        let now = Utc::now();

        let change = agg
            .record_task_output(
                &TaskOutput::new("whatever", "Positive").with_agent("Sentiment Analyst"),
                now,
            )
            .is_some();
        assert!(!change);
        assert_eq!(agg.current_agent(), Some("Content Planner"));

        agg.record_task_output(&TaskOutput::new("create_content_plan", "Plan"), now);
        assert_eq!(agg.current_agent(), Some("Trend Researcher"));
    }

    #[test]
    fn test_unmapped_task_output_ignored() {
        let mut agg = ProgressAggregator::new(StagePlan::content_pipeline());
        let change = agg.record_task_output(&TaskOutput::new("write_press_release", "x"), Utc::now());

        assert!(change.is_none());
        assert!(agg.timeline().is_empty());
        assert_eq!(agg.current_agent(), Some("Content Planner"));
    }

    #[test]
    fn test_snapshot() {
        let mut agg = ProgressAggregator::new(StagePlan::content_pipeline());
        let now = Utc::now();
        agg.record_progress(progress("Content Planner", "create_content_plan"), now);

        let snapshot = agg.snapshot();
        assert_eq!(snapshot.current_agent.as_deref(), Some("Sentiment Analyst"));
        assert_eq!(snapshot.completed_agents, vec!["Content Planner"]);
        assert_eq!(snapshot.timeline.len(), 1);
        assert_eq!(agg.first_seen("Content Planner"), Some(now));
    }
}
