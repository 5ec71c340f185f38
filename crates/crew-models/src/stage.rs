//! Pipeline stages and the task → agent lookup table.
//!
//! The content crew runs a fixed, ordered list of stages. Each stage is an
//! agent with one task. Workers do not always name the agent when they
//! report a task output, so the table below resolves it from the task name.
//!
//! Lookup policy for a task name:
//! 1. exact match on a stage's task key;
//! 2. case-insensitive substring match (e.g. `create_content_plan_task`);
//! 3. otherwise the task is unmapped and callers ignore it.

use serde::{Deserialize, Serialize};

/// The stages of the content pipeline, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Builds the content plan.
    ContentPlanner,
    /// Analyzes audience sentiment.
    SentimentAnalyst,
    /// Researches market trends.
    TrendResearcher,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 3] = [
        Stage::ContentPlanner,
        Stage::SentimentAnalyst,
        Stage::TrendResearcher,
    ];

    /// Display name of the agent, as the worker reports it.
    pub fn agent_name(&self) -> &'static str {
        match self {
            Stage::ContentPlanner => "Content Planner",
            Stage::SentimentAnalyst => "Sentiment Analyst",
            Stage::TrendResearcher => "Trend Researcher",
        }
    }

    /// Task key the stage's agent runs.
    pub fn task_key(&self) -> &'static str {
        match self {
            Stage::ContentPlanner => "create_content_plan",
            Stage::SentimentAnalyst => "analyze_sentiment",
            Stage::TrendResearcher => "research_trends",
        }
    }
}

/// One entry of a [`StagePlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Agent name.
    pub agent: String,
    /// Task key run by the agent.
    pub task: String,
}

impl StageSpec {
    /// Creates a stage spec.
    pub fn new(agent: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            task: task.into(),
        }
    }
}

impl From<Stage> for StageSpec {
    fn from(stage: Stage) -> Self {
        Self::new(stage.agent_name(), stage.task_key())
    }
}

/// Ordered list of expected stages for one pipeline.
///
/// The default plan is the content pipeline from [`Stage::ALL`]. Callers
/// may supply their own order. Task lookups follow the policy in the module
/// docs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePlan {
    stages: Vec<StageSpec>,
}

impl StagePlan {
    /// Creates a plan from an ordered list of stages.
    pub fn new(stages: Vec<StageSpec>) -> Self {
        Self { stages }
    }

    /// The content pipeline: planner, sentiment, trends.
    pub fn content_pipeline() -> Self {
        Self::new(Stage::ALL.into_iter().map(StageSpec::from).collect())
    }

    /// Stages in order.
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Agent names in order.
    pub fn agents(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.agent.as_str())
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the plan has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns true if `agent` is one of the plan's stages.
    pub fn contains_agent(&self, agent: &str) -> bool {
        self.agents().any(|a| a == agent)
    }

    /// Resolves the agent that runs `task`, or `None` if unmapped.
    pub fn agent_for_task(&self, task: &str) -> Option<&str> {
        let lowered = task.to_lowercase();
        self.stages
            .iter()
            .find(|s| s.task == task)
            .or_else(|| {
                self.stages
                    .iter()
                    .find(|s| !s.task.is_empty() && lowered.contains(&s.task.to_lowercase()))
            })
            .map(|s| s.agent.as_str())
    }
}

impl Default for StagePlan {
    fn default() -> Self {
        Self::content_pipeline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let names: Vec<&str> = Stage::ALL.iter().map(|s| s.agent_name()).collect();
        assert_eq!(
            names,
            vec!["Content Planner", "Sentiment Analyst", "Trend Researcher"]
        );
    }

    #[test]
    fn test_task_lookup_exact_and_substring() {
        let plan = StagePlan::content_pipeline();
        assert_eq!(plan.agent_for_task("create_content_plan"), Some("Content Planner"));
        assert_eq!(plan.agent_for_task("Research_Trends_v2"), Some("Trend Researcher"));
        assert_eq!(plan.agent_for_task("write_press_release"), None);
        assert!(!plan.contains_agent("sentiment analyst"));
    }

    #[test]
    fn test_plan_lookup() {
        let plan = StagePlan::content_pipeline();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.agents().last(), Some("Trend Researcher"));
        assert!(plan.contains_agent("Content Planner"));
        assert_eq!(plan.agent_for_task("analyze_sentiment"), Some("Sentiment Analyst"));
        assert_eq!(plan.agent_for_task("unknown"), None);
    }

    #[test]
    fn test_custom_plan() {
        let plan = StagePlan::new(vec![
            StageSpec::new("Writer", "draft"),
            StageSpec::new("Editor", "review_draft"),
        ]);
        // Exact match wins over the earlier substring hit.
        assert_eq!(plan.agent_for_task("review_draft"), Some("Editor"));
        assert_eq!(plan.agent_for_task("final_draft"), Some("Writer"));
        assert_eq!(plan.agents().collect::<Vec<_>>(), vec!["Writer", "Editor"]);
    }
}
