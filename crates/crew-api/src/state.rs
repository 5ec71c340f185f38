//! Application state shared across handlers.

use std::sync::Arc;

use crew_runtime::CrewRunner;

use crate::config::ApiConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: Arc<ApiConfig>,
    /// Runner that launches one worker per request.
    pub runner: Arc<CrewRunner>,
}

impl AppState {
    /// Creates a new AppState.
    pub fn new(config: ApiConfig, runner: CrewRunner) -> Self {
        Self {
            config: Arc::new(config),
            runner: Arc::new(runner),
        }
    }
}
