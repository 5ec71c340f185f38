//! Request DTOs for the API.

use serde::Deserialize;

use crew_models::WorkerRequest;

/// Chat request accepted by both crew endpoints.
///
/// Clients send either `message` or `user_input`; `message` wins when both
/// carry text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrewChatRequest {
    /// Chat message.
    #[serde(default)]
    pub message: Option<String>,
    /// Alternative name for the chat message.
    #[serde(default)]
    pub user_input: Option<String>,
    /// Requested output language.
    #[serde(default)]
    pub language: Option<String>,
    /// Optional campaign context.
    #[serde(default)]
    pub campaign_context: Option<String>,
}

impl CrewChatRequest {
    /// Builds the payload written to the worker.
    pub fn into_worker_request(self) -> WorkerRequest {
        let message = [self.message, self.user_input]
            .into_iter()
            .flatten()
            .find(|m| !m.trim().is_empty());

        WorkerRequest::new(message)
            .with_language(self.language)
            .with_campaign_context(self.campaign_context)
    }
}
