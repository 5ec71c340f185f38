//! Worker request payload.
//!
//! A request is built once per client call, serialized to JSON and written
//! to the worker's stdin. It is never mutated after construction.

use serde::{Deserialize, Serialize};

/// Text sent in place of an empty or whitespace-only client message.
pub const PLACEHOLDER_MESSAGE: &str = "No message provided.";

/// Output language used when the client does not pick one.
pub const DEFAULT_OUTPUT_LANGUAGE: &str = "English";

/// Payload written to the worker's stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// The instruction the crew acts on. Never empty.
    pub user_input: String,

    /// The raw client message, when one was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Optional campaign context forwarded verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_context: Option<String>,

    /// Language requested by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Language the crew should answer in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_language: Option<String>,
}

impl WorkerRequest {
    /// Creates a request from a client chat message.
    ///
    /// Blank messages are replaced with [`PLACEHOLDER_MESSAGE`] so the worker
    /// never receives an empty instruction.
    pub fn new(message: Option<String>) -> Self {
        let message = message.filter(|m| !m.trim().is_empty());
        let user_input = message
            .clone()
            .unwrap_or_else(|| PLACEHOLDER_MESSAGE.to_string());

        Self {
            user_input,
            message,
            campaign_context: None,
            language: None,
            output_language: Some(DEFAULT_OUTPUT_LANGUAGE.to_string()),
        }
    }

    /// Sets the requested language; also used as the output language.
    pub fn with_language(mut self, language: Option<String>) -> Self {
        let language = language.filter(|l| !l.trim().is_empty());
        self.output_language = Some(
            language
                .clone()
                .unwrap_or_else(|| DEFAULT_OUTPUT_LANGUAGE.to_string()),
        );
        self.language = language;
        self
    }

    /// Sets the campaign context.
    pub fn with_campaign_context(mut self, context: Option<String>) -> Self {
        self.campaign_context = context.filter(|c| !c.trim().is_empty());
        self
    }

    /// Returns true if the instruction is the placeholder text.
    pub fn is_placeholder(&self) -> bool {
        self.message.is_none()
    }

    /// Serializes the request as the UTF-8 JSON line written to stdin.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
