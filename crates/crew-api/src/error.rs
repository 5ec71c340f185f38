//! API error types.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crew_runtime::CrewError;

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// API error type for consistent error responses.
///
/// Worker failures keep their message; the worker's exit code never reaches
/// the client as a status code.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// The worker could not be started.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// The worker ran out of time.
    #[error("{0}")]
    GatewayTimeout(String),

    /// The worker failed or produced an unusable result.
    #[error("{0}")]
    BadGateway(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "status": "error",
            "error": self.to_string()
        }));
        (status, body).into_response()
    }
}

impl From<CrewError> for ApiError {
    fn from(err: CrewError) -> Self {
        let message = err.to_string();
        match err {
            CrewError::Launch { .. } => ApiError::ServiceUnavailable(message),
            CrewError::Timeout(_) => ApiError::GatewayTimeout(message),
            CrewError::WorkerExit { .. }
            | CrewError::Auth
            | CrewError::MalformedOutput { .. }
            | CrewError::WorkerReported(_) => ApiError::BadGateway(message),
            CrewError::Io(_) | CrewError::Encode(_) => ApiError::Internal(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
