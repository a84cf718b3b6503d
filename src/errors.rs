use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

const GENERIC_FAILURE_MESSAGE: &str = "Order processing failed. Please try again.";

fn current_request_id() -> Option<String> {
    crate::telemetry::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Body returned for every non-2xx answer.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`; mirrors the `success` flag of the confirmation body
    pub success: bool,
    /// Human-readable error description
    pub message: String,
    /// Request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::MalformedBody(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return a generic message; details stay in the logs.
    pub fn response_message(&self) -> String {
        match self {
            Self::MalformedBody(_) | Self::InternalError(_) | Self::Other(_) => {
                GENERIC_FAILURE_MESSAGE.to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Order processing error");
        }

        let body = ErrorResponse {
            success: false,
            message: self.response_message(),
            request_id: current_request_id(),
        };

        (status, Json(body)).into_response()
    }
}
