//! Error types for the gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Gateway error types.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    #[error("Challenge not found")]
    ChallengeNotFound,

    #[error("Challenge mismatch")]
    ChallengeMismatch,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Direct token issue is disabled")]
    DirectIssueDisabled,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Notification failure: {0}")]
    NotificationFailure(String),

    #[error("Signing failure: {0}")]
    SigningFailure(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl GatewayError {
    /// Status code and stable error code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            GatewayError::InvalidPhoneNumber(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_PHONE_NUMBER")
            }
            GatewayError::ChallengeNotFound | GatewayError::ChallengeMismatch => {
                (StatusCode::NOT_FOUND, "CHALLENGE_NOT_FOUND")
            }
            GatewayError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            GatewayError::DirectIssueDisabled => (StatusCode::FORBIDDEN, "DIRECT_ISSUE_DISABLED"),
            GatewayError::RateLimitExceeded => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"),
            GatewayError::NotificationFailure(_)
            | GatewayError::SigningFailure(_)
            | GatewayError::Storage(_)
            | GatewayError::Database(_)
            | GatewayError::Upstream(_)
            | GatewayError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Internal failures are detailed in the log only.
        let message = if status.is_server_error() {
            error!(error = %self, "Request failed with internal error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::InvalidRequest(format!("Malformed JSON body: {}", e))
    }
}

impl From<redis::RedisError> for GatewayError {
    fn from(e: redis::RedisError) -> Self {
        GatewayError::Storage(e.to_string())
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(e: sqlx::Error) -> Self {
        GatewayError::Database(e.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for GatewayError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        GatewayError::SigningFailure(e.to_string())
    }
}

impl From<twilio_client::TwilioError> for GatewayError {
    fn from(e: twilio_client::TwilioError) -> Self {
        GatewayError::NotificationFailure(e.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Upstream(e.to_string())
    }
}
