//! Error types for API handlers.
//!
//! Bridges the engine's typed errors to HTTP responses with
//! `{code, message, details}` bodies.

use crate::error::EngineError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Application error type for API handlers.
///
/// Implements Axum's `IntoResponse` so handlers can return
/// `Result<Json<T>, ApiError>` and `?` through engine calls.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: String,
    details: Option<serde_json::Value>,
    source: Option<anyhow::Error>,
}

impl ApiError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            details: None,
            source: None,
        }
    }

    /// Attach structured details for the client.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach a source error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "VALIDATION_ERROR".to_string(),
        )
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            message.into(),
            "AUTHENTICATION_ERROR".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// The HTTP status (for tests).
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let code = err.code().to_string();
        match err {
            EngineError::Validation(message) => {
                Self::new(StatusCode::BAD_REQUEST, message, code)
            }
            EngineError::Authentication(message) => {
                Self::new(StatusCode::UNAUTHORIZED, message, code)
            }
            EngineError::Authorization(message) => {
                Self::new(StatusCode::FORBIDDEN, message, code)
            }
            EngineError::NotFound { resource, ref id } => Self::new(
                StatusCode::NOT_FOUND,
                format!("{resource} {id} not found"),
                code,
            )
            .with_details(serde_json::json!({ "resource": resource, "id": id })),
            EngineError::Conflict(message) => Self::new(StatusCode::CONFLICT, message, code),
            EngineError::SeatLocked { expires_in } => Self::new(
                StatusCode::LOCKED,
                "seat is locked by another request".to_string(),
                code,
            )
            .with_details(serde_json::json!({ "expiresIn": expires_in })),
            EngineError::Payment(message) => {
                Self::new(StatusCode::PAYMENT_REQUIRED, message, code)
            }
            EngineError::StoreUnavailable(message) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "a backing store is unavailable".to_string(),
                code,
            )
            .with_source(anyhow::anyhow!(message)),
        }
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                code = %self.code,
                message = %self.message,
                source = ?self.source,
                "Server error"
            );
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };

        (self.status, Json(body)).into_response()
    }
}
