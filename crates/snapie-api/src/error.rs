//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Every failure maps to a stable code in a JSON body:
//!
//! ```json
//! {"error": {"code": "NOT_FOUND", "message": "...", "details": {...}}}
//! ```
//!
//! Server-side failures (500/502/503) are logged here, once, and answered
//! with a generic message. Gateway and store internals never reach clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use snapie_core::ValidationError;
use snapie_ipfs::{GatewayError, PinError};
use snapie_store::StoreError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable code, e.g. `"NOT_FOUND"`.
    pub code: String,
    pub message: String,
    /// Extra context for client errors only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Required upload metadata absent (422, field list in `details`).
    #[error("missing required metadata: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credential (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller is known but not allowed, e.g. a banned uploader (403).
    /// The message is the reason shown to the client.
    #[error("{0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("rate limit exceeded")]
    RateLimited,

    /// Every gateway candidate failed (502). Cause is logged only.
    #[error("content unavailable: {0}")]
    ContentUnavailable(String),

    /// A required backend is not configured or not reachable (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Message is logged but not returned to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) | Self::MissingFields(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
            }
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            Self::ContentUnavailable(_) => (StatusCode::BAD_GATEWAY, "CONTENT_UNAVAILABLE"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn is_server_side(&self) -> bool {
        matches!(
            self,
            Self::ContentUnavailable(_) | Self::ServiceUnavailable(_) | Self::Internal(_)
        )
    }

    fn client_message(&self) -> String {
        match self {
            Self::ContentUnavailable(_) => "Content is not available from any gateway".into(),
            Self::ServiceUnavailable(_) => "Service temporarily unavailable".into(),
            Self::Internal(_) => "An internal error occurred".into(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if self.is_server_side() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        }

        let mut body = ErrorBody::new(code, self.client_message());
        if let Self::MissingFields(fields) = &self {
            body.error.details = Some(serde_json::json!({ "required": fields }));
        }

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::MissingMetadata(fields) => Self::MissingFields(fields),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::LifecycleConflict(p) => {
                Self::Conflict(format!("record {p} was modified concurrently"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        Self::ContentUnavailable(err.to_string())
    }
}

impl From<PinError> for AppError {
    fn from(err: PinError) -> Self {
        Self::Internal(format!("content store: {err}"))
    }
}
