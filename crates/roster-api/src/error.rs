//! # API Error Types
//!
//! [`AppError`] is the single failure type returned by handlers. Its
//! [`IntoResponse`] impl renders the standard [`Envelope`], so failures have
//! the same shape as successes. Internal error details are never sent to
//! clients; they are logged and replaced with "internal server error".

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use roster_schema::ValidationViolations;
use thiserror::Error;

use crate::envelope::Envelope;
use crate::store::StoreError;

/// Message returned for every 500 response.
pub const INTERNAL_MESSAGE: &str = "internal server error";

/// Message for a profile id with no stored profile.
pub const USER_NOT_FOUND: &str = "user not found";

/// Message for a write that would duplicate a profile name.
pub const USER_EXISTS: &str = "user already exists";

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Payload failed schema validation (400). `violations` goes out as `data`.
    #[error("{message}")]
    Validation {
        message: String,
        violations: Vec<String>,
    },

    /// Malformed request: bad JSON, bad id, bad paging (400).
    #[error("{0}")]
    BadRequest(String),

    /// Resource not found (404).
    #[error("{0}")]
    NotFound(String),

    /// Path exists but not for this method (405).
    #[error("{0}")]
    MethodNotAllowed(String),

    /// The request outlived the configured timeout (408).
    #[error("{0}")]
    Timeout(String),

    /// Uniqueness conflict (409).
    #[error("{0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Build a validation error from the violations the schema produced.
    pub fn validation(message: impl Into<String>, violations: &ValidationViolations) -> Self {
        Self::Validation {
            message: message.into(),
            violations: violations.messages(),
        }
    }

    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::MethodNotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED"),
            Self::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, "REQUEST_TIMEOUT"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        match self {
            Self::Validation {
                message,
                violations,
            } => Envelope::new(status, message, Some(violations)).into_response(),
            Self::Internal(cause) => {
                tracing::error!(error = %cause, code, "internal server error");
                Envelope::empty(status, INTERNAL_MESSAGE).into_response()
            }
            other => {
                tracing::debug!(code, message = %other, "request rejected");
                Envelope::empty(status, other.to_string()).into_response()
            }
        }
    }
}

/// Convert store errors to API errors.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound(USER_NOT_FOUND.to_string()),
            StoreError::Conflict { .. } => Self::Conflict(USER_EXISTS.to_string()),
            StoreError::Corrupt(_) | StoreError::Database(_) => Self::Internal(err.to_string()),
        }
    }
}
