//! # Request Extraction Helpers
//!
//! Handlers take `Result<Json<_>, JsonRejection>` and
//! `Result<Path<_>, PathRejection>` and call these helpers, so extraction
//! failures become [`AppError`]s and render as the standard envelope instead
//! of axum's plain-text rejections.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::Json;
use roster_core::{Document, ProfileId};
use serde_json::Value;

use crate::error::AppError;

pub const INVALID_BODY: &str = "invalid JSON body";
pub const INVALID_ID: &str = "invalid id";
pub const MISSING_ID: &str = "id missing in params";

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result.map(|Json(v)| v).map_err(|err| {
        tracing::debug!(rejection = %err.body_text(), "malformed request body");
        AppError::BadRequest(INVALID_BODY.to_string())
    })
}

/// Extract a JSON body that must be an object.
pub fn extract_document(result: Result<Json<Value>, JsonRejection>) -> Result<Document, AppError> {
    match extract_json(result)? {
        Value::Object(doc) => Ok(doc),
        other => {
            tracing::debug!(kind = json_kind(&other), "request body is not a JSON object");
            Err(AppError::BadRequest(INVALID_BODY.to_string()))
        }
    }
}

/// Extract and parse the `{id}` path segment.
pub fn extract_id(result: Result<Path<String>, PathRejection>) -> Result<ProfileId, AppError> {
    let Path(raw) = result.map_err(|err| {
        tracing::debug!(rejection = %err.body_text(), "bad path parameter");
        AppError::BadRequest(INVALID_ID.to_string())
    })?;
    parse_id(&raw)
}

/// Parse a raw identifier: blank is "missing", anything else must be a UUID.
pub fn parse_id(raw: &str) -> Result<ProfileId, AppError> {
    if raw.trim().is_empty() {
        return Err(AppError::BadRequest(MISSING_ID.to_string()));
    }
    raw.parse().map_err(|err| {
        tracing::debug!(error = %err, "unparseable profile id");
        AppError::BadRequest(INVALID_ID.to_string())
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
