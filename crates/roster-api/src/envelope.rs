//! # Response Envelope
//!
//! Every response body, success or failure, has the same shape:
//!
//! ```json
//! {"msg": "user fetched successfully", "data": {...}, "status": 200}
//! ```
//!
//! List responses add `"totalcount"`. The HTTP status line always equals
//! `status`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Uniform JSON response wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub msg: String,
    pub data: Option<T>,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totalcount: Option<u64>,
}

impl<T> Envelope<T> {
    pub fn new(status: StatusCode, msg: impl Into<String>, data: Option<T>) -> Self {
        Self {
            msg: msg.into(),
            data,
            status: status.as_u16(),
            totalcount: None,
        }
    }

    /// A 200 envelope carrying `data`.
    pub fn ok(msg: impl Into<String>, data: T) -> Self {
        Self::new(StatusCode::OK, msg, Some(data))
    }

    /// Attach the total-count field of list responses.
    pub fn with_total(mut self, total: u64) -> Self {
        self.totalcount = Some(total);
        self
    }
}

impl Envelope<()> {
    /// An envelope with `data: null`.
    pub fn empty(status: StatusCode, msg: impl Into<String>) -> Self {
        Self::new(status, msg, None)
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
