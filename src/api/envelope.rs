//! Uniform response envelope and request-failure mapping.
//!
//! Every endpoint answers with `{success, data?, error?, message?}`. Failures
//! come in exactly three kinds: validation (400, message names the field),
//! not-found (404) and unexpected (500, generic message, detail only in the
//! server log).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// The `{success, data, error, message}` wrapper returned by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Envelope {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        })
    }

    pub fn ok_with_message(data: T, message: &str) -> Json<Self> {
        Json(Envelope {
            success: true,
            data: Some(data),
            error: None,
            message: Some(message.to_string()),
        })
    }
}

/// Message-only success body, used by deletes.
pub fn ok_message(message: &str) -> Json<Envelope<()>> {
    Json(Envelope {
        success: true,
        data: None,
        error: None,
        message: Some(message.to_string()),
    })
}

/// A request-level failure carrying its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    /// Log the underlying error server-side and hand the client a generic
    /// message only.
    pub fn internal(message: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "{message}");
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(Envelope::<()> {
            success: false,
            data: None,
            error: Some(self.message),
            message: None,
        });
        (self.status, body).into_response()
    }
}
