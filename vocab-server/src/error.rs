//! HTTP error responses
//!
//! Every error renders as `{"error": {"code", "message"}}`. Rejected form
//! submissions also echo the submitted `input`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;
use vocab_common::Error as CommonError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Registry error, mapped by kind
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Malformed request outside the registry taxonomy (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// A form submission that failed, with the input echoed back
    #[error("{error}")]
    Rejected { error: CommonError, input: Value },

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Wrap a failed form submission so the response carries the input
    pub fn rejected(error: CommonError, input: &impl Serialize) -> Self {
        ApiError::Rejected {
            error,
            input: serde_json::to_value(input).unwrap_or(Value::Null),
        }
    }
}

fn classify(err: &CommonError) -> (StatusCode, &'static str) {
    match err {
        CommonError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        CommonError::Format(_) => (StatusCode::BAD_REQUEST, "FORMAT_ERROR"),
        CommonError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        CommonError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "PERMISSION_DENIED"),
        CommonError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        CommonError::ConstraintViolation(_) => (StatusCode::CONFLICT, "CONSTRAINT_VIOLATION"),
        CommonError::Duplicate(_) => (StatusCode::CONFLICT, "DUPLICATE"),
        CommonError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        CommonError::Csv(_) => (StatusCode::BAD_REQUEST, "FORMAT_ERROR"),
        CommonError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        CommonError::Config(_) | CommonError::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    }
}

/// Registry messages are already prefixed by their kind ("Format error: ...");
/// the response carries the bare message under its code.
fn message_of(err: &CommonError) -> String {
    match err {
        CommonError::ConstraintViolation(m)
        | CommonError::Validation(m)
        | CommonError::Format(m)
        | CommonError::Duplicate(m)
        | CommonError::NotFound(m)
        | CommonError::PermissionDenied(m)
        | CommonError::Unauthorized(m) => m.clone(),
        other => other.to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, input) = match self {
            ApiError::Common(err) => {
                let (status, code) = classify(&err);
                (status, code, message_of(&err), None)
            }
            ApiError::Rejected { error, input } => {
                let (status, code) = classify(&error);
                (status, code, message_of(&error), Some(input))
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg, None),
        };

        if status.is_server_error() {
            error!(code, %message, "Request failed");
        }

        let mut body = json!({
            "error": {
                "code": code,
                "message": message,
            }
        });
        if let Some(input) = input {
            body["input"] = input;
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
