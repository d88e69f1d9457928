//! Error types for scorewave-sr
//!
//! Every handler error renders as
//! `{"error": {"code": ..., "message": ..., "details": ...}}`.

use crate::pipeline::PipelineError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Request body over the configured limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Pipeline failure, status taken from the failure kind
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// scorewave-common error
    #[error("{0}")]
    Common(#[from] scorewave_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use scorewave_common::Error as CommonError;

        let (status, error_code, message, details): (StatusCode, &str, String, Option<Value>) =
            match self {
                ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
                ApiError::PayloadTooLarge(msg) => {
                    (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg, None)
                }
                ApiError::Pipeline(ref err) => (
                    StatusCode::from_u16(err.status_code())
                        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                    err.code(),
                    err.to_string(),
                    err.details(),
                ),
                ApiError::Common(ref err) => {
                    let (status, code) = match err {
                        CommonError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                        CommonError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                        CommonError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                        _ => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR"),
                    };
                    (status, code, err.to_string(), None)
                }
            };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
