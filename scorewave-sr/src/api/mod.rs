//! HTTP API handlers for scorewave-sr

pub mod accounts;
pub mod health;
pub mod library;
pub mod process_music;

pub use accounts::account_routes;
pub use health::health_routes;
pub use library::library_routes;
pub use process_music::process_routes;

use crate::ApiError;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

/// Map a multipart read failure, keeping the body-limit case distinct
pub(crate) fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(format!("Malformed multipart body: {}", err.body_text()))
    }
}
