//! Per-account audio library endpoints

use super::multipart_error;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Multipart field carrying the uploaded waveform
pub const UPLOAD_FIELD: &str = "file_";

#[derive(Debug, Deserialize)]
pub struct FilenameQuery {
    /// Entry name without the `.wav` extension
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /:user_id/upload_audio?filename=
///
/// Stores the `file_` part as `<filename>.wav`, replacing any entry with
/// the same name.
pub async fn upload_audio(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<FilenameQuery>,
    mut multipart: Multipart,
) -> ApiResult<Json<MessageResponse>> {
    let mut content = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(UPLOAD_FIELD) {
            content = Some(field.bytes().await.map_err(multipart_error)?);
            break;
        }
    }
    let content = content
        .ok_or_else(|| ApiError::BadRequest(format!("Missing multipart field '{}'", UPLOAD_FIELD)))?;

    state.library.save(user_id, &query.filename, &content).await?;

    Ok(Json(MessageResponse {
        message: format!("File {}.wav uploaded successfully.", query.filename),
    }))
}

/// GET /:user_id/my_music
///
/// `[[name, base64], ...]` sorted by name; empty for unknown accounts.
pub async fn my_music(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<(String, String)>>> {
    let entries = state.library.list(user_id).await?;
    Ok(Json(
        entries
            .into_iter()
            .map(|entry| (entry.name, entry.payload))
            .collect(),
    ))
}

/// PUT /:user_id/my_music/delete?filename=
///
/// **Errors:** 404 Not Found when no such entry exists
pub async fn delete_music(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<FilenameQuery>,
) -> ApiResult<Json<MessageResponse>> {
    state.library.delete(user_id, &query.filename).await?;
    Ok(Json(MessageResponse {
        message: format!("File {}.wav deleted.", query.filename),
    }))
}

/// Build library routes
pub fn library_routes() -> Router<AppState> {
    Router::new()
        .route("/:user_id/upload_audio", post(upload_audio))
        .route("/:user_id/my_music", get(my_music))
        .route("/:user_id/my_music/delete", put(delete_music))
}
