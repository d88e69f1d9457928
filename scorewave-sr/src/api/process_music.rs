//! Score rendering endpoint
//!
//! `POST /process_music` takes the page images of one piece as multipart
//! parts and answers with the rendered waveform.

use super::multipart_error;
use crate::models::PageImage;
use crate::{ApiResult, AppState};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tracing::{debug, warn};

/// Multipart field carrying page images
pub const PAGE_FIELD: &str = "files";

pub const RUN_ID_HEADER: &str = "x-run-id";
pub const SCORE_DIGEST_HEADER: &str = "x-score-digest";
pub const SKIPPED_FRAGMENTS_HEADER: &str = "x-skipped-fragments";

/// POST /process_music
///
/// Pages are indexed in the order their parts appear in the body. Parts
/// named `files`, or any part carrying a filename, are treated as pages;
/// other parts are ignored.
///
/// **Errors:** see [`crate::pipeline::PipelineError::status_code`]
pub async fn process_music(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let mut pages = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let is_page = field.name() == Some(PAGE_FIELD) || field.file_name().is_some();
        if !is_page {
            debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }

        let index = pages.len();
        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("page-{}", index + 1));
        let bytes = field.bytes().await.map_err(multipart_error)?;

        debug!(page = index, filename = %filename, bytes = bytes.len(), "Page received");
        pages.push(PageImage::new(index, filename, bytes.to_vec()));
    }

    match state.orchestrator.run(pages).await {
        Ok(output) => {
            let headers = [
                ("content-type", "audio/wav".to_string()),
                (RUN_ID_HEADER, output.run.run_id.to_string()),
                (SCORE_DIGEST_HEADER, output.score_digest.clone()),
                (SKIPPED_FRAGMENTS_HEADER, output.skipped_fragments.to_string()),
            ];
            Ok((StatusCode::OK, headers, output.audio.wav).into_response())
        }
        Err(e) => {
            warn!(code = e.code(), "process_music failed: {}", e);
            *state.last_error.write().await = Some(e.to_string());
            Err(e.into())
        }
    }
}

/// Build score rendering routes
pub fn process_routes() -> Router<AppState> {
    Router::new().route("/process_music", post(process_music))
}
