//! scorewave-sr library interface
//!
//! Exposes the pipeline, collaborators and router for the binary and for
//! integration tests.

pub mod api;
pub mod capability;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notation;
pub mod pipeline;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use pipeline::PipelineOrchestrator;
use services::{AccountStore, AudioLibrary};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Request body limit when none is configured
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Rendering pipeline; each call runs in its own workspace
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub accounts: Arc<dyn AccountStore>,
    pub library: Arc<dyn AudioLibrary>,
    /// Request body limit applied to every route
    pub max_upload_bytes: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last failed rendering request, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        orchestrator: PipelineOrchestrator,
        accounts: Arc<dyn AccountStore>,
        library: Arc<dyn AudioLibrary>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            accounts,
            library,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .merge(api::process_routes())
        .merge(api::account_routes())
        .merge(api::library_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
