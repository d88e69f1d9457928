//! Pipeline failure taxonomy
//!
//! Every way an invocation can end unsuccessfully maps to one variant here,
//! and each variant carries a fixed status category, a machine code, and a
//! message naming the cause.

use super::timeline::TimelineError;
use crate::capability::CapabilityError;
use crate::models::FailureKind;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// Why a single page was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageRejection {
    /// Bytes do not decode as a supported raster image
    #[error("Page {page} ({filename}) is not a valid image: {reason}")]
    InvalidImage {
        page: usize,
        filename: String,
        reason: String,
    },

    /// Density below the minimum on at least one axis
    #[error("Page {page} ({filename}) resolution {dpi} DPI is below the required {minimum} DPI ({horizontal}x{vertical})")]
    ResolutionTooLow {
        page: usize,
        filename: String,
        /// Larger of the two detected axes
        dpi: u32,
        horizontal: u32,
        vertical: u32,
        minimum: u32,
    },
}

impl ImageRejection {
    pub fn status_code(&self) -> u16 {
        match self {
            ImageRejection::InvalidImage { .. } => 422,
            ImageRejection::ResolutionTooLow { .. } => 400,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ImageRejection::InvalidImage { .. } => "INVALID_IMAGE",
            ImageRejection::ResolutionTooLow { .. } => "RESOLUTION_TOO_LOW",
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            ImageRejection::InvalidImage { filename, .. }
            | ImageRejection::ResolutionTooLow { filename, .. } => filename,
        }
    }
}

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Request carried no pages
    #[error("No page images were submitted")]
    EmptyRequest,

    /// One or more pages rejected before recognition
    #[error("{}", describe_rejections(.rejections))]
    ValidationFailed { rejections: Vec<ImageRejection> },

    /// Recognition capability could not run or reported failure
    #[error("Recognition failed: {0}")]
    RecognitionFailed(#[source] CapabilityError),

    /// Recognition succeeded but produced fewer fragments than pages
    #[error("One or more images could not be recognized: expected at least {expected} notation fragments, found {found}")]
    IncompleteRecognition { expected: usize, found: usize },

    /// Every fragment was skipped
    #[error("No well-formed notation fragments to assemble ({skipped} skipped)")]
    AssemblyFailed { skipped: usize },

    /// Assembled score could not be expanded into a performance timeline
    #[error("Timeline conversion failed: {0}")]
    TimelineConversionFailed(#[from] TimelineError),

    /// Synthesis capability could not run, failed, or produced nothing
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(#[source] CapabilityError),

    /// External capability exceeded its time limit
    #[error("{stage} did not finish within {}s", limit.as_secs_f64())]
    Timeout { stage: &'static str, limit: Duration },

    /// Workspace I/O outside the capabilities
    #[error("Pipeline I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other unexpected failure
    #[error("Pipeline error: {0}")]
    Internal(String),
}

fn describe_rejections(rejections: &[ImageRejection]) -> String {
    let messages: Vec<String> = rejections.iter().map(ToString::to_string).collect();
    match messages.len() {
        0 => "Page validation failed".to_string(),
        1 => messages[0].clone(),
        n => format!("{} pages rejected: {}", n, messages.join("; ")),
    }
}

impl PipelineError {
    /// Terminal state kind recorded on the run
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::EmptyRequest => FailureKind::EmptyRequest,
            PipelineError::ValidationFailed { .. } => FailureKind::ValidationFailed,
            PipelineError::RecognitionFailed(_) => FailureKind::RecognitionFailed,
            PipelineError::IncompleteRecognition { .. } => FailureKind::IncompleteRecognition,
            PipelineError::AssemblyFailed { .. } => FailureKind::AssemblyFailed,
            PipelineError::TimelineConversionFailed(_) => FailureKind::TimelineConversionFailed,
            PipelineError::SynthesisFailed(_) => FailureKind::SynthesisFailed,
            PipelineError::Timeout { .. } => FailureKind::Timeout,
            PipelineError::Io(_) | PipelineError::Internal(_) => FailureKind::Unexpected,
        }
    }

    /// HTTP status category
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::EmptyRequest => 400,
            PipelineError::ValidationFailed { rejections } => rejections
                .first()
                .map(ImageRejection::status_code)
                .unwrap_or(400),
            PipelineError::IncompleteRecognition { .. } => 422,
            PipelineError::Timeout { .. } => 504,
            PipelineError::RecognitionFailed(_)
            | PipelineError::AssemblyFailed { .. }
            | PipelineError::TimelineConversionFailed(_)
            | PipelineError::SynthesisFailed(_)
            | PipelineError::Io(_)
            | PipelineError::Internal(_) => 500,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::EmptyRequest => "EMPTY_REQUEST",
            // A single rejection is reported under its own code
            PipelineError::ValidationFailed { rejections } if rejections.len() == 1 => {
                rejections[0].code()
            }
            PipelineError::ValidationFailed { .. } => "VALIDATION_FAILED",
            PipelineError::RecognitionFailed(_) => "RECOGNITION_FAILED",
            PipelineError::IncompleteRecognition { .. } => "INCOMPLETE_RECOGNITION",
            PipelineError::AssemblyFailed { .. } => "ASSEMBLY_FAILED",
            PipelineError::TimelineConversionFailed(_) => "TIMELINE_CONVERSION_FAILED",
            PipelineError::SynthesisFailed(_) => "SYNTHESIS_FAILED",
            PipelineError::Timeout { .. } => "TIMEOUT",
            PipelineError::Io(_) | PipelineError::Internal(_) => "PIPELINE_ERROR",
        }
    }

    /// Structured detail for the error body, when there is any
    pub fn details(&self) -> Option<Value> {
        match self {
            PipelineError::ValidationFailed { rejections } => {
                Some(json!({ "rejections": rejections }))
            }
            PipelineError::IncompleteRecognition { expected, found } => {
                Some(json!({ "expected": expected, "found": found }))
            }
            PipelineError::AssemblyFailed { skipped } => Some(json!({ "skipped": skipped })),
            PipelineError::Timeout { stage, limit } => Some(json!({
                "stage": stage,
                "limit_seconds": limit.as_secs_f64(),
            })),
            PipelineError::RecognitionFailed(CapabilityError::Failed { status, .. })
            | PipelineError::SynthesisFailed(CapabilityError::Failed { status, .. }) => {
                Some(json!({ "exit_status": status }))
            }
            _ => None,
        }
    }
}
