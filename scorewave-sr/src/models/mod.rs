//! Data models for scorewave-sr (Score Renderer)
//!
//! - Page images as received at the request boundary
//! - Pipeline run state machine

pub mod page_image;
pub mod pipeline_run;

pub use page_image::PageImage;
pub use pipeline_run::{FailureKind, PipelineRun, PipelineState, StateTransition};
