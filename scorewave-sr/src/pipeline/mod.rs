//! Score assembly and rendering pipeline
//!
//! images → validated pages → notation fragments → assembled score →
//! performance timeline → waveform
//!
//! Each stage lives in its own module; [`PipelineOrchestrator`] sequences
//! them for one request.

pub mod assembler;
pub mod density;
pub mod error;
pub mod image_validator;
pub mod orchestrator;
pub mod recognition;
pub mod renderer;
pub mod timeline;
pub mod workspace;

pub use assembler::{AssembledFragment, AssembledScore, AssemblyOutcome, ScoreAssembler};
pub use density::{detect_dpi, read_dpi, Dpi, DEFAULT_DPI};
pub use error::{ImageRejection, PipelineError};
pub use image_validator::{ImageValidator, MIN_DPI};
pub use orchestrator::{PipelineConfig, PipelineOrchestrator, PipelineOutput};
pub use recognition::{discover_fragments, DiscoveredFragment, RecognitionInvoker};
pub use renderer::{AudioRenderer, RenderedAudio};
pub use timeline::{PerformanceTimeline, TimedEvent, TimelineError, TimelineEvent};
pub use workspace::{StoredPage, Workspace};
