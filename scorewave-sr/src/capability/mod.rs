//! External capabilities used by the pipeline
//!
//! Optical music recognition and audio synthesis are opaque to the pipeline.
//! Each is a trait with two implementations:
//! - a subprocess adapter ([`AudiverisRecognizer`], [`FluidSynthSynthesizer`])
//! - a canned adapter for deterministic tests ([`CannedRecognizer`], [`CannedSynthesizer`])
//!
//! Adapters run to completion. Time limits are applied by the caller; a
//! dropped call kills the child process.

pub mod audiveris;
pub mod canned;
pub mod fluidsynth;
pub mod process;

pub use audiveris::AudiverisRecognizer;
pub use canned::{CannedRecognizer, CannedSynthesizer};
pub use fluidsynth::FluidSynthSynthesizer;

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Capability invocation errors
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// Process could not be started (binary missing, permissions)
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Process ran and reported failure
    #[error("{program} exited with status {}: {diagnostic}", status.map(|c| c.to_string()).unwrap_or_else(|| "unknown (terminated by signal)".to_string()))]
    Failed {
        program: String,
        status: Option<i32>,
        diagnostic: String,
    },

    /// Process reported success but the expected output is missing
    #[error("{program} produced no output at {}", path.display())]
    MissingOutput { program: String, path: PathBuf },

    /// I/O error while talking to the process or preparing its files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Optical music recognition capability
///
/// Receives every page of one request in page order and writes notation
/// fragments somewhere below `output_dir`.
#[async_trait::async_trait]
pub trait Recognizer: Send + Sync {
    /// Capability name for logging
    fn name(&self) -> &'static str;

    async fn recognize(&self, pages: &[PathBuf], output_dir: &Path) -> Result<(), CapabilityError>;
}

/// Audio synthesis capability
///
/// Renders a Standard MIDI File with the given sound bank into a WAV file.
#[async_trait::async_trait]
pub trait Synthesizer: Send + Sync {
    /// Capability name for logging
    fn name(&self) -> &'static str;

    async fn synthesize(
        &self,
        timeline: &Path,
        sound_bank: &Path,
        output: &Path,
    ) -> Result<(), CapabilityError>;
}
