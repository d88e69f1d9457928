//! Audiveris optical music recognition adapter
//!
//! Runs `audiveris -batch -transcribe -export -output <dir> <pages...>`.
//! Audiveris writes one book folder per input image containing `.mxl`
//! exports, with `.mvt<N>` suffixes when a page holds several movements.

use super::process::run_to_completion;
use super::{CapabilityError, Recognizer};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Subprocess-backed recognizer
#[derive(Debug, Clone)]
pub struct AudiverisRecognizer {
    binary: String,
}

impl AudiverisRecognizer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, pages: &[PathBuf], output_dir: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("-batch")
            .arg("-transcribe")
            .arg("-export")
            .arg("-output")
            .arg(output_dir)
            .args(pages);
        command
    }
}

#[async_trait::async_trait]
impl Recognizer for AudiverisRecognizer {
    fn name(&self) -> &'static str {
        "audiveris"
    }

    async fn recognize(&self, pages: &[PathBuf], output_dir: &Path) -> Result<(), CapabilityError> {
        tracing::info!(
            binary = %self.binary,
            pages = pages.len(),
            output_dir = %output_dir.display(),
            "Running optical music recognition"
        );

        let output = run_to_completion(&self.binary, self.command(pages, output_dir)).await?;

        tracing::debug!(
            stdout_bytes = output.stdout.len(),
            "Optical music recognition finished"
        );
        Ok(())
    }
}
