//! FluidSynth synthesis adapter
//!
//! Runs `fluidsynth -ni <sound bank> <timeline.mid> -F <output.wav>`.

use super::process::run_to_completion;
use super::{CapabilityError, Synthesizer};
use std::path::Path;
use tokio::process::Command;

/// Subprocess-backed synthesizer
#[derive(Debug, Clone)]
pub struct FluidSynthSynthesizer {
    binary: String,
}

impl FluidSynthSynthesizer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait::async_trait]
impl Synthesizer for FluidSynthSynthesizer {
    fn name(&self) -> &'static str {
        "fluidsynth"
    }

    async fn synthesize(
        &self,
        timeline: &Path,
        sound_bank: &Path,
        output: &Path,
    ) -> Result<(), CapabilityError> {
        tracing::info!(
            binary = %self.binary,
            sound_bank = %sound_bank.display(),
            "Synthesizing waveform"
        );

        let mut command = Command::new(&self.binary);
        command
            .arg("-ni")
            .arg(sound_bank)
            .arg(timeline)
            .arg("-F")
            .arg(output);
        run_to_completion(&self.binary, command).await?;

        // FluidSynth exits 0 for some unreadable inputs without writing anything
        let written = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(CapabilityError::MissingOutput {
                program: self.binary.clone(),
                path: output.to_path_buf(),
            });
        }

        Ok(())
    }
}
