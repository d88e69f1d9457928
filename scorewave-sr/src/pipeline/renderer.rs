//! Two-stage audio rendering
//!
//! Stage 1 expands the assembled score into a performance timeline and
//! writes it as a MIDI file. Stage 2 hands that file and the process-wide
//! sound bank to the synthesizer and reads back the waveform.

use super::assembler::AssembledScore;
use super::error::PipelineError;
use super::timeline::PerformanceTimeline;
use crate::capability::{CapabilityError, Synthesizer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Waveform produced by the synthesizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedAudio {
    pub wav: Vec<u8>,
}

pub struct AudioRenderer {
    synthesizer: Arc<dyn Synthesizer>,
    sound_bank: PathBuf,
    timeout: Duration,
}

impl AudioRenderer {
    pub fn new(synthesizer: Arc<dyn Synthesizer>, sound_bank: PathBuf, timeout: Duration) -> Self {
        Self {
            synthesizer,
            sound_bank,
            timeout,
        }
    }

    /// Stage 1: score to timeline, written to `timeline_path`
    pub async fn render_timeline(
        &self,
        score: &AssembledScore,
        timeline_path: &Path,
    ) -> Result<PerformanceTimeline, PipelineError> {
        let timeline = PerformanceTimeline::from_score(score)?;
        let bytes = timeline.to_smf_bytes()?;
        tokio::fs::write(timeline_path, &bytes).await?;

        info!(
            events = timeline.events.len(),
            notes = timeline.note_count(),
            end_tick = timeline.end_tick,
            bytes = bytes.len(),
            "Performance timeline written"
        );

        Ok(timeline)
    }

    /// Stage 2: timeline file to waveform via the synthesizer
    pub async fn synthesize(
        &self,
        timeline_path: &Path,
        output_path: &Path,
    ) -> Result<RenderedAudio, PipelineError> {
        info!(
            synthesizer = self.synthesizer.name(),
            sound_bank = %self.sound_bank.display(),
            timeout_secs = self.timeout.as_secs(),
            "Invoking synthesis"
        );

        let call = self
            .synthesizer
            .synthesize(timeline_path, &self.sound_bank, output_path);

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(PipelineError::SynthesisFailed(e)),
            Err(_) => {
                return Err(PipelineError::Timeout {
                    stage: "synthesis",
                    limit: self.timeout,
                })
            }
        }

        let missing = || {
            PipelineError::SynthesisFailed(CapabilityError::MissingOutput {
                program: self.synthesizer.name().to_string(),
                path: output_path.to_path_buf(),
            })
        };

        let wav = match tokio::fs::read(output_path).await {
            Ok(wav) => wav,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(missing()),
            Err(e) => return Err(e.into()),
        };
        if wav.is_empty() {
            return Err(missing());
        }

        Ok(RenderedAudio { wav })
    }
}
