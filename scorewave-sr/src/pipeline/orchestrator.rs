//! Pipeline Orchestrator
//!
//! Sequences one invocation through validation, recognition, assembly and
//! rendering inside its own temporary workspace.
//!
//! # Stages
//! - **Validating**: every page decoded and density-checked; any rejection
//!   fails the run before recognition is attempted
//! - **Recognizing**: one recognizer call over all pages; fewer discovered
//!   fragments than pages fails the run
//! - **Assembling**: invalid fragments skipped, zero survivors fails the run
//! - **RenderingTimeline** / **RenderingAudio**: score → MIDI → waveform
//!
//! No stage is retried. The workspace is removed on every exit path.

use super::assembler::{AssembledScore, ScoreAssembler};
use super::error::PipelineError;
use super::image_validator::{ImageValidator, MIN_DPI};
use super::recognition::{discover_fragments, RecognitionInvoker};
use super::renderer::{AudioRenderer, RenderedAudio};
use super::workspace::{Workspace, ASSEMBLED_FILE, TIMELINE_FILE, WAVEFORM_FILE};
use crate::capability::{Recognizer, Synthesizer};
use crate::models::{PageImage, PipelineRun, PipelineState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Parent of per-run workspaces (system temp dir when `None`)
    pub scratch_dir: Option<PathBuf>,
    /// Sound bank handed to the synthesizer
    pub sound_bank: PathBuf,
    /// Minimum page density on both axes
    pub min_dpi: u32,
    pub recognition_timeout: Duration,
    pub synthesis_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            sound_bank: PathBuf::from("soundfont.sf2"),
            min_dpi: MIN_DPI,
            recognition_timeout: Duration::from_secs(300),
            synthesis_timeout: Duration::from_secs(120),
        }
    }
}

/// Successful run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub audio: RenderedAudio,
    pub score: AssembledScore,
    /// SHA-256 of the canonical assembled score
    pub score_digest: String,
    pub skipped_fragments: usize,
    pub timeline_events: usize,
    /// Run report with the full transition history
    pub run: PipelineRun,
}

struct Rendered {
    audio: RenderedAudio,
    score: AssembledScore,
    score_digest: String,
    skipped_fragments: usize,
    timeline_events: usize,
}

pub struct PipelineOrchestrator {
    config: PipelineConfig,
    validator: ImageValidator,
    invoker: RecognitionInvoker,
    assembler: ScoreAssembler,
    renderer: AudioRenderer,
}

impl PipelineOrchestrator {
    pub fn new(
        config: PipelineConfig,
        recognizer: Arc<dyn Recognizer>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            validator: ImageValidator::new(config.min_dpi),
            invoker: RecognitionInvoker::new(recognizer, config.recognition_timeout),
            assembler: ScoreAssembler::new(),
            renderer: AudioRenderer::new(
                synthesizer,
                config.sound_bank.clone(),
                config.synthesis_timeout,
            ),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline over pages in request order
    pub async fn run(&self, pages: Vec<PageImage>) -> Result<PipelineOutput, PipelineError> {
        let mut run = PipelineRun::new(pages.len());
        info!(run_id = %run.run_id, pages = pages.len(), "Pipeline run received");

        match self.execute(&mut run, pages).await {
            Ok(rendered) => {
                run.transition_to(PipelineState::Succeeded);
                info!(
                    run_id = %run.run_id,
                    fragments = rendered.score.len(),
                    skipped = rendered.skipped_fragments,
                    timeline_events = rendered.timeline_events,
                    audio_bytes = rendered.audio.wav.len(),
                    digest = %rendered.score_digest,
                    elapsed_ms = run.elapsed_ms(),
                    "Pipeline run succeeded"
                );
                Ok(PipelineOutput {
                    audio: rendered.audio,
                    score: rendered.score,
                    score_digest: rendered.score_digest,
                    skipped_fragments: rendered.skipped_fragments,
                    timeline_events: rendered.timeline_events,
                    run,
                })
            }
            Err(e) => {
                let stage = run.state;
                run.transition_to(PipelineState::Failed(e.kind()));
                error!(
                    run_id = %run.run_id,
                    code = e.code(),
                    stage = ?stage,
                    elapsed_ms = run.elapsed_ms(),
                    "Pipeline run failed: {}",
                    e
                );
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        run: &mut PipelineRun,
        pages: Vec<PageImage>,
    ) -> Result<Rendered, PipelineError> {
        if pages.is_empty() {
            return Err(PipelineError::EmptyRequest);
        }

        run.transition_to(PipelineState::Validating);
        let validator = self.validator;
        let pages = tokio::task::spawn_blocking(move || validator.validate_batch(&pages).map(|_| pages))
            .await
            .map_err(|e| PipelineError::Internal(format!("Validation task failed: {}", e)))?
            .map_err(|rejections| PipelineError::ValidationFailed { rejections })?;

        // Removed on drop, whatever happens below
        let workspace = Workspace::create(self.config.scratch_dir.as_deref())?;
        debug!(run_id = %run.run_id, workspace = %workspace.path().display(), "Workspace created");

        let mut stored = Vec::with_capacity(pages.len());
        for page in &pages {
            stored.push(workspace.store_page(page).await?);
        }
        drop(pages);

        run.transition_to(PipelineState::Recognizing);
        let recognition_dir = workspace.recognition_dir();
        self.invoker.invoke(&stored, &recognition_dir).await?;

        let discovery_dir = recognition_dir.clone();
        let discovery_pages = stored.clone();
        let fragments =
            tokio::task::spawn_blocking(move || discover_fragments(&discovery_dir, &discovery_pages))
                .await
                .map_err(|e| PipelineError::Internal(format!("Fragment discovery failed: {}", e)))?;
        info!(
            run_id = %run.run_id,
            pages = stored.len(),
            fragments = fragments.len(),
            "Recognition output discovered"
        );
        if fragments.len() < stored.len() {
            return Err(PipelineError::IncompleteRecognition {
                expected: stored.len(),
                found: fragments.len(),
            });
        }

        run.transition_to(PipelineState::Assembling);
        let assembler = self.assembler;
        let outcome = tokio::task::spawn_blocking(move || assembler.assemble(fragments))
            .await
            .map_err(|e| PipelineError::Internal(format!("Assembly task failed: {}", e)))??;

        let canonical = outcome
            .score
            .to_canonical_bytes()
            .map_err(|e| PipelineError::Internal(format!("Score serialization failed: {}", e)))?;
        let score_digest = outcome
            .score
            .digest()
            .map_err(|e| PipelineError::Internal(format!("Score serialization failed: {}", e)))?;
        tokio::fs::write(workspace.render_file(ASSEMBLED_FILE), &canonical).await?;

        run.transition_to(PipelineState::RenderingTimeline);
        let timeline_path = workspace.render_file(TIMELINE_FILE);
        let timeline = self
            .renderer
            .render_timeline(&outcome.score, &timeline_path)
            .await?;

        run.transition_to(PipelineState::RenderingAudio);
        let audio = self
            .renderer
            .synthesize(&timeline_path, &workspace.render_file(WAVEFORM_FILE))
            .await?;

        if let Err(e) = workspace.release() {
            warn!(run_id = %run.run_id, "Failed to remove workspace: {}", e);
        }

        Ok(Rendered {
            audio,
            score: outcome.score,
            score_digest,
            skipped_fragments: outcome.skipped,
            timeline_events: timeline.events.len(),
        })
    }
}
