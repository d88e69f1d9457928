//! Test Helper Utilities
//!
//! Shared fixtures for scorewave-sr integration tests

#![allow(dead_code)]

pub mod pages;
pub mod scores;

pub use pages::{jpeg_page, page, pages, undecodable_page};
pub use scores::{
    fragment, malformed_fragment, out_of_range_fragment, overfull_fragment, unparsable_fragment,
};

use scorewave_sr::capability::{CannedRecognizer, CannedSynthesizer};
use scorewave_sr::pipeline::{PipelineConfig, PipelineOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Orchestrator over canned capabilities with a private scratch directory
pub struct Harness {
    pub orchestrator: PipelineOrchestrator,
    pub recognizer: Arc<CannedRecognizer>,
    pub synthesizer: Arc<CannedSynthesizer>,
    pub scratch: TempDir,
}

impl Harness {
    pub fn new(recognizer: CannedRecognizer, synthesizer: CannedSynthesizer) -> Self {
        Self::with_timeouts(recognizer, synthesizer, Duration::from_secs(10))
    }

    pub fn with_timeouts(
        recognizer: CannedRecognizer,
        synthesizer: CannedSynthesizer,
        timeout: Duration,
    ) -> Self {
        let scratch = tempfile::tempdir().expect("create scratch dir");
        let recognizer = Arc::new(recognizer);
        let synthesizer = Arc::new(synthesizer);

        let config = PipelineConfig {
            scratch_dir: Some(scratch.path().to_path_buf()),
            sound_bank: PathBuf::from("test-bank.sf2"),
            recognition_timeout: timeout,
            synthesis_timeout: timeout,
            ..PipelineConfig::default()
        };

        Self {
            orchestrator: PipelineOrchestrator::new(config, recognizer.clone(), synthesizer.clone()),
            recognizer,
            synthesizer,
            scratch,
        }
    }

    /// Entries left behind in the scratch directory
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.scratch.path())
            .expect("read scratch dir")
            .map(|entry| entry.expect("scratch entry").path())
            .collect()
    }
}
