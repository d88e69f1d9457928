//! Canned capability adapters
//!
//! Deterministic stand-ins for the recognition engine and synthesizer. They
//! write prepared fragments and waveforms into the workspace the same way
//! the real binaries do, and count their invocations.

use super::{CapabilityError, Recognizer, Synthesizer};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Recognizer returning prepared MusicXML documents
///
/// `pages[i]` holds the fragments produced for the i-th input image (in the
/// order the images are passed). Pages without an entry produce nothing.
#[derive(Debug, Default)]
pub struct CannedRecognizer {
    pages: Vec<Vec<String>>,
    failure: Option<String>,
    delay: Option<Duration>,
    invocations: AtomicUsize,
}

impl CannedRecognizer {
    pub fn new(pages: Vec<Vec<String>>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    /// Exactly one fragment for each page
    pub fn one_per_page(documents: Vec<String>) -> Self {
        Self::new(documents.into_iter().map(|d| vec![d]).collect())
    }

    /// Recognizer that always exits with status 1
    pub fn failing(diagnostic: impl Into<String>) -> Self {
        Self {
            failure: Some(diagnostic.into()),
            ..Self::default()
        }
    }

    /// Sleep before producing output
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Recognizer for CannedRecognizer {
    fn name(&self) -> &'static str {
        "canned-recognizer"
    }

    async fn recognize(&self, pages: &[PathBuf], output_dir: &Path) -> Result<(), CapabilityError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(diagnostic) = &self.failure {
            return Err(CapabilityError::Failed {
                program: self.name().to_string(),
                status: Some(1),
                diagnostic: diagnostic.clone(),
            });
        }

        for (position, page) in pages.iter().enumerate() {
            let Some(fragments) = self.pages.get(position) else {
                continue;
            };
            let stem = page
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("page{}", position + 1));

            // Same layout as an Audiveris book folder
            let book_dir = output_dir.join(&stem);
            tokio::fs::create_dir_all(&book_dir).await?;

            for (movement, document) in fragments.iter().enumerate() {
                let file_name = if fragments.len() == 1 {
                    format!("{}.musicxml", stem)
                } else {
                    format!("{}.mvt{}.musicxml", stem, movement + 1)
                };
                tokio::fs::write(book_dir.join(file_name), document).await?;
            }
        }

        Ok(())
    }
}

/// Synthesizer writing a prepared waveform
#[derive(Debug)]
pub struct CannedSynthesizer {
    wav: Vec<u8>,
    failure: Option<String>,
    delay: Option<Duration>,
    invocations: AtomicUsize,
    timelines: Mutex<Vec<Vec<u8>>>,
}

impl Default for CannedSynthesizer {
    fn default() -> Self {
        Self::new(silent_wav(8000, 800))
    }
}

impl CannedSynthesizer {
    pub fn new(wav: Vec<u8>) -> Self {
        Self {
            wav,
            failure: None,
            delay: None,
            invocations: AtomicUsize::new(0),
            timelines: Mutex::new(Vec::new()),
        }
    }

    /// Synthesizer that always exits with status 1
    pub fn failing(diagnostic: impl Into<String>) -> Self {
        Self {
            failure: Some(diagnostic.into()),
            ..Self::default()
        }
    }

    /// Sleep before writing the waveform
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Timeline files received so far, in call order
    pub fn received_timelines(&self) -> Vec<Vec<u8>> {
        self.timelines
            .lock()
            .map(|timelines| timelines.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Synthesizer for CannedSynthesizer {
    fn name(&self) -> &'static str {
        "canned-synthesizer"
    }

    async fn synthesize(
        &self,
        timeline: &Path,
        _sound_bank: &Path,
        output: &Path,
    ) -> Result<(), CapabilityError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        let midi = tokio::fs::read(timeline).await?;
        if let Ok(mut timelines) = self.timelines.lock() {
            timelines.push(midi);
        }

        if let Some(diagnostic) = &self.failure {
            return Err(CapabilityError::Failed {
                program: self.name().to_string(),
                status: Some(1),
                diagnostic: diagnostic.clone(),
            });
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        tokio::fs::write(output, &self.wav).await?;
        Ok(())
    }
}

/// 16-bit mono PCM WAV of silence
pub fn silent_wav(sample_rate: u32, samples: u32) -> Vec<u8> {
    let data_len = samples * 2;
    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 0);
    wav
}
