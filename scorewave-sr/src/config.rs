//! Service configuration for scorewave-sr
//!
//! Merges command-line overrides with the TOML bootstrap file and derives
//! the pipeline settings.
//!
//! **Priority:** CLI → TOML → built-in default (the root folder also
//! honors `SCOREWAVE_ROOT_FOLDER`, see [`RootFolderResolver`]).

use crate::pipeline::{PipelineConfig, MIN_DPI};
use scorewave_common::config::{RootFolderResolver, TomlConfig};
use scorewave_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Module name used for config lookup and health reporting
pub const MODULE_NAME: &str = "scorewave-sr";

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub sound_bank: Option<PathBuf>,
}

/// Fully resolved service settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub bind_address: String,
    pub port: u16,
    /// Absolute, or relative to the working directory
    pub sound_bank: PathBuf,
    pub scratch_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub recognizer_binary: String,
    pub recognition_timeout: Duration,
    pub synthesizer_binary: String,
    pub synthesis_timeout: Duration,
}

impl ServiceConfig {
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Self {
        let root_folder = RootFolderResolver::new(MODULE_NAME).resolve(cli.root_folder.as_deref(), toml);

        Self {
            root_folder,
            bind_address: toml.bind_address.clone(),
            port: cli.port.unwrap_or(toml.port),
            sound_bank: cli
                .sound_bank
                .clone()
                .unwrap_or_else(|| toml.sound_bank.clone()),
            scratch_dir: toml.scratch_dir.clone(),
            max_upload_bytes: toml.max_upload_bytes,
            recognizer_binary: toml.recognizer.binary.clone(),
            recognition_timeout: Duration::from_secs(toml.recognizer.timeout_secs),
            synthesizer_binary: toml.synthesizer.binary.clone(),
            synthesis_timeout: Duration::from_secs(toml.synthesizer.timeout_secs),
        }
    }

    /// Refuse to start without a readable sound bank or with zero limits
    pub fn validate(&self) -> Result<()> {
        check_sound_bank(&self.sound_bank)?;

        if self.recognition_timeout.is_zero() || self.synthesis_timeout.is_zero() {
            return Err(Error::Config("capability timeouts must be positive".to_string()));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::Config("max_upload_bytes must be positive".to_string()));
        }
        if let Some(scratch) = &self.scratch_dir {
            std::fs::create_dir_all(scratch).map_err(|e| {
                Error::Config(format!("scratch_dir {} unusable: {}", scratch.display(), e))
            })?;
        }

        info!(sound_bank = %self.sound_bank.display(), "Sound bank found");
        Ok(())
    }

    /// `address:port` for the TCP listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            scratch_dir: self.scratch_dir.clone(),
            sound_bank: self.sound_bank.clone(),
            min_dpi: MIN_DPI,
            recognition_timeout: self.recognition_timeout,
            synthesis_timeout: self.synthesis_timeout,
        }
    }
}

fn check_sound_bank(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(Error::Config(format!(
            "sound bank {} is not a file",
            path.display()
        ))),
        Err(e) => Err(Error::Config(format!(
            "sound bank {} not readable: {}",
            path.display(),
            e
        ))),
    }
}
