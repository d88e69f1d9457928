//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. A missing per-user file
//! is not fatal: the service logs a warning and continues with built-in
//! defaults. A file named explicitly (`--config` or `SCOREWAVE_CONFIG`)
//! must exist and parse.
//!
//! # Root Folder Priority
//!
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `SCOREWAVE_ROOT_FOLDER`
//! 3. TOML config file `root_folder`
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit TOML config file
pub const CONFIG_ENV_VAR: &str = "SCOREWAVE_CONFIG";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "SCOREWAVE_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "scorewave.db";

/// Audio library directory name inside the root folder
pub const LIBRARY_DIR: &str = "library";

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime. The service must restart
/// to pick up changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and audio library
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// SoundFont used for every synthesis call
    #[serde(default = "default_sound_bank")]
    pub sound_bank: PathBuf,

    /// Directory under which per-request workspaces are created
    /// (system temp directory when unset)
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// Maximum accepted request body size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Optical music recognition engine
    #[serde(default)]
    pub recognizer: RecognizerConfig,

    /// Audio synthesizer
    #[serde(default)]
    pub synthesizer: SynthesizerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// External recognition engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerConfig {
    /// Executable name or path
    #[serde(default = "default_recognizer_binary")]
    pub binary: String,

    /// Upper bound for one recognition run
    #[serde(default = "default_recognizer_timeout")]
    pub timeout_secs: u64,
}

/// External synthesizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizerConfig {
    /// Executable name or path
    #[serde(default = "default_synthesizer_binary")]
    pub binary: String,

    /// Upper bound for one synthesis run
    #[serde(default = "default_synthesizer_timeout")]
    pub timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5731
}

fn default_sound_bank() -> PathBuf {
    PathBuf::from("soundfont.sf2")
}

fn default_max_upload_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_recognizer_binary() -> String {
    "audiveris".to_string()
}

fn default_recognizer_timeout() -> u64 {
    300
}

fn default_synthesizer_binary() -> String {
    "fluidsynth".to_string()
}

fn default_synthesizer_timeout() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            binary: default_recognizer_binary(),
            timeout_secs: default_recognizer_timeout(),
        }
    }
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            binary: default_synthesizer_binary(),
            timeout_secs: default_synthesizer_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: default_bind_address(),
            port: default_port(),
            sound_bank: default_sound_bank(),
            scratch_dir: None,
            max_upload_bytes: default_max_upload_bytes(),
            recognizer: RecognizerConfig::default(),
            synthesizer: SynthesizerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration following the config file priority order
    ///
    /// 1. `explicit` path (CLI flag); must be readable
    /// 2. `SCOREWAVE_CONFIG` environment variable; must be readable
    /// 3. Per-user config file for `module_name`, if present
    /// 4. Built-in defaults
    pub fn load(explicit: Option<&Path>, module_name: &str) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load_file(Path::new(&path));
        }

        if let Some(path) = user_config_path(module_name) {
            if path.exists() {
                return Self::load_file(&path);
            }
        }

        warn!(
            "No configuration file found for {}, using built-in defaults",
            module_name
        );
        Ok(Self::default())
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read TOML {} failed: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }
}

/// Per-user config file location: `<config_dir>/scorewave/<module>.toml`
pub fn user_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scorewave").join(format!("{}.toml", module_name)))
}

/// Compiled fallback values for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "linux") {
            // ~/.local/share/scorewave (or /var/lib/scorewave for system-wide)
            dirs::data_local_dir()
                .map(|d| d.join("scorewave"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/scorewave"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join("scorewave"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/scorewave"))
        } else if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("scorewave"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\scorewave"))
        } else {
            PathBuf::from("./scorewave_data")
        };

        Self {
            root_folder,
            log_level: default_log_level(),
        }
    }
}

/// Resolves the root folder for one service
pub struct RootFolderResolver {
    module_name: String,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
        }
    }

    /// Resolve root folder by priority: CLI → ENV → TOML → compiled default
    pub fn resolve(&self, cli_arg: Option<&Path>, toml: &TomlConfig) -> PathBuf {
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &toml.root_folder {
            return path.clone();
        }

        let default = CompiledDefaults::for_current_platform().root_folder;
        info!(
            module = %self.module_name,
            "Using compiled default root folder: {}",
            default.display()
        );
        default
    }
}

/// Creates the root folder layout on first start
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create root folder and library directory if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            info!("Creating root folder: {}", self.root_folder.display());
        }
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.library_path())?;
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Path to the SQLite database inside the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    /// Path to the per-account audio library
    pub fn library_path(&self) -> PathBuf {
        self.root_folder.join(LIBRARY_DIR)
    }
}
