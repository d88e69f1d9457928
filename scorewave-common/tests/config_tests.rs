//! Unit tests for configuration and graceful degradation
//!
//! Tests the implementation of:
//! - A missing per-user TOML file SHALL NOT cause termination
//! - A missing file named by `--config` or SCOREWAVE_CONFIG is an error
//! - Partial TOML files fall back to defaults field by field
//! - Priority order for root folder resolution
//! - Automatic directory creation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SCOREWAVE_ROOT_FOLDER or SCOREWAVE_CONFIG are marked
//! with #[serial] so they run sequentially.

use scorewave_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig, CONFIG_ENV_VAR,
    ROOT_FOLDER_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert_eq!(defaults.log_level, "info");
    assert!(defaults.root_folder.to_string_lossy().contains("scorewave"));
}

#[test]
fn test_empty_toml_uses_defaults() {
    let config = TomlConfig::from_toml_str("").unwrap();

    assert_eq!(config.port, 5731);
    assert_eq!(config.bind_address, "127.0.0.1");
    assert_eq!(config.sound_bank, PathBuf::from("soundfont.sf2"));
    assert_eq!(config.recognizer.binary, "audiveris");
    assert_eq!(config.recognizer.timeout_secs, 300);
    assert_eq!(config.synthesizer.binary, "fluidsynth");
    assert_eq!(config.synthesizer.timeout_secs, 120);
    assert_eq!(config.logging.level, "info");
    assert!(config.root_folder.is_none());
}

#[test]
fn test_partial_toml_overrides_only_given_fields() {
    let config = TomlConfig::from_toml_str(
        r#"
        port = 6000
        sound_bank = "/usr/share/sounds/sf2/FluidR3_GM.sf2"

        [synthesizer]
        timeout_secs = 30
        "#,
    )
    .unwrap();

    assert_eq!(config.port, 6000);
    assert_eq!(
        config.sound_bank,
        PathBuf::from("/usr/share/sounds/sf2/FluidR3_GM.sf2")
    );
    assert_eq!(config.synthesizer.timeout_secs, 30);
    assert_eq!(config.synthesizer.binary, "fluidsynth");
    assert_eq!(config.recognizer.timeout_secs, 300);
}

#[test]
fn test_malformed_toml_is_config_error() {
    let err = TomlConfig::from_toml_str("port = \"not a number\"").unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
#[serial]
fn test_load_from_env_config_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scorewave-sr.toml");
    std::fs::write(&path, "port = 7001\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let config = TomlConfig::load(None, "scorewave-sr");
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.unwrap().port, 7001);
}

#[test]
#[serial]
fn test_explicit_missing_config_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let result = TomlConfig::load(Some(Path::new("/nonexistent/scorewave.toml")), "scorewave-sr");
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_env_named_missing_config_is_error() {
    env::set_var(CONFIG_ENV_VAR, "/nonexistent/from-env.toml");
    let result = TomlConfig::load(None, "scorewave-sr");
    env::remove_var(CONFIG_ENV_VAR);

    let err = result.unwrap_err();
    assert!(err.to_string().contains("/nonexistent/from-env.toml"));
}

#[test]
#[serial]
fn test_resolver_cli_argument_wins() {
    env::set_var(ROOT_FOLDER_ENV_VAR, "/tmp/from-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };

    let resolver = RootFolderResolver::new("scorewave-sr");
    let resolved = resolver.resolve(Some(Path::new("/tmp/from-cli")), &toml);
    env::remove_var(ROOT_FOLDER_ENV_VAR);

    assert_eq!(resolved, PathBuf::from("/tmp/from-cli"));
}

#[test]
#[serial]
fn test_resolver_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV_VAR, "/tmp/from-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };

    let resolved = RootFolderResolver::new("scorewave-sr").resolve(None, &toml);
    env::remove_var(ROOT_FOLDER_ENV_VAR);

    assert_eq!(resolved, PathBuf::from("/tmp/from-env"));
}

#[test]
#[serial]
fn test_resolver_falls_back_to_toml_then_default() {
    env::remove_var(ROOT_FOLDER_ENV_VAR);
    let resolver = RootFolderResolver::new("scorewave-sr");

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };
    assert_eq!(resolver.resolve(None, &toml), PathBuf::from("/tmp/from-toml"));

    let resolved = resolver.resolve(None, &TomlConfig::default());
    assert_eq!(resolved, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
fn test_initializer_creates_layout() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested").join("root");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert!(initializer.library_path().is_dir());
    assert_eq!(initializer.database_path(), root.join("scorewave.db"));
}
