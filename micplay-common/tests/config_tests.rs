//! Settings file loading and path resolution
//!
//! Tests touching MICPLAY_CONFIG are marked #[serial] so they never race on
//! the process environment.

use micplay_common::config::{load_config, resolve_config_path, TomlConfig, CONFIG_ENV_VAR};
use micplay_common::{Error, VoiceQuality};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_load_without_file_uses_defaults() {
    let config = load_config(None).unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.player.voice_quality, VoiceQuality::Medium);
}

#[test]
fn test_load_full_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[logging]
level = "debug"
file = "/tmp/micplay.log"

[player]
device = 2
voice_mode = true
voice_quality = "high"
volume = 0.25
loop = true
"#,
    )
    .unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.file.as_deref(), Some(Path::new("/tmp/micplay.log")));
    assert_eq!(config.player.device, Some(2));
    assert!(config.player.voice_mode);
    assert_eq!(config.player.voice_quality, VoiceQuality::High);
    assert_eq!(config.player.volume, 0.25);
    assert!(config.player.looping);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[player]\nvoice_mode = true\n").unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert!(config.player.voice_mode);
    assert_eq!(config.player.volume, 1.0);
    assert_eq!(config.player.device, None);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_missing_explicit_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let err = load_config(Some(&path)).unwrap_err();
    match err {
        Error::Config(msg) => assert!(msg.contains("absent.toml")),
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn test_malformed_file_names_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[player\nvolume = ").unwrap();

    let err = load_config(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("broken.toml"));
}

#[test]
#[serial]
fn test_cli_argument_beats_environment() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");

    let resolved = resolve_config_path(Some(Path::new("/tmp/from-cli.toml")), CONFIG_ENV_VAR);
    assert_eq!(resolved.as_deref(), Some(Path::new("/tmp/from-cli.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_used_without_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");

    let resolved = resolve_config_path(None, CONFIG_ENV_VAR);
    assert_eq!(resolved.as_deref(), Some(Path::new("/tmp/from-env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_environment_is_ignored() {
    env::set_var(CONFIG_ENV_VAR, "   ");

    let resolved = resolve_config_path(None, CONFIG_ENV_VAR);
    assert_ne!(resolved.as_deref(), Some(Path::new("   ")));

    env::remove_var(CONFIG_ENV_VAR);
}
