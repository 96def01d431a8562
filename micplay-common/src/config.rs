//! Settings file loading and config path resolution
//!
//! The settings file is read-only to the player. Path priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. `config.toml` in the platform config directory, if present
//! 4. Built-in defaults (no file)

use crate::voice::{VoiceModeConfig, VoiceQuality};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the settings file
pub const CONFIG_ENV_VAR: &str = "MICPLAY_CONFIG";

/// Settings file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Player settings (optional)
    #[serde(default)]
    pub player: PlayerSettings,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Settings consumed by the playback core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// Last used output device index
    #[serde(default)]
    pub device: Option<usize>,

    #[serde(default)]
    pub voice_mode: bool,

    #[serde(default)]
    pub voice_quality: VoiceQuality,

    /// Initial volume (0.0-1.0)
    #[serde(default = "default_volume")]
    pub volume: f32,

    #[serde(default, rename = "loop")]
    pub looping: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            device: None,
            voice_mode: false,
            voice_quality: VoiceQuality::default(),
            volume: default_volume(),
            looping: false,
        }
    }
}

impl PlayerSettings {
    pub fn voice(&self) -> VoiceModeConfig {
        VoiceModeConfig::new(self.voice_mode, self.voice_quality)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_volume() -> f32 {
    1.0
}

/// Resolve which settings file to read, if any.
///
/// An explicit path (CLI or environment) is returned even if it does not
/// exist so that loading reports the problem; the platform default is only
/// used when the file is actually there.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: platform config directory
    default_config_path().filter(|path| path.exists())
}

/// `<config dir>/micplay/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("micplay").join("config.toml"))
}

/// Load settings from `path`, or built-in defaults when there is none.
pub fn load_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        debug!("No settings file, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read settings file {}: {}", path.display(), e))
    })?;

    let config = parse_config(&content)
        .map_err(|e| Error::Config(format!("{} ({})", e, path.display())))?;

    info!("Loaded settings from {}", path.display());
    Ok(config)
}

/// Parse settings file contents
pub fn parse_config(content: &str) -> Result<TomlConfig> {
    let config: TomlConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Failed to parse settings: {}", e)))?;

    if !(0.0..=1.0).contains(&config.player.volume) {
        return Err(Error::Config(format!(
            "player.volume must be between 0.0 and 1.0, got {}",
            config.player.volume
        )));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.player.volume, 1.0);
        assert!(!config.player.voice().enabled);
    }

    #[test]
    fn test_player_section() {
        let config = parse_config(
            r#"
            [player]
            device = 3
            voice_mode = true
            voice_quality = "low"
            volume = 0.4
            loop = true
            "#,
        )
        .unwrap();

        assert_eq!(config.player.device, Some(3));
        assert_eq!(config.player.voice(), VoiceModeConfig::new(true, VoiceQuality::Low));
        assert_eq!(config.player.volume, 0.4);
        assert!(config.player.looping);
    }

    #[test]
    fn test_volume_out_of_range_rejected() {
        let err = parse_config("[player]\nvolume = 1.5\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unknown_quality_rejected() {
        assert!(parse_config("[player]\nvoice_quality = \"ultra\"\n").is_err());
    }

    #[test]
    fn test_cli_path_wins() {
        let path = resolve_config_path(Some(Path::new("/tmp/explicit.toml")), "MICPLAY_TEST_UNSET_VAR");
        assert_eq!(path, Some(PathBuf::from("/tmp/explicit.toml")));
    }
}
