//! Voice mode settings
//!
//! Voice mode conditions the decoded signal for a voice-chat input (mono,
//! reduced sample rate, normalized and compressed) and shortens the device
//! buffer for lower latency. The quality tier picks the rate/buffer pair.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chunk size used when voice mode is off
pub const STANDARD_BUFFER_SIZE: usize = 1024;

/// Rate the binding validates devices against when voice mode is off
pub const STANDARD_SAMPLE_RATE: u32 = 44100;

/// Voice quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl VoiceQuality {
    /// Sample rate the asset is resampled to in voice mode
    pub fn target_sample_rate(self) -> u32 {
        match self {
            VoiceQuality::Low => 16000,
            VoiceQuality::Medium => 24000,
            VoiceQuality::High => 48000,
        }
    }

    /// Samples written to the device per chunk in voice mode
    pub fn buffer_size(self) -> usize {
        match self {
            VoiceQuality::Low => 256,
            VoiceQuality::Medium => 512,
            VoiceQuality::High => 1024,
        }
    }
}

impl fmt::Display for VoiceQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceQuality::Low => write!(f, "low"),
            VoiceQuality::Medium => write!(f, "medium"),
            VoiceQuality::High => write!(f, "high"),
        }
    }
}

impl FromStr for VoiceQuality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(VoiceQuality::Low),
            "medium" => Ok(VoiceQuality::Medium),
            "high" => Ok(VoiceQuality::High),
            other => Err(Error::InvalidInput(format!(
                "unknown voice quality '{}' (expected low, medium or high)",
                other
            ))),
        }
    }
}

/// Voice mode configuration as supplied by the settings collaborator.
///
/// Changing either field invalidates a loaded asset: it must be decoded again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoiceModeConfig {
    pub enabled: bool,
    pub quality: VoiceQuality,
}

impl VoiceModeConfig {
    pub fn new(enabled: bool, quality: VoiceQuality) -> Self {
        Self { enabled, quality }
    }

    /// Samples per streaming chunk
    pub fn chunk_size(&self) -> usize {
        if self.enabled {
            self.quality.buffer_size()
        } else {
            STANDARD_BUFFER_SIZE
        }
    }

    /// Target rate for conditioning, or None when the native rate is kept
    pub fn target_sample_rate(&self) -> Option<u32> {
        self.enabled.then(|| self.quality.target_sample_rate())
    }

    /// Rate output devices must accept under this configuration
    pub fn device_sample_rate(&self) -> u32 {
        self.target_sample_rate().unwrap_or(STANDARD_SAMPLE_RATE)
    }
}

impl fmt::Display for VoiceModeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.enabled {
            write!(f, "voice mode ({})", self.quality)
        } else {
            write!(f, "standard mode")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_tiers() {
        assert_eq!(VoiceQuality::Low.target_sample_rate(), 16000);
        assert_eq!(VoiceQuality::Medium.target_sample_rate(), 24000);
        assert_eq!(VoiceQuality::High.target_sample_rate(), 48000);

        assert_eq!(VoiceQuality::Low.buffer_size(), 256);
        assert_eq!(VoiceQuality::Medium.buffer_size(), 512);
        assert_eq!(VoiceQuality::High.buffer_size(), 1024);
    }

    #[test]
    fn test_quality_parse() {
        assert_eq!("low".parse::<VoiceQuality>().unwrap(), VoiceQuality::Low);
        assert_eq!(" High ".parse::<VoiceQuality>().unwrap(), VoiceQuality::High);
        assert!("ultra".parse::<VoiceQuality>().is_err());
    }

    #[test]
    fn test_quality_display_roundtrip() {
        for quality in [VoiceQuality::Low, VoiceQuality::Medium, VoiceQuality::High] {
            assert_eq!(quality.to_string().parse::<VoiceQuality>().unwrap(), quality);
        }
    }

    #[test]
    fn test_chunk_size_follows_mode() {
        let standard = VoiceModeConfig::new(false, VoiceQuality::Low);
        assert_eq!(standard.chunk_size(), STANDARD_BUFFER_SIZE);
        assert_eq!(standard.target_sample_rate(), None);
        assert_eq!(standard.device_sample_rate(), STANDARD_SAMPLE_RATE);

        let voice = VoiceModeConfig::new(true, VoiceQuality::Low);
        assert_eq!(voice.chunk_size(), 256);
        assert_eq!(voice.target_sample_rate(), Some(16000));
        assert_eq!(voice.device_sample_rate(), 16000);
    }

    #[test]
    fn test_default_is_medium_disabled() {
        let config = VoiceModeConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.quality, VoiceQuality::Medium);
    }
}
