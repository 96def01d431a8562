//! Playback state

use super::events::SessionId;
use micplay_common::VoiceModeConfig;
use serde::{Deserialize, Serialize};

/// Volume change per up/down step
pub const VOLUME_STEP: f32 = 0.05;

/// Engine status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// No buffer loaded
    #[default]
    Idle,
    /// Buffer loaded, never started
    Loaded,
    Playing,
    Paused,
    /// Buffer kept; `play` restarts it
    Stopped,
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackStatus::Idle => write!(f, "idle"),
            PlaybackStatus::Loaded => write!(f, "loaded"),
            PlaybackStatus::Playing => write!(f, "playing"),
            PlaybackStatus::Paused => write!(f, "paused"),
            PlaybackStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Transport state shared between the engine and its streaming thread.
///
/// `is_playing` and `is_paused` derive from `status`, so paused always
/// implies playing.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub looping: bool,
    /// Seconds from buffer start
    pub position: f64,
    pub volume: f32,
    pub muted: bool,
    /// Level restored on unmute
    pub last_volume: f32,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Idle,
            looping: false,
            position: 0.0,
            volume: 1.0,
            muted: false,
            last_volume: 1.0,
        }
    }
}

impl PlaybackState {
    /// Playing or paused
    pub fn is_playing(&self) -> bool {
        matches!(self.status, PlaybackStatus::Playing | PlaybackStatus::Paused)
    }

    pub fn is_paused(&self) -> bool {
        self.status == PlaybackStatus::Paused
    }

    /// Multiplier applied to each chunk
    pub fn effective_gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    /// Clamp into [0, 1]; non-finite input is ignored. Returns the resulting volume.
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        if !volume.is_finite() {
            return self.volume;
        }
        self.volume = volume.clamp(0.0, 1.0);
        if !self.muted {
            self.last_volume = self.volume;
        }
        self.volume
    }

    /// Flip mute; returns the new muted flag.
    pub fn toggle_mute(&mut self) -> bool {
        if self.muted {
            self.volume = self.last_volume;
            self.muted = false;
        } else {
            self.last_volume = self.volume;
            self.volume = 0.0;
            self.muted = true;
        }
        self.muted
    }
}

/// Point-in-time copy of the engine for progress display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub position: f64,
    pub duration: f64,
    pub volume: f32,
    pub muted: bool,
    pub looping: bool,
    /// Rate of the loaded asset
    pub sample_rate: Option<u32>,
    pub device: usize,
    pub voice: VoiceModeConfig,
    /// Most recently started streaming session; end notifications for
    /// any other session are not delivered
    pub session: Option<SessionId>,
}

impl PlaybackSnapshot {
    pub fn is_playing(&self) -> bool {
        matches!(self.status, PlaybackStatus::Playing | PlaybackStatus::Paused)
    }
}
