//! Error types for micplay-ap
//!
//! Each layer has its own thiserror enum; `Error` wraps them for callers that
//! drive the whole engine.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn a file into an audio asset
#[derive(Error, Debug)]
pub enum DecodeError {
    /// File could not be opened or read
    #[error("Cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Container or codec could not be parsed
    #[error("Unsupported audio in {}: {reason}", path.display())]
    Unsupported { path: PathBuf, reason: String },
}

impl DecodeError {
    pub fn unsupported(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        DecodeError::Unsupported {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Output device errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// Host exposes no device with output channels
    #[error("No audio output devices available")]
    NoOutputDevices,

    /// Device exists but cannot play mono at the required rate
    #[error("Device {index} is incompatible: {reason}")]
    IncompatibleDevice { index: usize, reason: String },

    #[error("Failed to open output stream: {0}")]
    StreamOpenFailed(String),

    #[error("Output stream write failed: {0}")]
    StreamWriteFailed(String),
}

/// Transport operation invoked in the wrong state
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("No audio buffer loaded")]
    NoBufferLoaded,

    #[error("Playback is not running")]
    NotPlaying,

    #[error("Playback is not paused")]
    NotPaused,

    #[error("No tracks to play")]
    EmptyPlaylist,

    #[error("No track at index {0}")]
    NoSuchTrack(usize),
}

/// Main error type for micplay-ap
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    State(#[from] StateError),

    /// Settings or shared-type errors
    #[error(transparent)]
    Common(#[from] micplay_common::Error),

    /// Sample rate conversion failed
    #[error("Resample error: {0}")]
    Resample(String),

    /// Unparseable operator command
    #[error("Bad command: {0}")]
    BadCommand(String),

    /// Streaming thread could not be started
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using micplay-ap Error
pub type Result<T> = std::result::Result<T, Error>;
