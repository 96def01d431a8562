//! # micplay Common Library
//!
//! Shared code for the micplay audio player:
//! - Settings file loading and path resolution
//! - Voice mode and quality tier definitions
//! - Clock formatting for progress display

pub mod config;
pub mod error;
pub mod human_time;
pub mod voice;

pub use error::{Error, Result};
pub use voice::{VoiceModeConfig, VoiceQuality};
