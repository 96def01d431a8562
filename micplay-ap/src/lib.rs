//! # micplay Audio Player Library (micplay-ap)
//!
//! Streaming playback engine for routing an audio file into an output device,
//! typically a virtual microphone cable.
//!
//! **Architecture:** symphonia decode, optional voice conditioning (mono
//! downmix, rubato resample, peak normalization, soft compression), then a
//! dedicated streaming thread writing fixed-size chunks to a cpal stream.

pub mod audio;
pub mod error;
pub mod playback;

pub use error::{DecodeError, DeviceError, Error, Result, StateError};
pub use playback::{PlaybackEngine, Transport};
