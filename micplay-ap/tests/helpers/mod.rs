//! Test helpers for micplay-ap integration tests
//!
//! - audio_generator: deterministic WAV fixtures
//! - mock_host: in-memory `AudioHost` with hold and failure injection
//! - observer: recording `PlaybackObserver`

#![allow(dead_code)]

pub mod audio_generator;
pub mod mock_host;
pub mod observer;

pub use audio_generator::{
    generate_constant_wav, generate_sine_wav, generate_silent_wav, write_garbage,
};
pub use mock_host::{MockDevice, MockHost};
pub use observer::RecordingObserver;

use std::time::{Duration, Instant};

/// Poll `condition` every millisecond until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}
