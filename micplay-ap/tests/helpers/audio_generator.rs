//! Audio test file generation
//!
//! Writes 16-bit PCM WAV files with known content so decode and playback
//! results can be checked sample by sample.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;

fn spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn frames_for(sample_rate: u32, duration_ms: u64) -> u64 {
    sample_rate as u64 * duration_ms / 1000
}

/// Silent mono WAV
pub fn generate_silent_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    duration_ms: u64,
) -> Result<(), hound::Error> {
    generate_constant_wav(path, sample_rate, &[0], frames_for(sample_rate, duration_ms))
}

/// Every frame holds `values[ch]` on channel `ch`.
pub fn generate_constant_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    values: &[i16],
    frames: u64,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(sample_rate, values.len() as u16))?;
    for _ in 0..frames {
        for value in values {
            writer.write_sample(*value)?;
        }
    }
    writer.finalize()
}

/// Sine wave, identical on every channel
///
/// `amplitude` is 0.0-1.0 of 16-bit full scale.
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    duration_ms: u64,
    frequency_hz: f32,
    amplitude: f32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(sample_rate, channels))?;
    for frame in 0..frames_for(sample_rate, duration_ms) {
        let t = frame as f32 / sample_rate as f32;
        let value = ((2.0 * PI * frequency_hz * t).sin() * amplitude * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(value)?;
        }
    }
    writer.finalize()
}

/// Plain text under an audio file name; no container format recognizes it
pub fn write_garbage<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    std::fs::write(path, "this is not audio data\n".repeat(200))
}
