//! Signal conditioning: downmix, gain, normalization, compression, limiting
//!
//! All functions work on f32 samples in the normalized [-1.0, 1.0] domain,
//! where 1.0 is the source's maximum representable amplitude.

use thiserror::Error;

/// Peak target after normalization, in dB below full scale
pub const NORMALIZE_HEADROOM_DB: f32 = 0.1;

/// Magnitude above which soft compression applies
pub const COMPRESSION_THRESHOLD: f32 = 0.75;

/// Fraction of the excess over the threshold that is kept
pub const COMPRESSION_RATIO: f32 = 0.5;

/// Voice-mode chunk ceiling
pub const LIMITER_CEILING: f32 = 0.95;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConditioningError {
    #[error("non-finite sample at index {index}")]
    NonFiniteSample { index: usize },
}

/// Average interleaved channels into one.
///
/// A trailing partial frame is dropped.
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels as usize;
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Largest absolute sample value, NaN ignored
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |max, s| max.max(s.abs()))
}

/// Linear amplitude of the normalization target
pub fn normalization_target() -> f32 {
    10f32.powf(-NORMALIZE_HEADROOM_DB / 20.0)
}

/// Scale so the peak sits at `normalization_target()`.
///
/// Silent buffers are left untouched. Returns the applied gain.
pub fn normalize_peak(samples: &mut [f32]) -> f32 {
    let measured = peak(samples);
    if measured <= 0.0 || !measured.is_finite() {
        return 1.0;
    }

    let gain = normalization_target() / measured;
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
    gain
}

/// Halve the excess of every sample beyond `COMPRESSION_THRESHOLD`.
///
/// Per-sample, no look-ahead. Samples at or below the threshold are not
/// touched. The buffer is left unmodified if any sample is non-finite.
pub fn soft_compress(samples: &mut [f32]) -> Result<(), ConditioningError> {
    if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
        return Err(ConditioningError::NonFiniteSample { index });
    }

    for sample in samples.iter_mut() {
        let magnitude = sample.abs();
        if magnitude > COMPRESSION_THRESHOLD {
            let compressed =
                COMPRESSION_THRESHOLD + (magnitude - COMPRESSION_THRESHOLD) * COMPRESSION_RATIO;
            *sample = compressed.copysign(*sample);
        }
    }
    Ok(())
}

/// Scale a chunk whose peak exceeds `LIMITER_CEILING` so the peak lands on it.
pub fn limit_chunk(chunk: &mut [f32]) {
    let measured = peak(chunk);
    if measured <= LIMITER_CEILING {
        return;
    }

    for sample in chunk.iter_mut() {
        *sample = *sample / measured * LIMITER_CEILING;
    }
}

/// Multiply by `gain`; unity gain is a no-op.
pub fn apply_gain(chunk: &mut [f32], gain: f32) {
    if gain == 1.0 {
        return;
    }
    for sample in chunk.iter_mut() {
        *sample *= gain;
    }
}
