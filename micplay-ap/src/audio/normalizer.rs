//! Asset loading: decode, downmix, and optional voice conditioning
//!
//! Voice pipeline order: resample to the tier rate, peak-normalize, then
//! soft-compress. Compression failure keeps the normalized signal.

use super::conditioning::{downmix, normalize_peak, soft_compress};
use super::decoder::SimpleDecoder;
use super::resampler::Resampler;
use super::types::AudioAsset;
use crate::error::DecodeError;
use micplay_common::VoiceModeConfig;
use std::path::Path;
use tracing::{debug, warn};

/// Decode `path` into a mono asset conditioned for `voice`.
pub fn load(path: &Path, voice: &VoiceModeConfig) -> Result<AudioAsset, DecodeError> {
    let decoded = SimpleDecoder::decode_file(path)?;

    let mut samples = downmix(&decoded.samples, decoded.channels);
    let mut sample_rate = decoded.sample_rate;

    if let Some(target_rate) = voice.target_sample_rate() {
        if sample_rate != target_rate {
            samples = Resampler::resample(&samples, sample_rate, target_rate)
                .map_err(|e| DecodeError::unsupported(path, e.to_string()))?;
            sample_rate = target_rate;
        }

        let gain = normalize_peak(&mut samples);
        debug!("Normalized {} with gain {:.3}", path.display(), gain);

        if let Err(e) = soft_compress(&mut samples) {
            warn!(
                "Compression skipped for {}: {}; using uncompressed signal",
                path.display(),
                e
            );
        }
    }

    for sample in samples.iter_mut() {
        *sample = if sample.is_finite() { sample.clamp(-1.0, 1.0) } else { 0.0 };
    }

    if samples.is_empty() {
        return Err(DecodeError::unsupported(path, "decoded audio is empty"));
    }

    let asset = AudioAsset {
        path: path.to_path_buf(),
        sample_rate,
        bits_per_sample: decoded.bits_per_sample,
        source_channels: decoded.channels,
        source_sample_rate: decoded.sample_rate,
        samples,
        voice_conditioned: voice.enabled,
    };

    debug!(
        "Loaded {}: {} samples at {}Hz ({:.2}s, source {}ch/{}Hz/{}bit, {})",
        path.display(),
        asset.len(),
        asset.sample_rate,
        asset.duration(),
        asset.source_channels,
        asset.source_sample_rate,
        asset.bits_per_sample,
        voice
    );

    Ok(asset)
}
