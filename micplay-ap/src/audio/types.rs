//! Core audio data types

use std::path::{Path, PathBuf};

/// Decoded, mono, ready-to-stream audio.
///
/// **Format:**
/// - Samples are f32 in [-1.0, 1.0]
/// - Always one channel after loading
/// - `sample_rate` is the native rate, or the voice tier's rate when conditioned
#[derive(Debug, Clone)]
pub struct AudioAsset {
    /// Source file; identity of the asset
    pub path: PathBuf,

    pub sample_rate: u32,

    /// Bit depth of the source encoding (diagnostics only)
    pub bits_per_sample: u32,

    pub source_channels: u16,
    pub source_sample_rate: u32,

    /// Mono PCM samples
    pub samples: Vec<f32>,

    /// True when the voice pipeline ran over `samples`
    pub voice_conditioned: bool,
}

impl AudioAsset {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of samples (one per frame, mono)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
