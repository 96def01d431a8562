//! Audio decoder using symphonia
//!
//! Decodes any container/codec symphonia recognizes into interleaved f32
//! samples. Integer formats are divided by the maximum magnitude of their
//! representation (`i16::MAX` for 16-bit) and clamped into [-1.0, 1.0].

use crate::error::DecodeError;
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::{debug, warn};

const I24_MAX: f32 = 8_388_607.0;
const U24_MID: f32 = 8_388_608.0;

/// Raw decode result, before any downmix or conditioning
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples, `channels` per frame
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }
}

/// Simple whole-file decoder.
pub struct SimpleDecoder;

impl SimpleDecoder {
    /// Decode an entire file.
    ///
    /// # Errors
    /// - `Unreadable` if the file cannot be opened
    /// - `Unsupported` if no decodable audio track is found, the track lacks a
    ///   sample rate or channel layout, or no frame decodes successfully
    pub fn decode_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
        debug!("Decoding entire file: {}", path.display());

        let file = std::fs::File::open(path).map_err(|source| DecodeError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::unsupported(path, format!("failed to probe format: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::unsupported(path, "no audio track found"))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .filter(|rate| *rate > 0)
            .ok_or_else(|| DecodeError::unsupported(path, "unknown sample rate"))?;

        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .filter(|count| *count > 0)
            .ok_or_else(|| DecodeError::unsupported(path, "unknown channel layout"))?;

        debug!(
            "Audio format: sample_rate={}, channels={}, bits={:?}",
            sample_rate, channels, codec_params.bits_per_sample
        );

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::unsupported(path, format!("failed to create decoder: {}", e)))?;

        let mut samples = Vec::new();
        let mut buffer_bits = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    warn!("Decoder reset required mid-stream, stopping at {} samples", samples.len());
                    break;
                }
                Err(e) => {
                    warn!("Error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    buffer_bits.get_or_insert_with(|| Self::buffer_bits(&decoded));
                    Self::convert_samples_to_f32(&decoded, &mut samples);
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping undecodable packet: {}", e);
                }
                Err(e) => {
                    warn!("Decode error: {}", e);
                    break;
                }
            }
        }

        if samples.is_empty() {
            return Err(DecodeError::unsupported(path, "no decodable audio frames"));
        }

        let bits_per_sample = codec_params
            .bits_per_sample
            .or(buffer_bits)
            .unwrap_or(32);

        debug!(
            "Decoded {} samples ({} frames)",
            samples.len(),
            samples.len() / channels as usize
        );

        Ok(DecodedAudio {
            samples,
            sample_rate,
            channels,
            bits_per_sample,
        })
    }

    /// Convert one decoded buffer to interleaved f32, appending to `output`.
    fn convert_samples_to_f32(decoded: &AudioBufferRef, output: &mut Vec<f32>) {
        match decoded {
            AudioBufferRef::F32(buf) => Self::interleave(&**buf, output, |s| s),
            AudioBufferRef::F64(buf) => Self::interleave(&**buf, output, |s| s as f32),
            AudioBufferRef::S8(buf) => {
                Self::interleave(&**buf, output, |s| s as f32 / i8::MAX as f32)
            }
            AudioBufferRef::S16(buf) => {
                Self::interleave(&**buf, output, |s| s as f32 / i16::MAX as f32)
            }
            AudioBufferRef::S24(buf) => {
                Self::interleave(&**buf, output, |s| s.inner() as f32 / I24_MAX)
            }
            AudioBufferRef::S32(buf) => {
                Self::interleave(&**buf, output, |s| (s as f64 / i32::MAX as f64) as f32)
            }
            AudioBufferRef::U8(buf) => {
                Self::interleave(&**buf, output, |s| (s as f32 - 128.0) / 127.0)
            }
            AudioBufferRef::U16(buf) => {
                Self::interleave(&**buf, output, |s| (s as f32 - 32768.0) / 32767.0)
            }
            AudioBufferRef::U24(buf) => {
                Self::interleave(&**buf, output, |s| (s.inner() as f32 - U24_MID) / I24_MAX)
            }
            AudioBufferRef::U32(buf) => Self::interleave(&**buf, output, |s| {
                ((s as f64 - 2_147_483_648.0) / 2_147_483_647.0) as f32
            }),
        }
    }

    /// Interleave planar samples through `convert`, clamping into range
    fn interleave<S: Sample>(buf: &AudioBuffer<S>, output: &mut Vec<f32>, convert: impl Fn(S) -> f32) {
        let num_channels = buf.spec().channels.count();
        let num_frames = buf.frames();
        output.reserve(num_frames * num_channels);

        for frame_idx in 0..num_frames {
            for ch_idx in 0..num_channels {
                let sample = convert(buf.chan(ch_idx)[frame_idx]);
                output.push(sample.clamp(-1.0, 1.0));
            }
        }
    }

    /// Bit depth implied by the decoded buffer's sample type
    fn buffer_bits(decoded: &AudioBufferRef) -> u32 {
        match decoded {
            AudioBufferRef::U8(_) | AudioBufferRef::S8(_) => 8,
            AudioBufferRef::U16(_) | AudioBufferRef::S16(_) => 16,
            AudioBufferRef::U24(_) | AudioBufferRef::S24(_) => 24,
            AudioBufferRef::U32(_) | AudioBufferRef::S32(_) | AudioBufferRef::F32(_) => 32,
            AudioBufferRef::F64(_) => 64,
        }
    }
}
