//! Audio pipeline: decode, condition, and device output

pub mod conditioning;
pub mod decoder;
pub mod device;
pub mod normalizer;
pub mod output;
pub mod resampler;
pub mod types;

pub use decoder::{DecodedAudio, SimpleDecoder};
pub use device::{
    AudioHost, Candidate, DeviceBinding, DeviceDescriptor, DeviceHandle, OutputStream, StreamSpec,
};
pub use normalizer::load;
pub use output::CpalHost;
pub use resampler::Resampler;
pub use types::AudioAsset;
