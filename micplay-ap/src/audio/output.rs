//! Audio output using cpal
//!
//! `CpalHost` implements `AudioHost` over the platform's default cpal host.
//! Each stream is a ring buffer filled by the streaming thread and drained by
//! the cpal callback. Mono configs are preferred; otherwise the mono sample is
//! fanned out to every channel of the narrowest config that covers the rate.

use super::device::{AudioHost, DeviceDescriptor, DeviceHandle, OutputStream, StreamSpec};
use crate::error::DeviceError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig, SupportedBufferSize, SupportedStreamConfigRange};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// A write fails once the device has taken nothing for this long
pub const WRITE_STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Sleep between ring buffer pushes while it is full
const WRITE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Ring capacity in chunks
const RING_CHUNKS: usize = 4;

/// cpal-backed host.
///
/// The cpal host is re-acquired per call; device positions follow
/// `Host::devices()` order.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalHost;

impl CpalHost {
    pub fn new() -> Self {
        Self
    }

    fn device_at(index: usize) -> Option<cpal::Device> {
        cpal::default_host().devices().ok()?.nth(index)
    }

    fn covers(range: &SupportedStreamConfigRange, sample_rate: u32) -> bool {
        range.min_sample_rate().0 <= sample_rate && range.max_sample_rate().0 >= sample_rate
    }

    fn format_rank(format: SampleFormat) -> u8 {
        match format {
            SampleFormat::F32 => 0,
            SampleFormat::I16 => 1,
            SampleFormat::U16 => 2,
            _ => 3,
        }
    }

    /// Pick the narrowest config covering `sample_rate`, f32 first.
    fn choose_config(
        device: &cpal::Device,
        spec: StreamSpec,
    ) -> Result<(StreamConfig, SampleFormat), DeviceError> {
        let configs = device
            .supported_output_configs()
            .map_err(|e| DeviceError::StreamOpenFailed(format!("Failed to get device configs: {}", e)))?;

        let best = configs
            .filter(|c| c.channels() > 0 && Self::covers(c, spec.sample_rate))
            .filter(|c| Self::format_rank(c.sample_format()) < 3)
            .min_by_key(|c| (c.channels(), Self::format_rank(c.sample_format())))
            .ok_or_else(|| {
                DeviceError::StreamOpenFailed(format!(
                    "no output config supports {}Hz",
                    spec.sample_rate
                ))
            })?;

        let buffer_size = match best.buffer_size() {
            SupportedBufferSize::Range { min, max }
                if (*min as usize..=*max as usize).contains(&spec.buffer_size) =>
            {
                cpal::BufferSize::Fixed(spec.buffer_size as u32)
            }
            _ => cpal::BufferSize::Default,
        };

        let sample_format = best.sample_format();
        let mut config = best.with_sample_rate(SampleRate(spec.sample_rate)).config();
        config.buffer_size = buffer_size;
        Ok((config, sample_format))
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut consumer: HeapCons<f32>,
        failure: Arc<StreamFailure>,
    ) -> Result<Stream, DeviceError> {
        let channels = config.channels.max(1) as usize;

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let value = T::from_sample(consumer.try_pop().unwrap_or(0.0));
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    failure.set(err.to_string());
                },
                None,
            )
            .map_err(|e| DeviceError::StreamOpenFailed(format!("Failed to build stream: {}", e)))
    }
}

impl AudioHost for CpalHost {
    fn devices(&self) -> Vec<DeviceDescriptor> {
        let host = cpal::default_host();
        let devices = match host.devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Failed to enumerate devices: {}", e);
                return Vec::new();
            }
        };

        devices
            .enumerate()
            .map(|(index, device)| {
                let max_output_channels = device
                    .supported_output_configs()
                    .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                    .unwrap_or(0);
                let default_sample_rate = device
                    .default_output_config()
                    .map(|c| c.sample_rate().0)
                    .unwrap_or(0);

                DeviceDescriptor {
                    index,
                    name: device.name().unwrap_or_else(|_| "Unknown".to_string()),
                    max_output_channels,
                    default_sample_rate,
                }
            })
            .collect()
    }

    fn default_output(&self) -> Option<usize> {
        let host = cpal::default_host();
        let default_name = host.default_output_device()?.name().ok()?;

        host.devices()
            .ok()?
            .position(|d| d.name().ok().as_deref() == Some(default_name.as_str()))
    }

    fn supports(&self, index: usize, channels: u16, sample_rate: u32) -> bool {
        let Some(device) = Self::device_at(index) else {
            return false;
        };

        // Narrower requests are served by fanning out
        device
            .supported_output_configs()
            .map(|mut configs| configs.any(|c| c.channels() >= channels && Self::covers(&c, sample_rate)))
            .unwrap_or(false)
    }

    fn open_stream(
        &self,
        handle: &DeviceHandle,
        spec: StreamSpec,
    ) -> Result<Box<dyn OutputStream>, DeviceError> {
        let device = Self::device_at(handle.index)
            .ok_or_else(|| DeviceError::StreamOpenFailed(format!("device {} disappeared", handle)))?;

        let name = device.name().unwrap_or_default();
        if name != handle.name {
            return Err(DeviceError::StreamOpenFailed(format!(
                "device list changed: index {} is now '{}'",
                handle.index, name
            )));
        }

        let (config, sample_format) = Self::choose_config(&device, spec)?;
        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}, buffer_size={:?}",
            config.sample_rate.0, config.channels, sample_format, config.buffer_size
        );

        let ring = HeapRb::<f32>::new(spec.buffer_size.max(1) * RING_CHUNKS);
        let (producer, consumer) = ring.split();
        let failure = Arc::new(StreamFailure::default());

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, consumer, Arc::clone(&failure))?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, consumer, Arc::clone(&failure))?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, consumer, Arc::clone(&failure))?,
            other => {
                return Err(DeviceError::StreamOpenFailed(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        };

        stream
            .play()
            .map_err(|e| DeviceError::StreamOpenFailed(format!("Failed to start stream: {}", e)))?;

        info!("Audio stream opened on {} at {}Hz", handle, spec.sample_rate);

        Ok(Box::new(CpalOutputStream {
            stream,
            producer,
            failure,
        }))
    }
}

/// Error reported by the cpal error callback
#[derive(Default)]
struct StreamFailure {
    failed: AtomicBool,
    message: Mutex<Option<String>>,
}

impl StreamFailure {
    fn set(&self, message: String) {
        self.message.lock().get_or_insert(message);
        self.failed.store(true, Ordering::Release);
    }

    fn check(&self) -> Result<(), DeviceError> {
        if !self.failed.load(Ordering::Acquire) {
            return Ok(());
        }
        let message = self
            .message
            .lock()
            .clone()
            .unwrap_or_else(|| "stream error".to_string());
        Err(DeviceError::StreamWriteFailed(message))
    }
}

struct CpalOutputStream {
    stream: Stream,
    producer: HeapProd<f32>,
    failure: Arc<StreamFailure>,
}

impl CpalOutputStream {
    fn stalled() -> DeviceError {
        DeviceError::StreamWriteFailed(format!(
            "device consumed nothing for {}s",
            WRITE_STALL_TIMEOUT.as_secs()
        ))
    }
}

impl OutputStream for CpalOutputStream {
    fn write(&mut self, chunk: &[f32], cancel: &AtomicBool) -> Result<(), DeviceError> {
        let mut remaining = chunk;
        let mut last_progress = Instant::now();

        while !remaining.is_empty() {
            if cancel.load(Ordering::Acquire) {
                return Ok(());
            }
            self.failure.check()?;

            let pushed = self.producer.push_slice(remaining);
            if pushed > 0 {
                remaining = &remaining[pushed..];
                last_progress = Instant::now();
            } else if last_progress.elapsed() >= WRITE_STALL_TIMEOUT {
                return Err(Self::stalled());
            } else {
                thread::sleep(WRITE_POLL_INTERVAL);
            }
        }
        Ok(())
    }

    fn flush(&mut self, cancel: &AtomicBool) -> Result<(), DeviceError> {
        let mut queued = self.producer.occupied_len();
        let mut last_progress = Instant::now();

        while queued > 0 && !cancel.load(Ordering::Acquire) {
            self.failure.check()?;
            thread::sleep(WRITE_POLL_INTERVAL);

            let now_queued = self.producer.occupied_len();
            if now_queued < queued {
                last_progress = Instant::now();
            } else if last_progress.elapsed() >= WRITE_STALL_TIMEOUT {
                return Err(Self::stalled());
            }
            queued = now_queued;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), DeviceError> {
        debug!("Closing audio stream");
        self.stream
            .pause()
            .map_err(|e| DeviceError::StreamWriteFailed(format!("Failed to pause stream: {}", e)))
    }
}
