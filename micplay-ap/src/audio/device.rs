//! Output device binding
//!
//! The binding owns the "current device" decision. Devices are identified by
//! their position in the host's device list, and must accept mono output at
//! the configured rate. Resolution walks an ordered candidate chain:
//! remembered index, system default, then the first enumerated device that
//! plays the rate. Every candidate is checked against the rate.

use crate::error::DeviceError;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Channel count of every output stream
pub const OUTPUT_CHANNELS: u16 = 1;

/// One device as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    /// Position in the host's device list
    pub index: usize,
    pub name: String,
    /// Largest channel count across the device's output configs; 0 for input-only
    pub max_output_channels: u16,
    pub default_sample_rate: u32,
}

/// A validated device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceHandle {
    pub index: usize,
    pub name: String,
    /// Rate the device was validated against
    pub sample_rate: u32,
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.index, self.name)
    }
}

/// Parameters for opening an output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    /// Samples per chunk; also the preferred device buffer size
    pub buffer_size: usize,
}

/// An open mono output stream.
///
/// Streams are created and used on the streaming thread only, so they need
/// not be `Send`.
pub trait OutputStream {
    /// Block until `chunk` is queued for the device.
    ///
    /// Returns early with `Ok` once `cancel` is set.
    fn write(&mut self, chunk: &[f32], cancel: &AtomicBool) -> Result<(), DeviceError>;

    /// Wait for queued samples to play out.
    fn flush(&mut self, _cancel: &AtomicBool) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Stop and release the device.
    fn close(self: Box<Self>) -> Result<(), DeviceError>;
}

/// Access to the platform's audio devices.
pub trait AudioHost: Send + Sync {
    /// Every device, in host order, including ones without outputs
    fn devices(&self) -> Vec<DeviceDescriptor>;

    /// Index of the system default output device
    fn default_output(&self) -> Option<usize>;

    /// Whether device `index` can play `channels` at `sample_rate`
    fn supports(&self, index: usize, channels: u16, sample_rate: u32) -> bool;

    fn open_stream(
        &self,
        device: &DeviceHandle,
        spec: StreamSpec,
    ) -> Result<Box<dyn OutputStream>, DeviceError>;
}

/// Step in the device fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// Previously used index; the only candidate checked against the rate
    Remembered(usize),
    SystemDefault,
    FirstEnumerated,
}

impl Candidate {
    /// Fallback chain, optionally headed by a remembered index
    pub fn chain(remembered: Option<usize>) -> Vec<Candidate> {
        let mut chain = Vec::with_capacity(3);
        if let Some(index) = remembered {
            chain.push(Candidate::Remembered(index));
        }
        chain.push(Candidate::SystemDefault);
        chain.push(Candidate::FirstEnumerated);
        chain
    }
}

/// Tracks the current output device across restarts.
pub struct DeviceBinding {
    host: Arc<dyn AudioHost>,
    sample_rate: u32,
    current: DeviceHandle,
}

impl DeviceBinding {
    /// Resolve the initial device.
    ///
    /// # Errors
    /// `NoOutputDevices` when the host has no device with output channels.
    pub fn new(
        host: Arc<dyn AudioHost>,
        remembered: Option<usize>,
        sample_rate: u32,
    ) -> Result<Self, DeviceError> {
        let current = Self::resolve_chain(host.as_ref(), &Candidate::chain(remembered), sample_rate)?;
        info!("Output device: {} (validated at {}Hz)", current, sample_rate);

        Ok(Self {
            host,
            sample_rate,
            current,
        })
    }

    /// Output-capable devices in host order
    pub fn enumerate(&self) -> Vec<DeviceDescriptor> {
        output_devices(self.host.as_ref())
    }

    /// Whether `index` is an output device that plays mono at `sample_rate`
    pub fn validate(&self, index: usize, sample_rate: u32) -> bool {
        validate_on(self.host.as_ref(), index, sample_rate)
    }

    /// Switch to device `index`.
    ///
    /// An incompatible device is rejected with `IncompatibleDevice`; the
    /// binding then re-runs the fallback chain headed by the previous device
    /// so it never ends up invalid.
    pub fn bind(&mut self, index: usize) -> Result<DeviceHandle, DeviceError> {
        let devices = self.enumerate();
        let reason = match devices.iter().find(|d| d.index == index) {
            None => Some("no output device at this index".to_string()),
            Some(_) if !self.host.supports(index, OUTPUT_CHANNELS, self.sample_rate) => Some(format!(
                "mono output at {}Hz not supported",
                self.sample_rate
            )),
            Some(device) => {
                self.current = DeviceHandle {
                    index,
                    name: device.name.clone(),
                    sample_rate: self.sample_rate,
                };
                None
            }
        };

        let Some(reason) = reason else {
            info!("Bound output device {}", self.current);
            return Ok(self.current.clone());
        };

        warn!("Cannot bind device {}: {}; falling back", index, reason);
        self.rebind_fallback();
        Err(DeviceError::IncompatibleDevice { index, reason })
    }

    /// Index of the current device
    pub fn current(&self) -> usize {
        self.current.index
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.current
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Change the validation rate and re-check the current device.
    ///
    /// If the current device cannot play the new rate the fallback chain runs
    /// and `IncompatibleDevice` is returned.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<(), DeviceError> {
        if sample_rate == self.sample_rate {
            return Ok(());
        }
        debug!("Device validation rate {}Hz -> {}Hz", self.sample_rate, sample_rate);
        self.sample_rate = sample_rate;

        let index = self.current.index;
        if self.validate(index, sample_rate) {
            self.current.sample_rate = sample_rate;
            return Ok(());
        }

        warn!("Device {} does not support {}Hz; falling back", self.current, sample_rate);
        self.rebind_fallback();
        Err(DeviceError::IncompatibleDevice {
            index,
            reason: format!("mono output at {}Hz not supported", sample_rate),
        })
    }

    pub fn host(&self) -> Arc<dyn AudioHost> {
        Arc::clone(&self.host)
    }

    fn rebind_fallback(&mut self) {
        let chain = Candidate::chain(Some(self.current.index));
        match Self::resolve_chain(self.host.as_ref(), &chain, self.sample_rate) {
            Ok(handle) => {
                info!("Fallback output device: {}", handle);
                self.current = handle;
            }
            Err(e) => warn!("Fallback chain failed, keeping {}: {}", self.current, e),
        }
    }

    /// Evaluate `chain` in order, returning the first candidate that resolves.
    fn resolve_chain(
        host: &dyn AudioHost,
        chain: &[Candidate],
        sample_rate: u32,
    ) -> Result<DeviceHandle, DeviceError> {
        let devices = output_devices(host);

        let playable = |index: usize| host.supports(index, OUTPUT_CHANNELS, sample_rate);

        for candidate in chain {
            let resolved = match *candidate {
                Candidate::Remembered(index) => devices.iter().find(|d| d.index == index),
                Candidate::SystemDefault => host
                    .default_output()
                    .and_then(|index| devices.iter().find(|d| d.index == index)),
                Candidate::FirstEnumerated => devices.iter().find(|d| playable(d.index)),
            };

            match resolved {
                Some(device) if playable(device.index) => {
                    debug!("Device candidate {:?} resolved to [{}] {}", candidate, device.index, device.name);
                    return Ok(handle_for(device, sample_rate));
                }
                Some(device) => {
                    warn!("Device candidate {:?} ([{}] {}) unavailable at {}Hz", candidate, device.index, device.name, sample_rate);
                }
                None => {}
            }
        }

        // Nothing plays this rate; keep an output device so the binding stays
        // usable, and let the stream start report the incompatibility.
        let Some(device) = devices.first() else {
            return Err(DeviceError::NoOutputDevices);
        };
        warn!("No output device plays mono at {}Hz; using [{}] {}", sample_rate, device.index, device.name);
        Ok(handle_for(device, sample_rate))
    }
}

fn output_devices(host: &dyn AudioHost) -> Vec<DeviceDescriptor> {
    host.devices()
        .into_iter()
        .filter(|d| d.max_output_channels > 0)
        .collect()
}

fn handle_for(device: &DeviceDescriptor, sample_rate: u32) -> DeviceHandle {
    DeviceHandle {
        index: device.index,
        name: device.name.clone(),
        sample_rate,
    }
}

fn validate_on(host: &dyn AudioHost, index: usize, sample_rate: u32) -> bool {
    output_devices(host).iter().any(|d| d.index == index)
        && host.supports(index, OUTPUT_CHANNELS, sample_rate)
}
