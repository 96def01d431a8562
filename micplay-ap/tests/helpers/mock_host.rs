//! In-memory audio host
//!
//! Records everything written, and can hold writes (the streaming thread
//! blocks until released or cancelled), slow down writes or the final drain,
//! fail after N chunks, or refuse to open a stream.

use micplay_ap::audio::{AudioHost, DeviceDescriptor, DeviceHandle, OutputStream, StreamSpec};
use micplay_ap::DeviceError;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Samples kept for inspection; later writes are only counted
const RECORD_LIMIT: usize = 1 << 21;

#[derive(Debug, Clone)]
pub struct MockDevice {
    pub name: &'static str,
    pub channels: u16,
}

impl MockDevice {
    pub fn output(name: &'static str) -> Self {
        Self { name, channels: 2 }
    }

    pub fn input_only(name: &'static str) -> Self {
        Self { name, channels: 0 }
    }
}

#[derive(Default)]
struct MockState {
    devices: Mutex<Vec<MockDevice>>,
    default_output: Mutex<Option<usize>>,
    rejected: Mutex<HashSet<usize>>,
    rejected_rates: Mutex<HashSet<(usize, u32)>>,

    hold: AtomicBool,
    fail_after: Mutex<Option<usize>>,
    open_error: Mutex<Option<DeviceError>>,
    write_delay: Mutex<Duration>,
    flush_delay: Mutex<Duration>,

    samples: Mutex<Vec<f32>>,
    samples_written: AtomicUsize,
    chunks_written: AtomicUsize,
    open_streams: AtomicUsize,
    max_open_streams: AtomicUsize,
    streams_opened: AtomicUsize,
    last_spec: Mutex<Option<StreamSpec>>,
    last_device: Mutex<Option<DeviceHandle>>,
}

#[derive(Clone, Default)]
pub struct MockHost {
    state: Arc<MockState>,
}

impl MockHost {
    /// Host with the given devices; device 0 is the system default.
    pub fn new(devices: Vec<MockDevice>) -> Self {
        let host = Self::default();
        let has_devices = !devices.is_empty();
        *host.state.devices.lock() = devices;
        *host.state.default_output.lock() = has_devices.then_some(0);
        host
    }

    /// Two stereo outputs: "Speakers" (default) and "CABLE Input"
    pub fn standard() -> Self {
        Self::new(vec![MockDevice::output("Speakers"), MockDevice::output("CABLE Input")])
    }

    pub fn as_host(&self) -> Arc<dyn AudioHost> {
        Arc::new(self.clone())
    }

    pub fn set_default_output(&self, index: Option<usize>) {
        *self.state.default_output.lock() = index;
    }

    /// Device never validates
    pub fn reject(&self, index: usize) {
        self.state.rejected.lock().insert(index);
    }

    pub fn reject_rate(&self, index: usize, sample_rate: u32) {
        self.state.rejected_rates.lock().insert((index, sample_rate));
    }

    pub fn set_hold(&self, hold: bool) {
        self.state.hold.store(hold, Ordering::SeqCst);
    }

    /// Writes fail once `chunks` chunks have been written
    pub fn fail_after(&self, chunks: usize) {
        *self.state.fail_after.lock() = Some(chunks);
    }

    pub fn fail_open(&self, error: DeviceError) {
        *self.state.open_error.lock() = Some(error);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        *self.state.write_delay.lock() = delay;
    }

    /// Draining a stream takes `delay` unless cancelled
    pub fn set_flush_delay(&self, delay: Duration) {
        *self.state.flush_delay.lock() = delay;
    }

    pub fn samples(&self) -> Vec<f32> {
        self.state.samples.lock().clone()
    }

    pub fn samples_written(&self) -> usize {
        self.state.samples_written.load(Ordering::SeqCst)
    }

    pub fn chunks_written(&self) -> usize {
        self.state.chunks_written.load(Ordering::SeqCst)
    }

    pub fn open_streams(&self) -> usize {
        self.state.open_streams.load(Ordering::SeqCst)
    }

    pub fn max_open_streams(&self) -> usize {
        self.state.max_open_streams.load(Ordering::SeqCst)
    }

    pub fn streams_opened(&self) -> usize {
        self.state.streams_opened.load(Ordering::SeqCst)
    }

    pub fn last_spec(&self) -> Option<StreamSpec> {
        *self.state.last_spec.lock()
    }

    pub fn last_device(&self) -> Option<DeviceHandle> {
        self.state.last_device.lock().clone()
    }
}

impl AudioHost for MockHost {
    fn devices(&self) -> Vec<DeviceDescriptor> {
        self.state
            .devices
            .lock()
            .iter()
            .enumerate()
            .map(|(index, device)| DeviceDescriptor {
                index,
                name: device.name.to_string(),
                max_output_channels: device.channels,
                default_sample_rate: 48000,
            })
            .collect()
    }

    fn default_output(&self) -> Option<usize> {
        *self.state.default_output.lock()
    }

    fn supports(&self, index: usize, channels: u16, sample_rate: u32) -> bool {
        let Some(device) = self.state.devices.lock().get(index).cloned() else {
            return false;
        };
        device.channels >= channels
            && !self.state.rejected.lock().contains(&index)
            && !self.state.rejected_rates.lock().contains(&(index, sample_rate))
    }

    fn open_stream(
        &self,
        device: &DeviceHandle,
        spec: StreamSpec,
    ) -> Result<Box<dyn OutputStream>, DeviceError> {
        if let Some(error) = self.state.open_error.lock().clone() {
            return Err(error);
        }

        let open = self.state.open_streams.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open_streams.fetch_max(open, Ordering::SeqCst);
        self.state.streams_opened.fetch_add(1, Ordering::SeqCst);
        *self.state.last_spec.lock() = Some(spec);
        *self.state.last_device.lock() = Some(device.clone());

        Ok(Box::new(MockStream {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockStream {
    state: Arc<MockState>,
}

impl OutputStream for MockStream {
    fn write(&mut self, chunk: &[f32], cancel: &AtomicBool) -> Result<(), DeviceError> {
        while self.state.hold.load(Ordering::SeqCst) {
            if cancel.load(Ordering::SeqCst) {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(1));
        }

        let delay = *self.state.write_delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        if let Some(limit) = *self.state.fail_after.lock() {
            if self.state.chunks_written.load(Ordering::SeqCst) >= limit {
                return Err(DeviceError::StreamWriteFailed("injected failure".to_string()));
            }
        }

        {
            let mut samples = self.state.samples.lock();
            if samples.len() < RECORD_LIMIT {
                samples.extend_from_slice(chunk);
            }
        }
        self.state.samples_written.fetch_add(chunk.len(), Ordering::SeqCst);
        self.state.chunks_written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn flush(&mut self, cancel: &AtomicBool) -> Result<(), DeviceError> {
        let deadline = Instant::now() + *self.state.flush_delay.lock();
        while Instant::now() < deadline && !cancel.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), DeviceError> {
        Ok(())
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.state.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}
