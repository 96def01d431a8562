//! Streaming thread
//!
//! One thread per playback session. It opens the device stream itself (cpal
//! streams cannot cross threads), reports the open result back through a
//! rendezvous channel, then pulls fixed-size chunks from the asset until the
//! buffer ends, the device fails, or the session is cancelled.

use super::engine::Shared;
use super::events::{PlaybackEvent, SessionId};
use super::state::PlaybackStatus;
use crate::audio::conditioning::{apply_gain, limit_chunk};
use crate::audio::{AudioAsset, AudioHost, DeviceHandle, OutputStream, StreamSpec};
use crate::error::{DeviceError, Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Bounded wait while paused
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

const THREAD_NAME: &str = "micplay-stream";

/// What the streaming loop does next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStep {
    /// Play `samples[start..end]`, zero-padded to the chunk size
    Play { start: usize, end: usize },
    EndOfBuffer,
}

/// Locate the chunk starting at `position` seconds.
///
/// A buffer shorter than one chunk is played once, padded, from the start.
pub fn next_chunk(len: usize, position: f64, sample_rate: u32, chunk_size: usize) -> ChunkStep {
    let start = (position * sample_rate as f64).round().max(0.0) as usize;
    let end = start + chunk_size;

    if end <= len {
        ChunkStep::Play { start, end }
    } else if start == 0 && len > 0 {
        ChunkStep::Play { start: 0, end: len }
    } else {
        ChunkStep::EndOfBuffer
    }
}

/// Copy `source` into `chunk`, pad to `chunk_size`, then apply gain and the
/// optional limiter.
pub fn fill_chunk(chunk: &mut Vec<f32>, source: &[f32], chunk_size: usize, gain: f32, limit: bool) {
    chunk.clear();
    chunk.extend_from_slice(source);
    chunk.resize(chunk_size, 0.0);
    apply_gain(chunk, gain);
    if limit {
        limit_chunk(chunk);
    }
}

/// Everything the streaming thread needs
pub(crate) struct StreamContext {
    pub shared: Arc<Shared>,
    pub cancel: Arc<AtomicBool>,
    pub session: SessionId,
    pub asset: Arc<AudioAsset>,
    pub chunk_size: usize,
    /// Voice mode anti-clip limiter
    pub limiter: bool,
    pub events: Sender<PlaybackEvent>,
}

enum Outcome {
    Finished,
    Cancelled,
    Failed(DeviceError),
}

/// Handle to a running streaming thread
pub(crate) struct Worker {
    session: SessionId,
    cancel: Arc<AtomicBool>,
    shared: Arc<Shared>,
    thread: JoinHandle<()>,
}

impl Worker {
    /// Start the streaming thread and wait until it has opened the device.
    pub fn spawn(
        ctx: StreamContext,
        host: Arc<dyn AudioHost>,
        device: DeviceHandle,
        spec: StreamSpec,
    ) -> Result<Self> {
        let session = ctx.session;
        let cancel = Arc::clone(&ctx.cancel);
        let shared = Arc::clone(&ctx.shared);
        let (ready_tx, ready_rx) = mpsc::sync_channel::<std::result::Result<(), DeviceError>>(1);

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let stream = match host.open_stream(&device, spec) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                ctx.run(stream);
            })
            .map_err(|e| Error::Internal(format!("Failed to spawn streaming thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                session,
                cancel,
                shared,
                thread,
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e.into())
            }
            Err(_) => {
                let _ = thread.join();
                Err(Error::Internal(
                    "streaming thread exited before opening the device".to_string(),
                ))
            }
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Cancel the session and wait for the thread to release the device.
    ///
    /// The join is skipped when called from the streaming thread itself.
    pub fn halt(self) {
        self.cancel.store(true, Ordering::Release);
        {
            let _session = self.shared.session.lock();
            self.shared.wake.notify_all();
        }

        if self.thread.thread().id() == thread::current().id() {
            return;
        }
        if self.thread.join().is_err() {
            error!("Streaming thread for session {} panicked", self.session);
        }
    }
}

impl StreamContext {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn run(self, mut stream: Box<dyn OutputStream>) {
        info!(
            "Session {} streaming {} samples/chunk at {}Hz",
            self.session, self.chunk_size, self.asset.sample_rate
        );

        let outcome = self.stream_loop(stream.as_mut());

        // End is reported once the last chunk is queued, before the drain
        match outcome {
            Outcome::Finished => {
                info!("Session {} reached end of buffer", self.session);
                let _ = self.events.send(PlaybackEvent::Ended { session: self.session });
                if let Err(e) = stream.flush(&self.cancel) {
                    warn!("Output did not drain: {}", e);
                }
            }
            Outcome::Failed(e) => {
                let _ = self.events.send(PlaybackEvent::DeviceError { message: e.to_string() });
                let _ = self.events.send(PlaybackEvent::Ended { session: self.session });
            }
            Outcome::Cancelled => debug!("Session {} cancelled", self.session),
        }

        if let Err(e) = stream.close() {
            warn!("Failed to release output stream: {}", e);
        }
    }

    fn stream_loop(&self, stream: &mut dyn OutputStream) -> Outcome {
        let samples = &self.asset.samples;
        let sample_rate = self.asset.sample_rate;
        let duration = self.asset.duration();
        let chunk_period = self.chunk_size as f64 / sample_rate as f64;
        let mut chunk = Vec::with_capacity(self.chunk_size);

        loop {
            let started_at = {
                let mut session = self.shared.session.lock();
                loop {
                    if self.cancelled() {
                        return Outcome::Cancelled;
                    }
                    match session.state.status {
                        PlaybackStatus::Playing => break,
                        PlaybackStatus::Paused => {
                            self.shared.wake.wait_for(&mut session, PAUSE_POLL_INTERVAL);
                        }
                        _ => return Outcome::Cancelled,
                    }
                }

                let position = session.state.position;
                match next_chunk(samples.len(), position, sample_rate, self.chunk_size) {
                    ChunkStep::Play { start, end } => {
                        fill_chunk(
                            &mut chunk,
                            &samples[start..end],
                            self.chunk_size,
                            session.state.effective_gain(),
                            self.limiter,
                        );
                        position
                    }
                    ChunkStep::EndOfBuffer if session.state.looping => {
                        debug!("Session {} looping to start", self.session);
                        session.state.position = 0.0;
                        continue;
                    }
                    ChunkStep::EndOfBuffer => {
                        session.state.status = PlaybackStatus::Stopped;
                        session.state.position = 0.0;
                        return Outcome::Finished;
                    }
                }
            };

            if let Err(e) = stream.write(&chunk, &self.cancel) {
                if self.cancelled() {
                    return Outcome::Cancelled;
                }
                error!("Session {} device write failed: {}", self.session, e);
                let mut session = self.shared.session.lock();
                session.state.status = PlaybackStatus::Stopped;
                session.state.position = 0.0;
                return Outcome::Failed(e);
            }

            // A seek during the write wins over the advance
            let mut session = self.shared.session.lock();
            if !self.cancelled() && session.state.position == started_at {
                session.state.position = (started_at + chunk_period).min(duration);
            }
        }
    }
}
