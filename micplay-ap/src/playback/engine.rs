//! Playback engine
//!
//! Owns the loaded asset, the transport state machine and the streaming
//! thread. Lock order: `control` -> `binding` / `worker` -> `shared.session`.
//!
//! Mutating operations (load, play, pause, resume, toggle, stop, reloads) hold the
//! control lock for their whole duration, so a reload never races a chunk
//! write: the streaming thread is joined before the asset is replaced.
//! `seek`, `set_volume`, `toggle_mute` and `set_looping` only take the
//! session lock and are picked up at the next chunk boundary.

use super::events::{PlaybackEvent, PlaybackObserver, SessionId};
use super::state::{PlaybackSnapshot, PlaybackState, PlaybackStatus};
use super::worker::{StreamContext, Worker};
use crate::audio::{
    self, AudioAsset, AudioHost, DeviceBinding, DeviceDescriptor, DeviceHandle, StreamSpec,
};
use crate::error::{DeviceError, Error, Result, StateError};
use micplay_common::{VoiceModeConfig, VoiceQuality};
use parking_lot::{Condvar, Mutex};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Everything guarded by the session lock
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub state: PlaybackState,
    pub asset: Option<Arc<AudioAsset>>,
    /// Last requested file; reloads decode it again
    pub path: Option<PathBuf>,
    pub voice: VoiceModeConfig,
    /// Session whose end may still be reported; cleared by `load`
    pub active: Option<SessionId>,
}

/// State shared with the streaming thread
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub session: Mutex<Session>,
    /// Wakes a paused streaming loop
    pub wake: Condvar,
}

type ObserverSlot = Arc<Mutex<Option<Arc<dyn PlaybackObserver>>>>;

/// Snapshot of what a reload has to put back
struct Resume {
    was_playing: bool,
    was_paused: bool,
    position: f64,
    looping: bool,
}

/// Single-stream playback engine.
pub struct PlaybackEngine {
    control: Mutex<()>,
    shared: Arc<Shared>,
    binding: Mutex<DeviceBinding>,
    worker: Mutex<Option<Worker>>,
    observer: ObserverSlot,
    events: Sender<PlaybackEvent>,
}

impl PlaybackEngine {
    /// Create an idle engine bound to `binding`.
    ///
    /// The binding's validation rate is aligned with `voice`.
    ///
    /// # Errors
    /// `Internal` if the notifier thread cannot be started.
    pub fn new(mut binding: DeviceBinding, voice: VoiceModeConfig) -> Result<Self> {
        if let Err(e) = binding.set_sample_rate(voice.device_sample_rate()) {
            warn!("Initial device rejected for {}: {}", voice, e);
        }

        let shared = Arc::new(Shared::default());
        shared.session.lock().voice = voice;

        let observer: ObserverSlot = Arc::new(Mutex::new(None));
        let events = spawn_notifier(Arc::clone(&observer), Arc::clone(&shared))?;

        info!("Playback engine ready ({}, device {})", voice, binding.handle());

        Ok(Self {
            control: Mutex::new(()),
            shared,
            binding: Mutex::new(binding),
            worker: Mutex::new(None),
            observer,
            events,
        })
    }

    /// Register the collaborator notified of end-of-stream and device errors.
    pub fn set_observer(&self, observer: Arc<dyn PlaybackObserver>) {
        *self.observer.lock() = Some(observer);
    }

    pub fn clear_observer(&self) {
        *self.observer.lock() = None;
    }

    /// Decode `path` with the current voice settings. Returns the duration.
    ///
    /// Any active stream is stopped first. On failure the engine is left idle
    /// with no buffer.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<f64> {
        let _control = self.control.lock();
        self.load_locked(path.as_ref())
    }

    /// Start playback.
    ///
    /// From `Paused` this is `resume()` and `looping` is ignored. From
    /// `Playing` the stream restarts at 0; from `Loaded` or `Stopped` it
    /// starts at the current position.
    pub fn play(&self, looping: bool) -> Result<()> {
        let _control = self.control.lock();
        self.play_locked(looping)
    }

    pub fn pause(&self) -> Result<()> {
        let _control = self.control.lock();
        let mut session = self.shared.session.lock();
        if session.state.status != PlaybackStatus::Playing {
            return Err(StateError::NotPlaying.into());
        }
        session.state.status = PlaybackStatus::Paused;
        info!("Paused at {:.2}s", session.state.position);
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        let _control = self.control.lock();
        self.resume_locked()
    }

    /// Pause when playing, resume when paused, otherwise start the loaded
    /// asset with the current loop flag. Returns the resulting status.
    ///
    /// The status check and the transition happen under one lock, so a
    /// session ending concurrently restarts playback instead of failing.
    pub fn toggle_playback(&self) -> Result<PlaybackStatus> {
        let _control = self.control.lock();
        let looping = {
            let mut session = self.shared.session.lock();
            match session.state.status {
                PlaybackStatus::Playing => {
                    session.state.status = PlaybackStatus::Paused;
                    info!("Paused at {:.2}s", session.state.position);
                    return Ok(PlaybackStatus::Paused);
                }
                PlaybackStatus::Paused => {
                    session.state.status = PlaybackStatus::Playing;
                    self.shared.wake.notify_all();
                    info!("Resumed at {:.2}s", session.state.position);
                    return Ok(PlaybackStatus::Playing);
                }
                _ => session.state.looping,
            }
        };

        self.play_locked(looping)?;
        Ok(self.status())
    }

    /// Stop playback and rewind. Idempotent; never reports end-of-stream.
    pub fn stop(&self) {
        let _control = self.control.lock();
        self.stop_locked();
    }

    /// Move to `position` seconds, clamped into the asset. Returns the new
    /// position; non-finite input leaves it unchanged.
    pub fn seek(&self, position: f64) -> f64 {
        let mut session = self.shared.session.lock();
        if !position.is_finite() {
            return session.state.position;
        }
        let duration = session.asset.as_ref().map_or(0.0, |a| a.duration());
        session.state.position = position.clamp(0.0, duration);
        debug!("Seek to {:.3}s", session.state.position);
        session.state.position
    }

    /// Returns the resulting volume
    pub fn set_volume(&self, volume: f32) -> f32 {
        self.shared.session.lock().state.set_volume(volume)
    }

    /// Returns true when now muted
    pub fn toggle_mute(&self) -> bool {
        let muted = self.shared.session.lock().state.toggle_mute();
        info!("{}", if muted { "Muted" } else { "Unmuted" });
        muted
    }

    /// Change the loop flag; a running stream honours it at the next end of buffer.
    pub fn set_looping(&self, looping: bool) {
        self.shared.session.lock().state.looping = looping;
    }

    /// Stop, reload with current settings and resume where playback was.
    pub fn restart_playback(&self) -> Result<()> {
        let _control = self.control.lock();
        self.reload_locked()
    }

    /// Switch output device and restart playback on it.
    ///
    /// An incompatible index leaves the binding on a fallback device;
    /// playback is restarted there and `IncompatibleDevice` is returned.
    pub fn change_device(&self, index: usize) -> Result<DeviceHandle> {
        let _control = self.control.lock();
        let bound = self.binding.lock().bind(index);
        self.reload_locked()?;
        Ok(bound?)
    }

    /// Enable or disable voice mode; the asset is reloaded.
    pub fn set_voice_mode(&self, enabled: bool) -> Result<()> {
        let _control = self.control.lock();
        let voice = {
            let mut session = self.shared.session.lock();
            if session.voice.enabled == enabled {
                return Ok(());
            }
            session.voice.enabled = enabled;
            session.voice
        };
        info!("Switching to {}", voice);
        self.apply_voice_rate(voice);
        self.reload_locked()
    }

    /// Change the voice tier. Reloads only while voice mode is enabled.
    pub fn set_voice_quality(&self, quality: VoiceQuality) -> Result<()> {
        let _control = self.control.lock();
        let voice = {
            let mut session = self.shared.session.lock();
            if session.voice.quality == quality {
                return Ok(());
            }
            session.voice.quality = quality;
            session.voice
        };

        if !voice.enabled {
            debug!("Voice quality set to {} (voice mode off, no reload)", quality);
            return Ok(());
        }
        info!("Switching to {}", voice);
        self.apply_voice_rate(voice);
        self.reload_locked()
    }

    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        self.binding.lock().enumerate()
    }

    pub fn current_device(&self) -> DeviceHandle {
        self.binding.lock().handle().clone()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let device = self.binding.lock().current();
        let session = self.shared.session.lock();
        PlaybackSnapshot {
            status: session.state.status,
            position: session.state.position,
            duration: session.asset.as_ref().map_or(0.0, |a| a.duration()),
            volume: session.state.volume,
            muted: session.state.muted,
            looping: session.state.looping,
            sample_rate: session.asset.as_ref().map(|a| a.sample_rate),
            device,
            voice: session.voice,
            session: session.active,
        }
    }

    /// Most recently started session, until the next `load`
    pub fn current_session(&self) -> Option<SessionId> {
        self.shared.session.lock().active
    }

    pub fn status(&self) -> PlaybackStatus {
        self.shared.session.lock().state.status
    }

    pub fn is_playing(&self) -> bool {
        self.shared.session.lock().state.is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.shared.session.lock().state.is_paused()
    }

    pub fn is_looping(&self) -> bool {
        self.shared.session.lock().state.looping
    }

    pub fn is_muted(&self) -> bool {
        self.shared.session.lock().state.muted
    }

    pub fn position(&self) -> f64 {
        self.shared.session.lock().state.position
    }

    pub fn volume(&self) -> f32 {
        self.shared.session.lock().state.volume
    }

    /// Duration of the loaded asset; 0 when nothing is loaded
    pub fn duration(&self) -> f64 {
        self.shared
            .session
            .lock()
            .asset
            .as_ref()
            .map_or(0.0, |a| a.duration())
    }

    pub fn voice(&self) -> VoiceModeConfig {
        self.shared.session.lock().voice
    }

    /// Loaded asset, shared
    pub fn asset(&self) -> Option<Arc<AudioAsset>> {
        self.shared.session.lock().asset.clone()
    }

    fn load_locked(&self, path: &Path) -> Result<f64> {
        self.stop_locked();

        let voice = {
            let mut session = self.shared.session.lock();
            session.asset = None;
            session.active = None;
            session.path = Some(path.to_path_buf());
            session.state.status = PlaybackStatus::Idle;
            session.state.position = 0.0;
            session.voice
        };

        // Decode without the session lock so progress readers are not blocked
        match audio::load(path, &voice) {
            Ok(asset) => {
                let duration = asset.duration();
                let mut session = self.shared.session.lock();
                session.asset = Some(Arc::new(asset));
                session.state.status = PlaybackStatus::Loaded;
                info!("Loaded {} ({:.2}s)", path.display(), duration);
                Ok(duration)
            }
            Err(e) => {
                warn!("Load failed: {}", e);
                Err(e.into())
            }
        }
    }

    fn play_locked(&self, looping: bool) -> Result<()> {
        let status = self.shared.session.lock().state.status;
        match status {
            PlaybackStatus::Paused => return self.resume_locked(),
            PlaybackStatus::Idle => {
                warn!("Play requested with no buffer loaded");
                return Err(StateError::NoBufferLoaded.into());
            }
            PlaybackStatus::Playing => self.stop_locked(),
            PlaybackStatus::Loaded | PlaybackStatus::Stopped => self.halt_worker(),
        }
        self.start_stream(looping, false)
    }

    fn resume_locked(&self) -> Result<()> {
        let mut session = self.shared.session.lock();
        if session.state.status != PlaybackStatus::Paused {
            return Err(StateError::NotPaused.into());
        }
        session.state.status = PlaybackStatus::Playing;
        self.shared.wake.notify_all();
        info!("Resumed at {:.2}s", session.state.position);
        Ok(())
    }

    /// Open the device and start a new session. Must follow `halt_worker`.
    fn start_stream(&self, looping: bool, paused: bool) -> Result<()> {
        let (asset, voice) = {
            let session = self.shared.session.lock();
            let asset = session.asset.clone().ok_or(StateError::NoBufferLoaded)?;
            (asset, session.voice)
        };

        let (host, device) = match self.bind_for_rate(asset.sample_rate) {
            Ok(bound) => bound,
            Err(e) => return Err(self.start_failed(e.into())),
        };

        let session_id = Uuid::new_v4();
        {
            let mut session = self.shared.session.lock();
            session.active = Some(session_id);
            session.state.looping = looping;
            session.state.status = if paused {
                PlaybackStatus::Paused
            } else {
                PlaybackStatus::Playing
            };
        }

        let chunk_size = voice.chunk_size();
        let spec = StreamSpec {
            sample_rate: asset.sample_rate,
            buffer_size: chunk_size,
        };
        let ctx = StreamContext {
            shared: Arc::clone(&self.shared),
            cancel: Arc::new(AtomicBool::new(false)),
            session: session_id,
            asset,
            chunk_size,
            limiter: voice.enabled,
            events: self.events.clone(),
        };

        match Worker::spawn(ctx, host, device.clone(), spec) {
            Ok(worker) => {
                info!(
                    "Playing on {} (session {}, loop={})",
                    device,
                    worker.session(),
                    looping
                );
                *self.worker.lock() = Some(worker);
                Ok(())
            }
            Err(e) => {
                warn!("Could not start playback on {}: {}", device, e);
                Err(self.start_failed(e))
            }
        }
    }

    /// Check the bound device against the asset's rate before opening it.
    ///
    /// The validation rate follows the asset (the voice tier's rate, or the
    /// native rate in standard mode). A device that cannot play it triggers
    /// the fallback chain; the start fails only if the device finally bound
    /// still cannot play the rate.
    fn bind_for_rate(
        &self,
        sample_rate: u32,
    ) -> std::result::Result<(Arc<dyn AudioHost>, DeviceHandle), DeviceError> {
        let mut binding = self.binding.lock();
        if let Err(e) = binding.set_sample_rate(sample_rate) {
            warn!("{}", e);
        }
        if !binding.validate(binding.current(), sample_rate) {
            return Err(DeviceError::IncompatibleDevice {
                index: binding.current(),
                reason: format!("no output device plays mono at {}Hz", sample_rate),
            });
        }
        Ok((binding.host(), binding.handle().clone()))
    }

    /// Leave the engine stopped after a failed start and report the device error.
    fn start_failed(&self, e: Error) -> Error {
        self.shared.session.lock().state.status = PlaybackStatus::Stopped;
        if let Error::Device(device_error) = &e {
            let _ = self.events.send(PlaybackEvent::DeviceError {
                message: device_error.to_string(),
            });
        }
        e
    }

    fn stop_locked(&self) {
        self.halt_worker();

        let mut session = self.shared.session.lock();
        if session.state.is_playing() {
            info!("Stopped");
        }
        session.state.status = if session.asset.is_some() {
            PlaybackStatus::Stopped
        } else {
            PlaybackStatus::Idle
        };
        session.state.position = 0.0;
    }

    /// Cancel and join the streaming thread, if any, without touching state.
    fn halt_worker(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.halt();
        }
    }

    fn apply_voice_rate(&self, voice: VoiceModeConfig) {
        if let Err(e) = self.binding.lock().set_sample_rate(voice.device_sample_rate()) {
            warn!("Device change forced by {}: {}", voice, e);
        }
    }

    /// Stop, reload the current file and put position/loop/play state back.
    fn reload_locked(&self) -> Result<()> {
        let (resume, path) = {
            let session = self.shared.session.lock();
            let resume = Resume {
                was_playing: session.state.is_playing(),
                was_paused: session.state.is_paused(),
                position: session.state.position,
                looping: session.state.looping,
            };
            (resume, session.path.clone())
        };

        let Some(path) = path else {
            debug!("Nothing loaded, settings apply to the next load");
            return Ok(());
        };

        self.stop_locked();
        self.load_locked(&path)?;

        {
            let mut session = self.shared.session.lock();
            let duration = session.asset.as_ref().map_or(0.0, |a| a.duration());
            session.state.position = resume.position.clamp(0.0, duration);
            session.state.looping = resume.looping;
            debug!("Reload restored position {:.3}s", session.state.position);
        }

        if resume.was_playing {
            self.start_stream(resume.looping, resume.was_paused)?;
        }
        Ok(())
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.halt_worker();
    }
}

/// Deliver events to the registered observer from a dedicated thread.
///
/// An end notification is dropped once its session is no longer the active
/// one (a newer session started, or another file was loaded).
fn spawn_notifier(observer: ObserverSlot, shared: Arc<Shared>) -> Result<Sender<PlaybackEvent>> {
    let (tx, rx) = mpsc::channel::<PlaybackEvent>();

    thread::Builder::new()
        .name("micplay-notify".to_string())
        .spawn(move || {
            for event in rx {
                if let PlaybackEvent::Ended { session } = &event {
                    let active = shared.session.lock().active;
                    if active != Some(*session) {
                        debug!("Dropping end of superseded session {}", session);
                        continue;
                    }
                }

                let current = observer.lock().clone();
                match current {
                    Some(observer) => event.dispatch(observer.as_ref()),
                    None => debug!("No observer for {:?}", event),
                }
            }
        })
        .map_err(|e| Error::Internal(format!("Failed to spawn notifier thread: {}", e)))?;

    Ok(tx)
}
