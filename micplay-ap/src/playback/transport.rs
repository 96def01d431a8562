//! Transport façade
//!
//! The operation set offered to front ends, plus a line-oriented command
//! syntax for the CLI:
//!
//! ```text
//! load <path>     play [loop]     pause     resume     toggle     stop
//! seek <sec>      fwd             back      vol <0..1> up         down
//! mute            loop            device <index>       devices
//! next            prev            track <index>        tracks
//! voice on|off    quality low|medium|high              status
//! ```

use super::engine::PlaybackEngine;
use super::playlist::Playlist;
use super::state::{PlaybackSnapshot, PlaybackStatus, VOLUME_STEP};
use crate::audio::{DeviceDescriptor, DeviceHandle};
use crate::error::{Error, Result, StateError};
use micplay_common::human_time::{format_clock, format_remaining};
use micplay_common::VoiceQuality;
use std::fmt;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Seconds moved by `fwd` / `back`
pub const SEEK_STEP_SECS: f64 = 5.0;

/// Parsed operator command
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    Load(PathBuf),
    Play { looping: bool },
    Pause,
    Resume,
    TogglePlayPause,
    Stop,
    Seek(f64),
    Forward,
    Back,
    Volume(f32),
    VolumeUp,
    VolumeDown,
    ToggleMute,
    ToggleLoop,
    Device(usize),
    Devices,
    Next,
    Previous,
    Track(usize),
    Tracks,
    VoiceMode(bool),
    Quality(VoiceQuality),
    Status,
}

impl FromStr for TransportCommand {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let bad = |msg: &str| Error::BadCommand(format!("{}: {}", line, msg));

        let command = match (verb.to_ascii_lowercase().as_str(), rest) {
            ("load", "") => return Err(bad("missing file path")),
            ("load", path) => TransportCommand::Load(PathBuf::from(path)),
            ("play", "") => TransportCommand::Play { looping: false },
            ("play", "loop") => TransportCommand::Play { looping: true },
            ("pause", "") => TransportCommand::Pause,
            ("resume", "") => TransportCommand::Resume,
            ("toggle", "") => TransportCommand::TogglePlayPause,
            ("stop", "") => TransportCommand::Stop,
            ("seek", value) => TransportCommand::Seek(
                value.parse().map_err(|_| bad("expected seconds"))?,
            ),
            ("fwd", "") => TransportCommand::Forward,
            ("back", "") => TransportCommand::Back,
            ("vol", value) => TransportCommand::Volume(
                value.parse().map_err(|_| bad("expected a volume between 0 and 1"))?,
            ),
            ("up", "") => TransportCommand::VolumeUp,
            ("down", "") => TransportCommand::VolumeDown,
            ("mute", "") => TransportCommand::ToggleMute,
            ("loop", "") => TransportCommand::ToggleLoop,
            ("device", value) => TransportCommand::Device(
                value.parse().map_err(|_| bad("expected a device index"))?,
            ),
            ("devices", "") => TransportCommand::Devices,
            ("next", "") => TransportCommand::Next,
            ("prev", "") | ("previous", "") => TransportCommand::Previous,
            ("track", value) => TransportCommand::Track(
                value.parse().map_err(|_| bad("expected a track index"))?,
            ),
            ("tracks", "") => TransportCommand::Tracks,
            ("voice", "on") => TransportCommand::VoiceMode(true),
            ("voice", "off") => TransportCommand::VoiceMode(false),
            ("quality", value) => TransportCommand::Quality(value.parse()?),
            ("status", "") => TransportCommand::Status,
            ("", _) => return Err(bad("empty command")),
            _ => return Err(bad("unknown command")),
        };
        Ok(command)
    }
}

/// Result of a command, for display
#[derive(Debug, Clone, PartialEq)]
pub enum TransportReply {
    Done,
    Loaded { duration: f64 },
    Position { position: f64, duration: f64 },
    Volume { volume: f32, muted: bool },
    Looping(bool),
    Devices { devices: Vec<DeviceDescriptor>, current: usize },
    Device(DeviceHandle),
    Track { index: usize, path: PathBuf },
    Tracks { tracks: Vec<PathBuf>, current: Option<usize> },
    Status(PlaybackSnapshot),
}

impl fmt::Display for TransportReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportReply::Done => write!(f, "ok"),
            TransportReply::Loaded { duration } => write!(f, "loaded ({})", format_clock(*duration)),
            TransportReply::Position { position, duration } => write!(
                f,
                "{} ({})",
                format_clock(*position),
                format_remaining(*position, *duration)
            ),
            TransportReply::Volume { volume, muted } => {
                if *muted {
                    write!(f, "muted")
                } else {
                    write!(f, "volume {:.0}%", volume * 100.0)
                }
            }
            TransportReply::Looping(looping) => {
                write!(f, "loop {}", if *looping { "on" } else { "off" })
            }
            TransportReply::Devices { devices, current } => {
                for (i, device) in devices.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    let marker = if device.index == *current { '*' } else { ' ' };
                    write!(
                        f,
                        "{} [{}] {} ({}ch, {}Hz)",
                        marker,
                        device.index,
                        device.name,
                        device.max_output_channels,
                        device.default_sample_rate
                    )?;
                }
                Ok(())
            }
            TransportReply::Device(handle) => write!(f, "device {}", handle),
            TransportReply::Track { index, path } => {
                write!(f, "track {}: {}", index, path.display())
            }
            TransportReply::Tracks { tracks, current } => {
                if tracks.is_empty() {
                    return write!(f, "no tracks");
                }
                for (i, path) in tracks.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    let marker = if Some(i) == *current { '*' } else { ' ' };
                    write!(f, "{} [{}] {}", marker, i, path.display())?;
                }
                Ok(())
            }
            TransportReply::Status(snapshot) => write!(
                f,
                "{} {} / {}{}{} vol {:.0}%{} | {} | device {}",
                snapshot.status,
                format_clock(snapshot.position),
                format_clock(snapshot.duration),
                if snapshot.looping { " loop" } else { "" },
                snapshot
                    .sample_rate
                    .map(|rate| format!(" @{}Hz", rate))
                    .unwrap_or_default(),
                snapshot.volume * 100.0,
                if snapshot.muted { " (muted)" } else { "" },
                snapshot.voice,
                snapshot.device
            ),
        }
    }
}

/// Operation set exposed to collaborators
#[derive(Clone)]
pub struct Transport {
    engine: Arc<PlaybackEngine>,
    playlist: Arc<Mutex<Playlist>>,
}

impl Transport {
    pub fn new(engine: Arc<PlaybackEngine>) -> Self {
        Self::with_tracks(engine, Vec::new())
    }

    pub fn with_tracks(engine: Arc<PlaybackEngine>, tracks: Vec<PathBuf>) -> Self {
        Self {
            engine,
            playlist: Arc::new(Mutex::new(Playlist::new(tracks))),
        }
    }

    pub fn engine(&self) -> &Arc<PlaybackEngine> {
        &self.engine
    }

    pub fn playlist(&self) -> Playlist {
        self.playlist.lock().clone()
    }

    /// Pause when playing, resume when paused, otherwise start the loaded asset.
    pub fn toggle_play_pause(&self) -> Result<PlaybackStatus> {
        self.engine.toggle_playback()
    }

    /// Load and play track `index`, keeping the current loop flag.
    ///
    /// The track becomes current even if it fails to load, so stepping
    /// continues past it.
    pub fn play_track(&self, index: usize) -> Result<PathBuf> {
        let path = {
            let mut playlist = self.playlist.lock();
            if playlist.is_empty() {
                return Err(StateError::EmptyPlaylist.into());
            }
            let path = playlist
                .path(index)
                .map(Path::to_path_buf)
                .ok_or(StateError::NoSuchTrack(index))?;
            playlist.select(index);
            path
        };

        info!("Track {}: {}", index, path.display());
        self.engine.load(&path)?;
        self.engine.play(self.engine.is_looping())?;
        Ok(path)
    }

    /// Play the next track, wrapping to the first
    pub fn next_track(&self) -> Result<PathBuf> {
        let index = self.playlist.lock().next_index();
        self.play_track(index.ok_or(StateError::EmptyPlaylist)?)
    }

    /// Play the previous track, wrapping to the last
    pub fn previous_track(&self) -> Result<PathBuf> {
        let index = self.playlist.lock().previous_index();
        self.play_track(index.ok_or(StateError::EmptyPlaylist)?)
    }

    /// Continue with the following track after a natural end.
    ///
    /// Returns None when looping or after the last track.
    pub fn advance_after_end(&self) -> Result<Option<PathBuf>> {
        if self.engine.is_looping() {
            return Ok(None);
        }
        let following = self.playlist.lock().following_index();
        match following {
            Some(index) => self.play_track(index).map(Some),
            None => {
                debug!("End of track list");
                Ok(None)
            }
        }
    }

    /// Returns the new loop flag
    pub fn toggle_loop(&self) -> bool {
        let looping = !self.engine.is_looping();
        self.engine.set_looping(looping);
        looping
    }

    /// Seek by `delta` seconds; only while playing or paused.
    pub fn seek_relative(&self, delta: f64) -> Result<f64> {
        if !self.engine.is_playing() {
            return Err(StateError::NotPlaying.into());
        }
        Ok(self.engine.seek(self.engine.position() + delta))
    }

    /// Change volume by `delta`, unmuting first. Returns the new volume.
    pub fn step_volume(&self, delta: f32) -> f32 {
        if self.engine.is_muted() {
            self.engine.toggle_mute();
        }
        self.engine.set_volume(self.engine.volume() + delta)
    }

    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        self.engine.devices()
    }

    fn position_reply(&self) -> TransportReply {
        TransportReply::Position {
            position: self.engine.position(),
            duration: self.engine.duration(),
        }
    }

    fn volume_reply(&self) -> TransportReply {
        TransportReply::Volume {
            volume: self.engine.volume(),
            muted: self.engine.is_muted(),
        }
    }

    fn track_reply(&self, path: PathBuf) -> TransportReply {
        let index = self.playlist.lock().current().unwrap_or_default();
        TransportReply::Track { index, path }
    }

    /// Run one command.
    pub fn execute(&self, command: TransportCommand) -> Result<TransportReply> {
        debug!("Executing {:?}", command);
        let engine = &self.engine;

        let reply = match command {
            TransportCommand::Load(path) => {
                let duration = engine.load(&path)?;
                self.playlist.lock().select_path(&path);
                TransportReply::Loaded { duration }
            }
            TransportCommand::Play { looping } => {
                engine.play(looping)?;
                TransportReply::Done
            }
            TransportCommand::Pause => {
                engine.pause()?;
                self.position_reply()
            }
            TransportCommand::Resume => {
                engine.resume()?;
                TransportReply::Done
            }
            TransportCommand::TogglePlayPause => {
                self.toggle_play_pause()?;
                TransportReply::Done
            }
            TransportCommand::Stop => {
                engine.stop();
                TransportReply::Done
            }
            TransportCommand::Seek(position) => {
                engine.seek(position);
                self.position_reply()
            }
            TransportCommand::Forward => {
                self.seek_relative(SEEK_STEP_SECS)?;
                self.position_reply()
            }
            TransportCommand::Back => {
                self.seek_relative(-SEEK_STEP_SECS)?;
                self.position_reply()
            }
            TransportCommand::Volume(volume) => {
                engine.set_volume(volume);
                self.volume_reply()
            }
            TransportCommand::VolumeUp => {
                self.step_volume(VOLUME_STEP);
                self.volume_reply()
            }
            TransportCommand::VolumeDown => {
                self.step_volume(-VOLUME_STEP);
                self.volume_reply()
            }
            TransportCommand::ToggleMute => {
                engine.toggle_mute();
                self.volume_reply()
            }
            TransportCommand::ToggleLoop => TransportReply::Looping(self.toggle_loop()),
            TransportCommand::Device(index) => TransportReply::Device(engine.change_device(index)?),
            TransportCommand::Devices => TransportReply::Devices {
                devices: self.devices(),
                current: engine.current_device().index,
            },
            TransportCommand::Next => self.track_reply(self.next_track()?),
            TransportCommand::Previous => self.track_reply(self.previous_track()?),
            TransportCommand::Track(index) => self.track_reply(self.play_track(index)?),
            TransportCommand::Tracks => {
                let playlist = self.playlist.lock();
                TransportReply::Tracks {
                    tracks: playlist.tracks().to_vec(),
                    current: playlist.current(),
                }
            }
            TransportCommand::VoiceMode(enabled) => {
                engine.set_voice_mode(enabled)?;
                TransportReply::Status(engine.snapshot())
            }
            TransportCommand::Quality(quality) => {
                engine.set_voice_quality(quality)?;
                TransportReply::Status(engine.snapshot())
            }
            TransportCommand::Status => TransportReply::Status(engine.snapshot()),
        };
        Ok(reply)
    }
}
