//! Playback engine, streaming thread, track list and transport façade

pub mod engine;
pub mod events;
pub mod playlist;
pub mod state;
pub mod transport;
pub mod worker;

pub use engine::PlaybackEngine;
pub use events::{PlaybackEvent, PlaybackObserver, SessionId};
pub use playlist::Playlist;
pub use state::{PlaybackSnapshot, PlaybackState, PlaybackStatus};
pub use transport::{Transport, TransportCommand, TransportReply};
