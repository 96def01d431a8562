//! Collaborator notifications
//!
//! Observers are called from the engine's notifier thread, never from the
//! streaming thread, so a callback may call back into the engine.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Identifies one streaming session (one run of the streaming thread)
pub type SessionId = Uuid;

/// Notification emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// Session reached end-of-buffer without looping, or died on a device error
    Ended { session: SessionId },

    /// Device failure; the engine has already stopped when this comes from
    /// the streaming thread
    DeviceError { message: String },
}

/// Receives playback notifications.
pub trait PlaybackObserver: Send + Sync {
    /// Called once per session that ends on its own, unless a newer session
    /// has started or another file was loaded by the time it is delivered.
    /// Never called for `stop()` or for a settings reload.
    fn on_playback_ended(&self, session: SessionId);

    fn on_device_error(&self, _message: &str) {}
}

/// Forwards notifications into a tokio channel.
impl PlaybackObserver for UnboundedSender<PlaybackEvent> {
    fn on_playback_ended(&self, session: SessionId) {
        // Receiver gone means nobody is listening any more
        let _ = self.send(PlaybackEvent::Ended { session });
    }

    fn on_device_error(&self, message: &str) {
        let _ = self.send(PlaybackEvent::DeviceError {
            message: message.to_string(),
        });
    }
}

impl PlaybackEvent {
    /// Deliver to `observer`
    pub fn dispatch(&self, observer: &dyn PlaybackObserver) {
        match self {
            PlaybackEvent::Ended { session } => observer.on_playback_ended(*session),
            PlaybackEvent::DeviceError { message } => observer.on_device_error(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_channel_observer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = Uuid::new_v4();

        tx.on_device_error("unplugged");
        tx.on_playback_ended(session);

        assert_eq!(
            rx.try_recv().unwrap(),
            PlaybackEvent::DeviceError {
                message: "unplugged".to_string()
            }
        );
        assert_eq!(rx.try_recv().unwrap(), PlaybackEvent::Ended { session });
    }

    #[test]
    fn test_dispatch_to_closed_channel_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel::<PlaybackEvent>();
        drop(rx);
        PlaybackEvent::Ended { session: Uuid::new_v4() }.dispatch(&tx);
    }

    #[test]
    fn test_event_json() {
        let event = PlaybackEvent::DeviceError {
            message: "gone".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"device_error","message":"gone"}"#);
    }
}
