//! Recording observer

use micplay_ap::playback::{PlaybackObserver, SessionId};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Record {
    ended: Vec<SessionId>,
    errors: Vec<String>,
}

/// Keeps every notification, in order
#[derive(Default)]
pub struct RecordingObserver {
    record: Mutex<Record>,
    changed: Condvar,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ended(&self) -> Vec<SessionId> {
        self.record.lock().ended.clone()
    }

    pub fn ended_count(&self) -> usize {
        self.record.lock().ended.len()
    }

    pub fn errors(&self) -> Vec<String> {
        self.record.lock().errors.clone()
    }

    /// Wait until at least `count` end notifications arrived
    pub fn wait_for_ended(&self, count: usize, timeout: Duration) -> bool {
        let mut record = self.record.lock();
        let deadline = std::time::Instant::now() + timeout;
        while record.ended.len() < count {
            if self.changed.wait_until(&mut record, deadline).timed_out() {
                return record.ended.len() >= count;
            }
        }
        true
    }

    pub fn wait_for_error(&self, timeout: Duration) -> bool {
        let mut record = self.record.lock();
        let deadline = std::time::Instant::now() + timeout;
        while record.errors.is_empty() {
            if self.changed.wait_until(&mut record, deadline).timed_out() {
                return !record.errors.is_empty();
            }
        }
        true
    }
}

impl PlaybackObserver for RecordingObserver {
    fn on_playback_ended(&self, session: SessionId) {
        self.record.lock().ended.push(session);
        self.changed.notify_all();
    }

    fn on_device_error(&self, message: &str) {
        self.record.lock().errors.push(message.to_string());
        self.changed.notify_all();
    }
}
