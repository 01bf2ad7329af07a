use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::buffer::RingBuffer;

/// A status line for the UI, tagged so that re-posting the same text is
/// distinguishable from "nothing new".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusMessage {
    /// Monotonic post counter; 0 means nothing was ever posted.
    pub id: u64,
    pub text: Option<String>,
}

impl StatusMessage {
    /// Whether this message was posted after the one with id `seen`.
    pub fn is_newer_than(&self, seen: u64) -> bool {
        self.id > seen
    }
}

/// Point-in-time copy of every published telemetry field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub connected: bool,
    pub status: StatusMessage,
    pub average_heart_rate: f32,
    pub rr_interval: i32,
    pub ecg: Arc<[i32]>,
}

/// Write side of the published telemetry.
///
/// Owned by the device session. Every field lives in its own `watch`
/// channel, so readers see whole values and can wait on any one field
/// without waking for the others.
#[derive(Debug)]
pub struct TelemetryPublisher {
    connected: watch::Sender<bool>,
    status: watch::Sender<StatusMessage>,
    average_heart_rate: watch::Sender<f32>,
    rr_interval: watch::Sender<i32>,
    ecg: watch::Sender<Arc<[i32]>>,
}

impl TelemetryPublisher {
    /// Create a publisher whose ECG snapshot starts as `ecg_len` zeros.
    pub fn new(ecg_len: usize) -> Self {
        Self {
            connected: watch::Sender::new(false),
            status: watch::Sender::new(StatusMessage::default()),
            average_heart_rate: watch::Sender::new(0.0),
            rr_interval: watch::Sender::new(0),
            ecg: watch::Sender::new(vec![0; ecg_len].into()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.send_if_modified(|c| {
            let changed = *c != connected;
            *c = connected;
            changed
        });
    }

    /// Post a new status line. Always notifies, even for repeated text.
    pub fn post_status(&self, text: impl Into<String>) {
        let text = text.into();
        self.status.send_modify(|s| {
            s.id += 1;
            s.text = Some(text);
        });
    }

    pub fn set_average_heart_rate(&self, bpm: f32) {
        self.average_heart_rate.send_replace(bpm);
    }

    pub fn set_rr_interval(&self, rr_ms: i32) {
        self.rr_interval.send_replace(rr_ms);
    }

    /// Publish a copy of the ECG buffer, oldest sample first.
    pub fn publish_ecg(&self, buffer: &RingBuffer<i32>) {
        self.ecg.send_replace(buffer.iter().copied().collect());
    }

    /// A read handle for the UI side.
    pub fn observer(&self) -> TelemetryObserver {
        TelemetryObserver {
            connected: self.connected.subscribe(),
            status: self.status.subscribe(),
            average_heart_rate: self.average_heart_rate.subscribe(),
            rr_interval: self.rr_interval.subscribe(),
            ecg: self.ecg.subscribe(),
        }
    }
}

/// Read side of the published telemetry. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TelemetryObserver {
    connected: watch::Receiver<bool>,
    status: watch::Receiver<StatusMessage>,
    average_heart_rate: watch::Receiver<f32>,
    rr_interval: watch::Receiver<i32>,
    ecg: watch::Receiver<Arc<[i32]>>,
}

impl TelemetryObserver {
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    pub fn status(&self) -> watch::Receiver<StatusMessage> {
        self.status.clone()
    }

    pub fn average_heart_rate(&self) -> watch::Receiver<f32> {
        self.average_heart_rate.clone()
    }

    pub fn rr_interval(&self) -> watch::Receiver<i32> {
        self.rr_interval.clone()
    }

    pub fn ecg(&self) -> watch::Receiver<Arc<[i32]>> {
        self.ecg.clone()
    }

    /// Read the current value of every field.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            connected: *self.connected.borrow(),
            status: self.status.borrow().clone(),
            average_heart_rate: *self.average_heart_rate.borrow(),
            rr_interval: *self.rr_interval.borrow(),
            ecg: self.ecg.borrow().clone(),
        }
    }
}
