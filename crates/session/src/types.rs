//! Public types for the device session.

use serde::{Deserialize, Serialize};
use tracing::warn;

use movelink_protocol::constants::{
    DEFAULT_ECG_BATCH_SIZE, DEFAULT_ECG_SAMPLE_RATE, ECG_SEGMENT_LEN,
};

/// Connection state of the session's device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// No link, or the link was lost.
    #[default]
    Disconnected,
    /// The transport reported that the link is being established.
    Connecting,
    /// Link established and the device serial is known.
    Connected,
}

/// The device the session is connected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectedDevice {
    pub address: String,
    /// Serial reported at connection completion; prefixes every resource path.
    pub serial: String,
}

/// ECG stream parameters negotiated for the current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EcgStreamParams {
    /// Samples per ECG notification.
    pub batch_size: usize,
    /// Sample rate (Hz) the ECG stream was requested at.
    pub sample_rate: u32,
}

/// Radio scan options passed through to the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanSettings {
    /// Trade battery for faster discovery.
    pub low_latency: bool,
    /// Report every advertisement instead of the first per device.
    pub all_matches: bool,
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Number of ECG samples kept in the rolling buffer.
    pub ring_capacity: usize,
    /// Batch size used when the device does not report a usable one.
    pub default_batch_size: usize,
    /// ECG sample rate (Hz) requested on subscription.
    pub sample_rate: u32,
    /// Post a "Disconnected" status when the device drops the link.
    pub announce_device_disconnect: bool,
    pub scan: ScanSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ring_capacity: ECG_SEGMENT_LEN,
            default_batch_size: DEFAULT_ECG_BATCH_SIZE,
            sample_rate: DEFAULT_ECG_SAMPLE_RATE,
            announce_device_disconnect: false,
            scan: ScanSettings::default(),
        }
    }
}

impl SessionConfig {
    /// Clamps sizes a config file may carry out of range: the ring keeps at
    /// least one slot and the default batch fits in `1..=ring_capacity`.
    pub fn sanitized(mut self) -> Self {
        if self.ring_capacity == 0 {
            warn!("ring capacity 0 is invalid, using 1");
            self.ring_capacity = 1;
        }
        let batch = self.default_batch_size.clamp(1, self.ring_capacity);
        if batch != self.default_batch_size {
            warn!(
                configured = self.default_batch_size,
                used = batch,
                "default batch size out of range, clamping"
            );
            self.default_batch_size = batch;
        }
        self
    }
}

/// Point-in-time view of the session, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub state: ConnectionState,
    pub device: Option<ConnectedDevice>,
    pub pending_address: Option<String>,
    pub params: Option<EcgStreamParams>,
    pub hr_subscribed: bool,
    pub ecg_subscribed: bool,
    pub scanning: bool,
}
