//! Session manager for a BLE wearable biosensor.
//!
//! Scans for devices, connects to one, negotiates the ECG stream and keeps
//! heart rate and ECG subscriptions alive for the life of the connection.
//! The radio itself sits behind the [`Transport`] trait.

pub mod error;
pub mod session;
pub mod subscriptions;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock;

pub use error::SessionError;
pub use session::DeviceSession;
pub use subscriptions::{ChannelUpdate, SubscriptionId, SubscriptionManager};
pub use transport::{
    LinkEvent, NotificationSink, ScanResults, SubscriptionHandle, Transport, TransportError,
};
pub use types::{
    ConnectedDevice, ConnectionState, EcgStreamParams, ScanSettings, SessionConfig, SessionInfo,
};
