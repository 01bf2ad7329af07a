//! Transport adapter seam.
//!
//! The radio stack (BLE scanning plus the sensor's request/subscribe
//! service) is implemented outside this crate. Every call is
//! fire-and-forget: results come back on the channel handed to the call,
//! never by blocking the caller.

use tokio::sync::{mpsc, oneshot};

use movelink_protocol::DeviceDescriptor;

use crate::types::ScanSettings;

/// Errors reported by the transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("bluetooth unavailable")]
    Unavailable,

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("transport closed")]
    Closed,
}

/// Connection lifecycle events for one connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The link is being established.
    Connecting,
    /// The link is up and the device reported its serial.
    Connected { serial: String },
    /// The attempt or the established link failed.
    Error(TransportError),
    /// The device dropped the link.
    Disconnected,
}

/// Stream of scan results. Dropping the receiver stops the scan.
pub type ScanResults = mpsc::UnboundedReceiver<Result<DeviceDescriptor, TransportError>>;

/// Where the transport delivers notification bodies for one subscription.
pub type NotificationSink = mpsc::UnboundedSender<Result<String, TransportError>>;

/// A live notification stream held open by the transport.
pub trait SubscriptionHandle: Send {
    /// Stop the stream. Called at most once per handle.
    fn unsubscribe(&mut self);
}

/// Abstract radio stack.
///
/// Implemented by the host app on top of its BLE library. Using a trait keeps
/// the session logic decoupled from the radio and testable with mocks.
pub trait Transport: Send + Sync {
    /// Starts scanning. Results arrive until the receiver is dropped.
    fn scan(&self, settings: &ScanSettings) -> Result<ScanResults, TransportError>;

    /// Starts connecting to `address`; lifecycle events go to `events`.
    fn connect(&self, address: &str, events: mpsc::UnboundedSender<LinkEvent>);

    /// Drops the link to `address`.
    fn disconnect(&self, address: &str);

    /// Issues a one-shot request; the response body goes to `reply`.
    fn get(
        &self,
        uri: &str,
        params: Option<&str>,
        reply: oneshot::Sender<Result<String, TransportError>>,
    );

    /// Opens a notification stream described by `contract`.
    fn subscribe(
        &self,
        event_uri: &str,
        contract: &str,
        notifications: NotificationSink,
    ) -> Result<Box<dyn SubscriptionHandle>, TransportError>;
}
