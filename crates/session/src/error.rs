//! Session error types.

use crate::transport::TransportError;

/// Errors returned by [`DeviceSession`](crate::DeviceSession) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("connection attempt to {0} already in flight")]
    ConnectInFlight(String),

    #[error("already connected to {0}")]
    AlreadyConnected(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("session closed")]
    Closed,
}
