pub mod buffer;
pub mod state;

pub use buffer::{BatchFit, BufferError, RingBuffer};
pub use state::{StatusMessage, TelemetryObserver, TelemetryPublisher, TelemetrySnapshot};
