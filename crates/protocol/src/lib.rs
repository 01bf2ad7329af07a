//! Wire-level pieces of the Movesense sensor protocol.
//!
//! Constants and resource addressing shared with the firmware, the scan
//! result descriptor, and the decoder for responses and notifications.

pub mod codec;
pub mod constants;
pub mod contract;
pub mod types;

pub use codec::{
    DecodeError, EcgBatch, EcgInfo, HeartRate, decode_ecg_batch, decode_ecg_info, decode_hr,
};
pub use contract::Channel;
pub use types::{DeviceClass, DeviceDescriptor};
