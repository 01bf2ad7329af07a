//! Resource addressing for subscriptions and one-shot requests.
//!
//! These strings are parsed by the sensor firmware and must match byte for
//! byte, including the space after the colon in subscription contracts.

use serde::{Deserialize, Serialize};

use crate::constants::{SCHEME_PREFIX, URI_ECG_INFO, URI_ECG_ROOT, URI_MEAS_HR};

/// A telemetry channel the session can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    HeartRate,
    Ecg,
}

impl Channel {
    /// Short label used in logs and status text.
    pub fn label(self) -> &'static str {
        match self {
            Self::HeartRate => "HR",
            Self::Ecg => "ECG",
        }
    }
}

/// Resource path of the heart-rate stream, e.g. `123/Meas/HR`.
pub fn hr_path(serial: &str) -> String {
    format!("{serial}{URI_MEAS_HR}")
}

/// Resource path of the ECG stream at `sample_rate`, e.g. `123/Meas/ECG/128`.
pub fn ecg_path(serial: &str, sample_rate: u32) -> String {
    format!("{serial}{URI_ECG_ROOT}{sample_rate}")
}

/// Subscription contract for a resource path: `{"Uri": "<path>"}`.
pub fn contract_for(path: &str) -> String {
    // Serializing the path as a JSON string takes care of escaping.
    let quoted = serde_json::Value::String(path.to_owned());
    format!("{{\"Uri\": {quoted}}}")
}

/// Subscription contract for the heart-rate stream.
pub fn hr_contract(serial: &str) -> String {
    contract_for(&hr_path(serial))
}

/// Subscription contract for the ECG stream.
pub fn ecg_contract(serial: &str, sample_rate: u32) -> String {
    contract_for(&ecg_path(serial, sample_rate))
}

/// URI of the one-shot ECG info request, e.g. `suunto://123/Meas/ECG/Info`.
pub fn ecg_info_uri(serial: &str) -> String {
    format!("{SCHEME_PREFIX}{serial}{URI_ECG_INFO}")
}
