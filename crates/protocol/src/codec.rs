//! Decoding of sensor responses and notification bodies.
//!
//! Every decoder is a pure function from the raw text to either a fully
//! populated record or a [`DecodeError`]. Nothing here panics on untrusted
//! input and nothing touches session state, so a malformed notification on
//! one channel can only cost that one update.

use serde::{Deserialize, Serialize};

/// Errors produced while decoding a device payload.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("empty sequence")]
    EmptySequence,
}

/// ECG stream parameters reported by `/Meas/ECG/Info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EcgInfo {
    /// Samples per notification, if the device reported one.
    pub array_size: Option<i64>,
    pub current_sample_rate: Option<u32>,
    pub available_sample_rates: Vec<u32>,
}

impl EcgInfo {
    /// The reported batch size, or `default` when it is absent or not positive.
    pub fn batch_size_or(&self, default: usize) -> usize {
        self.array_size
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(default)
    }
}

/// One heart-rate notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRate {
    /// Average heart rate in beats per minute.
    pub average: Option<f32>,
    /// RR intervals in milliseconds, most recent first.
    pub rr_intervals: Vec<i32>,
}

impl HeartRate {
    /// The RR interval to publish for this notification.
    pub fn latest_rr(&self) -> Result<i32, DecodeError> {
        self.rr_intervals
            .first()
            .copied()
            .ok_or(DecodeError::EmptySequence)
    }
}

/// One ECG notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EcgBatch {
    pub samples: Vec<i32>,
    pub timestamp: Option<u64>,
}

// --- Wire shapes ---

#[derive(Deserialize)]
struct EcgInfoResponse {
    #[serde(rename = "Content", alias = "content")]
    content: Option<EcgInfoContent>,
}

#[derive(Deserialize)]
struct EcgInfoContent {
    #[serde(default, rename = "arraySize", alias = "ArraySize")]
    array_size: Option<i64>,
    #[serde(default, rename = "CurrentSampleRate", alias = "currentSampleRate")]
    current_sample_rate: Option<u32>,
    #[serde(default, rename = "AvailableSampleRates", alias = "availableSampleRates")]
    available_sample_rates: Vec<u32>,
}

#[derive(Deserialize)]
struct HrResponse {
    #[serde(rename = "Body", alias = "body")]
    body: Option<HrBody>,
}

#[derive(Deserialize)]
struct HrBody {
    #[serde(default)]
    average: Option<f32>,
    #[serde(default, rename = "rrData", alias = "RrData")]
    rr_data: Vec<i32>,
}

#[derive(Deserialize)]
struct EcgResponse {
    #[serde(rename = "Body", alias = "body")]
    body: Option<EcgBody>,
}

#[derive(Deserialize)]
struct EcgBody {
    #[serde(default, rename = "Samples", alias = "samples")]
    samples: Option<Vec<i32>>,
    #[serde(default, rename = "Timestamp", alias = "timestamp")]
    timestamp: Option<u64>,
}

/// Decodes the response of the ECG info request.
///
/// A well-formed response without `Content` or `arraySize` still decodes;
/// callers apply their default via [`EcgInfo::batch_size_or`].
pub fn decode_ecg_info(raw: &str) -> Result<EcgInfo, DecodeError> {
    let resp: EcgInfoResponse = serde_json::from_str(raw)?;
    Ok(match resp.content {
        Some(c) => EcgInfo {
            array_size: c.array_size,
            current_sample_rate: c.current_sample_rate,
            available_sample_rates: c.available_sample_rates,
        },
        None => EcgInfo::default(),
    })
}

/// Decodes a heart-rate notification.
pub fn decode_hr(raw: &str) -> Result<HeartRate, DecodeError> {
    let resp: HrResponse = serde_json::from_str(raw)?;
    let body = resp.body.ok_or(DecodeError::MissingField("Body"))?;
    Ok(HeartRate {
        average: body.average,
        rr_intervals: body.rr_data,
    })
}

/// Decodes an ECG sample notification.
///
/// A body without `Samples` is an error; an explicit empty array is not.
pub fn decode_ecg_batch(raw: &str) -> Result<EcgBatch, DecodeError> {
    let resp: EcgResponse = serde_json::from_str(raw)?;
    let body = resp.body.ok_or(DecodeError::MissingField("Body"))?;
    Ok(EcgBatch {
        samples: body.samples.ok_or(DecodeError::MissingField("Samples"))?,
        timestamp: body.timestamp,
    })
}
