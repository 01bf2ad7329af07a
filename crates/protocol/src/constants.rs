//! Wire constants shared with the sensor firmware.

/// Scheme prefix for one-shot resource requests.
pub const SCHEME_PREFIX: &str = "suunto://";

/// Event listener resource every subscription is opened on.
pub const URI_EVENT_LISTENER: &str = "suunto://MDS/EventListener";

/// ECG stream info resource, appended to the device serial.
pub const URI_ECG_INFO: &str = "/Meas/ECG/Info";

/// ECG stream resource root; the sample rate is appended.
pub const URI_ECG_ROOT: &str = "/Meas/ECG/";

/// Heart-rate stream resource.
pub const URI_MEAS_HR: &str = "/Meas/HR";

/// Number of ECG samples kept for the rolling waveform.
pub const ECG_SEGMENT_LEN: usize = 1024;

/// Samples per ECG notification when the device does not report one.
pub const DEFAULT_ECG_BATCH_SIZE: usize = 16;

/// ECG sample rate (Hz) requested on subscription.
pub const DEFAULT_ECG_SAMPLE_RATE: u32 = 128;
