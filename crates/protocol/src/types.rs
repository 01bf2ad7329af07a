use serde::{Deserialize, Serialize};

/// Bluetooth major device class reported with a scan result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceClass {
    Misc,
    Computer,
    Phone,
    Networking,
    AudioVideo,
    Peripheral,
    Imaging,
    Wearable,
    Toy,
    Health,
    Uncategorized,
    /// A major class value outside the assigned numbers.
    Other(u32),
}

impl DeviceClass {
    /// Maps a raw major device class (the `0x1F00` bits of the class of device).
    pub fn from_major(major: u32) -> Self {
        match major {
            0x0000 => Self::Misc,
            0x0100 => Self::Computer,
            0x0200 => Self::Phone,
            0x0300 => Self::Networking,
            0x0400 => Self::AudioVideo,
            0x0500 => Self::Peripheral,
            0x0600 => Self::Imaging,
            0x0700 => Self::Wearable,
            0x0800 => Self::Toy,
            0x0900 => Self::Health,
            0x1F00 => Self::Uncategorized,
            other => Self::Other(other),
        }
    }

    /// The raw major device class value.
    pub fn major(self) -> u32 {
        match self {
            Self::Misc => 0x0000,
            Self::Computer => 0x0100,
            Self::Phone => 0x0200,
            Self::Networking => 0x0300,
            Self::AudioVideo => 0x0400,
            Self::Peripheral => 0x0500,
            Self::Imaging => 0x0600,
            Self::Wearable => 0x0700,
            Self::Toy => 0x0800,
            Self::Health => 0x0900,
            Self::Uncategorized => 0x1F00,
            Self::Other(raw) => raw,
        }
    }
}

/// A device seen during a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub name: String,
    /// Transport address (MAC), unique per device.
    pub address: String,
    pub rssi: i32,
    pub device_class: DeviceClass,
}

impl DeviceDescriptor {
    /// Builds a descriptor from a raw scan result, filling in the fallbacks
    /// used when the radio stack omits a field.
    pub fn from_scan(
        name: Option<String>,
        address: Option<String>,
        rssi: i32,
        major_class: Option<u32>,
    ) -> Self {
        Self {
            name: name.unwrap_or_else(|| "Unnamed".to_string()),
            address: address.unwrap_or_else(|| "Unknown".to_string()),
            rssi,
            device_class: major_class
                .map(DeviceClass::from_major)
                .unwrap_or(DeviceClass::Computer),
        }
    }
}
