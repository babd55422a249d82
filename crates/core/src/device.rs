//! USB discovery of Logitech keyboards with G-keys and an LCD.

use crate::error::{Error, Result};
use crate::sdk::LcdType;
use crate::{pids, LOGITECH_VID};
use tracing::{debug, info};

/// Supported keyboard models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardModel {
    G13,
    G15v1,
    G15v2,
    G510,
    G19,
}

impl KeyboardModel {
    pub const ALL: &'static [KeyboardModel] = &[
        KeyboardModel::G13,
        KeyboardModel::G15v1,
        KeyboardModel::G15v2,
        KeyboardModel::G510,
        KeyboardModel::G19,
    ];

    /// Look up model from USB product ID.
    pub fn from_pid(pid: u16) -> Option<Self> {
        match pid {
            pids::G13 => Some(Self::G13),
            pids::G15_V1 => Some(Self::G15v1),
            pids::G15_V2 => Some(Self::G15v2),
            pids::G510 | pids::G510_AUDIO => Some(Self::G510),
            pids::G19 => Some(Self::G19),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::G13 => "Logitech G13",
            Self::G15v1 => "Logitech G15 v1",
            Self::G15v2 => "Logitech G15 v2",
            Self::G510 => "Logitech G510",
            Self::G19 => "Logitech G19",
        }
    }

    pub fn lcd_type(&self) -> LcdType {
        match self {
            Self::G19 => LcdType::Color,
            _ => LcdType::Mono,
        }
    }

    /// Number of G-keys per mode.
    pub fn gkey_count(&self) -> u8 {
        match self {
            Self::G13 => 29,
            Self::G15v1 | Self::G510 => 18,
            Self::G15v2 => 6,
            Self::G19 => 12,
        }
    }
}

/// Information about a discovered keyboard.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub model: KeyboardModel,
    pub vid: u16,
    pub pid: u16,
    pub path: String,
    pub serial: Option<String>,
}

/// Discover connected G-key/LCD keyboards.
///
/// A keyboard exposing several HID interfaces is reported once when it has
/// a serial number. Interfaces without one are listed individually.
pub fn discover_devices() -> Result<Vec<DeviceInfo>> {
    debug!("Starting HID device enumeration");
    let api = hidapi::HidApi::new().map_err(|e| Error::Hid(e.to_string()))?;

    let mut devices: Vec<DeviceInfo> = Vec::new();
    for info in api.device_list() {
        if info.vendor_id() != LOGITECH_VID {
            continue;
        }
        let Some(model) = KeyboardModel::from_pid(info.product_id()) else {
            continue;
        };
        let serial = info
            .serial_number()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        if is_duplicate(&devices, info.product_id(), serial.as_deref()) {
            continue;
        }

        info!(
            model = model.name(),
            lcd = %model.lcd_type(),
            pid = format_args!("0x{:04X}", info.product_id()),
            path = %info.path().to_string_lossy(),
            "Found G-key keyboard"
        );
        devices.push(DeviceInfo {
            model,
            vid: info.vendor_id(),
            pid: info.product_id(),
            path: info.path().to_string_lossy().into_owned(),
            serial,
        });
    }

    debug!(count = devices.len(), "Device enumeration complete");
    Ok(devices)
}

/// Same product and same non-empty serial. Without a serial two identical
/// keyboards cannot be told apart, so nothing is treated as a duplicate.
fn is_duplicate(seen: &[DeviceInfo], pid: u16, serial: Option<&str>) -> bool {
    let Some(serial) = serial else {
        return false;
    };
    seen.iter()
        .any(|d| d.pid == pid && d.serial.as_deref() == Some(serial))
}
