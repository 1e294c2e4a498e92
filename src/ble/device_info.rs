//! Device Information service (0x180A) values published by the remote.

use core::fmt::Write;

use heapless::String;

use crate::config;

pub const DEVICE_INFO_SERVICE_UUID: u16 = 0x180A;
pub const MANUFACTURER_NAME_UUID: u16 = 0x2A29;
pub const MODEL_NUMBER_UUID: u16 = 0x2A24;
pub const SERIAL_NUMBER_UUID: u16 = 0x2A25;
pub const HARDWARE_REVISION_UUID: u16 = 0x2A26;
pub const FIRMWARE_REVISION_UUID: u16 = 0x2A28;

/// Read-only strings exposed by the Device Information service.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceInfo {
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub serial: String<16>,
    pub hardware_revision: &'static str,
    pub firmware_revision: &'static str,
}

impl DeviceInfo {
    /// Fleet defaults with the serial derived from the chip's unique id.
    pub fn new(device_id: [u8; 8]) -> Self {
        Self {
            manufacturer: config::MANUFACTURER_NAME,
            model: config::MODEL_NUMBER,
            serial: serial_number(device_id),
            hardware_revision: config::HARDWARE_REVISION,
            firmware_revision: config::FIRMWARE_REVISION,
        }
    }
}

/// Render a 64-bit unique id as 16 lowercase hex characters.
pub fn serial_number(device_id: [u8; 8]) -> String<16> {
    let mut s = String::new();
    for b in device_id {
        // 8 bytes × 2 chars fills the capacity exactly.
        let _ = write!(s, "{:02x}", b);
    }
    s
}
