//! Advertisement data building for the remote.
//!
//! Layout of the legacy (31-byte) advertising payload:
//! ```text
//! [3]  Flags: LE General Discoverable, BR/EDR not supported
//! [4]  Complete list of 16-bit service ids (one id)
//! [4]  Appearance
//! [n]  Complete local name (shortened when it does not fit)
//! ```

use heapless::Vec;

use crate::ble::adv_parser::{
    AD_APPEARANCE, AD_COMPLETE_NAME, AD_COMPLETE_UUID16, AD_FLAGS, AD_SHORT_NAME,
};

/// Legacy advertising payload limit.
pub const MAX_ADV_DATA: usize = 31;

/// LE General Discoverable | BR/EDR Not Supported.
const FLAGS_GENERAL_DISCOVERABLE: u8 = 0x06;

pub type AdvData = Vec<u8, MAX_ADV_DATA>;

fn push_structure(out: &mut AdvData, ad_type: u8, payload: &[u8]) -> bool {
    let needed = payload.len() + 2;
    if out.len() + needed > MAX_ADV_DATA {
        return false;
    }
    // Capacity checked above.
    let _ = out.push(payload.len() as u8 + 1);
    let _ = out.push(ad_type);
    let _ = out.extend_from_slice(payload);
    true
}

/// Build the connectable advertisement for `name` offering `service`.
///
/// When the name does not fit it is cut and sent as a shortened name, so
/// the robot's exact-name match fails loudly instead of matching a prefix.
pub fn build_advertisement(name: &str, service: u16, appearance: u16) -> AdvData {
    let mut out = AdvData::new();
    push_structure(&mut out, AD_FLAGS, &[FLAGS_GENERAL_DISCOVERABLE]);
    push_structure(&mut out, AD_COMPLETE_UUID16, &service.to_le_bytes());
    push_structure(&mut out, AD_APPEARANCE, &appearance.to_le_bytes());

    let room = MAX_ADV_DATA.saturating_sub(out.len() + 2);
    let bytes = name.as_bytes();
    if bytes.len() <= room {
        push_structure(&mut out, AD_COMPLETE_NAME, bytes);
    } else if room > 0 {
        push_structure(&mut out, AD_SHORT_NAME, &bytes[..room]);
    }
    out
}

/// Scan response listing the GATT services offered after connecting.
pub fn build_scan_response(services: &[u16]) -> AdvData {
    let mut ids: Vec<u8, { MAX_ADV_DATA - 2 }> = Vec::new();
    for service in services {
        if ids.extend_from_slice(&service.to_le_bytes()).is_err() {
            break;
        }
    }
    let mut out = AdvData::new();
    if !ids.is_empty() {
        push_structure(&mut out, AD_COMPLETE_UUID16, &ids);
    }
    out
}
