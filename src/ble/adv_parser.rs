//! Advertisement data (AD structure) parsing.

use heapless::{String, Vec};

use crate::ble::{PeerAddress, PeerDescriptor, MAX_ADVERTISED_SERVICES};

pub const AD_FLAGS: u8 = 0x01;
pub const AD_INCOMPLETE_UUID16: u8 = 0x02;
pub const AD_COMPLETE_UUID16: u8 = 0x03;
pub const AD_SHORT_NAME: u8 = 0x08;
pub const AD_COMPLETE_NAME: u8 = 0x09;
pub const AD_APPEARANCE: u8 = 0x19;

/// Iterate `(ad_type, payload)` pairs. Stops at the first malformed length.
fn ad_structures(data: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    let mut i = 0;
    core::iter::from_fn(move || {
        let len = *data.get(i)? as usize;
        if len == 0 || i + len >= data.len() {
            return None;
        }
        let ad_type = data[i + 1];
        let payload = &data[i + 2..i + 1 + len];
        i += len + 1;
        Some((ad_type, payload))
    })
}

/// Collect 16-bit service ids from complete and incomplete lists.
pub fn advertised_services(data: &[u8]) -> Vec<u16, MAX_ADVERTISED_SERVICES> {
    let mut services = Vec::new();
    for (ad_type, payload) in ad_structures(data) {
        if ad_type == AD_INCOMPLETE_UUID16 || ad_type == AD_COMPLETE_UUID16 {
            for chunk in payload.chunks_exact(2) {
                let uuid = u16::from_le_bytes([chunk[0], chunk[1]]);
                if !services.contains(&uuid) && services.push(uuid).is_err() {
                    return services;
                }
            }
        }
    }
    services
}

/// Check if raw advertisement data lists `uuid` among its 16-bit services.
pub fn contains_service_uuid(data: &[u8], uuid: u16) -> bool {
    let uuid_le = uuid.to_le_bytes();
    ad_structures(data).any(|(ad_type, payload)| {
        (ad_type == AD_INCOMPLETE_UUID16 || ad_type == AD_COMPLETE_UUID16)
            && payload.chunks_exact(2).any(|chunk| chunk == uuid_le)
    })
}

/// Extract complete/shortened local name from advertisement data.
///
/// Non-ASCII bytes are replaced by `?`; names longer than 32 bytes are
/// truncated.
pub fn extract_device_name(data: &[u8]) -> Option<String<32>> {
    let (_, name_bytes) = ad_structures(data)
        .find(|(ad_type, _)| *ad_type == AD_SHORT_NAME || *ad_type == AD_COMPLETE_NAME)?;

    let mut name = String::new();
    for &b in name_bytes {
        let c = if b.is_ascii() { b as char } else { '?' };
        if name.push(c).is_err() {
            break;
        }
    }
    Some(name)
}

/// GAP appearance value, if advertised.
pub fn extract_appearance(data: &[u8]) -> Option<u16> {
    ad_structures(data)
        .find(|(ad_type, _)| *ad_type == AD_APPEARANCE)
        .and_then(|(_, payload)| match payload {
            [lo, hi] => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        })
}

/// Build a [`PeerDescriptor`] from one advertising report.
pub fn parse_report(address: PeerAddress, rssi: i8, data: &[u8]) -> PeerDescriptor {
    PeerDescriptor {
        address,
        name: extract_device_name(data).unwrap_or_default(),
        services: advertised_services(data),
        rssi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: PeerAddress = PeerAddress {
        addr_type: 1,
        bytes: [1, 2, 3, 4, 5, 6],
    };

    #[test]
    fn detect_service_uuid_in_advertisement() {
        // len=3, type=0x03 (Complete 16-bit UUIDs), UUID=0x1800
        let ad_data = [0x03, 0x03, 0x00, 0x18];
        assert!(contains_service_uuid(&ad_data, 0x1800));
        assert!(!contains_service_uuid(&ad_data, 0x1848));
    }

    #[test]
    fn service_among_multiple_uuids() {
        let ad_data = [
            0x07, 0x03, // len=7, Complete 16-bit UUIDs
            0x0F, 0x18, // Battery
            0x00, 0x18, // Generic Access
            0x48, 0x18, // 0x1848
        ];
        assert!(contains_service_uuid(&ad_data, 0x1848));
        assert_eq!(advertised_services(&ad_data).as_slice(), &[0x180F, 0x1800, 0x1848]);
    }

    #[test]
    fn incomplete_uuid_list_is_checked() {
        let ad_data = [0x03, 0x02, 0x00, 0x18];
        assert!(contains_service_uuid(&ad_data, 0x1800));
    }

    #[test]
    fn malformed_lengths_stop_parsing() {
        assert!(!contains_service_uuid(&[], 0x1800));
        assert!(!contains_service_uuid(&[0x00], 0x1800));
        // Claims 5 bytes, only 2 follow.
        assert!(!contains_service_uuid(&[0x05, 0x03, 0x00], 0x1800));
        assert!(extract_device_name(&[0x09, 0x09, b'K']).is_none());
    }

    #[test]
    fn extract_complete_local_name() {
        let ad_data = [
            0x0B, 0x09, b'K', b'e', b'v', b's', b'R', b'o', b'b', b'o', b't', b's',
        ];
        assert_eq!(extract_device_name(&ad_data).unwrap().as_str(), "KevsRobots");
    }

    #[test]
    fn extract_shortened_local_name() {
        let ad_data = [0x05, 0x08, b'K', b'e', b'v', b's'];
        assert_eq!(extract_device_name(&ad_data).unwrap().as_str(), "Kevs");
    }

    #[test]
    fn no_name_in_advertisement() {
        let ad_data = [0x02, 0x01, 0x06];
        assert!(extract_device_name(&ad_data).is_none());
    }

    #[test]
    fn name_truncated_to_32_chars() {
        let mut ad_data = [0u8; 40];
        ad_data[0] = 35;
        ad_data[1] = AD_COMPLETE_NAME;
        for b in &mut ad_data[2..37] {
            *b = b'X';
        }
        assert_eq!(extract_device_name(&ad_data).unwrap().len(), 32);
    }

    #[test]
    fn non_ascii_name_bytes_are_replaced() {
        let ad_data = [0x04, 0x09, b'o', 0xFF, b'k'];
        assert_eq!(extract_device_name(&ad_data).unwrap().as_str(), "o?k");
    }

    #[test]
    fn appearance_is_little_endian() {
        let ad_data = [0x03, 0x19, 0x80, 0x01];
        assert_eq!(extract_appearance(&ad_data), Some(384));
        assert_eq!(extract_appearance(&[0x02, 0x19, 0x80]), None);
    }

    #[test]
    fn report_without_name_has_empty_name() {
        let peer = parse_report(ADDR, -70, &[0x03, 0x03, 0x00, 0x18]);
        assert!(peer.name.is_empty());
        assert!(peer.advertises(0x1800));
        assert_eq!(peer.rssi, -70);
        assert_eq!(peer.address, ADDR);
    }

    #[test]
    fn duplicate_service_ids_are_collapsed() {
        let ad_data = [0x05, 0x03, 0x00, 0x18, 0x00, 0x18];
        assert_eq!(advertised_services(&ad_data).len(), 1);
    }
}
