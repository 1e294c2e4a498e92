//! Nordic SoftDevice (S140) adapters for the radio and board traits.
//!
//! Only built with the `embedded` feature. The host build never sees any of
//! this; the portable core talks to it through `crate::ble` and `crate::io`.

pub mod board;
pub mod central;
pub mod peripheral;

use core::mem;

use nrf_softdevice::ble::{Address, AddressType};
use nrf_softdevice::{raw, Softdevice};

use crate::ble::PeerAddress;
use crate::time::Clock;

/// Monotonic clock backed by the embassy time driver (RTC1).
#[derive(Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }
}

/// SoftDevice configuration shared by both roles: one link, default MTU,
/// and the GAP device name set to `name`.
pub fn sd_config(name: &'static str) -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 23 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 1,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: name.as_ptr() as _,
            current_len: name.len() as u16,
            max_len: name.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

/// Runs the SoftDevice event loop. Spawn exactly once.
pub async fn run(sd: &'static Softdevice) -> ! {
    sd.run().await
}

pub(crate) fn peer_address(addr: &Address) -> PeerAddress {
    let addr_type = match addr.address_type() {
        AddressType::Public => 0,
        AddressType::RandomStatic => 1,
        AddressType::RandomPrivateResolvable => 2,
        AddressType::RandomPrivateNonResolvable => 3,
        AddressType::Anonymous => 4,
    };
    PeerAddress {
        addr_type,
        bytes: addr.bytes(),
    }
}

pub(crate) fn sd_address(peer: &PeerAddress) -> Address {
    let addr_type = match peer.addr_type {
        0 => AddressType::Public,
        2 => AddressType::RandomPrivateResolvable,
        3 => AddressType::RandomPrivateNonResolvable,
        4 => AddressType::Anonymous,
        _ => AddressType::RandomStatic,
    };
    Address::new(addr_type, peer.bytes)
}

/// 64-bit factory device id from FICR.
pub fn device_id() -> [u8; 8] {
    let lo = embassy_nrf::pac::FICR.deviceid(0).read();
    let hi = embassy_nrf::pac::FICR.deviceid(1).read();
    let mut id = [0u8; 8];
    id[..4].copy_from_slice(&hi.to_be_bytes());
    id[4..].copy_from_slice(&lo.to_be_bytes());
    id
}

/// Microseconds to BLE 0.625 ms units.
pub(crate) fn us_to_units_625(us: u32) -> u32 {
    us / 625
}
