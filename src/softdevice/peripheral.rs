//! Peripheral role on the SoftDevice: advertising and the GATT server
//! holding the device information and control services.

use core::cell::Cell;

use heapless::Vec;
use nrf_softdevice::ble::{gatt_server, peripheral, Connection};
use nrf_softdevice::Softdevice;

use super::{peer_address, us_to_units_625};
use crate::ble::device_info::DeviceInfo;
use crate::ble::{PeerAddress, Peripheral, PeripheralLink};
use crate::command::MAX_COMMAND_SIZE;
use crate::config::AdvertisingParams;
use crate::error::{Error, Fault};

type Text = Vec<u8, 20>;

#[nrf_softdevice::gatt_service(uuid = "180a")]
pub struct DeviceInformationService {
    #[characteristic(uuid = "2a29", read)]
    pub manufacturer: Text,
    #[characteristic(uuid = "2a24", read)]
    pub model: Text,
    #[characteristic(uuid = "2a25", read)]
    pub serial: Text,
    #[characteristic(uuid = "2a26", read)]
    pub hardware_revision: Text,
    #[characteristic(uuid = "2a28", read)]
    pub firmware_revision: Text,
}

#[nrf_softdevice::gatt_service(uuid = "1848")]
pub struct ControlService {
    /// Latest command, see `crate::command` for the layout.
    #[characteristic(uuid = "2a6e", read, notify)]
    pub value: Vec<u8, MAX_COMMAND_SIZE>,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub dis: DeviceInformationService,
    pub control: ControlService,
}

fn text(s: &str) -> Text {
    let bytes = s.as_bytes();
    let n = bytes.len().min(20);
    // Length clamped to capacity.
    Vec::from_slice(&bytes[..n]).unwrap_or_default()
}

impl Server {
    /// Fill the read-only Device Information characteristics.
    pub fn load_device_info(&self, info: &DeviceInfo) -> Result<(), Error> {
        let set = |r: Result<(), gatt_server::SetValueError>| {
            r.map_err(|_| Error::from(Fault::Transport))
        };
        set(self.dis.manufacturer_set(&text(info.manufacturer)))?;
        set(self.dis.model_set(&text(info.model)))?;
        set(self.dis.serial_set(&text(info.serial.as_str())))?;
        set(self.dis.hardware_revision_set(&text(info.hardware_revision)))?;
        set(self.dis.firmware_revision_set(&text(info.firmware_revision)))?;
        Ok(())
    }
}

pub struct SdPeripheral {
    sd: &'static Softdevice,
    server: &'static Server,
}

impl SdPeripheral {
    pub fn new(sd: &'static Softdevice, server: &'static Server) -> Self {
        Self { sd, server }
    }
}

impl Peripheral for SdPeripheral {
    type Link = SdPeripheralLink;

    async fn advertise(
        &mut self,
        params: &AdvertisingParams,
        adv_data: &[u8],
        scan_data: &[u8],
    ) -> Result<SdPeripheralLink, Error> {
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected { adv_data, scan_data };
        let config = peripheral::Config {
            interval: us_to_units_625(params.interval_us),
            // SoftDevice counts the advertising timeout in 10 ms units.
            timeout: params
                .timeout_ms
                .map(|ms| (ms / 10).min(u32::from(u16::MAX)) as u16),
            ..Default::default()
        };

        let conn = peripheral::advertise_connectable(self.sd, adv, &config)
            .await
            .map_err(|e| match e {
                peripheral::AdvertiseError::Timeout => Error::DiscoveryTimeout,
                peripheral::AdvertiseError::Raw(raw) => Error::Radio(raw as u32),
                _ => Error::ConnectRefused,
            })?;

        Ok(SdPeripheralLink {
            conn,
            server: self.server,
            notify: Cell::new(false),
        })
    }
}

/// One accepted central.
pub struct SdPeripheralLink {
    conn: Connection,
    server: &'static Server,
    /// CCCD state as last written by the central.
    notify: Cell<bool>,
}

impl PeripheralLink for SdPeripheralLink {
    fn peer(&self) -> PeerAddress {
        peer_address(&self.conn.peer_address())
    }

    async fn serve(&self) -> Error {
        gatt_server::run(&self.conn, self.server, |event| match event {
            ServerEvent::Control(ControlServiceEvent::ValueCccdWrite { notifications, .. }) => {
                info!("remote: notifications {}", notifications);
                self.notify.set(notifications);
            }
            #[allow(unreachable_patterns)]
            _ => {}
        })
        .await;
        Error::PeerDisconnected
    }

    fn publish(&self, payload: &[u8], notify: bool) -> Result<(), Error> {
        let value: Vec<u8, MAX_COMMAND_SIZE> =
            Vec::from_slice(payload).map_err(|_| Error::from(Fault::Transport))?;
        self.server
            .control
            .value_set(&value)
            .map_err(|_| Error::from(Fault::Transport))?;

        if notify && self.notify.get() {
            match self.server.control.value_notify(&self.conn, &value) {
                Ok(()) => {}
                Err(gatt_server::NotifyValueError::Disconnected) => {
                    return Err(Error::PeerDisconnected)
                }
                Err(_) => warn!("remote: notify dropped"),
            }
        }
        Ok(())
    }

    fn disconnect(&self) {
        let _ = self.conn.disconnect();
    }
}
