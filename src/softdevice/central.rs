//! Central role on the SoftDevice: scanning, connecting and the GATT client
//! for the control characteristic.

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use nrf_softdevice::ble::{central, gatt_client, Address, Connection};
use nrf_softdevice::Softdevice;

use super::{peer_address, sd_address, us_to_units_625};
use crate::ble::{adv_parser, Central, GattLink, Handles, Payload, PeerAddress, PeerDescriptor};
use crate::config::{ScanParams, CONTROL_CHAR_UUID, CONTROL_SERVICE_UUID};
use crate::error::{Error, Fault, Missing};

/// Generated client for the control service.
#[nrf_softdevice::gatt_client(uuid = "1848")]
pub struct ControlClient {
    #[characteristic(uuid = "2a6e", read, notify)]
    pub value: Payload,
}

pub struct SdCentral {
    sd: &'static Softdevice,
}

impl SdCentral {
    pub fn new(sd: &'static Softdevice) -> Self {
        Self { sd }
    }
}

impl Central for SdCentral {
    type Link = SdGattLink;

    async fn scan<F, R>(&mut self, params: &ScanParams, mut on_report: F) -> Result<R, Error>
    where
        F: FnMut(&PeerDescriptor) -> Option<R>,
    {
        let config = central::ScanConfig {
            // Active scan so scan responses are delivered too.
            active: params.active,
            interval: us_to_units_625(params.interval_us),
            window: us_to_units_625(params.window_us),
            ..Default::default()
        };

        central::scan(self.sd, &config, |report| {
            let data =
                unsafe { core::slice::from_raw_parts(report.data.p_data, report.data.len as usize) };
            let address = peer_address(&Address::from_raw(report.peer_addr));
            let peer = adv_parser::parse_report(address, report.rssi, data);
            on_report(&peer)
        })
        .await
        .map_err(|e| match e {
            central::ScanError::Raw(raw) => Error::Radio(raw as u32),
            _ => Error::DiscoveryTimeout,
        })
    }

    async fn connect(&mut self, peer: &PeerAddress) -> Result<SdGattLink, Error> {
        let address = sd_address(peer);
        let whitelist = [&address];
        let config = central::ConnectConfig {
            scan_config: central::ScanConfig {
                whitelist: Some(&whitelist),
                ..Default::default()
            },
            ..Default::default()
        };

        let conn = central::connect(self.sd, &config)
            .await
            .map_err(|e| match e {
                central::ConnectError::Timeout => Error::ConnectTimeout,
                central::ConnectError::Raw(raw) => Error::Radio(raw as u32),
                _ => Error::ConnectRefused,
            })?;
        Ok(SdGattLink::new(conn))
    }
}

/// Open link to the remote.
///
/// `listen` owns the SoftDevice event stream for the whole session and
/// queues each notification; `notified` only drains the queue. A value is
/// lost only when the queue is full.
pub struct SdGattLink {
    conn: Connection,
    client: Option<ControlClient>,
    notifications: Channel<NoopRawMutex, Payload, NOTIFY_QUEUE>,
}

const NOTIFY_QUEUE: usize = 8;

impl SdGattLink {
    fn new(conn: Connection) -> Self {
        Self {
            conn,
            client: None,
            notifications: Channel::new(),
        }
    }

    fn client(&self) -> Result<&ControlClient, Error> {
        self.client
            .as_ref()
            .ok_or(Error::ResolutionFailure(Missing::Characteristic))
    }
}

impl GattLink for SdGattLink {
    async fn resolve(&mut self, service: u16, characteristic: u16) -> Result<Handles, Error> {
        // The generated client is bound to the fleet ids.
        if service != CONTROL_SERVICE_UUID {
            return Err(Missing::Service.into());
        }
        if characteristic != CONTROL_CHAR_UUID {
            return Err(Missing::Characteristic.into());
        }

        let client: ControlClient = gatt_client::discover(&self.conn)
            .await
            .map_err(|e| match e {
                gatt_client::DiscoverError::ServiceNotFound => Error::from(Missing::Service),
                gatt_client::DiscoverError::ServiceIncomplete => {
                    Error::from(Missing::Characteristic)
                }
                gatt_client::DiscoverError::Disconnected => Error::PeerDisconnected,
                _ => Error::from(Fault::Transport),
            })?;

        // The control service carries a single characteristic.
        let handles =
            Handles::sole_characteristic(client.value_value_handle, Some(client.value_cccd_handle))
                .ok_or(Error::from(Missing::Service))?;
        self.client = Some(client);
        Ok(handles)
    }

    async fn subscribe(&mut self, _handles: &Handles) -> Result<(), Error> {
        self.client()?
            .value_cccd_write(true)
            .await
            .map_err(|e| match e {
                gatt_client::WriteError::Disconnected => Error::PeerDisconnected,
                _ => Error::from(Fault::SubscribeRejected),
            })
    }

    async fn listen(&self, _handles: &Handles) -> Error {
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => return e,
        };
        gatt_client::run(&self.conn, client, |event| match event {
            ControlClientEvent::ValueNotification(value) => {
                if self.notifications.try_send(value).is_err() {
                    warn!("central: notification queue full, dropping");
                }
            }
        })
        .await;
        Error::PeerDisconnected
    }

    async fn notified(&self, _handles: &Handles) -> Result<Payload, Error> {
        Ok(self.notifications.receive().await)
    }

    async fn read(&self, _handles: &Handles) -> Result<Payload, Error> {
        self.client()?.value_read().await.map_err(|e| match e {
            gatt_client::ReadError::Disconnected => Error::PeerDisconnected,
            _ => Error::from(Fault::Transport),
        })
    }

    fn disconnect(&mut self) {
        let _ = self.conn.disconnect();
    }
}
