//! Bluetooth Low Energy subsystem.
//!
//! The link runs in two roles:
//!
//! 1. **Robot (Central)** - scans for the remote, connects, resolves the
//!    control characteristic and consumes its values.
//! 2. **Remote (Peripheral)** - advertises, accepts one central, and
//!    publishes button/sensor values through a GATT server.
//!
//! The radio stack is reached only through the traits below. The firmware
//! implements them on the Nordic SoftDevice (`crate::softdevice`); tests
//! implement them with scripted mocks.

pub mod adv_builder;
pub mod adv_parser;
pub mod device_info;
pub mod discovery;

use heapless::{String, Vec};

use crate::config::{AdvertisingParams, ScanParams};
use crate::error::Error;

/// Largest characteristic value we exchange (default ATT MTU - 3).
pub const MAX_PAYLOAD: usize = 20;

/// Maximum advertised 16-bit service ids kept per peer.
pub const MAX_ADVERTISED_SERVICES: usize = 8;

/// Characteristic value as received from the radio.
pub type Payload = Vec<u8, MAX_PAYLOAD>;

/// 48-bit device address plus its GAP address type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerAddress {
    pub addr_type: u8,
    pub bytes: [u8; 6],
}

/// One advertiser seen during a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerDescriptor {
    pub address: PeerAddress,
    /// Advertised local name; empty when the advertiser sent none.
    pub name: String<32>,
    /// Advertised 16-bit service ids.
    pub services: Vec<u16, MAX_ADVERTISED_SERVICES>,
    /// Received Signal Strength Indicator (dBm).
    pub rssi: i8,
}

impl PeerDescriptor {
    /// A peer known only by address, e.g. a central that connected to us.
    pub fn from_address(address: PeerAddress) -> Self {
        Self {
            address,
            name: String::new(),
            services: Vec::new(),
            rssi: 0,
        }
    }

    pub fn advertises(&self, service: u16) -> bool {
        self.services.contains(&service)
    }
}

/// Attribute handles of the resolved control characteristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Handles {
    /// Primary service declaration.
    pub service: u16,
    pub value: u16,
    /// Client Characteristic Configuration descriptor, when notifiable.
    pub cccd: Option<u16>,
}

impl Handles {
    /// Handles of the only characteristic in a service without includes.
    ///
    /// Such a service is laid out as service declaration, characteristic
    /// declaration, value, so the service sits two handles below the value.
    /// Returns `None` when `value` is too low for that layout.
    pub fn sole_characteristic(value: u16, cccd: Option<u16>) -> Option<Self> {
        // Handle 0 is reserved.
        let service = value.checked_sub(2).filter(|h| *h != 0)?;
        Some(Self {
            service,
            value,
            cccd,
        })
    }
}

/// Central role of the radio stack.
#[allow(async_fn_in_trait)]
pub trait Central {
    type Link: GattLink;

    /// Scan until `on_report` returns `Some`. The receiver is active only
    /// while the returned future is alive; dropping it stops the scan.
    async fn scan<F, R>(&mut self, params: &ScanParams, on_report: F) -> Result<R, Error>
    where
        F: FnMut(&PeerDescriptor) -> Option<R>;

    /// Open a link to `peer`. Unbounded; callers apply their own timeout.
    async fn connect(&mut self, peer: &PeerAddress) -> Result<Self::Link, Error>;
}

/// GATT client side of an open link.
///
/// Values are taken through `&self` so that [`GattLink::listen`] can run
/// beside the consumer for the whole session.
#[allow(async_fn_in_trait)]
pub trait GattLink {
    /// Find `characteristic` inside `service`.
    async fn resolve(&mut self, service: u16, characteristic: u16) -> Result<Handles, Error>;

    /// Enable notifications (CCCD write).
    async fn subscribe(&mut self, handles: &Handles) -> Result<(), Error>;

    /// Receive radio events for `handles` until the link closes; returns
    /// why it closed. Notifications arriving meanwhile are queued for
    /// [`GattLink::notified`], including those that come in while the
    /// consumer is busy applying the previous one.
    ///
    /// Links that queue notifications on their own never return.
    async fn listen(&self, handles: &Handles) -> Error {
        let _ = handles;
        core::future::pending().await
    }

    /// Next queued notification on `handles.value`, oldest first.
    async fn notified(&self, handles: &Handles) -> Result<Payload, Error>;

    /// Read the characteristic value once.
    async fn read(&self, handles: &Handles) -> Result<Payload, Error>;

    /// Tear the link down. Idempotent.
    fn disconnect(&mut self);
}

/// Peripheral role of the radio stack.
#[allow(async_fn_in_trait)]
pub trait Peripheral {
    type Link: PeripheralLink;

    /// Advertise `adv_data` / `scan_data` until a central connects (or the
    /// optional timeout in `params` elapses).
    async fn advertise(
        &mut self,
        params: &AdvertisingParams,
        adv_data: &[u8],
        scan_data: &[u8],
    ) -> Result<Self::Link, Error>;
}

/// GATT server side of an accepted link.
#[allow(async_fn_in_trait)]
pub trait PeripheralLink {
    fn peer(&self) -> PeerAddress;

    /// Process GATT events until the link closes; returns why it closed.
    async fn serve(&self) -> Error;

    /// Store `payload` as the characteristic value and, when `notify` is set
    /// and the central subscribed, push it. Fire-and-forget.
    fn publish(&self, payload: &[u8], notify: bool) -> Result<(), Error>;

    fn disconnect(&self);
}
