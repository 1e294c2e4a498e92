//! Peer discovery - finds the one advertiser we should connect to.
//!
//! The radio scan runs until the first report that matches both the target
//! name and the target service id, or until the scan budget elapses.
//! Running out of budget is a normal outcome (`Ok(None)`), not an error.

use embedded_hal_async::delay::DelayNs;

use crate::ble::{Central, PeerDescriptor};
use crate::config::{LinkConfig, ScanParams};
use crate::error::Error;
use crate::time::with_timeout;

/// What a peer must advertise to be accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerFilter<'a> {
    pub name: &'a str,
    pub service: u16,
}

impl<'a> PeerFilter<'a> {
    pub fn from_config(config: &'a LinkConfig) -> Self {
        Self {
            name: config.peer_name,
            service: config.advertised_service,
        }
    }

    /// Name must match exactly AND the service must be advertised.
    pub fn matches(&self, peer: &PeerDescriptor) -> bool {
        peer.name.as_str() == self.name && peer.advertises(self.service)
    }
}

/// Scan for at most `params.duration_ms` and return the first match.
///
/// The radio is released when this returns: the scan future is dropped
/// either because it produced a match or because the budget ran out.
pub async fn discover<C, D>(
    central: &mut C,
    delay: &mut D,
    filter: &PeerFilter<'_>,
    params: &ScanParams,
) -> Result<Option<PeerDescriptor>, Error>
where
    C: Central,
    D: DelayNs,
{
    info!(
        "scan: looking for {} ({} ms window)",
        filter.name, params.duration_ms
    );

    let scan = central.scan(params, |peer| {
        if filter.matches(peer) {
            Some(peer.clone())
        } else {
            if peer.name.as_str() == filter.name {
                debug!("scan: {} lacks service {:#x}", filter.name, filter.service);
            }
            None
        }
    });

    match with_timeout(delay, params.duration_ms, scan).await {
        Ok(Ok(peer)) => {
            info!("scan: found {} (RSSI {})", peer.name.as_str(), peer.rssi);
            Ok(Some(peer))
        }
        Ok(Err(e)) => {
            warn!("scan: radio error {}", e);
            Err(e)
        }
        Err(_) => {
            info!("scan: {} not found", filter.name);
            Ok(None)
        }
    }
}
