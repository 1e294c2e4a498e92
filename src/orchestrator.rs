//! Always-on supervisors for the two roles.
//!
//! Robot cycle:
//! ```text
//! scan ─▶ connect ─▶ resolve ─▶ subscribe ─▶ consume ─▶ teardown ─▶ Idle
//! ```
//! Remote cycle:
//! ```text
//! advertise ─▶ accept ─▶ (produce | serve GATT) ─▶ teardown ─▶ Idle
//! ```
//! Every step that waits on the radio carries a timeout. Whatever ends a
//! cycle, the session is driven back to `Idle` and the next cycle starts
//! after a capped exponential backoff.

use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;

use crate::ble::adv_builder::{build_advertisement, build_scan_response, AdvData};
use crate::ble::discovery::{discover, PeerFilter};
use crate::ble::{Central, GattLink, PeerDescriptor, Peripheral, PeripheralLink};
use crate::config::{BackoffConfig, LinkConfig, APPEARANCE_GENERIC_REMOTE_CONTROL};
use crate::control::{consume, CommandSink, CommandSource, Consumer};
use crate::error::{Error, Fault, Missing};
use crate::session::{SessionEvent, SessionManager, StatusCell};
use crate::time::{with_timeout, Clock};

/// How one supervisor cycle ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleOutcome {
    /// Scan (or advertising) window elapsed without a peer.
    NotFound,
    /// The session broke before reaching `Active`.
    Failed(Error),
    /// An `Active` session ended.
    Ended(Error),
}

impl CycleOutcome {
    pub fn reached_active(&self) -> bool {
        matches!(self, CycleOutcome::Ended(_))
    }
}

/// Delay between cycles: doubles per cycle that did not reach `Active`,
/// capped at `max_ms`, back to `initial_ms` after one that did.
#[derive(Clone, Copy, Debug)]
pub struct Backoff {
    config: BackoffConfig,
    next_ms: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            next_ms: config.initial_ms,
        }
    }

    pub fn next_delay(&mut self, reached_active: bool) -> u32 {
        if reached_active {
            self.next_ms = self.config.initial_ms;
        }
        let delay = self.next_ms.min(self.config.max_ms);
        self.next_ms = delay.saturating_mul(2).min(self.config.max_ms);
        delay
    }
}

/// Central-role supervisor running on the robot.
pub struct RobotSupervisor<'a, C, D> {
    config: LinkConfig,
    session: SessionManager<'a>,
    clock: C,
    delay: D,
    backoff: Backoff,
}

impl<'a, C: Clock, D: DelayNs> RobotSupervisor<'a, C, D> {
    pub fn new(config: LinkConfig, status: &'a StatusCell, clock: C, delay: D) -> Self {
        Self {
            backoff: Backoff::new(config.backoff),
            session: SessionManager::new(status),
            config,
            clock,
            delay,
        }
    }

    pub fn session(&self) -> &SessionManager<'a> {
        &self.session
    }

    /// Run cycles forever.
    pub async fn run<R, S>(&mut self, central: &mut R, sink: &mut S) -> !
    where
        R: Central,
        S: CommandSink,
    {
        loop {
            let outcome = self.run_cycle(central, sink).await;
            let wait = self.backoff.next_delay(outcome.reached_active());
            info!("robot: {}, next cycle in {} ms", outcome, wait);
            self.delay.delay_ms(wait).await;
        }
    }

    /// One discovery-to-teardown pass. Always leaves the session `Idle`.
    pub async fn run_cycle<R, S>(&mut self, central: &mut R, sink: &mut S) -> CycleOutcome
    where
        R: Central,
        S: CommandSink,
    {
        self.session.begin_scan();
        let filter = PeerFilter::from_config(&self.config);
        let peer = match discover(central, &mut self.delay, &filter, &self.config.scan).await {
            Ok(Some(peer)) => peer,
            Ok(None) => {
                self.session.end_scan();
                return CycleOutcome::NotFound;
            }
            Err(e) => {
                self.session.fail(&e);
                return CycleOutcome::Failed(e);
            }
        };

        let address = peer.address;
        if let Err(e) = self.session.open(peer, self.clock.now_ms()) {
            return CycleOutcome::Failed(e);
        }

        let connect = central.connect(&address);
        let mut link = match with_timeout(&mut self.delay, self.config.timeouts.connect_ms, connect).await
        {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => return self.abandon(e),
            Err(_) => return self.abandon(Error::ConnectTimeout),
        };
        self.session.apply(SessionEvent::ConnectSucceeded);

        let outcome = self.serve_link(&mut link, sink).await;
        // The consumer future is gone by now; only then drop the transport.
        link.disconnect();
        self.session.reset();
        outcome
    }

    async fn serve_link<L, S>(&mut self, link: &mut L, sink: &mut S) -> CycleOutcome
    where
        L: GattLink,
        S: CommandSink,
    {
        let timeouts = self.config.timeouts;

        let resolve = link.resolve(self.config.control_service, self.config.control_characteristic);
        let handles = match with_timeout(&mut self.delay, timeouts.resolve_ms, resolve).await {
            Ok(Ok(handles)) => handles,
            Ok(Err(e)) => return self.stage_failed(e),
            Err(_) => return self.stage_failed(Missing::TimedOut.into()),
        };
        debug!(
            "robot: control value at {:#x}, cccd {}",
            handles.value, handles.cccd
        );
        self.session.record_handles(handles);
        self.session.apply(SessionEvent::Resolved);

        let mut consumer = Consumer::new(&self.config);
        if consumer.needs_subscription() {
            let subscribe = link.subscribe(&handles);
            match with_timeout(&mut self.delay, timeouts.subscribe_ms, subscribe).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return self.stage_failed(e),
                Err(_) => return self.stage_failed(Fault::SubscribeRejected.into()),
            }
        }
        self.session.apply(SessionEvent::SubscriptionAcknowledged);

        // One listener for the whole session: notifications arriving while
        // the sink is busy stay queued.
        let link = &*link;
        let session = &mut self.session;
        let clock = &self.clock;
        let consuming = consume(
            &mut consumer,
            link,
            &handles,
            &mut self.delay,
            sink,
            |_| session.touch(clock.now_ms()),
        );
        let error = match select(link.listen(&handles), consuming).await {
            Either::First(e) | Either::Second(e) => e,
        };
        self.session.fail(&error);
        CycleOutcome::Ended(error)
    }

    /// Connect failed: no transport to tear down.
    fn abandon(&mut self, error: Error) -> CycleOutcome {
        self.session.fail(&error);
        self.session.reset();
        CycleOutcome::Failed(error)
    }

    fn stage_failed(&mut self, error: Error) -> CycleOutcome {
        self.session.fail(&error);
        CycleOutcome::Failed(error)
    }
}

/// Peripheral-role supervisor running on the remote.
pub struct RemoteSupervisor<'a, C, D> {
    config: LinkConfig,
    session: SessionManager<'a>,
    clock: C,
    delay: D,
    backoff: Backoff,
    adv_data: AdvData,
    scan_data: AdvData,
}

impl<'a, C: Clock, D: DelayNs> RemoteSupervisor<'a, C, D> {
    pub fn new(config: LinkConfig, status: &'a StatusCell, clock: C, delay: D) -> Self {
        let adv_data = build_advertisement(
            config.peer_name,
            config.advertised_service,
            APPEARANCE_GENERIC_REMOTE_CONTROL,
        );
        let scan_data = build_scan_response(&[config.control_service]);
        Self {
            backoff: Backoff::new(config.backoff),
            session: SessionManager::new(status),
            config,
            clock,
            delay,
            adv_data,
            scan_data,
        }
    }

    pub fn session(&self) -> &SessionManager<'a> {
        &self.session
    }

    pub fn adv_data(&self) -> &[u8] {
        &self.adv_data
    }

    pub async fn run<P, S>(&mut self, peripheral: &mut P, source: &mut S) -> !
    where
        P: Peripheral,
        S: CommandSource,
    {
        loop {
            let outcome = self.run_cycle(peripheral, source).await;
            let wait = self.backoff.next_delay(outcome.reached_active());
            info!("remote: {}, next cycle in {} ms", outcome, wait);
            self.delay.delay_ms(wait).await;
        }
    }

    /// Advertise, serve one central until it leaves, return to `Idle`.
    ///
    /// Advertising is tracked as `Scanning`: it is the discovery phase from
    /// this side of the link.
    pub async fn run_cycle<P, S>(&mut self, peripheral: &mut P, source: &mut S) -> CycleOutcome
    where
        P: Peripheral,
        S: CommandSource,
    {
        self.session.begin_scan();
        let link = match peripheral
            .advertise(&self.config.advertising, &self.adv_data, &self.scan_data)
            .await
        {
            Ok(link) => link,
            Err(Error::DiscoveryTimeout) => {
                self.session.end_scan();
                return CycleOutcome::NotFound;
            }
            Err(e) => {
                self.session.fail(&e);
                return CycleOutcome::Failed(e);
            }
        };

        let peer = link.peer();
        info!("remote: central {} connected", peer);
        if let Err(e) = self
            .session
            .open(PeerDescriptor::from_address(peer), self.clock.now_ms())
        {
            link.disconnect();
            return CycleOutcome::Failed(e);
        }
        self.session.apply(SessionEvent::ConnectSucceeded);
        self.session.apply(SessionEvent::Resolved);
        self.session.apply(SessionEvent::SubscriptionAcknowledged);

        let error = match select(source.produce(&link), link.serve()).await {
            Either::First(e) | Either::Second(e) => e,
        };
        self.session.fail(&error);
        link.disconnect();
        self.session.reset();
        CycleOutcome::Ended(error)
    }
}
