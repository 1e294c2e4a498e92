//! Host doubles for the radio and board traits, driven on a virtual clock.
//!
//! `run` polls a future until it completes. Whenever a poll makes no
//! progress it jumps the clock to the earliest armed timer, so a 60 s
//! timeout costs nothing and every timestamp is exact.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::{pin, Pin};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use botlink::ble::adv_builder::build_advertisement;
use botlink::ble::{
    adv_parser, Central, GattLink, Handles, Payload, PeerAddress, PeerDescriptor, Peripheral,
    PeripheralLink,
};
use botlink::command::{Button, Reading};
use botlink::config::{AdvertisingParams, ScanParams};
use botlink::io::{Actuator, ButtonInput, Indicator, Sensor};
use botlink::time::Clock;
use botlink::Error;
use embedded_hal_async::delay::DelayNs;

// Virtual time

#[derive(Default)]
struct Timeline {
    now_ns: u64,
    next_id: u64,
    timers: Vec<(u64, u64)>,
}

#[derive(Clone, Default)]
pub struct VirtualTime(Rc<RefCell<Timeline>>);

impl VirtualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.0.borrow().now_ns / 1_000_000
    }

    pub fn sleep_ns(&self, ns: u64) -> Sleep {
        let deadline = self.0.borrow().now_ns + ns;
        Sleep {
            time: self.clone(),
            deadline,
            id: None,
        }
    }

    pub fn sleep_ms(&self, ms: u64) -> Sleep {
        self.sleep_ns(ms * 1_000_000)
    }

    /// Sleep until the absolute time `at_ms`.
    pub fn until_ms(&self, at_ms: u64) -> Sleep {
        Sleep {
            time: self.clone(),
            deadline: at_ms * 1_000_000,
            id: None,
        }
    }

    pub fn delay(&self) -> VirtualDelay {
        VirtualDelay(self.clone())
    }

    pub fn clock(&self) -> VirtualClock {
        VirtualClock(self.clone())
    }

    fn advance(&self) -> bool {
        let mut t = self.0.borrow_mut();
        match t.timers.iter().map(|(_, deadline)| *deadline).min() {
            Some(deadline) => {
                t.now_ns = t.now_ns.max(deadline);
                true
            }
            None => false,
        }
    }
}

pub struct Sleep {
    time: VirtualTime,
    deadline: u64,
    id: Option<u64>,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let mut t = this.time.0.borrow_mut();
        if t.now_ns >= this.deadline {
            if let Some(id) = this.id.take() {
                t.timers.retain(|(i, _)| *i != id);
            }
            return Poll::Ready(());
        }
        if this.id.is_none() {
            let id = t.next_id;
            t.next_id += 1;
            t.timers.push((id, this.deadline));
            this.id = Some(id);
        }
        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.time.0.borrow_mut().timers.retain(|(i, _)| *i != id);
        }
    }
}

struct WakeFlag(AtomicBool);

impl Wake for WakeFlag {
    fn wake(self: Arc<Self>) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Drive `fut` to completion on the virtual clock.
pub fn run<F: Future>(time: &VirtualTime, fut: F) -> F::Output {
    let flag = Arc::new(WakeFlag(AtomicBool::new(false)));
    let waker = Waker::from(flag.clone());
    let mut cx = Context::from_waker(&waker);
    let mut fut = pin!(fut);

    for _ in 0..1_000_000 {
        flag.0.store(false, Ordering::SeqCst);
        if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
            return out;
        }
        if !flag.0.load(Ordering::SeqCst) && !time.advance() {
            panic!("stalled at {} ms: nothing ready and no timer armed", time.now_ms());
        }
    }
    panic!("future did not finish");
}

#[derive(Clone)]
pub struct VirtualDelay(VirtualTime);

impl DelayNs for VirtualDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.0.sleep_ns(u64::from(ns)).await
    }

    async fn delay_us(&mut self, us: u32) {
        self.0.sleep_ns(u64::from(us) * 1_000).await
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.0.sleep_ms(u64::from(ms)).await
    }
}

#[derive(Clone)]
pub struct VirtualClock(VirtualTime);

impl Clock for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.0.now_ms()
    }
}

// Peers

pub fn address(last: u8) -> PeerAddress {
    PeerAddress {
        addr_type: 1,
        bytes: [0xC0, 0x11, 0x22, 0x33, 0x44, last],
    }
}

/// The remote exactly as it advertises itself.
pub fn remote_peer() -> PeerDescriptor {
    let adv = build_advertisement("KevsRobots", 0x1800, 384);
    adv_parser::parse_report(address(0x01), -48, &adv)
}

pub fn other_peer(name: &str, service: u16) -> PeerDescriptor {
    let adv = build_advertisement(name, service, 0);
    adv_parser::parse_report(address(0x02), -70, &adv)
}

pub const HANDLES: Handles = Handles {
    service: 0x000C,
    value: 0x000E,
    cccd: Some(0x000F),
};

// Robot side radio

/// An advertisement heard `at_ms` after the scan starts.
pub struct Advert {
    pub at_ms: u64,
    pub peer: PeerDescriptor,
}

pub enum ConnectBehavior {
    Accept,
    Refuse,
    Hang,
}

pub struct MockCentral<L = MockLink> {
    time: VirtualTime,
    pub adverts: Vec<Advert>,
    pub connect: ConnectBehavior,
    pub links: VecDeque<L>,
    pub scan_started_ms: Vec<u64>,
    pub connect_attempts: u32,
}

impl MockCentral {
    pub fn new(time: &VirtualTime, adverts: Vec<Advert>) -> Self {
        Self::with_links(time, adverts, VecDeque::new())
    }
}

impl MockCentral<AirLink> {
    /// A central whose only link listens to a remote's notifications.
    pub fn on_air(time: &VirtualTime, adverts: Vec<Advert>, link: AirLink) -> Self {
        Self::with_links(time, adverts, VecDeque::from([link]))
    }
}

impl<L> MockCentral<L> {
    fn with_links(time: &VirtualTime, adverts: Vec<Advert>, links: VecDeque<L>) -> Self {
        Self {
            time: time.clone(),
            adverts,
            connect: ConnectBehavior::Accept,
            links,
            scan_started_ms: Vec::new(),
            connect_attempts: 0,
        }
    }

    pub fn with_link(mut self, link: L) -> Self {
        self.links.push_back(link);
        self
    }
}

impl<L: GattLink> Central for MockCentral<L> {
    type Link = L;

    async fn scan<F, R>(&mut self, _params: &ScanParams, mut on_report: F) -> Result<R, Error>
    where
        F: FnMut(&PeerDescriptor) -> Option<R>,
    {
        let start = self.time.now_ms();
        self.scan_started_ms.push(start);
        for advert in &self.adverts {
            self.time.until_ms(start + advert.at_ms).await;
            if let Some(found) = on_report(&advert.peer) {
                return Ok(found);
            }
        }
        std::future::pending().await
    }

    async fn connect(&mut self, _peer: &PeerAddress) -> Result<L, Error> {
        self.connect_attempts += 1;
        match self.connect {
            ConnectBehavior::Accept => self.links.pop_front().ok_or(Error::ConnectRefused),
            ConnectBehavior::Refuse => Err(Error::ConnectRefused),
            ConnectBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Counters shared between a link and the test body.
#[derive(Default)]
pub struct LinkCounters {
    pub subscribes: Cell<u32>,
    pub reads: Cell<u32>,
    pub disconnects: Cell<u32>,
}

/// One value delivered `after_ms` after the consumer starts waiting.
pub struct Delivery {
    pub after_ms: u64,
    pub value: Result<Vec<u8>, Error>,
}

pub fn value(after_ms: u64, bytes: &[u8]) -> Delivery {
    Delivery {
        after_ms,
        value: Ok(bytes.to_vec()),
    }
}

pub fn failure(after_ms: u64, error: Error) -> Delivery {
    Delivery {
        after_ms,
        value: Err(error),
    }
}

pub struct MockLink {
    time: VirtualTime,
    /// `None` never answers.
    pub resolve: Option<Result<Handles, Error>>,
    pub subscribe: Option<Result<(), Error>>,
    pub deliveries: RefCell<VecDeque<Delivery>>,
    pub counters: Rc<LinkCounters>,
}

impl MockLink {
    pub fn new(time: &VirtualTime, deliveries: Vec<Delivery>) -> Self {
        Self {
            time: time.clone(),
            resolve: Some(Ok(HANDLES)),
            subscribe: Some(Ok(())),
            deliveries: RefCell::new(deliveries.into()),
            counters: Rc::new(LinkCounters::default()),
        }
    }

    async fn next_delivery(&self) -> Result<Payload, Error> {
        let next = self.deliveries.borrow_mut().pop_front();
        match next {
            Some(d) => {
                self.time.sleep_ms(d.after_ms).await;
                d.value
                    .map(|bytes| Payload::from_slice(&bytes).expect("payload fits"))
            }
            None => std::future::pending().await,
        }
    }
}

impl GattLink for MockLink {
    async fn resolve(&mut self, _service: u16, _characteristic: u16) -> Result<Handles, Error> {
        match self.resolve {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn subscribe(&mut self, _handles: &Handles) -> Result<(), Error> {
        self.counters.subscribes.set(self.counters.subscribes.get() + 1);
        match self.subscribe {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn notified(&self, _handles: &Handles) -> Result<Payload, Error> {
        self.next_delivery().await
    }

    async fn read(&self, _handles: &Handles) -> Result<Payload, Error> {
        self.counters.reads.set(self.counters.reads.get() + 1);
        self.next_delivery().await
    }

    fn disconnect(&mut self) {
        self.counters.disconnects.set(self.counters.disconnects.get() + 1);
    }
}

/// Notified values in flight from a [`MockServerLink`] to an [`AirLink`].
pub type Air = Rc<RefCell<VecDeque<Vec<u8>>>>;

/// Robot-side link fed by a remote's notifications.
///
/// Nothing here registers a waker: `run` re-polls the whole task on every
/// clock step, which is enough to observe the queue.
pub struct AirLink {
    time: VirtualTime,
    air: Air,
    /// Absolute time at which the remote goes away.
    pub leaves_at_ms: u64,
}

impl AirLink {
    pub fn new(time: &VirtualTime, air: &Air, leaves_at_ms: u64) -> Self {
        Self {
            time: time.clone(),
            air: air.clone(),
            leaves_at_ms,
        }
    }
}

impl GattLink for AirLink {
    async fn resolve(&mut self, _service: u16, _characteristic: u16) -> Result<Handles, Error> {
        Ok(HANDLES)
    }

    async fn subscribe(&mut self, _handles: &Handles) -> Result<(), Error> {
        Ok(())
    }

    async fn listen(&self, _handles: &Handles) -> Error {
        self.time.until_ms(self.leaves_at_ms).await;
        Error::PeerDisconnected
    }

    async fn notified(&self, _handles: &Handles) -> Result<Payload, Error> {
        std::future::poll_fn(|_cx| match self.air.borrow_mut().pop_front() {
            Some(bytes) => Poll::Ready(Ok(
                Payload::from_slice(&bytes).expect("payload fits")
            )),
            None => Poll::Pending,
        })
        .await
    }

    async fn read(&self, _handles: &Handles) -> Result<Payload, Error> {
        std::future::pending().await
    }

    fn disconnect(&mut self) {}
}

// Remote side radio

pub enum Accept {
    /// A central connects `after_ms` into advertising.
    After(u64, MockServerLink),
    /// Advertising stops after `ms` without a connection.
    TimeOut(u64),
}

pub struct MockPeripheral {
    time: VirtualTime,
    pub accepts: VecDeque<Accept>,
    pub adv_data: Vec<Vec<u8>>,
    pub scan_data: Vec<Vec<u8>>,
    pub started_ms: Vec<u64>,
}

impl MockPeripheral {
    pub fn new(time: &VirtualTime, accepts: Vec<Accept>) -> Self {
        Self {
            time: time.clone(),
            accepts: accepts.into(),
            adv_data: Vec::new(),
            scan_data: Vec::new(),
            started_ms: Vec::new(),
        }
    }
}

impl Peripheral for MockPeripheral {
    type Link = MockServerLink;

    async fn advertise(
        &mut self,
        _params: &AdvertisingParams,
        adv_data: &[u8],
        scan_data: &[u8],
    ) -> Result<MockServerLink, Error> {
        self.started_ms.push(self.time.now_ms());
        self.adv_data.push(adv_data.to_vec());
        self.scan_data.push(scan_data.to_vec());
        match self.accepts.pop_front() {
            Some(Accept::After(ms, link)) => {
                self.time.sleep_ms(ms).await;
                Ok(link)
            }
            Some(Accept::TimeOut(ms)) => {
                self.time.sleep_ms(ms).await;
                Err(Error::DiscoveryTimeout)
            }
            None => std::future::pending().await,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Published {
    pub at_ms: u64,
    pub bytes: Vec<u8>,
    pub notified: bool,
}

pub struct MockServerLink {
    time: VirtualTime,
    /// Absolute time at which the central goes away; `None` stays forever.
    pub leaves_at_ms: Option<u64>,
    pub published: Rc<RefCell<Vec<Published>>>,
    pub counters: Rc<LinkCounters>,
    /// Where notified values go, when a robot is listening.
    pub air: Option<Air>,
}

impl MockServerLink {
    pub fn new(time: &VirtualTime, leaves_at_ms: Option<u64>) -> Self {
        Self {
            time: time.clone(),
            leaves_at_ms,
            published: Rc::default(),
            counters: Rc::default(),
            air: None,
        }
    }

    pub fn on_air(mut self, air: &Air) -> Self {
        self.air = Some(air.clone());
        self
    }

    fn gone(&self) -> bool {
        self.leaves_at_ms
            .is_some_and(|at| self.time.now_ms() >= at)
    }
}

impl PeripheralLink for MockServerLink {
    fn peer(&self) -> PeerAddress {
        address(0x7F)
    }

    async fn serve(&self) -> Error {
        match self.leaves_at_ms {
            Some(at) => {
                self.time.until_ms(at).await;
                Error::PeerDisconnected
            }
            None => std::future::pending().await,
        }
    }

    fn publish(&self, payload: &[u8], notify: bool) -> Result<(), Error> {
        if self.gone() {
            return Err(Error::PeerDisconnected);
        }
        self.published.borrow_mut().push(Published {
            at_ms: self.time.now_ms(),
            bytes: payload.to_vec(),
            notified: notify,
        });
        if let (true, Some(air)) = (notify, &self.air) {
            air.borrow_mut().push_back(payload.to_vec());
        }
        Ok(())
    }

    fn disconnect(&self) {
        self.counters.disconnects.set(self.counters.disconnects.get() + 1);
    }
}

// Board

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Motion {
    Forward(u32),
    Backward(u32),
    TurnLeft(u32),
    TurnRight(u32),
    Stop,
}

/// Motors that log each call with its start time.
pub struct RecordingMotors {
    time: VirtualTime,
    pub log: Rc<RefCell<Vec<(u64, Motion)>>>,
}

impl RecordingMotors {
    pub fn new(time: &VirtualTime) -> Self {
        Self {
            time: time.clone(),
            log: Rc::default(),
        }
    }

    async fn run_for(&mut self, motion: Motion, ms: u32) {
        self.log.borrow_mut().push((self.time.now_ms(), motion));
        self.time.sleep_ms(u64::from(ms)).await;
    }

    pub fn motions(&self) -> Vec<Motion> {
        self.log.borrow().iter().map(|(_, m)| *m).collect()
    }
}

impl Actuator for RecordingMotors {
    async fn forward(&mut self, duration_ms: u32) {
        self.run_for(Motion::Forward(duration_ms), duration_ms).await
    }

    async fn backward(&mut self, duration_ms: u32) {
        self.run_for(Motion::Backward(duration_ms), duration_ms).await
    }

    async fn turn_left(&mut self, duration_ms: u32) {
        self.run_for(Motion::TurnLeft(duration_ms), duration_ms).await
    }

    async fn turn_right(&mut self, duration_ms: u32) {
        self.run_for(Motion::TurnRight(duration_ms), duration_ms).await
    }

    fn stop(&mut self) {
        self.log.borrow_mut().push((self.time.now_ms(), Motion::Stop));
    }
}

/// Buttons held during `[from_ms, to_ms)` windows.
pub struct ScriptedButtons {
    time: VirtualTime,
    pub presses: Vec<(u64, u64, Button)>,
}

impl ScriptedButtons {
    pub fn new(time: &VirtualTime, presses: Vec<(u64, u64, Button)>) -> Self {
        Self {
            time: time.clone(),
            presses,
        }
    }
}

impl ButtonInput for ScriptedButtons {
    fn is_pressed(&mut self, button: Button) -> bool {
        let now = self.time.now_ms();
        self.presses
            .iter()
            .any(|&(from, to, b)| b == button && (from..to).contains(&now))
    }
}

/// LED that records `(time, level)` for every write.
pub struct RecordingLed {
    time: VirtualTime,
    pub writes: Rc<RefCell<Vec<(u64, bool)>>>,
}

impl RecordingLed {
    pub fn new(time: &VirtualTime) -> Self {
        Self {
            time: time.clone(),
            writes: Rc::default(),
        }
    }
}

impl Indicator for RecordingLed {
    fn set(&mut self, on: bool) {
        self.writes.borrow_mut().push((self.time.now_ms(), on));
    }
}

/// Sensor returning a fixed sequence, then repeating the last value.
pub struct SequenceSensor {
    pub values: VecDeque<Reading>,
    last: Reading,
}

impl SequenceSensor {
    pub fn new(values: &[f32]) -> Self {
        Self {
            values: values.iter().map(|v| Reading::from_f32(*v)).collect(),
            last: Reading::ZERO,
        }
    }
}

impl Sensor for SequenceSensor {
    async fn sample(&mut self) -> Reading {
        if let Some(next) = self.values.pop_front() {
            self.last = next;
        }
        self.last
    }
}
