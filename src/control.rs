//! Control channel: producing commands on the remote, consuming them on
//! the robot.
//!
//! The remote stores every sample in the control characteristic and
//! notifies presses, releases, sensor readings and an idle keepalive. The
//! robot takes values either from notifications or from timed reads,
//! decodes them and hands them to a [`CommandSink`] in wire order.

use embedded_hal_async::delay::DelayNs;

use crate::ble::{GattLink, Handles, PeripheralLink};
use crate::command::{Button, Command, PayloadKind, Reading, MAX_COMMAND_SIZE};
use crate::config::{Delivery, LinkConfig};
use crate::error::{Error, Fault};
use crate::io::{Actuator, ButtonInput, Sensor};
use crate::time::with_timeout;

// Remote side

/// First pressed button in A > B > X > Y order, or `Idle`.
pub fn sample_buttons<B: ButtonInput>(buttons: &mut B) -> Command {
    Button::PRIORITY
        .into_iter()
        .find(|b| buttons.is_pressed(*b))
        .map(Command::from)
        .unwrap_or(Command::Idle)
}

/// Store `command` in the characteristic and push it when `notify` is set.
/// Commands without a wire form are skipped.
pub fn publish<L: PeripheralLink>(link: &L, command: Command, notify: bool) -> Result<(), Error> {
    let mut buf = [0u8; MAX_COMMAND_SIZE];
    let n = command.encode(&mut buf);
    if n == 0 {
        return Ok(());
    }
    link.publish(&buf[..n], notify)
}

/// Something that feeds the control characteristic while a central is
/// connected.
#[allow(async_fn_in_trait)]
pub trait CommandSource {
    /// Publish until the link refuses a value; returns that error.
    async fn produce<L: PeripheralLink>(&mut self, link: &L) -> Error;
}

/// Polls the button bank every `poll_ms`.
///
/// Every sample is stored. A held button is notified on each sample and
/// its release once. While idle, `Idle` is re-notified every `keepalive_ms`
/// so the robot's notify timeout never fires on a live link.
pub struct ButtonPanel<B, D> {
    buttons: B,
    delay: D,
    poll_ms: u32,
    keepalive_ms: u32,
    last: Command,
    /// Time since the last notified value.
    quiet_ms: u32,
}

impl<B: ButtonInput, D: DelayNs> ButtonPanel<B, D> {
    pub fn new(buttons: B, delay: D, poll_ms: u32, keepalive_ms: u32) -> Self {
        Self {
            buttons,
            delay,
            poll_ms,
            keepalive_ms,
            last: Command::Idle,
            quiet_ms: 0,
        }
    }

    pub fn from_config(buttons: B, delay: D, config: &LinkConfig) -> Self {
        Self::new(
            buttons,
            delay,
            config.button_poll_ms,
            config.idle_keepalive_ms,
        )
    }

    /// Whether `command`, sampled now, should be pushed to the central.
    fn should_notify(&self, command: Command) -> bool {
        command != Command::Idle
            || self.last != Command::Idle
            || self.quiet_ms >= self.keepalive_ms
    }
}

impl<B: ButtonInput, D: DelayNs> CommandSource for ButtonPanel<B, D> {
    async fn produce<L: PeripheralLink>(&mut self, link: &L) -> Error {
        // Each connection starts from a quiet idle panel.
        self.last = Command::Idle;
        self.quiet_ms = 0;
        loop {
            let command = sample_buttons(&mut self.buttons);
            let notify = self.should_notify(command);
            if command != self.last {
                debug!("panel: {}", command);
                self.last = command;
            }
            if let Err(e) = publish(link, command, notify) {
                return e;
            }
            self.quiet_ms = if notify {
                0
            } else {
                self.quiet_ms.saturating_add(self.poll_ms)
            };
            self.delay.delay_ms(self.poll_ms).await;
        }
    }
}

/// Samples a [`Sensor`] every `interval_ms`.
pub struct SensorFeed<S, D> {
    sensor: S,
    delay: D,
    interval_ms: u32,
}

impl<S: Sensor, D: DelayNs> SensorFeed<S, D> {
    pub fn new(sensor: S, delay: D, interval_ms: u32) -> Self {
        Self {
            sensor,
            delay,
            interval_ms,
        }
    }

    pub fn from_config(sensor: S, delay: D, config: &LinkConfig) -> Self {
        Self::new(sensor, delay, config.sensor_poll_ms)
    }
}

impl<S: Sensor, D: DelayNs> CommandSource for SensorFeed<S, D> {
    async fn produce<L: PeripheralLink>(&mut self, link: &L) -> Error {
        loop {
            let reading = self.sensor.sample().await;
            debug!("sensor: {} centi", reading.centi());
            if let Err(e) = publish(link, Command::Reading(reading), true) {
                return e;
            }
            self.delay.delay_ms(self.interval_ms).await;
        }
    }
}

// Robot side

/// Pulls one command at a time off an established link.
pub struct Consumer {
    kind: PayloadKind,
    delivery: Delivery,
    read_timeout_ms: u32,
    notify_timeout_ms: u32,
    primed: bool,
}

impl Consumer {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            kind: config.payload,
            delivery: config.delivery,
            read_timeout_ms: config.timeouts.read_ms,
            notify_timeout_ms: config.timeouts.notify_ms,
            primed: false,
        }
    }

    /// Notify mode needs the CCCD written before values arrive.
    pub fn needs_subscription(&self) -> bool {
        self.delivery == Delivery::Notify
    }

    /// Wait for the next value and decode it.
    ///
    /// In poll mode the first read is immediate and later ones are spaced
    /// by the poll interval.
    pub async fn next<L, D>(
        &mut self,
        link: &L,
        handles: &Handles,
        delay: &mut D,
    ) -> Result<Command, Error>
    where
        L: GattLink,
        D: DelayNs,
    {
        let payload = match self.delivery {
            Delivery::Notify => {
                match with_timeout(delay, self.notify_timeout_ms, link.notified(handles)).await {
                    Ok(payload) => payload?,
                    Err(_) => return Err(Fault::NotifyTimeout.into()),
                }
            }
            Delivery::Poll { interval_ms } => {
                if self.primed {
                    delay.delay_ms(interval_ms).await;
                }
                self.primed = true;
                match with_timeout(delay, self.read_timeout_ms, link.read(handles)).await {
                    Ok(payload) => payload?,
                    Err(_) => return Err(Fault::ReadTimeout.into()),
                }
            }
        };

        if payload.is_empty() {
            return Err(Fault::EmptyPayload.into());
        }
        Ok(Command::decode(&payload, self.kind))
    }
}

/// Receives decoded commands on the robot.
#[allow(async_fn_in_trait)]
pub trait CommandSink {
    async fn apply(&mut self, command: Command);
}

/// Deliver commands to `sink` until the link fails; returns the failure.
///
/// `on_command` runs for every delivered value before the sink sees it.
pub async fn consume<L, D, S, F>(
    consumer: &mut Consumer,
    link: &L,
    handles: &Handles,
    delay: &mut D,
    sink: &mut S,
    mut on_command: F,
) -> Error
where
    L: GattLink,
    D: DelayNs,
    S: CommandSink,
    F: FnMut(Command),
{
    loop {
        match consumer.next(link, handles, delay).await {
            Ok(command) => {
                on_command(command);
                sink.apply(command).await;
            }
            Err(e) => {
                warn!("control: consumer stopped: {}", e);
                return e;
            }
        }
    }
}

/// Maps button commands to one timed motion followed by a single stop.
pub struct Drive<A> {
    actuator: A,
    motion_ms: u32,
}

impl<A: Actuator> Drive<A> {
    pub fn new(actuator: A, motion_ms: u32) -> Self {
        Self {
            actuator,
            motion_ms,
        }
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }
}

impl<A: Actuator> CommandSink for Drive<A> {
    async fn apply(&mut self, command: Command) {
        let ms = self.motion_ms;
        match command {
            Command::ButtonA => self.actuator.forward(ms).await,
            Command::ButtonB => self.actuator.backward(ms).await,
            Command::ButtonX => self.actuator.turn_left(ms).await,
            Command::ButtonY => self.actuator.turn_right(ms).await,
            Command::Idle => return,
            Command::Reading(r) => {
                debug!("drive: ignoring reading {}", r.centi());
                return;
            }
            Command::Unknown => {
                warn!("drive: unknown command");
                return;
            }
        }
        self.actuator.stop();
    }
}

/// Logs sensor readings and keeps the latest one.
#[derive(Default)]
pub struct ReadingLog {
    last: Option<Reading>,
    count: u32,
}

impl ReadingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<Reading> {
        self.last
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl CommandSink for ReadingLog {
    async fn apply(&mut self, command: Command) {
        match command {
            Command::Reading(r) => {
                info!("reading: {} centi", r.centi());
                self.last = Some(r);
                self.count = self.count.wrapping_add(1);
            }
            Command::Unknown => warn!("reading: undecodable value"),
            _ => debug!("reading: ignoring {}", command),
        }
    }
}
