//! Status LED: slow blink while connected, fast blink otherwise.

use embedded_hal_async::delay::DelayNs;

use crate::config::{BLINK_CONNECTED_MS, BLINK_DISCONNECTED_MS};
use crate::io::Indicator;
use crate::session::StatusReader;

/// Half-period of the blink for the given connection flag.
pub fn blink_period_ms(connected: bool) -> u32 {
    if connected {
        BLINK_CONNECTED_MS
    } else {
        BLINK_DISCONNECTED_MS
    }
}

/// Toggles an [`Indicator`] at the cadence of the shared status.
pub struct LivenessIndicator<'a, I, D> {
    status: StatusReader<'a>,
    indicator: I,
    delay: D,
    level: bool,
}

impl<'a, I: Indicator, D: DelayNs> LivenessIndicator<'a, I, D> {
    pub fn new(status: StatusReader<'a>, indicator: I, delay: D) -> Self {
        Self {
            status,
            indicator,
            delay,
            level: false,
        }
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    /// Drive the current level, flip it, then wait one period.
    ///
    /// The period is taken from a fresh snapshot at every tick, so a status
    /// change shows up within one toggle.
    pub async fn tick(&mut self) {
        self.indicator.set(self.level);
        self.level = !self.level;
        let period = blink_period_ms(self.status.flags().connected);
        self.delay.delay_ms(period).await;
    }

    pub async fn run(&mut self) -> ! {
        loop {
            self.tick().await;
        }
    }

    /// Blink until the session is no longer alive, then switch off.
    pub async fn run_while_alive(&mut self) {
        while self.status.flags().alive {
            self.tick().await;
        }
        self.indicator.set(false);
        self.level = false;
    }
}
