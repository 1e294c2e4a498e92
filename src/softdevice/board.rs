//! nRF52840-DK GPIO for motors, buttons and the status LED, plus the die
//! temperature sensor.
//!
//! Buttons and LEDs on the DK are active-low.

use embassy_nrf::gpio::{Input, Level, Output};
use embassy_time::Timer;
use nrf_softdevice::raw;

use crate::command::{Button, Reading};
use crate::io::{Actuator, ButtonInput, Indicator, Sensor};

/// Two DC motors behind an H-bridge, one forward and one reverse input each.
pub struct Motors<'d> {
    left_fwd: Output<'d>,
    left_rev: Output<'d>,
    right_fwd: Output<'d>,
    right_rev: Output<'d>,
}

impl<'d> Motors<'d> {
    pub fn new(
        left_fwd: Output<'d>,
        left_rev: Output<'d>,
        right_fwd: Output<'d>,
        right_rev: Output<'d>,
    ) -> Self {
        Self {
            left_fwd,
            left_rev,
            right_fwd,
            right_rev,
        }
    }

    fn drive(&mut self, left: i8, right: i8, duration_ms: u32) -> Timer {
        set_motor(&mut self.left_fwd, &mut self.left_rev, left);
        set_motor(&mut self.right_fwd, &mut self.right_rev, right);
        Timer::after_millis(u64::from(duration_ms))
    }
}

fn set_motor(fwd: &mut Output<'_>, rev: &mut Output<'_>, direction: i8) {
    let (f, r) = match direction {
        1 => (Level::High, Level::Low),
        -1 => (Level::Low, Level::High),
        _ => (Level::Low, Level::Low),
    };
    fwd.set_level(f);
    rev.set_level(r);
}

impl Actuator for Motors<'_> {
    async fn forward(&mut self, duration_ms: u32) {
        self.drive(1, 1, duration_ms).await
    }

    async fn backward(&mut self, duration_ms: u32) {
        self.drive(-1, -1, duration_ms).await
    }

    async fn turn_left(&mut self, duration_ms: u32) {
        self.drive(-1, 1, duration_ms).await
    }

    async fn turn_right(&mut self, duration_ms: u32) {
        self.drive(1, -1, duration_ms).await
    }

    fn stop(&mut self) {
        set_motor(&mut self.left_fwd, &mut self.left_rev, 0);
        set_motor(&mut self.right_fwd, &mut self.right_rev, 0);
    }
}

/// A / B / X / Y push buttons with pull-ups.
pub struct Buttons<'d> {
    pub a: Input<'d>,
    pub b: Input<'d>,
    pub x: Input<'d>,
    pub y: Input<'d>,
}

impl ButtonInput for Buttons<'_> {
    fn is_pressed(&mut self, button: Button) -> bool {
        let pin = match button {
            Button::A => &self.a,
            Button::B => &self.b,
            Button::X => &self.x,
            Button::Y => &self.y,
        };
        pin.is_low()
    }
}

pub struct Led<'d>(pub Output<'d>);

impl Indicator for Led<'_> {
    fn set(&mut self, on: bool) {
        self.0.set_level(if on { Level::Low } else { Level::High });
    }
}

/// On-die temperature read through the SoftDevice (it owns TEMP).
pub struct DieTemperature;

impl Sensor for DieTemperature {
    async fn sample(&mut self) -> Reading {
        let mut quarter_degrees: i32 = 0;
        let ret = unsafe { raw::sd_temp_get(&mut quarter_degrees) };
        if ret != raw::NRF_SUCCESS {
            warn!("sensor: sd_temp_get failed {}", ret);
            return Reading::ZERO;
        }
        let centi = (quarter_degrees * 25).clamp(i32::from(i16::MIN), i32::from(i16::MAX));
        Reading(centi as i16)
    }
}
