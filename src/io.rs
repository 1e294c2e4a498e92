//! Board collaborators: motors, buttons, status LED and sensor.
//!
//! The firmware implements these on `embassy_nrf` GPIO
//! (`crate::softdevice::board`); tests use recording mocks.

use crate::command::{Button, Reading};

/// Drive train on the robot. Each motion runs for `duration_ms` and leaves
/// the motors running; callers issue `stop` afterwards.
#[allow(async_fn_in_trait)]
pub trait Actuator {
    async fn forward(&mut self, duration_ms: u32);
    async fn backward(&mut self, duration_ms: u32);
    async fn turn_left(&mut self, duration_ms: u32);
    async fn turn_right(&mut self, duration_ms: u32);
    fn stop(&mut self);
}

/// Button bank on the remote.
pub trait ButtonInput {
    fn is_pressed(&mut self, button: Button) -> bool;
}

/// Single on/off status output.
pub trait Indicator {
    fn set(&mut self, on: bool);
}

/// Numeric source for the sensor variant of the remote.
#[allow(async_fn_in_trait)]
pub trait Sensor {
    async fn sample(&mut self) -> Reading;
}
