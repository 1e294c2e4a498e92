//! Application-wide constants and link configuration.
//!
//! Radio identifiers, timing parameters and GPIO assignments live here so
//! they can be tuned in one place. [`LinkConfig`] groups the runtime-facing
//! values; its `Default` is built from the constants below.

use crate::command::PayloadKind;

// Radio identity

/// Local name advertised by the remote and matched by the robot.
pub const PEER_NAME: &str = "KevsRobots";

/// Service id carried in the remote's advertisement.
pub const ADVERTISED_SERVICE_UUID: u16 = 0x1800;

/// GATT service holding the control characteristic.
pub const CONTROL_SERVICE_UUID: u16 = 0x1848;

/// Control characteristic (read + notify).
pub const CONTROL_CHAR_UUID: u16 = 0x2A6E;

/// GAP appearance: generic remote control.
pub const APPEARANCE_GENERIC_REMOTE_CONTROL: u16 = 384;

// Scanning (robot)

/// Scan budget per discovery attempt (ms).
pub const SCAN_DURATION_MS: u32 = 5_000;

/// Scan interval (µs). Low interval/window maximises detection rate.
pub const SCAN_INTERVAL_US: u32 = 30_000;

/// Scan window (µs).
pub const SCAN_WINDOW_US: u32 = 30_000;

// Advertising (remote)

/// Advertising interval (µs).
pub const ADV_INTERVAL_US: u32 = 250_000;

// Timeouts

/// Connect attempt budget, T_conn (ms).
pub const CONNECT_TIMEOUT_MS: u32 = 5_000;

/// Service + characteristic resolution budget (ms).
pub const RESOLVE_TIMEOUT_MS: u32 = 5_000;

/// CCCD write budget (ms).
pub const SUBSCRIBE_TIMEOUT_MS: u32 = 2_000;

/// Maximum wait for a single read response (ms).
pub const READ_TIMEOUT_MS: u32 = 1_000;

/// Maximum silence on the notify channel before the link is treated as
/// dead. An idle remote re-notifies every `IDLE_KEEPALIVE_MS`.
pub const NOTIFY_TIMEOUT_MS: u32 = 60_000;

// Control channel

/// Button sampling period on the remote (ms).
pub const BUTTON_POLL_MS: u32 = 10;

/// Idle re-notify period on the remote (ms). Must stay well below
/// `NOTIFY_TIMEOUT_MS`.
pub const IDLE_KEEPALIVE_MS: u32 = 5_000;

/// Sensor sampling period for the numeric variant (ms).
pub const SENSOR_POLL_MS: u32 = 1_000;

/// Read period when the robot polls instead of subscribing (ms).
pub const READ_POLL_MS: u32 = 1_000;

/// Duration of the single-shot motion triggered by one command (ms).
pub const MOTION_DURATION_MS: u32 = 100;

// Status LED

/// Blink half-period while connected (ms).
pub const BLINK_CONNECTED_MS: u32 = 1_000;

/// Blink half-period while not connected (ms).
pub const BLINK_DISCONNECTED_MS: u32 = 250;

// Supervisor backoff

/// First delay after a failed cycle (ms).
pub const BACKOFF_INITIAL_MS: u32 = 250;

/// Upper bound on the delay between cycles (ms).
pub const BACKOFF_MAX_MS: u32 = 8_000;

// Device information (remote)

pub const MANUFACTURER_NAME: &str = "KevsRobotsRemote";
pub const MODEL_NUMBER: &str = "1.0";
pub const HARDWARE_REVISION: &str = "nRF52840";
pub const FIRMWARE_REVISION: &str = "1.0";

// GPIO pin assignments (nRF52840-DK defaults)
//
// Actual `embassy_nrf::peripherals::*` pins are picked in the binaries.
//
//   Button A       → P0.11
//   Button B       → P0.12
//   Button X       → P0.24
//   Button Y       → P0.25
//   Status LED     → P0.13
//   Motor L fwd/rev → P1.01 / P1.02
//   Motor R fwd/rev → P1.03 / P1.04

/// Scanner duty-cycle parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanParams {
    pub duration_ms: u32,
    pub interval_us: u32,
    pub window_us: u32,
    /// Request scan responses (needed to see names placed there).
    pub active: bool,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            duration_ms: SCAN_DURATION_MS,
            interval_us: SCAN_INTERVAL_US,
            window_us: SCAN_WINDOW_US,
            active: true,
        }
    }
}

/// Advertiser parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingParams {
    pub interval_us: u32,
    /// `None` advertises until a central connects.
    pub timeout_ms: Option<u32>,
}

impl Default for AdvertisingParams {
    fn default() -> Self {
        Self {
            interval_us: ADV_INTERVAL_US,
            timeout_ms: None,
        }
    }
}

/// Per-operation budgets for the blocking radio calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeouts {
    pub connect_ms: u32,
    pub resolve_ms: u32,
    pub subscribe_ms: u32,
    pub read_ms: u32,
    pub notify_ms: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect_ms: CONNECT_TIMEOUT_MS,
            resolve_ms: RESOLVE_TIMEOUT_MS,
            subscribe_ms: SUBSCRIBE_TIMEOUT_MS,
            read_ms: READ_TIMEOUT_MS,
            notify_ms: NOTIFY_TIMEOUT_MS,
        }
    }
}

/// Delay policy between supervisor cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BackoffConfig {
    pub initial_ms: u32,
    pub max_ms: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: BACKOFF_INITIAL_MS,
            max_ms: BACKOFF_MAX_MS,
        }
    }
}

/// How the robot obtains values from the control characteristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Delivery {
    /// Subscribe and wait for notifications.
    Notify,
    /// Read the characteristic every `interval_ms`.
    Poll { interval_ms: u32 },
}

/// Everything one side of the link needs to run a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    pub peer_name: &'static str,
    pub advertised_service: u16,
    pub control_service: u16,
    pub control_characteristic: u16,
    pub payload: PayloadKind,
    pub delivery: Delivery,
    pub scan: ScanParams,
    pub advertising: AdvertisingParams,
    pub timeouts: Timeouts,
    pub backoff: BackoffConfig,
    pub motion_ms: u32,
    pub button_poll_ms: u32,
    pub idle_keepalive_ms: u32,
    pub sensor_poll_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            peer_name: PEER_NAME,
            advertised_service: ADVERTISED_SERVICE_UUID,
            control_service: CONTROL_SERVICE_UUID,
            control_characteristic: CONTROL_CHAR_UUID,
            payload: PayloadKind::Button,
            delivery: Delivery::Notify,
            scan: ScanParams::default(),
            advertising: AdvertisingParams::default(),
            timeouts: Timeouts::default(),
            backoff: BackoffConfig::default(),
            motion_ms: MOTION_DURATION_MS,
            button_poll_ms: BUTTON_POLL_MS,
            idle_keepalive_ms: IDLE_KEEPALIVE_MS,
            sensor_poll_ms: SENSOR_POLL_MS,
        }
    }
}

impl LinkConfig {
    /// Numeric sensor variant: readings instead of buttons, polled reads.
    pub fn sensor() -> Self {
        Self {
            payload: PayloadKind::Reading,
            delivery: Delivery::Poll {
                interval_ms: READ_POLL_MS,
            },
            ..Self::default()
        }
    }
}
