//! botlink - a BLE remote-control link between two nRF52840 boards.
//!
//! The remote advertises as `"KevsRobots"`, samples its buttons (or a
//! sensor) and publishes each value through a GATT characteristic. The
//! robot scans for it, connects, subscribes, and turns every received
//! command into a short motor motion.
//!
//! Everything except `softdevice` is hardware-free and runs under
//! `cargo test` on the host. The `embedded` feature adds the SoftDevice
//! adapters and the `robot` / `remote` firmware binaries.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible everywhere.
mod fmt;

pub mod ble;
pub mod command;
pub mod config;
pub mod control;
pub mod error;
pub mod io;
pub mod liveness;
pub mod orchestrator;
pub mod session;
pub mod time;

#[cfg(feature = "embedded")]
pub mod softdevice;

pub use command::{Button, Command, PayloadKind, Reading};
pub use config::LinkConfig;
pub use error::Error;
pub use orchestrator::{CycleOutcome, RemoteSupervisor, RobotSupervisor};
pub use session::{ConnectionState, StatusCell, StatusFlags, StatusReader};
