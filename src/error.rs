//! Unified error type for botlink.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! None of these is fatal: each maps to a session event and the
//! supervisor restarts the discovery cycle.

use core::fmt;

use crate::session::SessionEvent;

/// Top-level error type used across the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No matching peer within the scan budget.
    DiscoveryTimeout,

    /// Connect attempt exceeded T_conn.
    ConnectTimeout,

    /// The stack or the peer rejected the connection.
    ConnectRefused,

    /// Expected service or characteristic is missing (or resolution timed out).
    ResolutionFailure(Missing),

    /// Malformed payload or transport fault on an established link.
    ProtocolError(Fault),

    /// The peer closed the link. Normal end of an active session.
    PeerDisconnected,

    /// A session is already live; only one is allowed at a time.
    SessionBusy,

    /// Raw error code from the radio stack, outside any session.
    Radio(u32),
}

/// What resolution failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Missing {
    Service,
    Characteristic,
    /// Resolution did not finish within its budget.
    TimedOut,
}

/// Detail carried by [`Error::ProtocolError`]. Only used for logging;
/// every fault is handled the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// Read returned no data.
    EmptyPayload,
    /// Read response did not arrive in time.
    ReadTimeout,
    /// No notification within the notify budget.
    NotifyTimeout,
    /// CCCD write rejected or timed out.
    SubscribeRejected,
    /// GATT-level error code from the stack.
    Gatt(u16),
    /// Link-level transport error.
    Transport,
}

impl Error {
    /// The state machine event this error drives, if any.
    pub fn session_event(&self) -> Option<SessionEvent> {
        match self {
            Error::DiscoveryTimeout => Some(SessionEvent::ScanEnded),
            Error::ConnectTimeout | Error::ConnectRefused => Some(SessionEvent::ConnectFailed),
            Error::ResolutionFailure(_) => Some(SessionEvent::ResolutionFailed),
            Error::ProtocolError(_) | Error::PeerDisconnected => Some(SessionEvent::LinkLost),
            // Raw stack errors happen before or around a connect attempt.
            Error::Radio(_) => Some(SessionEvent::ConnectFailed),
            // Rejected before any state change; the live session is untouched.
            Error::SessionBusy => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DiscoveryTimeout => write!(f, "no matching peer within scan budget"),
            Error::ConnectTimeout => write!(f, "connect timed out"),
            Error::ConnectRefused => write!(f, "connect refused"),
            Error::ResolutionFailure(m) => write!(f, "resolution failed: {:?}", m),
            Error::ProtocolError(fault) => write!(f, "protocol error: {:?}", fault),
            Error::PeerDisconnected => write!(f, "peer disconnected"),
            Error::SessionBusy => write!(f, "a session is already live"),
            Error::Radio(code) => write!(f, "radio error {:#x}", code),
        }
    }
}

// Convenience conversions

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        Error::ProtocolError(fault)
    }
}

impl From<Missing> for Error {
    fn from(missing: Missing) -> Self {
        Error::ResolutionFailure(missing)
    }
}
