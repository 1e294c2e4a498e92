//! Connection lifecycle state machine.
//!
//! ```text
//!  Idle ──ScanStarted──▶ Scanning ──ScanEnded──▶ Idle
//!    │                      │
//!    └──────PeerFound───────┴──▶ Connecting ──ConnectFailed──▶ Failed ──┐
//!                                  │                                    │
//!                          ConnectSucceeded                             │
//!                                  ▼                                    │
//!                             Discovering ──ResolutionFailed──┐         │
//!                                  │                          │         │
//!                              Resolved                       ▼         │
//!                                  ▼                    Disconnected ───┤
//!                             Subscribed ──LinkLost──────▶    ▲         │
//!                                  │                          │       Reset
//!                       SubscriptionAcknowledged           LinkLost     │
//!                                  ▼                          │         ▼
//!                               Active ───────────────────────┘       Idle
//! ```
//!
//! [`SessionManager`] owns the single live [`Session`] and is the only
//! writer of the shared [`StatusCell`]. Everyone else reads snapshots via
//! [`StatusReader`].

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Deque;

use crate::ble::{Handles, PeerDescriptor};
use crate::error::Error;

/// Number of transitions kept for diagnostics.
pub const HISTORY_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Idle,
    Scanning,
    Connecting,
    Discovering,
    Subscribed,
    Active,
    Disconnected,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionEvent {
    ScanStarted,
    /// Scan window elapsed without a match.
    ScanEnded,
    PeerFound,
    ConnectSucceeded,
    /// Connect timed out or was refused.
    ConnectFailed,
    Resolved,
    ResolutionFailed,
    SubscriptionAcknowledged,
    /// Peer disconnect, protocol error, or read/notify timeout.
    LinkLost,
    /// Cleanup finished after `Disconnected` / `Failed`.
    Reset,
}

impl ConnectionState {
    /// Transition table. Total: pairs without an entry keep the state.
    pub fn next(self, event: SessionEvent) -> ConnectionState {
        use ConnectionState::*;
        use SessionEvent::*;

        match (self, event) {
            (Idle, ScanStarted) => Scanning,
            (Scanning, ScanEnded) => Idle,
            (Idle | Scanning, PeerFound) => Connecting,
            (Connecting, ConnectSucceeded) => Discovering,
            (Connecting, ConnectFailed) => Failed,
            (Discovering, Resolved) => Subscribed,
            (Discovering, ResolutionFailed) => Disconnected,
            (Subscribed, SubscriptionAcknowledged) => Active,
            (Subscribed | Active, LinkLost) => Disconnected,
            (Disconnected | Failed, Reset) => Idle,
            (state, _) => state,
        }
    }

    /// A session object exists in this state.
    pub fn has_session(self) -> bool {
        !matches!(self, ConnectionState::Idle | ConnectionState::Scanning)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Failed)
    }

    /// Event that ends the current stage when it fails.
    pub fn failure_event(self) -> Option<SessionEvent> {
        use ConnectionState::*;
        match self {
            Scanning => Some(SessionEvent::ScanEnded),
            Connecting => Some(SessionEvent::ConnectFailed),
            Discovering => Some(SessionEvent::ResolutionFailed),
            Subscribed | Active => Some(SessionEvent::LinkLost),
            Idle | Disconnected | Failed => None,
        }
    }
}

/// Coarse projection of the state for observers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusFlags {
    /// State is `Active`.
    pub connected: bool,
    /// A session is open and has not ended (`Connecting` ..= `Active`).
    pub alive: bool,
}

impl StatusFlags {
    pub fn project(state: ConnectionState) -> Self {
        use ConnectionState::*;
        Self {
            connected: state == Active,
            alive: matches!(state, Connecting | Discovering | Subscribed | Active),
        }
    }
}

/// State and flags captured together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusSnapshot {
    pub state: ConnectionState,
    pub flags: StatusFlags,
}

impl StatusSnapshot {
    pub const IDLE: StatusSnapshot = StatusSnapshot {
        state: ConnectionState::Idle,
        flags: StatusFlags {
            connected: false,
            alive: false,
        },
    };
}

/// Shared status slot. Readers always get a whole snapshot, also when a
/// writer runs on another priority level.
pub struct StatusCell {
    inner: Mutex<CriticalSectionRawMutex, Cell<StatusSnapshot>>,
}

impl StatusCell {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(StatusSnapshot::IDLE)),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.lock(|cell| cell.get())
    }

    pub fn reader(&self) -> StatusReader<'_> {
        StatusReader { cell: self }
    }

    fn publish(&self, snapshot: StatusSnapshot) {
        self.inner.lock(|cell| cell.set(snapshot));
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a [`StatusCell`].
#[derive(Clone, Copy)]
pub struct StatusReader<'a> {
    cell: &'a StatusCell,
}

impl StatusReader<'_> {
    pub fn snapshot(&self) -> StatusSnapshot {
        self.cell.snapshot()
    }

    pub fn state(&self) -> ConnectionState {
        self.snapshot().state
    }

    pub fn flags(&self) -> StatusFlags {
        self.snapshot().flags
    }
}

/// The one live connection.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Session {
    pub peer: PeerDescriptor,
    /// Resolved service / characteristic handles, once `Subscribed`.
    pub handles: Option<Handles>,
    pub state: ConnectionState,
    pub opened_at_ms: u64,
    pub last_activity_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    pub from: ConnectionState,
    pub event: SessionEvent,
    pub to: ConnectionState,
}

/// Owns the lifecycle and publishes status at every transition.
pub struct SessionManager<'a> {
    status: &'a StatusCell,
    state: ConnectionState,
    session: Option<Session>,
    history: Deque<Transition, HISTORY_LEN>,
}

impl<'a> SessionManager<'a> {
    pub fn new(status: &'a StatusCell) -> Self {
        status.publish(StatusSnapshot::IDLE);
        Self {
            status,
            state: ConnectionState::Idle,
            session: None,
            history: Deque::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn status(&self) -> StatusReader<'a> {
        self.status.reader()
    }

    /// Most recent transitions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Transition> {
        self.history.iter()
    }

    pub fn begin_scan(&mut self) -> ConnectionState {
        self.apply(SessionEvent::ScanStarted)
    }

    pub fn end_scan(&mut self) -> ConnectionState {
        self.apply(SessionEvent::ScanEnded)
    }

    /// Open a session to `peer` and move to `Connecting`.
    ///
    /// Rejected with [`Error::SessionBusy`] while another session exists;
    /// the live session is left untouched.
    pub fn open(&mut self, peer: PeerDescriptor, now_ms: u64) -> Result<(), Error> {
        if self.session.is_some() || self.state.has_session() {
            warn!("link: open rejected, session in {}", self.state);
            return Err(Error::SessionBusy);
        }
        self.session = Some(Session {
            peer,
            handles: None,
            state: self.state,
            opened_at_ms: now_ms,
            last_activity_ms: now_ms,
        });
        self.apply(SessionEvent::PeerFound);
        Ok(())
    }

    pub fn record_handles(&mut self, handles: Handles) {
        if let Some(session) = self.session.as_mut() {
            session.handles = Some(handles);
        }
    }

    pub fn touch(&mut self, now_ms: u64) {
        if let Some(session) = self.session.as_mut() {
            session.last_activity_ms = now_ms;
        }
    }

    /// Report `error` once and end the current stage.
    ///
    /// The error's own event is used when the table has an entry for it;
    /// otherwise the stage's failure event applies, so a failure never
    /// leaves a session stranded mid-handshake.
    pub fn fail(&mut self, error: &Error) -> ConnectionState {
        warn!("link: {} in {}", error, self.state);
        let Some(event) = error.session_event() else {
            return self.state;
        };
        if self.state.next(event) != self.state {
            return self.apply(event);
        }
        match self.state.failure_event() {
            Some(fallback) => self.apply(fallback),
            None => self.state,
        }
    }

    /// Return to `Idle` after a terminal state, dropping the session.
    pub fn reset(&mut self) -> ConnectionState {
        self.apply(SessionEvent::Reset)
    }

    /// Feed one event through the table and publish the result.
    pub fn apply(&mut self, event: SessionEvent) -> ConnectionState {
        let from = self.state;
        let to = from.next(event);
        if to == from {
            debug!("link: {} ignored in {}", event, from);
            return from;
        }

        info!("link: {} -> {}", from, to);
        self.state = to;
        if self.history.is_full() {
            self.history.pop_front();
        }
        let _ = self.history.push_back(Transition { from, event, to });

        if to.has_session() {
            if let Some(session) = self.session.as_mut() {
                session.state = to;
            }
        } else {
            self.session = None;
        }

        self.status.publish(StatusSnapshot {
            state: to,
            flags: StatusFlags::project(to),
        });
        to
    }
}
