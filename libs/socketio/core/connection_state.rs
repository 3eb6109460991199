//! Lock-free connection state
//!
//! ```text
//! Dialing ──> Handshaking ──> Open ──> Closing ──> Closed
//!    │             │                      ↑
//!    └─────────────┴──────────────────────┘
//! ```
//!
//! `Closed` is absorbing: once stored, no other state can replace it.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of one transport-bound connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Transport negotiated, namespace layer not bound yet
    Dialing = 0,
    /// Connect packet sent, waiting for the server's Connect
    Handshaking = 1,
    /// Server confirmed the namespace
    Open = 2,
    /// Close in progress
    Closing = 3,
    /// Terminal
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Dialing,
            1 => ConnectionState::Handshaking,
            2 => ConnectionState::Open,
            3 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Dialing => "dialing",
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Atomic cell holding a [`ConnectionState`]
#[derive(Debug)]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// Store a new state unless the current one is `Closed`
    ///
    /// Returns whether the state was stored.
    pub fn set(&self, state: ConnectionState) -> bool {
        self.inner
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != ConnectionState::Closed as u8).then_some(state as u8)
            })
            .is_ok()
    }

    /// Move from `current` to `new` atomically
    pub fn compare_exchange(
        &self,
        current: ConnectionState,
        new: ConnectionState,
    ) -> Result<ConnectionState, ConnectionState> {
        if current == ConnectionState::Closed {
            return Err(self.get());
        }
        self.inner
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(ConnectionState::from_u8)
            .map_err(ConnectionState::from_u8)
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.get() == ConnectionState::Open
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.get() == ConnectionState::Closed
    }
}
