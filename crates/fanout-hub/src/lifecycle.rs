//! Per-connection lifecycle state machine.
//!
//! ```text
//! Connecting ──register──▶ Registered ──unregister/evict──▶ Draining ──pumps done──▶ Closed
//!      │                                                                              ▲
//!      └──────────────────────────── registration rejected ───────────────────────────┘
//! ```
//!
//! The state lives in one atomic shared by the hub-side handle and the
//! connection driver. Transitions are compare-and-swap, so each edge fires at
//! most once no matter how many parties race to take it.

use std::sync::atomic::{AtomicU8, Ordering};

/// Where a connection is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Upgrade done, not yet visible to broadcasts.
    Connecting = 0,
    /// Member of the hub; both pumps active.
    Registered = 1,
    /// Removed from the hub; outbound queue closed, write pump flushing.
    Draining = 2,
    /// Stream closed. Terminal.
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Registered,
            2 => Self::Draining,
            _ => Self::Closed,
        }
    }

    /// Short label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Registered => "registered",
            Self::Draining => "draining",
            Self::Closed => "closed",
        }
    }
}

/// Shared lifecycle cell.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    /// A fresh lifecycle in `Connecting`.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Connecting as u8),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn advance(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `Connecting → Registered`. Returns `false` if not in `Connecting`.
    pub fn mark_registered(&self) -> bool {
        self.advance(ConnectionState::Connecting, ConnectionState::Registered)
    }

    /// `Registered → Draining`. Returns `false` if not in `Registered`.
    pub fn mark_draining(&self) -> bool {
        self.advance(ConnectionState::Registered, ConnectionState::Draining)
    }

    /// Move to `Closed`.
    ///
    /// From `Registered` this passes through `Draining` first (the hub is
    /// gone and never took that edge). From `Connecting` it is the
    /// rejected-registration path. Returns `false` if already `Closed`.
    pub fn mark_closed(&self) -> bool {
        let _ = self.mark_draining();
        self.advance(ConnectionState::Draining, ConnectionState::Closed)
            || self.advance(ConnectionState::Connecting, ConnectionState::Closed)
    }

    /// Whether the connection is currently a hub member.
    pub fn is_registered(&self) -> bool {
        self.state() == ConnectionState::Registered
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
