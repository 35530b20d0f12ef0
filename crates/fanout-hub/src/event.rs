//! The hub's event vocabulary.

use tokio::sync::oneshot;

use crate::connection::Connection;
use crate::errors::Result;
use crate::ids::ConnectionId;
use crate::payload::Payload;

/// A request to the hub's control loop. The only way membership changes.
#[derive(Debug)]
pub enum Event {
    /// Add a connection to membership.
    Register {
        /// The connection to add.
        connection: Connection,
        /// Receives the outcome once the event has been applied.
        ack: Option<oneshot::Sender<Result<()>>>,
    },
    /// Remove a connection and close its outbound queue. No-op if absent.
    Unregister(ConnectionId),
    /// Deliver a payload to every member.
    Broadcast {
        /// Message body.
        payload: Payload,
        /// Client the message came from. Skipped unless `echo` is set, and
        /// the broadcast is dropped if it is no longer a member.
        origin: Option<ConnectionId>,
        /// Deliver to `origin` as well.
        echo: bool,
    },
}

impl Event {
    /// Register without waiting for an outcome.
    pub fn register(connection: Connection) -> Self {
        Self::Register {
            connection,
            ack: None,
        }
    }

    /// Broadcast to every member.
    pub fn broadcast(payload: impl Into<Payload>) -> Self {
        Self::Broadcast {
            payload: payload.into(),
            origin: None,
            echo: false,
        }
    }

    /// Broadcast to every member except `origin`.
    pub fn relay(origin: ConnectionId, payload: impl Into<Payload>) -> Self {
        Self::Broadcast {
            payload: payload.into(),
            origin: Some(origin),
            echo: false,
        }
    }

    /// Broadcast from `origin` to every member, `origin` included.
    pub fn echo(origin: ConnectionId, payload: impl Into<Payload>) -> Self {
        Self::Broadcast {
            payload: payload.into(),
            origin: Some(origin),
            echo: true,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Unregister(_) => "unregister",
            Self::Broadcast { .. } => "broadcast",
        }
    }
}
