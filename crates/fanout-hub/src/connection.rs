//! Connection handle and its private outbound queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::ids::ConnectionId;
use crate::lifecycle::{ConnectionState, Lifecycle};
use crate::payload::Payload;

/// Outcome of a non-blocking enqueue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enqueue {
    /// Payload accepted.
    Queued,
    /// Queue at capacity; the client is not keeping up.
    Full,
    /// Write pump is gone.
    Closed,
}

/// Hub-side handle of one client connection.
///
/// Holds the producing end of the connection's bounded outbound queue.
/// Deliberately not `Clone`: the hub is the queue's only producer, and
/// dropping this handle is what closes the queue.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    outbound: mpsc::Sender<Payload>,
    lifecycle: Arc<Lifecycle>,
    evicted: CancellationToken,
    connected_at: Instant,
}

/// Consuming end of a connection's outbound queue, drained by the write pump.
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::Receiver<Payload>,
    evicted: CancellationToken,
}

impl Connection {
    /// Create a connection with a fresh id and an outbound queue of `capacity`.
    pub fn new(capacity: usize) -> (Self, OutboundQueue) {
        Self::with_id(ConnectionId::new(), capacity)
    }

    /// Create a connection with a caller-chosen id.
    pub fn with_id(id: ConnectionId, capacity: usize) -> (Self, OutboundQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let evicted = CancellationToken::new();
        let conn = Self {
            id,
            outbound: tx,
            lifecycle: Arc::new(Lifecycle::new()),
            evicted: evicted.clone(),
            connected_at: Instant::now(),
        };
        (conn, OutboundQueue { rx, evicted })
    }

    /// Connection id.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Shared lifecycle cell.
    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        Arc::clone(&self.lifecycle)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    /// Enqueue without waiting.
    pub fn try_enqueue(&self, payload: Payload) -> Enqueue {
        match self.outbound.try_send(payload) {
            Ok(()) => Enqueue::Queued,
            Err(TrySendError::Full(_)) => Enqueue::Full,
            Err(TrySendError::Closed(_)) => Enqueue::Closed,
        }
    }

    /// Free slots left in the outbound queue.
    pub fn remaining_capacity(&self) -> usize {
        self.outbound.capacity()
    }

    /// Time since the connection was created.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Signal the write pump that the hub dropped this connection for
    /// falling behind. Payloads still buffered are abandoned.
    pub(crate) fn evict(&self) {
        self.evicted.cancel();
    }
}

impl OutboundQueue {
    /// Wait for the next payload. `None` once the queue is closed and empty.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.rx.recv().await
    }

    /// Take a payload if one is ready.
    pub fn try_recv(&mut self) -> Option<Payload> {
        self.rx.try_recv().ok()
    }

    /// Number of payloads waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Whether the producing end has been dropped.
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// Token cancelled when the hub evicts this connection.
    pub fn eviction(&self) -> CancellationToken {
        self.evicted.clone()
    }

    /// Whether the hub evicted this connection.
    pub fn is_evicted(&self) -> bool {
        self.evicted.is_cancelled()
    }
}
