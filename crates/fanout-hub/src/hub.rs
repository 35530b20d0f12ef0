//! The hub control loop.
//!
//! [`Hub`] owns the membership map and is driven by a single task running
//! [`Hub::run`]. Everything else talks to it through a cloneable
//! [`HubHandle`] that feeds the bounded event channel. Because only the
//! control loop ever touches the map, membership changes and broadcast
//! enumeration are serialized without locks.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::connection::{Connection, Enqueue};
use crate::errors::{HubError, Result};
use crate::event::Event;
use crate::ids::ConnectionId;
use crate::metrics::{HubSnapshot, HubStats};
use crate::payload::Payload;

/// Hub sizing.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Bound of each connection's outbound queue.
    pub outbound_capacity: usize,
    /// Bound of the hub's inbound event channel.
    pub event_capacity: usize,
    /// Maximum simultaneous members.
    pub max_connections: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            event_capacity: 1024,
            max_connections: 10_000,
        }
    }
}

/// Result of one broadcast step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members whose queue accepted the payload.
    pub delivered: usize,
    /// Members removed because their queue was full or closed.
    pub evicted: Vec<ConnectionId>,
}

/// Single authority over membership and fan-out.
pub struct Hub {
    members: HashMap<ConnectionId, Connection>,
    events: mpsc::Receiver<Event>,
    config: HubConfig,
    stats: Arc<HubStats>,
}

impl Hub {
    /// Create a hub and the handle used to reach it.
    pub fn new(config: HubConfig) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(config.event_capacity.max(1));
        let stats = Arc::new(HubStats::default());
        let handle = HubHandle {
            events: tx,
            outbound_capacity: config.outbound_capacity.max(1),
            stats: Arc::clone(&stats),
        };
        let hub = Self {
            members: HashMap::new(),
            events: rx,
            config,
            stats,
        };
        (hub, handle)
    }

    /// Run the control loop.
    ///
    /// Applies events one at a time, in arrival order. Returns once every
    /// [`HubHandle`] has been dropped; remaining members then have their
    /// queues closed.
    pub async fn run(mut self) {
        info!(
            outbound_capacity = self.config.outbound_capacity,
            max_connections = self.config.max_connections,
            "hub control loop started"
        );
        while let Some(event) = self.events.recv().await {
            self.apply(event);
        }
        let remaining = self.members.len();
        for (_, conn) in self.members.drain() {
            let _ = conn.lifecycle().mark_draining();
        }
        info!(remaining, "hub control loop stopped");
    }

    /// Apply exactly one event.
    pub fn apply(&mut self, event: Event) {
        match event {
            Event::Register { connection, ack } => {
                let result = self.register(connection);
                if let Some(ack) = ack {
                    let _ = ack.send(result);
                }
            }
            Event::Unregister(id) => {
                let _ = self.unregister(&id);
            }
            Event::Broadcast {
                payload,
                origin,
                echo,
            } => {
                let _ = self.broadcast(&payload, origin.as_ref(), echo);
            }
        }
    }

    fn register(&mut self, connection: Connection) -> Result<()> {
        let id = connection.id().clone();
        if self.members.contains_key(&id) {
            warn!(conn_id = %id, "rejecting duplicate registration");
            self.stats.rejected("duplicate");
            let _ = connection.lifecycle().mark_closed();
            return Err(HubError::DuplicateConnection(id));
        }
        if self.members.len() >= self.config.max_connections {
            warn!(
                conn_id = %id,
                limit = self.config.max_connections,
                "rejecting registration, hub is full"
            );
            self.stats.rejected("capacity");
            let _ = connection.lifecycle().mark_closed();
            return Err(HubError::CapacityExceeded {
                limit: self.config.max_connections,
            });
        }
        let _ = connection.lifecycle().mark_registered();
        let _ = self.members.insert(id.clone(), connection);
        self.stats.registered(self.members.len());
        debug!(conn_id = %id, members = self.members.len(), "connection registered");
        Ok(())
    }

    /// Remove a member and close its queue. Returns whether it was present.
    fn unregister(&mut self, id: &ConnectionId) -> bool {
        self.remove(id, false)
    }

    fn remove(&mut self, id: &ConnectionId, evicted: bool) -> bool {
        let Some(conn) = self.members.remove(id) else {
            debug!(conn_id = %id, "unregister for absent connection ignored");
            return false;
        };
        let _ = conn.lifecycle().mark_draining();
        if evicted {
            conn.evict();
        }
        self.stats.unregistered(self.members.len(), evicted);
        debug!(conn_id = %id, evicted, members = self.members.len(), "connection unregistered");
        // Dropping the handle closes the outbound queue.
        drop(conn);
        true
    }

    fn broadcast(
        &mut self,
        payload: &Payload,
        origin: Option<&ConnectionId>,
        echo: bool,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        if let Some(origin) = origin.filter(|id| !self.members.contains_key(*id)) {
            debug!(conn_id = %origin, "dropping relay from non-member");
            return report;
        }
        for (id, conn) in &self.members {
            if !echo && origin == Some(id) {
                continue;
            }
            match conn.try_enqueue(payload.clone()) {
                Enqueue::Queued => report.delivered += 1,
                Enqueue::Full => {
                    warn!(conn_id = %id, "outbound queue full, evicting slow client");
                    report.evicted.push(id.clone());
                }
                Enqueue::Closed => {
                    debug!(conn_id = %id, "outbound queue closed, removing stale member");
                    report.evicted.push(id.clone());
                }
            }
        }
        for id in &report.evicted {
            let _ = self.remove(id, true);
        }
        self.stats.broadcast(report.delivered as u64);
        debug!(
            bytes = payload.len(),
            recipients = report.delivered,
            evicted = report.evicted.len(),
            "broadcast dispatched"
        );
        report
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether there are no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `id` is a member.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.members.contains_key(id)
    }

    /// Ids of all members, in no particular order.
    pub fn member_ids(&self) -> Vec<ConnectionId> {
        self.members.keys().cloned().collect()
    }
}

/// Cloneable front door to a running [`Hub`].
#[derive(Clone, Debug)]
pub struct HubHandle {
    events: mpsc::Sender<Event>,
    outbound_capacity: usize,
    stats: Arc<HubStats>,
}

impl HubHandle {
    async fn submit(&self, event: Event) -> Result<()> {
        self.events.send(event).await.map_err(|_| HubError::Closed)
    }

    /// Register a connection and wait for the hub to accept or refuse it.
    pub async fn register(&self, connection: Connection) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        let lifecycle = connection.lifecycle();
        if self
            .submit(Event::Register {
                connection,
                ack: Some(ack_tx),
            })
            .await
            .is_err()
        {
            let _ = lifecycle.mark_closed();
            return Err(HubError::Closed);
        }
        ack_rx.await.unwrap_or(Err(HubError::Closed))
    }

    /// Ask the hub to drop a connection. Absent connections are ignored.
    pub async fn unregister(&self, id: ConnectionId) -> Result<()> {
        self.submit(Event::Unregister(id)).await
    }

    /// Deliver a payload to every member.
    pub async fn broadcast(&self, payload: impl Into<Payload>) -> Result<()> {
        self.submit(Event::broadcast(payload)).await
    }

    /// Deliver a payload to every member except `origin`.
    pub async fn relay(&self, origin: ConnectionId, payload: impl Into<Payload>) -> Result<()> {
        self.submit(Event::relay(origin, payload)).await
    }

    /// Deliver a payload from `origin` to every member, `origin` included.
    pub async fn echo(&self, origin: ConnectionId, payload: impl Into<Payload>) -> Result<()> {
        self.submit(Event::echo(origin, payload)).await
    }

    /// Outbound queue bound for new connections.
    pub fn outbound_capacity(&self) -> usize {
        self.outbound_capacity
    }

    /// Current counters.
    pub fn stats(&self) -> HubSnapshot {
        self.stats.snapshot()
    }

    /// Whether the control loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}
