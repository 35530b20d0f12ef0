//! Hub counters.
//!
//! Two views of the same numbers: lock-free atomics readable through
//! [`HubHandle::stats`](crate::HubHandle::stats) (used by `/health`), and the
//! `metrics` facade for whatever recorder the process installs.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use metrics::{counter, gauge};
use serde::Serialize;

// Metric name constants to avoid typos across crates.

/// Current hub members (gauge).
pub const HUB_CONNECTIONS_ACTIVE: &str = "hub_connections_active";
/// Successful registrations (counter).
pub const HUB_REGISTRATIONS_TOTAL: &str = "hub_registrations_total";
/// Refused registrations (counter, labels: reason).
pub const HUB_REJECTIONS_TOTAL: &str = "hub_rejections_total";
/// Members removed for any reason (counter).
pub const HUB_UNREGISTRATIONS_TOTAL: &str = "hub_unregistrations_total";
/// Members removed during a broadcast because their queue was full or closed (counter).
pub const HUB_EVICTIONS_TOTAL: &str = "hub_evictions_total";
/// Broadcast events processed (counter).
pub const HUB_BROADCASTS_TOTAL: &str = "hub_broadcasts_total";
/// Payloads enqueued onto member queues (counter).
pub const HUB_DELIVERIES_TOTAL: &str = "hub_deliveries_total";
/// Lifetime of served connections (histogram, seconds).
pub const CONNECTION_DURATION_SECONDS: &str = "connection_duration_seconds";

/// Live counters, written only by the control loop.
#[derive(Debug, Default)]
pub struct HubStats {
    active: AtomicUsize,
    registrations: AtomicU64,
    rejections: AtomicU64,
    unregistrations: AtomicU64,
    evictions: AtomicU64,
    broadcasts: AtomicU64,
    deliveries: AtomicU64,
}

/// Point-in-time copy of [`HubStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HubSnapshot {
    /// Current members.
    pub active: usize,
    /// Successful registrations since start.
    pub registrations: u64,
    /// Refused registrations since start.
    pub rejections: u64,
    /// Removals since start (including evictions).
    pub unregistrations: u64,
    /// Backpressure evictions since start.
    pub evictions: u64,
    /// Broadcasts processed since start.
    pub broadcasts: u64,
    /// Payloads enqueued since start.
    pub deliveries: u64,
}

impl HubStats {
    pub(crate) fn registered(&self, active: usize) {
        let _ = self.registrations.fetch_add(1, Ordering::Relaxed);
        self.active.store(active, Ordering::Relaxed);
        counter!(HUB_REGISTRATIONS_TOTAL).increment(1);
        #[allow(clippy::cast_precision_loss)]
        gauge!(HUB_CONNECTIONS_ACTIVE).set(active as f64);
    }

    pub(crate) fn rejected(&self, reason: &'static str) {
        let _ = self.rejections.fetch_add(1, Ordering::Relaxed);
        counter!(HUB_REJECTIONS_TOTAL, "reason" => reason).increment(1);
    }

    pub(crate) fn unregistered(&self, active: usize, evicted: bool) {
        let _ = self.unregistrations.fetch_add(1, Ordering::Relaxed);
        self.active.store(active, Ordering::Relaxed);
        counter!(HUB_UNREGISTRATIONS_TOTAL).increment(1);
        if evicted {
            let _ = self.evictions.fetch_add(1, Ordering::Relaxed);
            counter!(HUB_EVICTIONS_TOTAL).increment(1);
        }
        #[allow(clippy::cast_precision_loss)]
        gauge!(HUB_CONNECTIONS_ACTIVE).set(active as f64);
    }

    pub(crate) fn broadcast(&self, delivered: u64) {
        let _ = self.broadcasts.fetch_add(1, Ordering::Relaxed);
        let _ = self.deliveries.fetch_add(delivered, Ordering::Relaxed);
        counter!(HUB_BROADCASTS_TOTAL).increment(1);
        counter!(HUB_DELIVERIES_TOTAL).increment(delivered);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            active: self.active.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            unregistrations: self.unregistrations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
        }
    }
}
