//! Hub sizing and connection keep-alive settings.

use serde::{Deserialize, Serialize};

/// Queue bounds, connection limits and per-connection timing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Bound of each connection's outbound queue.
    pub outbound_capacity: usize,
    /// Bound of the hub's event channel.
    pub event_capacity: usize,
    /// Maximum simultaneous connections.
    pub max_connections: usize,
    /// Largest accepted inbound message, in bytes.
    pub max_message_size: usize,
    /// Interval between server pings, in milliseconds.
    pub ping_interval_ms: u64,
    /// Read deadline, in milliseconds. Must exceed `ping_interval_ms`.
    pub pong_wait_ms: u64,
    /// Upper bound on one frame write, in milliseconds.
    pub write_timeout_ms: u64,
    /// Deliver client messages back to their sender too.
    pub echo_to_sender: bool,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            event_capacity: 1024,
            max_connections: 10_000,
            max_message_size: 512 * 1024,
            ping_interval_ms: 54_000,
            pong_wait_ms: 60_000,
            write_timeout_ms: 10_000,
            echo_to_sender: false,
        }
    }
}
