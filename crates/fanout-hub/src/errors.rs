//! Hub error types.

use thiserror::Error;

use crate::ids::ConnectionId;

/// Errors reported to callers of [`HubHandle`](crate::HubHandle).
///
/// Per-connection I/O failures and backpressure evictions are not errors at
/// this level: they are handled inside the hub and the pumps and never reach
/// a caller.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HubError {
    /// The control loop is not running (all receivers dropped).
    #[error("hub is not running")]
    Closed,
    /// A connection with this id is already registered.
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),
    /// Membership is at its configured limit.
    #[error("connection limit reached ({limit})")]
    CapacityExceeded {
        /// Configured maximum number of members.
        limit: usize,
    },
}

/// Result type for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;
