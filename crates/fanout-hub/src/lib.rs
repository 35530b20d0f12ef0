//! # fanout-hub
//!
//! Membership and broadcast fan-out for live client connections.
//!
//! - [`Hub`] owns the set of registered connections and is driven by a
//!   single control-loop task fed through a bounded event channel.
//! - [`HubHandle`] is the cloneable front door used by everything else.
//! - [`Connection`] pairs an id with a bounded outbound queue; a full queue
//!   gets the connection evicted instead of stalling the broadcast.
//! - [`read_pump`] / [`write_pump`] move frames between a transport and the
//!   hub, and [`serve`] runs both for one connection.

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod event;
pub mod hub;
pub mod ids;
pub mod lifecycle;
pub mod metrics;
pub mod payload;
pub mod pump;
pub mod session;

pub use connection::{Connection, Enqueue, OutboundQueue};
pub use errors::{HubError, Result};
pub use event::Event;
pub use hub::{BroadcastReport, Hub, HubConfig, HubHandle};
pub use ids::ConnectionId;
pub use lifecycle::{ConnectionState, Lifecycle};
pub use metrics::{HubSnapshot, HubStats};
pub use payload::{Frame, Payload};
pub use pump::{PumpConfig, ReadOutcome, WriteOutcome, read_pump, write_pump};
pub use session::{ConnectionSummary, serve};
