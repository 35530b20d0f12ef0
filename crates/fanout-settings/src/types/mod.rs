//! Settings types.
//!
//! All structs use `#[serde(rename_all = "camelCase", default)]` so a
//! partial settings file deserializes with defaults for everything it
//! leaves out.

mod hub;
mod logging;
mod server;

pub use hub::HubSettings;
pub use logging::{LogFormat, LogLevel, LoggingSettings};
pub use server::ServerSettings;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FanoutSettings {
    /// HTTP listener.
    pub server: ServerSettings,
    /// Hub and connection tuning.
    pub hub: HubSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

impl FanoutSettings {
    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let hub = &self.hub;
        let checks = [
            (hub.outbound_capacity == 0, "hub.outboundCapacity", "must be > 0"),
            (hub.event_capacity == 0, "hub.eventCapacity", "must be > 0"),
            (hub.max_connections == 0, "hub.maxConnections", "must be > 0"),
            (hub.max_message_size == 0, "hub.maxMessageSize", "must be > 0"),
            (hub.ping_interval_ms == 0, "hub.pingIntervalMs", "must be > 0"),
            (hub.write_timeout_ms == 0, "hub.writeTimeoutMs", "must be > 0"),
            (
                hub.pong_wait_ms <= hub.ping_interval_ms,
                "hub.pongWaitMs",
                "must be greater than hub.pingIntervalMs",
            ),
            (
                !self.server.ws_path.starts_with('/'),
                "server.wsPath",
                "must start with '/'",
            ),
        ];
        match checks.iter().find(|(failed, _, _)| *failed) {
            Some(&(_, field, rule)) => Err(SettingsError::Constraint { field, rule }),
            None => Ok(()),
        }
    }
}
