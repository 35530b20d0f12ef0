//! HTTP listener settings.

use serde::{Deserialize, Serialize};

/// Where and how the HTTP/WebSocket listener runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks a free port.
    pub port: u16,
    /// Path that accepts WebSocket upgrades.
    pub ws_path: String,
    /// Attach the permissive CORS layer.
    pub cors_enabled: bool,
    /// How long shutdown waits for tracked tasks, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ws_path: "/ws".to_string(),
            cors_enabled: true,
            shutdown_timeout_secs: 30,
        }
    }
}
