//! Server configuration.

use std::time::Duration;

use fanout_hub::{HubConfig, PumpConfig};
use fanout_settings::{FanoutSettings, HubSettings};

/// Runtime configuration for [`FanoutServer`](crate::FanoutServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Path accepting WebSocket upgrades.
    pub ws_path: String,
    /// Attach the CORS layer.
    pub cors_enabled: bool,
    /// Upper bound on graceful shutdown.
    pub shutdown_timeout: Duration,
    /// Per-connection pump settings.
    pub pump: PumpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ws_path: "/ws".into(),
            cors_enabled: true,
            shutdown_timeout: Duration::from_secs(30),
            pump: PumpConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &FanoutSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            ws_path: settings.server.ws_path.clone(),
            cors_enabled: settings.server.cors_enabled,
            shutdown_timeout: Duration::from_secs(settings.server.shutdown_timeout_secs),
            pump: pump_config(&settings.hub),
        }
    }
}

/// Pump timing and limits from hub settings.
pub fn pump_config(hub: &HubSettings) -> PumpConfig {
    PumpConfig {
        ping_interval: Duration::from_millis(hub.ping_interval_ms),
        pong_wait: Duration::from_millis(hub.pong_wait_ms),
        write_timeout: Duration::from_millis(hub.write_timeout_ms),
        max_message_size: hub.max_message_size,
        echo_to_sender: hub.echo_to_sender,
    }
}

/// Hub sizing from hub settings.
pub fn hub_config(hub: &HubSettings) -> HubConfig {
    HubConfig {
        outbound_capacity: hub.outbound_capacity,
        event_capacity: hub.event_capacity,
        max_connections: hub.max_connections,
    }
}
