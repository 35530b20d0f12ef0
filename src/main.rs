//! # fanout
//!
//! WebSocket broadcast hub binary. Loads settings, starts the hub control
//! loop and the HTTP/WebSocket server, and shuts both down on Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use fanout_hub::Hub;
use fanout_server::{FanoutServer, ServerConfig, hub_config};
use fanout_settings::loader::parse_variant;
use fanout_settings::{FanoutSettings, LogFormat, LogLevel, load_settings, load_settings_from_path};
use tracing::{info, warn};

/// Fanout WebSocket broadcast server.
#[derive(Parser, Debug)]
#[command(name = "fanout", about = "WebSocket broadcast hub server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.fanout/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Apply flags on top of file and env settings.
    fn apply(&self, settings: &mut FanoutSettings) -> Result<()> {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            let Some(level) = parse_variant::<LogLevel>(level) else {
                bail!("unknown log level: {level}");
            };
            settings.logging.level = level;
        }
        if self.json_logs {
            settings.logging.format = LogFormat::Json;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => load_settings().context("Failed to load settings")?,
    };
    cli.apply(&mut settings)?;
    settings.validate().context("Invalid settings")?;

    fanout_logging::init_subscriber(&settings.logging).context("Failed to initialize logging")?;
    let metrics = fanout_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let (hub, handle) = Hub::new(hub_config(&settings.hub));
    let hub_task = tokio::spawn(hub.run());

    let server = FanoutServer::new(ServerConfig::from_settings(&settings), handle)
        .with_metrics(metrics);
    let (addr, serve_task) = server.listen().await.context("Failed to start server")?;
    info!(%addr, "fanout ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    info!("shutdown signal received");

    let timeout = server.config().shutdown_timeout;
    if !server
        .shutdown()
        .graceful_shutdown(vec![serve_task], Some(timeout))
        .await
    {
        warn!("connections still open at shutdown deadline");
    }

    // Dropping the server releases the last hub handle, ending the loop.
    drop(server);
    if tokio::time::timeout(timeout, hub_task).await.is_err() {
        warn!("hub control loop did not stop in time");
    }
    info!("fanout stopped");
    Ok(())
}
