//! # fanout-server
//!
//! Axum front end for the fanout hub.
//!
//! - `GET /ws` (configurable): WebSocket upgrade, handed to the hub's
//!   connection driver
//! - `GET /ping`, `GET /health`, `GET /metrics`
//! - Permissive CORS for browser clients
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod cors;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::{ServerConfig, hub_config, pump_config};
pub use errors::ServerError;
pub use server::{AppState, FanoutServer};
pub use shutdown::ShutdownCoordinator;
