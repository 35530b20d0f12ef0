//! `FanoutServer`: Axum HTTP + WebSocket server in front of the hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use fanout_hub::{ConnectionId, HubHandle, serve};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::cors::cors_layer;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse, PingResponse};
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::split_socket;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Front door to the hub control loop.
    pub hub: HubHandle,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The fanout HTTP server.
pub struct FanoutServer {
    config: Arc<ServerConfig>,
    hub: HubHandle,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl FanoutServer {
    /// Create a server in front of a running hub.
    pub fn new(config: ServerConfig, hub: HubHandle) -> Self {
        Self {
            config: Arc::new(config),
            hub,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from this Prometheus handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            config: Arc::clone(&self.config),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        let router = Router::new()
            .route("/ping", get(ping_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route(&self.config.ws_path, get(ws_handler))
            .with_state(state);

        if self.config.cors_enabled {
            router.layer(cors_layer())
        } else {
            router
        }
    }

    /// Bind and start serving in the background.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    /// The task ends once the shutdown token is cancelled.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "http server stopped with error");
            }
        });

        info!(
            addr = %local_addr,
            ws_path = %self.config.ws_path,
            "fanout server listening"
        );
        Ok((local_addr, handle))
    }

    /// Get the hub handle.
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ping
async fn ping_handler() -> Json<PingResponse> {
    Json(PingResponse::default())
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.hub.stats();
    Json(health::health_check(
        state.start_time,
        &stats,
        state.shutdown.is_shutting_down(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// GET {ws_path}
///
/// Requests that are not valid upgrades are rejected by the extractor and
/// never reach the hub.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    }
    let max_message_size = state.config.pump.max_message_size;
    ws.max_message_size(max_message_size)
        .on_failed_upgrade(|err| warn!(error = %err, "websocket upgrade failed"))
        .on_upgrade(move |socket| {
            let shutdown = Arc::clone(&state.shutdown);
            shutdown.track(handle_socket(socket, state))
        })
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = ConnectionId::new();
    debug!(conn_id = %id, "websocket upgraded");
    let (sink, stream) = split_socket(socket);
    let token = state.shutdown.token();
    match serve(id.clone(), sink, stream, state.hub, state.config.pump.clone(), &token).await {
        Ok(summary) => debug!(
            conn_id = %summary.id,
            read = summary.read.as_str(),
            write = summary.write.as_str(),
            "connection finished"
        ),
        Err(e) => warn!(conn_id = %id, error = %e, "connection rejected by hub"),
    }
}
