//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use huddle_store::RoomStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::delivery::DeliveryEngine;
use crate::dispatch::{DispatchTable, HandlerContext};
use crate::health::{self, HealthResponse};
use crate::registry::SessionRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::upgrade::ws_handler;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Open sessions.
    pub registry: Arc<SessionRegistry>,
    /// Tag to handler routing.
    pub table: Arc<DispatchTable>,
    /// Store and delivery handed to handlers.
    pub ctx: HandlerContext,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The relay server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    registry: Arc<SessionRegistry>,
    delivery: Arc<DeliveryEngine>,
    table: Arc<DispatchTable>,
    store: Arc<dyn RoomStore>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl RelayServer {
    /// Create a server around a filled dispatch table and a room store.
    pub fn new(config: ServerConfig, table: DispatchTable, store: Arc<dyn RoomStore>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        Self {
            config: Arc::new(config),
            delivery: Arc::new(DeliveryEngine::new(registry.clone())),
            registry,
            table: Arc::new(table),
            store,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            config: self.config.clone(),
            registry: self.registry.clone(),
            table: self.table.clone(),
            ctx: HandlerContext::new(self.store.clone(), self.delivery.clone()),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind and start accepting in a background task.
    ///
    /// Returns the bound address and the acceptor task. The task ends once
    /// [`ShutdownCoordinator::shutdown`] is called; every open session is
    /// closed on the way out.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "listening");

        let app = self.router();
        let token = self.shutdown.token();
        let registry = self.registry.clone();
        let handle = tokio::spawn(async move {
            let stop = async move {
                token.cancelled().await;
                let closed = registry.close_all().await;
                info!(closed, "acceptor stopping");
            };
            if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(stop).await {
                error!(error = %e, "server error");
            }
        });
        Ok((addr, handle))
    }

    /// Stop accepting, close every session and wait for the acceptor.
    pub async fn stop(&self, acceptor: JoinHandle<()>) {
        self.shutdown
            .graceful_shutdown(vec![acceptor], Some(self.config.shutdown_timeout()))
            .await;
    }

    /// Open sessions.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Delivery engine over the registry.
    pub fn delivery(&self) -> &Arc<DeliveryEngine> {
        &self.delivery
    }

    /// Room store.
    pub fn store(&self) -> &Arc<dyn RoomStore> {
        &self.store
    }

    /// Dispatch table.
    pub fn table(&self) -> &Arc<DispatchTable> {
        &self.table
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.registry.len().await;
    let rooms = state.ctx.store.room_count().await;
    Json(health::health_check(
        state.start_time,
        connections,
        rooms,
        state.shutdown.is_shutting_down(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
