//! `CareHubServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::adapter::InboundAdapter;
use crate::websocket::broadcast::{BroadcastManager, BroadcastReport};
use crate::websocket::registry::ConnectionRegistry;
use crate::websocket::session::{Endpoint, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast engine (and through it, the registry).
    pub broadcast: Arc<BroadcastManager>,
    /// Producer entry point.
    pub adapter: InboundAdapter,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, when a recorder is installed.
    pub metrics_handle: Option<PrometheusHandle>,
    /// Max inbound WebSocket message size.
    pub max_message_size: usize,
}

/// Query parameters accepted on the WebSocket routes.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Unvalidated caller identity used to attribute the connection.
    pub user_id: Option<String>,
}

/// The hub server.
pub struct CareHubServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    broadcast: Arc<BroadcastManager>,
    adapter: InboundAdapter,
    shutdown: Arc<ShutdownCoordinator>,
    metrics_handle: Option<PrometheusHandle>,
    start_time: Instant,
}

impl CareHubServer {
    /// Create a new server with its own registry, engine, and adapter.
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(config.outbound_queue_capacity));
        let broadcast = Arc::new(BroadcastManager::new(Arc::clone(&registry)));
        let adapter = InboundAdapter::new(Arc::clone(&broadcast));
        Self {
            config,
            registry,
            broadcast,
            adapter,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics_handle: None,
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            broadcast: Arc::clone(&self.broadcast),
            adapter: self.adapter.clone(),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            metrics_handle: self.metrics_handle.clone(),
            max_message_size: self.config.max_message_size,
        };

        Router::new()
            .route(Endpoint::LiveUpdates.path(), get(live_updates_handler))
            .route(Endpoint::CallStatus.path(), get(call_status_handler))
            .route("/events", post(ingest_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(cors_layer(&self.config.cors_origins))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve in a background task.
    ///
    /// Returns the bound address (useful with port `0`) and the server task,
    /// which finishes after [`ShutdownCoordinator::shutdown`].
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%addr, "carehub listening");
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server stopped with error");
            }
        });
        Ok((addr, handle))
    }

    /// Get the connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get the broadcast manager.
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.broadcast
    }

    /// Get the inbound event adapter.
    pub fn adapter(&self) -> &InboundAdapter {
        &self.adapter
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

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "invalid CORS origin, skipping");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

fn upgrade(ws: WebSocketUpgrade, endpoint: Endpoint, params: ConnectParams, state: AppState) -> Response {
    let shutdown = state.shutdown.token();
    let sessions = state.shutdown.tracker();
    let broadcast = state.broadcast;
    ws.max_message_size(state.max_message_size).on_upgrade(move |socket| {
        sessions.track_future(run_ws_session(socket, endpoint, params.user_id, broadcast, shutdown))
    })
}

/// GET /ws/live-updates
async fn live_updates_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    upgrade(ws, Endpoint::LiveUpdates, params, state)
}

/// GET /ws/call-status
async fn call_status_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    upgrade(ws, Endpoint::CallStatus, params, state)
}

/// POST /events
async fn ingest_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<BroadcastReport>) {
    let report = state.adapter.ingest_relayed(body);
    (StatusCode::ACCEPTED, Json(report))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.broadcast.registry();
    Json(health::health_check(
        state.start_time,
        registry.count(),
        registry.user_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics_handle {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
