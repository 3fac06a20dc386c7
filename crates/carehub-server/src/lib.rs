//! # carehub-server
//!
//! Axum HTTP + `WebSocket` hub for real-time care-call distribution.
//!
//! - `WebSocket` endpoints: `/ws/live-updates` and `/ws/call-status`
//! - Connection registry with identity attribution and liveness tracking
//! - Broadcast engine that evicts connections whose delivery fails
//! - Inbound event adapter for producers and the cross-process relay (`POST /events`)
//! - Health check, Prometheus metrics, graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::CareHubServer;
pub use websocket::adapter::{InboundAdapter, RelayMessage};
pub use websocket::broadcast::{BroadcastManager, BroadcastReport};
pub use websocket::connection::ClientConnection;
pub use websocket::registry::ConnectionRegistry;
