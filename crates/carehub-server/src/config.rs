//! Server configuration.

use std::time::Duration;

use carehub_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the hub server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Capacity of each connection's outbound queue.
    pub outbound_queue_capacity: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Allowed CORS origins; `"*"` allows any.
    pub cors_origins: Vec<String>,
    /// Grace period for sessions during shutdown, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl ServerConfig {
    /// Derive the server configuration from loaded settings.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            outbound_queue_capacity: settings.outbound_queue_capacity.max(1),
            max_message_size: settings.max_message_size,
            cors_origins: settings.cors_origins.clone(),
            shutdown_timeout_ms: settings.shutdown_timeout_ms,
        }
    }

    /// `host:port` string suitable for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Shutdown grace period.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            outbound_queue_capacity: 1024,
            max_message_size: 64 * 1024,
            cors_origins: vec!["*".into()],
            shutdown_timeout_ms: 5_000,
        }
    }
}
