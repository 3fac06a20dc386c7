//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded; a second call fails
/// because a global recorder is already set.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket connections opened total (counter, labels: endpoint).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Live WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket connection duration seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Broadcast operations total (counter, labels: type).
pub const HUB_BROADCASTS_TOTAL: &str = "hub_broadcasts_total";
/// Deliveries that could not be enqueued (counter).
pub const HUB_DELIVERIES_FAILED_TOTAL: &str = "hub_deliveries_failed_total";
/// Connections evicted after a failed delivery (counter).
pub const HUB_EVICTIONS_TOTAL: &str = "hub_evictions_total";
/// Inbound events discarded by the adapter (counter, labels: reason).
pub const HUB_INGEST_REJECTED_TOTAL: &str = "hub_ingest_rejected_total";
