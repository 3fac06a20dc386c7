//! Envelope fan-out to connected WebSocket clients.

use std::sync::Arc;

use carehub_core::{ConnectionId, Envelope, EventKind};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use super::registry::ConnectionRegistry;
use crate::metrics::{HUB_BROADCASTS_TOTAL, HUB_DELIVERIES_FAILED_TOTAL, HUB_EVICTIONS_TOTAL};

/// Outcome of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Connections targeted by the snapshot.
    pub recipients: usize,
    /// Connections whose queue accepted the envelope.
    pub delivered: usize,
    /// Connections evicted because delivery failed.
    pub evicted: usize,
}

/// Delivers envelopes to one connection, one identity, or everyone.
///
/// Delivery is best effort: a connection whose outbound queue is full or
/// closed is unregistered, and the rest of the fan-out continues.
pub struct BroadcastManager {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastManager {
    /// Create a broadcast manager over a registry.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this manager delivers through.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Deliver to a single connection.
    ///
    /// Returns whether the envelope was enqueued. A failed delivery evicts
    /// the connection; an unknown ID is not an error.
    pub fn send_to_one(&self, envelope: &Envelope, id: &ConnectionId) -> bool {
        let Some(connection) = self.registry.get(id) else {
            debug!(conn_id = %id, envelope_type = %envelope.kind(), "send to unknown connection");
            return false;
        };
        let Some(json) = serialize(envelope) else {
            return false;
        };
        let report = self.fan_out(&[connection], &json, id.as_str());
        report.delivered == 1
    }

    /// Deliver to every connection attributed to `identity`.
    pub fn send_to_user(&self, envelope: &Envelope, identity: &str) -> BroadcastReport {
        let targets = self.registry.snapshot_for(identity);
        let Some(json) = serialize(envelope) else {
            return BroadcastReport::default();
        };
        self.fan_out(&targets, &json, identity)
    }

    /// Deliver to every connection registered at the time of the call.
    pub fn broadcast(&self, envelope: &Envelope) -> BroadcastReport {
        let targets = self.registry.snapshot();
        let Some(json) = serialize(envelope) else {
            return BroadcastReport::default();
        };
        counter!(HUB_BROADCASTS_TOTAL, "type" => envelope.kind().as_str()).increment(1);
        let report = self.fan_out(&targets, &json, "all");
        debug!(
            envelope_type = %envelope.kind(),
            recipients = report.recipients,
            delivered = report.delivered,
            evicted = report.evicted,
            "broadcast envelope"
        );
        report
    }

    /// Broadcast a producer event stamped now.
    pub fn send_event(&self, kind: EventKind, data: Value) -> BroadcastReport {
        self.broadcast(&Envelope::event(kind, data))
    }

    /// Broadcast a producer event with an explicit emission time.
    pub fn send_event_at(
        &self,
        kind: EventKind,
        data: Value,
        emitted_at: DateTime<Utc>,
    ) -> BroadcastReport {
        self.broadcast(&Envelope::event_at(kind, data, emitted_at))
    }

    /// Broadcast a `call_event`.
    pub fn send_call_event(&self, data: Value) -> BroadcastReport {
        self.send_event(EventKind::CallEvent, data)
    }

    /// Broadcast a `system_status`.
    pub fn send_system_status(&self, data: Value) -> BroadcastReport {
        self.send_event(EventKind::SystemStatus, data)
    }

    /// Broadcast a `resident_update`.
    pub fn send_resident_update(&self, data: Value) -> BroadcastReport {
        self.send_event(EventKind::ResidentUpdate, data)
    }

    /// Enqueue `json` on each target, then evict the ones that failed.
    fn fan_out(
        &self,
        targets: &[Arc<ClientConnection>],
        json: &Arc<String>,
        label: &str,
    ) -> BroadcastReport {
        let mut report = BroadcastReport {
            recipients: targets.len(),
            ..BroadcastReport::default()
        };
        let mut to_remove = Vec::new();
        for conn in targets {
            if conn.send(Arc::clone(json)) {
                report.delivered += 1;
            } else {
                counter!(HUB_DELIVERIES_FAILED_TOTAL).increment(1);
                warn!(
                    conn_id = %conn.id(),
                    label,
                    total_drops = conn.drop_count(),
                    "delivery failed, evicting connection"
                );
                to_remove.push(conn.id().clone());
            }
        }
        for id in &to_remove {
            if self.registry.unregister(id) {
                report.evicted += 1;
                counter!(HUB_EVICTIONS_TOTAL).increment(1);
            }
        }
        report
    }
}

fn serialize(envelope: &Envelope) -> Option<Arc<String>> {
    match envelope.to_json() {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            warn!(envelope_type = %envelope.kind(), error = %e, "failed to serialize envelope");
            None
        }
    }
}
