//! Inbound event adapter: where producers hand events to the hub.
//!
//! Producers name the event kind as a string; the adapter validates it,
//! normalizes the payload and emission time, and broadcasts. Nothing is
//! reported back to producers as a failure: bad input is logged and dropped.

use std::str::FromStr;
use std::sync::Arc;

use carehub_core::EventKind;
use carehub_core::models::{CallEvent, ResidentProfile, SystemStatus};
use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::broadcast::{BroadcastManager, BroadcastReport};
use crate::metrics::HUB_INGEST_REJECTED_TOTAL;

/// Relay producers that omit the offset send UTC in this shape.
const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Message shape used by the cross-process notification relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelayMessage {
    /// Event kind (`call_event`, `system_status`, `resident_update`).
    pub event_type: String,
    /// Opaque payload.
    #[serde(default)]
    pub data: Value,
    /// Original emission time (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Producing service, for logs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Entry point for event producers.
#[derive(Clone)]
pub struct InboundAdapter {
    broadcast: Arc<BroadcastManager>,
}

impl InboundAdapter {
    /// Create an adapter that delivers through `broadcast`.
    pub fn new(broadcast: Arc<BroadcastManager>) -> Self {
        Self { broadcast }
    }

    /// Broadcast an event of kind `kind`, stamped now.
    ///
    /// Unknown kinds are logged and discarded with zero deliveries.
    pub fn ingest(&self, kind: &str, payload: Value) -> BroadcastReport {
        self.ingest_at(kind, payload, Utc::now())
    }

    /// Broadcast an event with an explicit emission time.
    pub fn ingest_at(&self, kind: &str, payload: Value, emitted_at: DateTime<Utc>) -> BroadcastReport {
        let Ok(kind) = EventKind::from_str(kind) else {
            counter!(HUB_INGEST_REJECTED_TOTAL, "reason" => "unknown_kind").increment(1);
            warn!(event_type = kind, "unknown event kind, discarding");
            return BroadcastReport::default();
        };
        self.broadcast
            .send_event_at(kind, normalize_payload(payload), emitted_at)
    }

    /// Accept a relay message (`POST /events` body).
    ///
    /// A parseable `timestamp` (RFC 3339, or offset-less and read as UTC)
    /// is kept as the emission time; otherwise the current time is used.
    pub fn ingest_relayed(&self, message: Value) -> BroadcastReport {
        let message: RelayMessage = match serde_json::from_value(message) {
            Ok(m) => m,
            Err(e) => {
                counter!(HUB_INGEST_REJECTED_TOTAL, "reason" => "malformed").increment(1);
                warn!(error = %e, "malformed relay message, discarding");
                return BroadcastReport::default();
            }
        };
        debug!(
            event_type = %message.event_type,
            source = message.source.as_deref().unwrap_or("-"),
            "relay message received"
        );
        let emitted_at = message
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);
        self.ingest_at(&message.event_type, message.data, emitted_at)
    }

    /// Broadcast a typed call event.
    pub fn publish_call_event(&self, event: &CallEvent) -> BroadcastReport {
        self.publish(EventKind::CallEvent, event)
    }

    /// Broadcast a typed component status report.
    pub fn publish_system_status(&self, status: &SystemStatus) -> BroadcastReport {
        self.publish(EventKind::SystemStatus, status)
    }

    /// Broadcast a typed resident profile change.
    pub fn publish_resident_update(&self, resident: &ResidentProfile) -> BroadcastReport {
        self.publish(EventKind::ResidentUpdate, resident)
    }

    fn publish<T: Serialize>(&self, kind: EventKind, payload: &T) -> BroadcastReport {
        match serde_json::to_value(payload) {
            Ok(value) => self.broadcast.send_event(kind, normalize_payload(value)),
            Err(e) => {
                warn!(event_type = %kind, error = %e, "failed to serialize payload");
                BroadcastReport::default()
            }
        }
    }
}

/// Coerce any JSON value into an object payload.
///
/// `null` becomes `{}`, objects are kept, anything else is wrapped as
/// `{"value": ...}`.
pub fn normalize_payload(payload: Value) -> Value {
    match payload {
        Value::Null => Value::Object(Map::new()),
        Value::Object(_) => payload,
        other => {
            let mut wrapped = Map::new();
            let _ = wrapped.insert("value".to_owned(), other);
            Value::Object(wrapped)
        }
    }
}

/// RFC 3339, or an offset-less ISO 8601 time taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(raw, NAIVE_TIMESTAMP_FORMAT) {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            debug!(timestamp = raw, error = %e, "unparseable relay timestamp, using now");
            None
        }
    }
}
