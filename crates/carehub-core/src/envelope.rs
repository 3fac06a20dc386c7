//! Hub-to-client envelope.
//!
//! Every message the hub pushes to a client is an [`Envelope`]:
//!
//! ```json
//! { "type": "call_event", "data": { ... }, "timestamp": "2026-01-01T00:00:00.000Z" }
//! ```
//!
//! Session-control envelopes (`connection_established`,
//! `subscription_confirmed`, `call_status_init`) carry their extra fields at
//! the top level next to `type`/`timestamp` instead of a nested `data`.
//!
//! Envelopes are immutable once built: fields are private and only the
//! constructors below can produce one.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{HubError, Result};
use crate::ids::ConnectionId;

/// Format a UTC instant the way envelopes carry it (RFC 3339, millis, `Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time formatted as an envelope timestamp.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// The `type` tag of an outbound envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
    /// A resident call event (touch call, emergency, nurse communication).
    CallEvent,
    /// A system component status update.
    SystemStatus,
    /// A resident profile update.
    ResidentUpdate,
    /// Greeting sent to a connection right after it is registered.
    ConnectionEstablished,
    /// Reply to a client `ping` frame.
    Pong,
    /// Reply to a client `subscribe` frame.
    SubscriptionConfirmed,
    /// Extra greeting on the call-status endpoint.
    CallStatusInit,
}

impl EnvelopeType {
    /// Wire name of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CallEvent => "call_event",
            Self::SystemStatus => "system_status",
            Self::ResidentUpdate => "resident_update",
            Self::ConnectionEstablished => "connection_established",
            Self::Pong => "pong",
            Self::SubscriptionConfirmed => "subscription_confirmed",
            Self::CallStatusInit => "call_status_init",
        }
    }
}

impl fmt::Display for EnvelopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event kinds an external producer may inject.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Resident call event.
    CallEvent,
    /// System status update.
    SystemStatus,
    /// Resident profile update.
    ResidentUpdate,
}

impl EventKind {
    /// All producer kinds.
    pub const ALL: [Self; 3] = [Self::CallEvent, Self::SystemStatus, Self::ResidentUpdate];

    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        self.envelope_type().as_str()
    }

    /// Envelope tag used when this kind is broadcast.
    pub fn envelope_type(self) -> EnvelopeType {
        match self {
            Self::CallEvent => EnvelopeType::CallEvent,
            Self::SystemStatus => EnvelopeType::SystemStatus,
            Self::ResidentUpdate => EnvelopeType::ResidentUpdate,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| HubError::UnknownEventKind(s.to_owned()))
    }
}

/// Canonical hub-to-client message wrapper. Serialize-only.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    kind: EnvelopeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    timestamp: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Envelope {
    fn new(kind: EnvelopeType, data: Option<Value>, timestamp: String) -> Self {
        Self {
            kind,
            data,
            timestamp,
            extra: Map::new(),
        }
    }

    fn with_extra(mut self, key: &str, value: Value) -> Self {
        let _ = self.extra.insert(key.to_owned(), value);
        self
    }

    /// Producer event stamped with the current time.
    pub fn event(kind: EventKind, data: Value) -> Self {
        Self::event_at(kind, data, Utc::now())
    }

    /// Producer event stamped with an explicit emission time.
    pub fn event_at(kind: EventKind, data: Value, emitted_at: DateTime<Utc>) -> Self {
        Self::new(kind.envelope_type(), Some(data), format_timestamp(emitted_at))
    }

    /// Greeting carrying the freshly assigned connection ID.
    pub fn connection_established(connection_id: &ConnectionId) -> Self {
        Self::new(EnvelopeType::ConnectionEstablished, None, now_timestamp())
            .with_extra("connection_id", Value::String(connection_id.to_string()))
    }

    /// Reply to a client ping.
    pub fn pong() -> Self {
        Self::new(EnvelopeType::Pong, None, now_timestamp())
    }

    /// Acknowledgement echoing the requested subscription list.
    pub fn subscription_confirmed(events: &[String]) -> Self {
        let list = events.iter().cloned().map(Value::String).collect();
        Self::new(EnvelopeType::SubscriptionConfirmed, None, now_timestamp())
            .with_extra("subscriptions", Value::Array(list))
    }

    /// Greeting sent on the call-status endpoint.
    pub fn call_status_init(message: &str) -> Self {
        Self::new(EnvelopeType::CallStatusInit, None, now_timestamp())
            .with_extra("message", Value::String(message.to_owned()))
    }

    /// Envelope tag.
    pub fn kind(&self) -> EnvelopeType {
        self.kind
    }

    /// Opaque payload, if any.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Emission timestamp.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// A top-level field other than `type`, `data`, `timestamp`.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Serialize to the JSON text sent over the wire.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn event_kind_parses_known_names() {
        assert_eq!("call_event".parse::<EventKind>().unwrap(), EventKind::CallEvent);
        assert_eq!(
            "system_status".parse::<EventKind>().unwrap(),
            EventKind::SystemStatus
        );
        assert_eq!(
            "resident_update".parse::<EventKind>().unwrap(),
            EventKind::ResidentUpdate
        );
    }

    #[test]
    fn event_kind_rejects_session_types() {
        // Session-control tags are not producer kinds.
        assert_matches!(
            "pong".parse::<EventKind>(),
            Err(HubError::UnknownEventKind(kind)) if kind == "pong"
        );
        assert!("".parse::<EventKind>().is_err());
        assert!("CALL_EVENT".parse::<EventKind>().is_err());
    }

    #[test]
    fn event_envelope_wire_shape() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let env = Envelope::event_at(
            EventKind::CallEvent,
            json!({"event_id": "e1", "event_type": "emergency"}),
            at,
        );
        let parsed: Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(
            parsed,
            json!({
                "type": "call_event",
                "data": {"event_id": "e1", "event_type": "emergency"},
                "timestamp": "2026-01-02T03:04:05.000Z",
            })
        );
    }

    #[test]
    fn connection_established_has_top_level_id() {
        let id = ConnectionId::from("c-1");
        let parsed: Value =
            serde_json::from_str(&Envelope::connection_established(&id).to_json().unwrap())
                .unwrap();
        assert_eq!(parsed["type"], "connection_established");
        assert_eq!(parsed["connection_id"], "c-1");
        assert!(parsed.get("data").is_none());
        assert!(parsed["timestamp"].is_string());
    }

    #[test]
    fn subscription_confirmed_echoes_list() {
        let events = vec!["call_event".to_owned(), "system_status".to_owned()];
        let env = Envelope::subscription_confirmed(&events);
        assert_eq!(env.kind(), EnvelopeType::SubscriptionConfirmed);
        assert_eq!(
            env.extra("subscriptions"),
            Some(&json!(["call_event", "system_status"]))
        );
    }

    #[test]
    fn pong_has_parseable_timestamp() {
        let env = Envelope::pong();
        assert_eq!(env.kind(), EnvelopeType::Pong);
        assert!(env.data().is_none());
        assert!(DateTime::parse_from_rfc3339(env.timestamp()).is_ok());
    }

    #[test]
    fn call_status_init_is_flat() {
        let env = Envelope::call_status_init("Connected to call status updates");
        assert_eq!(
            env.extra("message"),
            Some(&json!("Connected to call status updates"))
        );
        let wire: Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(wire["type"], "call_status_init");
        assert_eq!(wire["message"], "Connected to call status updates");
        assert!(wire.get("data").is_none());
        assert_eq!(wire.as_object().unwrap().len(), 3);
    }

    #[test]
    fn envelope_type_display_matches_serde() {
        for kind in EventKind::ALL {
            let via_serde = serde_json::to_value(kind.envelope_type()).unwrap();
            assert_eq!(via_serde, json!(kind.to_string()));
        }
    }
}
