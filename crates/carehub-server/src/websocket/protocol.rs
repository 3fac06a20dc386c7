//! Client-to-hub frame parsing.
//!
//! Clients send JSON objects tagged by `type`:
//!
//! ```json
//! {"type": "ping"}
//! {"type": "subscribe", "events": ["call_event", "system_status"]}
//! ```

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// A recognized inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientFrame {
    /// Liveness probe; answered with `pong`.
    Ping,
    /// Subscription request; answered with `subscription_confirmed`.
    Subscribe {
        /// Requested event names, echoed back verbatim.
        events: Vec<String>,
    },
}

/// Why an inbound frame was not understood.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The text is not JSON.
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    /// The frame has no string `type` field.
    #[error("frame has no type")]
    MissingType,
    /// The `type` is not one the hub handles.
    #[error("unrecognized frame type: {0}")]
    Unrecognized(String),
    /// A known `type` with a body that does not fit it.
    #[error("invalid {kind} frame: {source}")]
    Invalid {
        /// Frame type.
        kind: &'static str,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

impl FrameError {
    /// Whether the frame was well-formed but of a type the hub ignores.
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, Self::Unrecognized(_) | Self::MissingType)
    }
}

#[derive(Deserialize)]
struct SubscribeBody {
    #[serde(default)]
    events: Vec<String>,
}

/// Parse one inbound text frame.
pub fn parse_frame(text: &str) -> Result<ClientFrame, FrameError> {
    let value: Value = serde_json::from_str(text).map_err(FrameError::InvalidJson)?;
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Err(FrameError::MissingType);
    };
    match kind {
        "ping" => Ok(ClientFrame::Ping),
        "subscribe" => {
            let body: SubscribeBody = serde_json::from_value(value)
                .map_err(|source| FrameError::Invalid { kind: "subscribe", source })?;
            Ok(ClientFrame::Subscribe { events: body.events })
        }
        other => Err(FrameError::Unrecognized(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn ping() {
        assert_eq!(parse_frame(r#"{"type":"ping"}"#).unwrap(), ClientFrame::Ping);
    }

    #[test]
    fn ping_ignores_extra_fields() {
        assert_eq!(
            parse_frame(r#"{"type":"ping","client_time":12}"#).unwrap(),
            ClientFrame::Ping
        );
    }

    #[test]
    fn subscribe_with_events() {
        let frame = parse_frame(r#"{"type":"subscribe","events":["call_event","system_status"]}"#)
            .unwrap();
        assert_eq!(
            frame,
            ClientFrame::Subscribe {
                events: vec!["call_event".into(), "system_status".into()]
            }
        );
    }

    #[test]
    fn subscribe_without_events_is_empty() {
        assert_eq!(
            parse_frame(r#"{"type":"subscribe"}"#).unwrap(),
            ClientFrame::Subscribe { events: vec![] }
        );
    }

    #[test]
    fn subscribe_with_bad_events() {
        let err = parse_frame(r#"{"type":"subscribe","events":"call_event"}"#).unwrap_err();
        assert_matches!(err, FrameError::Invalid { kind: "subscribe", .. });
        assert!(!err.is_unrecognized());
    }

    #[test]
    fn not_json() {
        assert_matches!(parse_frame("not json"), Err(FrameError::InvalidJson(_)));
        assert_matches!(parse_frame(""), Err(FrameError::InvalidJson(_)));
    }

    #[test]
    fn missing_type() {
        assert_matches!(parse_frame(r#"{"events":[]}"#), Err(FrameError::MissingType));
        assert_matches!(parse_frame("42"), Err(FrameError::MissingType));
        assert_matches!(parse_frame(r#"{"type":7}"#), Err(FrameError::MissingType));
    }

    #[test]
    fn unknown_type() {
        let err = parse_frame(r#"{"type":"dance"}"#).unwrap_err();
        assert_matches!(&err, FrameError::Unrecognized(t) if t == "dance");
        assert!(err.is_unrecognized());
        assert_eq!(err.to_string(), "unrecognized frame type: dance");
    }
}
