//! Error types shared across the hub.

use thiserror::Error;

/// Errors raised by core hub operations.
///
/// None of these are ever surfaced to event producers; callers at the hub
/// boundary log them and carry on.
#[derive(Debug, Error)]
pub enum HubError {
    /// An event kind outside `call_event` / `system_status` / `resident_update`.
    #[error("unknown event kind: {0}")]
    UnknownEventKind(String),
    /// An envelope or payload failed to (de)serialize.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for core hub operations.
pub type Result<T> = std::result::Result<T, HubError>;
