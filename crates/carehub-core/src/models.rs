//! Producer-side payload models.
//!
//! The hub treats every payload as opaque `data`; these types exist for the
//! producers that hand events to the hub (the calls API, the voice-assistant
//! backend, the status monitor) so they agree on one JSON shape with the
//! dashboards. Field names are `snake_case` on the wire.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What kind of call a resident placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEventType {
    /// Touch-screen help call.
    TouchCall,
    /// Emergency call.
    Emergency,
    /// Nurse communication (carries a message).
    NurseComm,
}

/// Lifecycle of a call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEventStatus {
    /// Waiting for a caregiver.
    #[default]
    Active,
    /// A caregiver acknowledged the call.
    Acknowledged,
    /// The call was resolved.
    Resolved,
}

/// A resident call event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallEvent {
    /// Unique event identifier.
    pub event_id: String,
    /// Resident who placed the call.
    pub resident_id: String,
    /// Call type.
    pub event_type: CallEventType,
    /// Current status.
    #[serde(default)]
    pub status: CallEventStatus,
    /// Message content for nurse communications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Responding caregiver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caregiver_id: Option<String>,
    /// Seconds until acknowledgement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    /// Free-form producer metadata.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// When the call occurred.
    pub timestamp: DateTime<Utc>,
    /// Record creation time.
    pub created_at: DateTime<Utc>,
    /// Last record update.
    pub updated_at: DateTime<Utc>,
}

impl CallEvent {
    /// New active call stamped with the current time.
    pub fn new(
        event_id: impl Into<String>,
        resident_id: impl Into<String>,
        event_type: CallEventType,
    ) -> Self {
        let now = Utc::now();
        Self {
            event_id: event_id.into(),
            resident_id: resident_id.into(),
            event_type,
            status: CallEventStatus::Active,
            message: None,
            caregiver_id: None,
            response_time: None,
            metadata: HashMap::new(),
            timestamp: now,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A resident profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResidentProfile {
    /// Unique resident identifier.
    pub resident_id: String,
    /// Full name.
    pub name: String,
    /// Room assignment.
    pub room_number: String,
    /// Associated voice device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Level of care required.
    #[serde(default = "default_care_level")]
    pub care_level: String,
    /// Emergency contacts.
    #[serde(default)]
    pub emergency_contacts: Vec<HashMap<String, String>>,
    /// Communication preferences.
    #[serde(default)]
    pub preferences: HashMap<String, Value>,
    /// Whether the resident is currently active.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Record creation time.
    pub created_at: DateTime<Utc>,
    /// Last record update.
    pub updated_at: DateTime<Utc>,
}

fn default_care_level() -> String {
    "standard".to_owned()
}

fn default_true() -> bool {
    true
}

/// Health of a monitored component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    /// Working normally.
    Healthy,
    /// Working with reduced capacity.
    Degraded,
    /// Not working.
    Down,
}

/// Components the status monitor reports on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemComponent {
    /// Voice-assistant skill.
    AlexaSkill,
    /// Device-facing backend.
    LambdaBackend,
    /// Dashboard-facing backend.
    FastapiBackend,
    /// Caregiver dashboard.
    Dashboard,
    /// Record store.
    Dynamodb,
    /// Cross-process notification relay.
    Sns,
}

/// A component status report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// When the status was sampled.
    pub timestamp: DateTime<Utc>,
    /// Component being reported.
    pub component: SystemComponent,
    /// Current health.
    pub status: ComponentStatus,
    /// Performance metrics.
    #[serde(default)]
    pub metrics: HashMap<String, Value>,
    /// Active alerts.
    #[serde(default)]
    pub alerts: Vec<String>,
    /// Response time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    /// Uptime percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<f64>,
}
