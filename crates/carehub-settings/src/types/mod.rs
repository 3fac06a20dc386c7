//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`,
//! so a settings file only needs the keys it changes.

mod server;

pub use server::*;

use serde::{Deserialize, Serialize};

/// Root settings for the hub.
///
/// Loaded from `~/.carehub/settings.json` with defaults applied for
/// missing fields. Environment variables can override specific values.
///
/// ```json
/// {
///   "server": { "port": 9000, "corsOrigins": ["*"] },
///   "logging": { "level": "debug", "json": true }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Network and connection limits.
    pub server: ServerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "carehub".to_string(),
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_serialize_round_trip() {
        let settings = HubSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: HubSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "carehub");
        assert_eq!(back.server.port, settings.server.port);
    }

    #[test]
    fn empty_object_is_defaults() {
        let settings: HubSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.version, "0.1.0");
        assert_eq!(settings.logging.level, LogLevel::Info);
    }

    #[test]
    fn unknown_keys_ignored() {
        let settings: HubSettings =
            serde_json::from_str(r#"{"legacy": true, "server": {"port": 8100}}"#).unwrap();
        assert_eq!(settings.server.port, 8100);
    }
}
