//! # carehub-settings
//!
//! Layered configuration for the CareHub hub.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`HubSettings::default()`]
//! 2. **Settings file**: `~/.carehub/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `CAREHUB_*` overrides (highest priority)
//!
//! There is no process-global settings instance: the binary loads settings
//! once at startup and passes what each component needs down explicitly.
//!
//! # Usage
//!
//! ```no_run
//! let settings = carehub_settings::load_settings().unwrap_or_default();
//! println!("listening on {}:{}", settings.server.host, settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = HubSettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = HubSettings::default();
        assert_eq!(settings.name, "carehub");
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.server.outbound_queue_capacity, 1024);
        assert_eq!(settings.logging.level, LogLevel::Info);
        assert!(!settings.logging.json);
    }
}
