//! Settings file loading and `CAREHUB_*` environment overrides.
//!
//! The file is parsed as loose JSON, layered over the serialized defaults
//! with [`deep_merge`], and only then deserialized into [`HubSettings`]. A
//! partial file therefore only needs the keys it changes.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{HubSettings, LogLevel};

/// Environment variable names recognized by [`apply_env_overrides`].
pub mod env {
    /// Bind host.
    pub const HOST: &str = "CAREHUB_HOST";
    /// Bind port, 1-65535.
    pub const PORT: &str = "CAREHUB_PORT";
    /// Per-connection outbound queue capacity.
    pub const QUEUE_CAPACITY: &str = "CAREHUB_QUEUE_CAPACITY";
    /// Largest inbound WebSocket message, in bytes.
    pub const MAX_MESSAGE_SIZE: &str = "CAREHUB_MAX_MESSAGE_SIZE";
    /// Comma-separated CORS origins.
    pub const CORS_ORIGINS: &str = "CAREHUB_CORS_ORIGINS";
    /// Log level name.
    pub const LOG_LEVEL: &str = "CAREHUB_LOG_LEVEL";
    /// Emit JSON log lines.
    pub const JSON_LOGS: &str = "CAREHUB_JSON_LOGS";
}

const QUEUE_CAPACITY_RANGE: (usize, usize) = (1, 1_000_000);
const MAX_MESSAGE_SIZE_RANGE: (usize, usize) = (1024, 16 * 1024 * 1024);

/// `~/.carehub/settings.json`, falling back to `/tmp` without `HOME`.
pub fn settings_path() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
        .join(".carehub")
        .join("settings.json")
}

/// [`load_settings_from_path`] on [`settings_path`].
pub fn load_settings() -> Result<HubSettings> {
    load_settings_from_path(&settings_path())
}

/// Load `path` over the defaults, then apply environment overrides.
///
/// A missing file yields the defaults. Unreadable files and invalid JSON
/// are errors.
pub fn load_settings_from_path(path: &Path) -> Result<HubSettings> {
    let mut settings = read_layered(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn read_layered(path: &Path) -> Result<HubSettings> {
    let base = serde_json::to_value(HubSettings::default())?;
    if !path.exists() {
        debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(serde_json::from_value(base)?);
    }
    let raw = std::fs::read_to_string(path)?;
    let overlay: Value = serde_json::from_str(&raw)?;
    debug!(path = %path.display(), "settings file loaded");
    Ok(serde_json::from_value(deep_merge(base, overlay))?)
}

/// Layer `overlay` on top of `base`.
///
/// Objects merge key by key, recursively. A `null` in the overlay keeps
/// the base value. Anything else in the overlay (arrays included) replaces
/// the base value outright.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut merged), Value::Object(layer)) => {
            for (key, value) in layer {
                if value.is_null() {
                    continue;
                }
                let combined = match merged.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = merged.insert(key, combined);
            }
            Value::Object(merged)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Apply `CAREHUB_*` environment variables to `settings`.
///
/// Values that fail to parse or fall outside their range are logged and
/// skipped, leaving the file or default value in place.
pub fn apply_env_overrides(settings: &mut HubSettings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Apply overrides looked up through `lookup` instead of the process
/// environment.
pub fn apply_overrides_from(settings: &mut HubSettings, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(host) = get(env::HOST) {
        settings.server.host = host.trim().to_owned();
    }
    if let Some(port) = checked(env::PORT, get(env::PORT), |v| parse_u16_range(v, 1, u16::MAX)) {
        settings.server.port = port;
    }
    let (lo, hi) = QUEUE_CAPACITY_RANGE;
    if let Some(cap) = checked(env::QUEUE_CAPACITY, get(env::QUEUE_CAPACITY), |v| {
        parse_usize_range(v, lo, hi)
    }) {
        settings.server.outbound_queue_capacity = cap;
    }
    let (lo, hi) = MAX_MESSAGE_SIZE_RANGE;
    if let Some(size) = checked(env::MAX_MESSAGE_SIZE, get(env::MAX_MESSAGE_SIZE), |v| {
        parse_usize_range(v, lo, hi)
    }) {
        settings.server.max_message_size = size;
    }
    if let Some(origins) = checked(env::CORS_ORIGINS, get(env::CORS_ORIGINS), |v| {
        Some(parse_list(v)).filter(|list| !list.is_empty())
    }) {
        settings.server.cors_origins = origins;
    }
    if let Some(level) = checked(env::LOG_LEVEL, get(env::LOG_LEVEL), parse_log_level) {
        settings.logging.level = level;
    }
    if let Some(json) = checked(env::JSON_LOGS, get(env::JSON_LOGS), parse_bool) {
        settings.logging.json = json;
    }
}

/// Run `parse` on a present value, warning when it is rejected.
fn checked<T>(key: &str, raw: Option<String>, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let raw = raw?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!(key, value = %raw, "ignoring invalid settings override");
    }
    parsed
}

/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`, any case.
pub fn parse_bool(val: &str) -> Option<bool> {
    const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];
    const FALSY: [&str; 4] = ["false", "0", "no", "off"];
    if TRUTHY.iter().any(|t| val.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if FALSY.iter().any(|f| val.eq_ignore_ascii_case(f)) {
        Some(false)
    } else {
        None
    }
}

/// A `u16` in `min..=max`.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    val.parse::<u16>().ok().filter(|n| (min..=max).contains(n))
}

/// A `usize` in `min..=max`.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    val.parse::<usize>().ok().filter(|n| (min..=max).contains(n))
}

/// A level name, any case (`INFO`, `warning`, `critical`, ...).
pub fn parse_log_level(val: &str) -> Option<LogLevel> {
    serde_json::from_value(Value::String(val.trim().to_lowercase())).ok()
}

/// Comma-separated entries, trimmed, empties dropped.
pub fn parse_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use carehub_core::logging::capture_logs;
    use serde_json::json;
    use std::collections::HashMap;

    fn write_settings(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, body).unwrap();
        (dir, path)
    }

    fn with_vars(pairs: &[(&str, &str)]) -> HubSettings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        let mut settings = HubSettings::default();
        apply_overrides_from(&mut settings, |key| vars.get(key).cloned());
        settings
    }

    #[test]
    fn settings_path_is_under_carehub_dir() {
        let path = settings_path();
        assert!(path.ends_with(".carehub/settings.json"));
    }

    #[test]
    fn merge_layers_nested_objects() {
        let base = json!({"server": {"host": "0.0.0.0", "port": 8000}, "name": "carehub"});
        let overlay = json!({"server": {"port": 9000}});
        let merged = deep_merge(base, overlay);
        assert_eq!(
            merged,
            json!({"server": {"host": "0.0.0.0", "port": 9000}, "name": "carehub"})
        );
    }

    #[test]
    fn merge_replaces_arrays_whole() {
        let base = json!({"corsOrigins": ["http://localhost:3000", "http://localhost:5173"]});
        let overlay = json!({"corsOrigins": ["https://care.example"]});
        assert_eq!(
            deep_merge(base, overlay)["corsOrigins"],
            json!(["https://care.example"])
        );
    }

    #[test]
    fn merge_skips_null_and_adds_new_keys() {
        let base = json!({"level": "info"});
        let overlay = json!({"level": null, "json": true});
        assert_eq!(deep_merge(base, overlay), json!({"level": "info", "json": true}));
    }

    #[test]
    fn merge_scalar_over_object() {
        let merged = deep_merge(json!({"server": {"port": 1}}), json!({"server": "off"}));
        assert_eq!(merged["server"], "off");
        assert_eq!(deep_merge(json!(3), Value::Null), json!(3));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = read_layered(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings.server.port, HubSettings::default().server.port);
        assert_eq!(settings.name, "carehub");
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let (_dir, path) = write_settings(
            r#"{"server": {"port": 9100, "corsOrigins": ["https://care.example"]},
                "logging": {"level": "debug"}}"#,
        );
        let settings = read_layered(&path).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.cors_origins, vec!["https://care.example"]);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.outbound_queue_capacity, 1024);
        assert_eq!(settings.logging.level, LogLevel::Debug);
    }

    #[test]
    fn null_in_file_keeps_default() {
        let (_dir, path) = write_settings(r#"{"server": {"host": null}}"#);
        assert_eq!(read_layered(&path).unwrap().server.host, "0.0.0.0");
    }

    #[test]
    fn invalid_json_is_an_error() {
        let (_dir, path) = write_settings("{ port: 80 ");
        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn wrong_type_is_an_error() {
        let (_dir, path) = write_settings(r#"{"server": {"port": "eighty"}}"#);
        assert!(matches!(read_layered(&path), Err(SettingsError::Json(_))));
    }

    #[test]
    fn overrides_apply_to_every_field() {
        let settings = with_vars(&[
            (env::HOST, "127.0.0.1"),
            (env::PORT, "9200"),
            (env::QUEUE_CAPACITY, "64"),
            (env::MAX_MESSAGE_SIZE, "4096"),
            (env::CORS_ORIGINS, "https://a.example, https://b.example"),
            (env::LOG_LEVEL, "WARNING"),
            (env::JSON_LOGS, "yes"),
        ]);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9200);
        assert_eq!(settings.server.outbound_queue_capacity, 64);
        assert_eq!(settings.server.max_message_size, 4096);
        assert_eq!(
            settings.server.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(settings.logging.level, LogLevel::Warn);
        assert!(settings.logging.json);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let defaults = HubSettings::default();
        let settings = with_vars(&[
            (env::PORT, "0"),
            (env::QUEUE_CAPACITY, "0"),
            (env::MAX_MESSAGE_SIZE, "12"),
            (env::CORS_ORIGINS, " , "),
            (env::LOG_LEVEL, "loud"),
            (env::JSON_LOGS, "sometimes"),
            (env::HOST, "   "),
        ]);
        assert_eq!(settings.server.port, defaults.server.port);
        assert_eq!(
            settings.server.outbound_queue_capacity,
            defaults.server.outbound_queue_capacity
        );
        assert_eq!(settings.server.max_message_size, defaults.server.max_message_size);
        assert_eq!(settings.server.cors_origins, defaults.server.cors_origins);
        assert_eq!(settings.server.host, defaults.server.host);
        assert_eq!(settings.logging.level, LogLevel::Info);
        assert!(!settings.logging.json);
    }

    #[test]
    fn invalid_override_is_logged() {
        let (logs, _guard) = capture_logs();
        let _ = with_vars(&[(env::PORT, "99999")]);
        let events = logs.matching("ignoring invalid settings override");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].field("key"), Some(env::PORT));
        assert_eq!(events[0].field("value"), Some("99999"));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for truthy in ["true", "1", "YES", "On"] {
            assert_eq!(parse_bool(truthy), Some(true), "{truthy}");
        }
        for falsy in ["FALSE", "0", "no", "Off"] {
            assert_eq!(parse_bool(falsy), Some(false), "{falsy}");
        }
        assert_eq!(parse_bool("enabled"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn parse_ranges_are_inclusive() {
        assert_eq!(parse_u16_range("1", 1, 10), Some(1));
        assert_eq!(parse_u16_range("10", 1, 10), Some(10));
        assert_eq!(parse_u16_range("11", 1, 10), None);
        assert_eq!(parse_u16_range("-1", 1, 10), None);
        assert_eq!(parse_usize_range("1024", 1024, 2048), Some(1024));
        assert_eq!(parse_usize_range("1023", 1024, 2048), None);
        assert_eq!(parse_usize_range("lots", 1, 2), None);
    }

    #[test]
    fn parse_log_level_aliases() {
        assert_eq!(parse_log_level("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(parse_log_level(" warning "), Some(LogLevel::Warn));
        assert_eq!(parse_log_level("critical"), Some(LogLevel::Fatal));
        assert_eq!(parse_log_level("verbose"), None);
    }

    #[test]
    fn parse_list_trims_entries() {
        assert_eq!(parse_list("a, b ,,c"), vec!["a", "b", "c"]);
        assert!(parse_list(" , ").is_empty());
    }
}
