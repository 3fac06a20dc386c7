//! Errors from loading `settings.json`.

use thiserror::Error;

/// Why settings could not be loaded.
///
/// A missing file is not an error; only a file that exists but cannot be
/// read or decoded is.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file exists but reading it failed.
    #[error("settings file unreadable: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not JSON, or a value has the wrong type.
    #[error("settings file invalid: {0}")]
    Json(#[from] serde_json::Error),
}

/// `Result` alias for settings loading.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_mention_the_file() {
        let err: SettingsError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(err.to_string(), "settings file unreadable: denied");
    }

    #[test]
    fn json_errors_convert() {
        let err: SettingsError = serde_json::from_str::<u16>("\"eighty\"").unwrap_err().into();
        assert!(matches!(err, SettingsError::Json(_)));
        assert!(err.to_string().starts_with("settings file invalid"));
    }
}
