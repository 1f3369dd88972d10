//! Settings storage trait and error type.

use thiserror::Error;

use super::SettingValue;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Unknown setting: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Persisted overrides. Keys without a row use the registry default.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Vec<(String, SettingValue)>, SettingsError>;

    fn save(&self, key: &str, value: &SettingValue) -> Result<(), SettingsError>;
}
