//! Runtime-editable settings with typed defaults.

mod registry;
mod service;
mod sqlite;
mod store;

pub use registry::{definition, definitions, keys, SettingDefinition, SettingType, SettingValue};
pub use service::{SettingsMap, SettingsService};
pub use sqlite::SqliteSettingsStore;
pub use store::{SettingsError, SettingsStore};
