//! The known settings, their types and defaults.

use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Setting keys.
pub mod keys {
    pub const JOBS_MAX_ATTEMPTS: &str = "jobs.max_attempts";
    pub const IMPORTS_MAX_ATTEMPTS: &str = "imports.max_attempts";
    pub const IMPORTS_VERIFY_COPIES: &str = "imports.verify_copies";
    pub const SITE_TITLE: &str = "site.title";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingType {
    Int,
    Bool,
    Text,
}

impl SettingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingType::Int => "int",
            SettingType::Bool => "bool",
            SettingType::Text => "text",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "int" => Some(SettingType::Int),
            "bool" => Some(SettingType::Bool),
            "text" => Some(SettingType::Text),
            _ => None,
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed setting value. Serializes as the bare JSON value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl SettingValue {
    pub fn value_type(&self) -> SettingType {
        match self {
            SettingValue::Bool(_) => SettingType::Bool,
            SettingValue::Int(_) => SettingType::Int,
            SettingValue::Text(_) => SettingType::Text,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Interpret a JSON value as `value_type`.
    pub fn from_json(value_type: SettingType, json: &serde_json::Value) -> Option<Self> {
        match value_type {
            SettingType::Int => json.as_i64().map(SettingValue::Int),
            SettingType::Bool => json.as_bool().map(SettingValue::Bool),
            SettingType::Text => json.as_str().map(|s| SettingValue::Text(s.to_string())),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SettingValue::Bool(v) => serde_json::Value::Bool(*v),
            SettingValue::Int(v) => serde_json::Value::from(*v),
            SettingValue::Text(v) => serde_json::Value::String(v.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingDefinition {
    pub key: &'static str,
    pub value_type: SettingType,
    pub default: SettingValue,
    pub description: &'static str,
    /// Lower bound for int settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
}

static DEFINITIONS: Lazy<Vec<SettingDefinition>> = Lazy::new(|| {
    vec![
        SettingDefinition {
            key: keys::JOBS_MAX_ATTEMPTS,
            value_type: SettingType::Int,
            default: SettingValue::Int(10),
            description: "Attempts before a download job fails",
            min: Some(1),
        },
        SettingDefinition {
            key: keys::IMPORTS_MAX_ATTEMPTS,
            value_type: SettingType::Int,
            default: SettingValue::Int(5),
            description: "Attempts before an import task fails",
            min: Some(1),
        },
        SettingDefinition {
            key: keys::IMPORTS_VERIFY_COPIES,
            value_type: SettingType::Bool,
            default: SettingValue::Bool(false),
            description: "Checksum copied files against their source",
            min: None,
        },
        SettingDefinition {
            key: keys::SITE_TITLE,
            value_type: SettingType::Text,
            default: SettingValue::Text("Snaggle".to_string()),
            description: "Title shown by clients",
            min: None,
        },
    ]
});

pub fn definitions() -> &'static [SettingDefinition] {
    &DEFINITIONS
}

pub fn definition(key: &str) -> Option<&'static SettingDefinition> {
    DEFINITIONS.iter().find(|d| d.key == key)
}
