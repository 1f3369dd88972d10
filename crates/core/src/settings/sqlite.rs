//! SQLite-backed settings store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::warn;

use super::{SettingType, SettingValue, SettingsError, SettingsStore};
use crate::db;

pub struct SqliteSettingsStore {
    conn: Mutex<Connection>,
}

impl SqliteSettingsStore {
    pub fn new(path: &Path) -> Result<Self, SettingsError> {
        let conn = db::open(path).map_err(|e| SettingsError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, SettingsError> {
        let conn = db::open_in_memory().map_err(|e| SettingsError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), SettingsError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value_type TEXT NOT NULL,
                value_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| SettingsError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SettingsError> {
        self.conn
            .lock()
            .map_err(|_| SettingsError::Database("connection lock poisoned".to_string()))
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn load(&self) -> Result<Vec<(String, SettingValue)>, SettingsError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT key, value_type, value_json FROM settings ORDER BY key")
            .map_err(|e| SettingsError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| SettingsError::Database(e.to_string()))?;

        let mut values = Vec::new();
        for row in rows {
            let (key, value_type, value_json) =
                row.map_err(|e| SettingsError::Database(e.to_string()))?;
            let parsed = SettingType::parse(&value_type).and_then(|t| {
                serde_json::from_str::<serde_json::Value>(&value_json)
                    .ok()
                    .and_then(|json| SettingValue::from_json(t, &json))
            });
            match parsed {
                Some(value) => values.push((key, value)),
                None => warn!(key = %key, value_type = %value_type, "Skipping unreadable setting row"),
            }
        }
        Ok(values)
    }

    fn save(&self, key: &str, value: &SettingValue) -> Result<(), SettingsError> {
        let value_json = serde_json::to_string(&value.to_json())
            .map_err(|e| SettingsError::Serialization(e.to_string()))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value_type, value_json, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                value_type = excluded.value_type,
                value_json = excluded.value_json,
                updated_at = excluded.updated_at",
            params![
                key,
                value.value_type().as_str(),
                value_json,
                db::format_ts(&Utc::now())
            ],
        )
        .map_err(|e| SettingsError::Database(e.to_string()))?;
        Ok(())
    }
}
