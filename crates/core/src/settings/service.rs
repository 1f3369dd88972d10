//! Cached settings access.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use super::registry::{definition, definitions, keys};
use super::{SettingValue, SettingsError, SettingsStore};

/// Every registered key with its effective value.
pub type SettingsMap = BTreeMap<String, SettingValue>;

/// Reads settings through a cache that every write invalidates.
///
/// A load that overlaps an invalidation is returned to its caller but never
/// cached; `generation` is bumped under the cache lock on every invalidation.
pub struct SettingsService {
    store: Arc<dyn SettingsStore>,
    cache: RwLock<Option<Arc<SettingsMap>>>,
    generation: AtomicU64,
}

impl SettingsService {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Defaults overlaid with stored values. Stored values of the wrong type or
    /// for unknown keys are ignored.
    pub fn get_all(&self) -> Result<Arc<SettingsMap>, SettingsError> {
        if let Some(cached) = self
            .cache
            .read()
            .map_err(|_| SettingsError::Database("settings cache poisoned".to_string()))?
            .as_ref()
        {
            return Ok(Arc::clone(cached));
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let mut map: SettingsMap = definitions()
            .iter()
            .map(|d| (d.key.to_string(), d.default.clone()))
            .collect();
        for (key, value) in self.store.load()? {
            match definition(&key) {
                Some(def) if def.value_type == value.value_type() => {
                    map.insert(key, value);
                }
                Some(def) => warn!(
                    key = %key,
                    expected = %def.value_type,
                    actual = %value.value_type(),
                    "Ignoring stored setting with wrong type"
                ),
                None => warn!(key = %key, "Ignoring stored setting with unknown key"),
            }
        }

        let map = Arc::new(map);
        let mut cache = self
            .cache
            .write()
            .map_err(|_| SettingsError::Database("settings cache poisoned".to_string()))?;
        if self.generation.load(Ordering::SeqCst) == generation {
            *cache = Some(Arc::clone(&map));
        }
        Ok(map)
    }

    pub fn get(&self, key: &str) -> Result<SettingValue, SettingsError> {
        self.get_all()?
            .get(key)
            .cloned()
            .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))
    }

    /// Validate `value` against the registry, persist it and drop the cache.
    pub fn set(&self, key: &str, value: &serde_json::Value) -> Result<SettingValue, SettingsError> {
        let def = definition(key).ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;
        let typed = SettingValue::from_json(def.value_type, value).ok_or_else(|| {
            SettingsError::InvalidValue {
                key: key.to_string(),
                reason: format!("expected {}", def.value_type),
            }
        })?;
        if let (Some(min), Some(v)) = (def.min, typed.as_int()) {
            if v < min {
                return Err(SettingsError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("must be at least {}", min),
                });
            }
        }

        self.store.save(key, &typed)?;
        self.invalidate();
        info!(key = %key, value = ?typed, "Setting updated");
        Ok(typed)
    }

    pub fn invalidate(&self) {
        let mut cache = match self.cache.write() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.generation.fetch_add(1, Ordering::SeqCst);
        *cache = None;
    }

    fn int_setting(&self, key: &str) -> Result<u32, SettingsError> {
        let value = self.get(key)?;
        value
            .as_int()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| SettingsError::InvalidValue {
                key: key.to_string(),
                reason: "not a positive integer".to_string(),
            })
    }

    pub fn jobs_max_attempts(&self) -> Result<u32, SettingsError> {
        self.int_setting(keys::JOBS_MAX_ATTEMPTS)
    }

    pub fn imports_max_attempts(&self) -> Result<u32, SettingsError> {
        self.int_setting(keys::IMPORTS_MAX_ATTEMPTS)
    }

    pub fn verify_copies(&self) -> Result<bool, SettingsError> {
        Ok(self
            .get(keys::IMPORTS_VERIFY_COPIES)?
            .as_bool()
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SqliteSettingsStore;
    use serde_json::json;
    use std::sync::atomic::AtomicBool;
    use std::sync::Barrier;

    fn create_service() -> (Arc<SqliteSettingsStore>, SettingsService) {
        let store = Arc::new(SqliteSettingsStore::in_memory().unwrap());
        let service = SettingsService::new(store.clone());
        (store, service)
    }

    #[test]
    fn test_defaults() {
        let (_, service) = create_service();
        let all = service.get_all().unwrap();
        assert_eq!(all.len(), definitions().len());
        assert_eq!(service.jobs_max_attempts().unwrap(), 10);
        assert_eq!(service.imports_max_attempts().unwrap(), 5);
        assert!(!service.verify_copies().unwrap());
        assert_eq!(
            service.get(keys::SITE_TITLE).unwrap(),
            SettingValue::Text("Snaggle".to_string())
        );
    }

    #[test]
    fn test_set_invalidates_cache() {
        let (_, service) = create_service();
        let before = service.get_all().unwrap();
        service.set(keys::IMPORTS_VERIFY_COPIES, &json!(true)).unwrap();
        let after = service.get_all().unwrap();

        assert_eq!(before[keys::IMPORTS_VERIFY_COPIES], SettingValue::Bool(false));
        assert_eq!(after[keys::IMPORTS_VERIFY_COPIES], SettingValue::Bool(true));
        assert!(service.verify_copies().unwrap());
    }

    #[test]
    fn test_cache_is_reused_until_invalidated() {
        let (store, service) = create_service();
        let first = service.get_all().unwrap();
        store.save(keys::JOBS_MAX_ATTEMPTS, &SettingValue::Int(2)).unwrap();

        assert!(Arc::ptr_eq(&first, &service.get_all().unwrap()));
        service.invalidate();
        assert_eq!(service.jobs_max_attempts().unwrap(), 2);
    }

    /// Parks the first `load` after it has read the rows, until released.
    struct ParkedStore {
        inner: SqliteSettingsStore,
        parked: AtomicBool,
        barrier: Barrier,
    }

    impl SettingsStore for ParkedStore {
        fn load(&self) -> Result<Vec<(String, SettingValue)>, SettingsError> {
            let rows = self.inner.load()?;
            if !self.parked.swap(true, Ordering::SeqCst) {
                self.barrier.wait();
                self.barrier.wait();
            }
            Ok(rows)
        }

        fn save(&self, key: &str, value: &SettingValue) -> Result<(), SettingsError> {
            self.inner.save(key, value)
        }
    }

    #[test]
    fn test_write_during_load_is_not_lost() {
        let store = Arc::new(ParkedStore {
            inner: SqliteSettingsStore::in_memory().unwrap(),
            parked: AtomicBool::new(false),
            barrier: Barrier::new(2),
        });
        let service = Arc::new(SettingsService::new(store.clone()));

        let reader = {
            let service = Arc::clone(&service);
            std::thread::spawn(move || service.jobs_max_attempts().unwrap())
        };
        store.barrier.wait();
        service.set(keys::JOBS_MAX_ATTEMPTS, &json!(3)).unwrap();
        store.barrier.wait();

        assert_eq!(reader.join().unwrap(), 10);
        assert_eq!(service.jobs_max_attempts().unwrap(), 3);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let (_, service) = create_service();
        assert!(matches!(
            service.set("nope", &json!(1)),
            Err(SettingsError::UnknownKey(_))
        ));
        assert!(matches!(
            service.set(keys::JOBS_MAX_ATTEMPTS, &json!("ten")),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            service.set(keys::JOBS_MAX_ATTEMPTS, &json!(0)),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert_eq!(service.jobs_max_attempts().unwrap(), 10);
    }

    #[test]
    fn test_mistyped_stored_value_is_ignored() {
        let (store, service) = create_service();
        store
            .save(keys::JOBS_MAX_ATTEMPTS, &SettingValue::Text("x".into()))
            .unwrap();
        store.save("legacy.key", &SettingValue::Int(1)).unwrap();
        assert_eq!(service.jobs_max_attempts().unwrap(), 10);
        assert!(!service.get_all().unwrap().contains_key("legacy.key"));
    }
}
