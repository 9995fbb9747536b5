//! Persistent key-value storage
//!
//! A small async key-value interface in the shape of browser extension storage. Values are
//! JSON; typed access goes through [`load`] and [`save`].

use crate::error::{AutofillError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};

/// Storage keys used by the extension
pub mod keys {
    pub const PROPERTIES: &str = "properties";
    pub const THEME: &str = "theme";
    pub const SETTINGS: &str = "settings";
    pub const SELECTED_PROPERTY_ID: &str = "selectedPropertyId";
    pub const AUTH_TOKEN: &str = "authToken";
    pub const LAST_SYNC: &str = "lastSync";

    /// Everything cleared on logout
    pub const ALL: [&str; 6] = [PROPERTIES, THEME, SETTINGS, SELECTED_PROPERTY_ID, AUTH_TOKEN, LAST_SYNC];
}

/// Async key-value store
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write several keys at once
    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()>;

    async fn remove(&self, keys: &[&str]) -> Result<()>;

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.set_many(vec![(key.to_string(), value)]).await
    }
}

/// Read `key` as `T`; a stored value of the wrong shape is an error, a missing one is `None`
pub async fn load<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Result<Option<T>> {
    match storage.get(key).await? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| AutofillError::Storage(format!("Corrupt value for '{}': {}", key, e))),
    }
}

pub async fn save<T: Serialize + ?Sized>(storage: &dyn Storage, key: &str, value: &T) -> Result<()> {
    storage.set(key, serde_json::to_value(value)?).await
}

/// Process-local storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()> {
        self.entries.write().await.extend(entries);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

/// All keys in one JSON object on disk
pub struct JsonFileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(AutofillError::Storage(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
        }
    }

    async fn write_all(&self, map: Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&Value::Object(map))?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        log::trace!("Wrote storage file {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_all().await?;
        map.extend(entries);
        self.write_all(map).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_all().await?;
        for key in keys {
            map.remove(*key);
        }
        self.write_all(map).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Settings;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_roundtrip_and_remove() {
        let storage = MemoryStorage::new();
        save(&storage, keys::SELECTED_PROPERTY_ID, "42").await.unwrap();
        storage.set(keys::AUTH_TOKEN, json!("abc")).await.unwrap();
        assert_eq!(storage.len().await, 2);

        let selected: Option<String> = load(&storage, keys::SELECTED_PROPERTY_ID).await.unwrap();
        assert_eq!(selected.as_deref(), Some("42"));

        storage.remove(&keys::ALL).await.unwrap();
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_null_reads_as_missing() {
        let storage = MemoryStorage::new();
        storage.set(keys::SELECTED_PROPERTY_ID, Value::Null).await.unwrap();
        let selected: Option<String> = load(&storage, keys::SELECTED_PROPERTY_ID).await.unwrap();
        assert_eq!(selected, None);
    }

    #[tokio::test]
    async fn test_corrupt_value_is_an_error() {
        let storage = MemoryStorage::new();
        storage.set(keys::SETTINGS, json!("not an object")).await.unwrap();
        let err = load::<Settings>(&storage, keys::SETTINGS).await.unwrap_err();
        assert!(matches!(err, AutofillError::Storage(msg) if msg.contains("settings")));
    }

    #[tokio::test]
    async fn test_file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("store.json");

        let first = JsonFileStorage::new(&path);
        assert_eq!(first.get(keys::THEME).await.unwrap(), None);
        first
            .set_many(vec![
                (keys::THEME.to_string(), json!({ "company_name": "Axis" })),
                (keys::LAST_SYNC.to_string(), json!(1_700_000_000)),
            ])
            .await
            .unwrap();
        first.remove(&[keys::LAST_SYNC]).await.unwrap();

        let second = JsonFileStorage::new(&path);
        assert_eq!(
            second.get(keys::THEME).await.unwrap(),
            Some(json!({ "company_name": "Axis" }))
        );
        assert_eq!(second.get(keys::LAST_SYNC).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_storage_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, "[1, 2]").await.unwrap();
        assert!(JsonFileStorage::new(&path).get(keys::THEME).await.is_err());
    }
}
