// ABOUTME: JSON key/value file used for persisted settings and credentials
// ABOUTME: Writes go to a temp file first and are renamed into place

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct Inner {
    /// None for a purely in-memory store
    path: Option<PathBuf>,
    data: Mutex<Map<String, Value>>,
}

/// A small persistent key/value store. Clones share the same data.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<Inner>,
}

impl LocalStore {
    /// Open the store at `path`, starting empty if the file does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
        } else {
            Map::new()
        };
        tracing::debug!(path = %path.display(), keys = data.len(), "Opened local store");
        Ok(Self {
            inner: Arc::new(Inner {
                path: Some(path),
                data: Mutex::new(data),
            }),
        })
    }

    /// A store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Inner {
                path: None,
                data: Mutex::new(Map::new()),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.inner.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read and deserialize the value under `key`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let data = self.lock();
        match data.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .with_context(|| format!("Failed to decode stored value for '{}'", key)),
        }
    }

    /// Store `value` under `key` and persist
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("Failed to encode value for '{}'", key))?;
        let mut data = self.lock();
        data.insert(key.to_string(), value);
        self.persist(&data)
    }

    /// Remove `key` and persist. Removing a missing key is not an error.
    pub fn remove(&self, key: &str) -> Result<()> {
        let mut data = self.lock();
        if data.remove(key).is_some() {
            self.persist(&data)?;
        }
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    fn persist(&self, data: &Map<String, Value>) -> Result<()> {
        let Some(path) = &self.inner.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(data).context("Failed to encode store")?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove_in_memory() {
        let store = LocalStore::in_memory();
        assert_eq!(store.get::<String>("k").unwrap(), None);

        store.set("k", &"v".to_string()).unwrap();
        assert_eq!(store.get::<String>("k").unwrap(), Some("v".to_string()));
        assert!(store.contains("k"));

        store.remove("k").unwrap();
        assert!(!store.contains("k"));
        store.remove("k").unwrap();
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = LocalStore::open(&path).unwrap();
        store.set("count", &3u32).unwrap();
        assert!(path.exists());

        let reopened = LocalStore::open(&path).unwrap();
        assert_eq!(reopened.get::<u32>("count").unwrap(), Some(3));
    }

    #[test]
    fn test_clones_share_data() {
        let store = LocalStore::in_memory();
        let other = store.clone();
        store.set("shared", &true).unwrap();
        assert_eq!(other.get::<bool>("shared").unwrap(), Some(true));
    }

    #[test]
    fn test_wrong_type_is_an_error() {
        let store = LocalStore::in_memory();
        store.set("n", &"not a number").unwrap();
        assert!(store.get::<u32>("n").is_err());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(LocalStore::open(&path).is_err());
    }
}
