use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("legacy store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("legacy store {path} is not a JSON object: {detail}")]
    Corrupt { path: PathBuf, detail: String },
    #[error("serialize legacy store: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("legacy store is closed")]
    Closed,
}

trait DocumentStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn delete(&self, key: &str) -> bool;
    fn save(&self) -> Result<(), StoreError>;
    fn path(&self) -> Option<&Path>;
}

fn lock(data: &Mutex<Map<String, Value>>) -> MutexGuard<'_, Map<String, Value>> {
    // A panic mid-write leaves a whole `Value` behind, never a torn one.
    data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Key/value document persisted as one JSON object on disk.
struct JsonFileStore {
    path: PathBuf,
    data: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    fn open(path: &Path) -> Result<Self, StoreError> {
        let data = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if raw.trim().is_empty() {
                Map::new()
            } else {
                match serde_json::from_str::<Value>(&raw) {
                    Ok(Value::Object(map)) => map,
                    Ok(other) => {
                        return Err(StoreError::Corrupt {
                            path: path.to_path_buf(),
                            detail: format!("found {}", json_kind(&other)),
                        })
                    }
                    Err(err) => {
                        return Err(StoreError::Corrupt {
                            path: path.to_path_buf(),
                            detail: err.to_string(),
                        })
                    }
                }
            }
        } else {
            Map::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            data: Mutex::new(data),
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl DocumentStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.data).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        lock(&self.data).insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) -> bool {
        lock(&self.data).remove(key).is_some()
    }

    fn save(&self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&*lock(&self.data))?;
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        crate::db::write_atomic(&self.path, &bytes).map_err(io_err)?;
        info!(
            target: "payroll",
            event = "legacy_store_saved",
            path = %self.path.display(),
            bytes = bytes.len()
        );
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

#[derive(Default)]
struct MemoryStore {
    data: Mutex<Map<String, Value>>,
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.data).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        lock(&self.data).insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) -> bool {
        lock(&self.data).remove(key).is_some()
    }

    fn save(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        None
    }
}

/// Shared handle to the legacy document store. Cloning shares the store;
/// `close` affects every clone.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<dyn DocumentStore>,
    closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("path", &self.inner.path())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl StoreHandle {
    pub fn open_file(path: &Path) -> Result<Self, StoreError> {
        let store = JsonFileStore::open(path)?;
        info!(target: "payroll", event = "legacy_store_open", path = %path.display());
        Ok(Self::from_store(Arc::new(store)))
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::default()))
    }

    fn from_store(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.inner.path().map(Path::to_path_buf)
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_open()?;
        Ok(self.inner.get(key))
    }

    pub fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.inner.set(key, value);
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.ensure_open()?;
        Ok(self.inner.delete(key))
    }

    pub fn save(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.inner.save()
    }

    /// Sets `key` and saves. When the save fails the previous value is put
    /// back, so readers never see a value that did not reach disk.
    pub fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.ensure_open()?;
        let previous = self.inner.get(key);
        self.inner.set(key, value);
        if let Err(err) = self.inner.save() {
            match previous {
                Some(previous) => self.inner.set(key, previous),
                None => {
                    self.inner.delete(key);
                }
            }
            warn!(target: "payroll", event = "legacy_store_put_reverted", key, error = %err);
            return Err(err);
        }
        Ok(())
    }

    /// Flushes to disk and releases the handle. Closing twice is a no-op.
    pub fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.inner.save();
        if let Err(err) = &result {
            warn!(target: "payroll", event = "legacy_store_close_save_failed", error = %err);
        }
        result
    }
}
