// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Durable key-value storage of recent log entries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde_json::Value;

use super::entry::LogEntry;
use crate::error::StorageError;

const PROBE_KEY: &str = "__visor_ifc_log_test__";

/// String key-value storage that survives restarts.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local store, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object file.
///
/// Every write rewrites the whole file. A missing file reads as empty.
/// Calls block on file I/O; [`LogStore`](super::LogStore) only reaches it
/// from its blocking pool.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<serde_json::Map<String, Value>, StorageError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(serde_json::Map::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(serde_json::Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &serde_json::Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec(map)?)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let map = self.read_map()?;
        Ok(map.get(key).and_then(Value::as_str).map(str::to_owned))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write_map(&map)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// The capped JSON array of recent entries kept under one storage key.
pub struct DurableLog {
    store: Option<Arc<dyn KeyValueStore>>,
    key: String,
    cap: usize,
    supported: OnceLock<bool>,
    /// Serializes read-modify-write of the stored array.
    write_lock: Mutex<()>,
}

impl DurableLog {
    pub fn new(store: Option<Arc<dyn KeyValueStore>>, key: impl Into<String>, cap: usize) -> Self {
        Self {
            store,
            key: key.into(),
            cap,
            supported: OnceLock::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Whether the store accepts writes. Probed once, then cached.
    pub fn is_supported(&self) -> bool {
        *self.supported.get_or_init(|| match &self.store {
            None => false,
            Some(store) => {
                let probe = store
                    .set_item(PROBE_KEY, "1")
                    .and_then(|()| store.remove_item(PROBE_KEY));
                if let Err(e) = &probe {
                    tracing::debug!(error = %e, "Durable log storage unavailable");
                }
                probe.is_ok()
            }
        })
    }

    fn store(&self) -> Option<&Arc<dyn KeyValueStore>> {
        if self.is_supported() {
            self.store.as_ref()
        } else {
            None
        }
    }

    /// Append an entry, keeping only the most recent `cap`. Failures only warn.
    pub fn persist(&self, entry: &LogEntry) {
        let Some(store) = self.store() else {
            return;
        };
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.try_persist(store.as_ref(), entry) {
            tracing::warn!(error = %e, key = %self.key, "Could not persist log entry");
        }
    }

    fn try_persist(&self, store: &dyn KeyValueStore, entry: &LogEntry) -> Result<(), StorageError> {
        let raw = store.get_item(&self.key)?;
        let stored: Value = serde_json::from_str(raw.as_deref().unwrap_or("[]"))?;
        // Something other than our array lives under the key; leave it alone.
        let Value::Array(mut entries) = stored else {
            return Ok(());
        };
        entries.push(serde_json::to_value(entry.to_stored())?);
        if entries.len() > self.cap {
            let excess = entries.len() - self.cap;
            entries.drain(..excess);
        }
        store.set_item(&self.key, &serde_json::to_string(&entries)?)
    }

    /// All persisted entries, oldest first.
    pub fn load(&self) -> Vec<LogEntry> {
        let Some(store) = self.store() else {
            return Vec::new();
        };
        let stored = store
            .get_item(&self.key)
            .and_then(|raw| Ok(serde_json::from_str::<Value>(raw.as_deref().unwrap_or("[]"))?));
        match stored {
            Ok(Value::Array(entries)) => entries.iter().map(LogEntry::from_stored_value).collect(),
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, key = %self.key, "Could not restore previous log entries");
                Vec::new()
            }
        }
    }

    /// Number of entries currently persisted.
    pub fn persisted_len(&self) -> usize {
        self.store()
            .and_then(|store| store.get_item(&self.key).ok().flatten())
            .and_then(|raw| serde_json::from_str::<Vec<Value>>(&raw).ok())
            .map_or(0, |entries| entries.len())
    }
}
