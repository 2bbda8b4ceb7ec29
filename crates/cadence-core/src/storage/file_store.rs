//! JSON-file-backed durable store.
//!
//! The whole key space lives in one `store.json` under the data directory,
//! cached in memory and written through on every batch.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use tokio::sync::broadcast;

use super::{data_dir, DurableStore, StoreChange, StoreKey};
use crate::error::StoreError;

const STORE_FILE: &str = "store.json";

pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, serde_json::Value>>,
    changes: broadcast::Sender<StoreChange>,
}

impl FileStore {
    /// Open (or create) the store at the default data directory.
    pub fn open_default() -> Result<Self, StoreError> {
        Ok(Self::open(data_dir()?.join(STORE_FILE))?)
    }

    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            HashMap::new()
        };
        let (changes, _) = broadcast::channel(64);
        Ok(Self {
            path,
            entries: Mutex::new(entries),
            changes,
        })
    }

    fn persist(&self, entries: &HashMap<String, serde_json::Value>) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}

impl DurableStore for FileStore {
    fn get_raw(&self, key: StoreKey) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.entries.lock().unwrap().get(key.as_str()).cloned())
    }

    fn set_raw(&self, batch: Vec<(StoreKey, serde_json::Value)>) -> Result<(), StoreError> {
        let keys: Vec<StoreKey> = batch.iter().map(|(key, _)| *key).collect();
        {
            let mut guard = self.entries.lock().unwrap();
            for (key, value) in batch {
                guard.insert(key.as_str().to_string(), value);
            }
            self.persist(&guard)?;
        }
        let _ = self.changes.send(StoreChange { keys });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
