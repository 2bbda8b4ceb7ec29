//! In-memory store used by tests and ephemeral hosts.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use super::{DurableStore, StoreChange, StoreKey};
use crate::error::StoreError;

pub struct MemoryStore {
    entries: Mutex<HashMap<&'static str, serde_json::Value>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            entries: Mutex::new(HashMap::new()),
            changes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableStore for MemoryStore {
    fn get_raw(&self, key: StoreKey) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.entries.lock().unwrap().get(key.as_str()).cloned())
    }

    fn set_raw(&self, entries: Vec<(StoreKey, serde_json::Value)>) -> Result<(), StoreError> {
        let keys: Vec<StoreKey> = entries.iter().map(|(key, _)| *key).collect();
        {
            let mut guard = self.entries.lock().unwrap();
            for (key, value) in entries {
                guard.insert(key.as_str(), value);
            }
        }
        let _ = self.changes.send(StoreChange { keys });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;
    use std::sync::Arc;

    #[tokio::test]
    async fn set_notifies_subscribers() {
        let store = Store::new(Arc::new(MemoryStore::new()));
        let mut changes = store.subscribe();
        store.set(StoreKey::Settings, &serde_json::json!({"focusTime": 60})).unwrap();

        let change = changes.recv().await.unwrap();
        assert_eq!(change.keys, vec![StoreKey::Settings]);
        let value: serde_json::Value = store.get(StoreKey::Settings).unwrap().unwrap();
        assert_eq!(value["focusTime"], 60);
    }

    #[test]
    fn missing_key_reads_none() {
        let store = Store::new(Arc::new(MemoryStore::new()));
        assert!(store
            .get::<serde_json::Value>(StoreKey::Session)
            .unwrap()
            .is_none());
    }
}
