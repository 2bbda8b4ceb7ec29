//! Durable key-value store abstraction.
//!
//! Local persistence mechanics are deliberately thin: the engine only
//! needs `get`/`set` over a fixed set of keys plus a change stream. The
//! trait keeps the engine testable against [`MemoryStore`] while
//! [`FileStore`] provides the JSON-file-backed production default.

mod config;
mod file_store;
mod memory;

pub use config::EngineConfig;
pub use file_store::FileStore;
pub use memory::MemoryStore;

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::StoreError;

/// The engine's keys of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    Session,
    DailyStats,
    HistoricalStats,
    Settings,
    BlockedWebsites,
    User,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Session => "session",
            StoreKey::DailyStats => "dailyStats",
            StoreKey::HistoricalStats => "historicalStats",
            StoreKey::Settings => "settings",
            StoreKey::BlockedWebsites => "blockedWebsites",
            StoreKey::User => "user",
        }
    }
}

/// Notification that one write batch landed.
#[derive(Debug, Clone)]
pub struct StoreChange {
    pub keys: Vec<StoreKey>,
}

/// Abstract persistent key-value store.
pub trait DurableStore: Send + Sync {
    fn get_raw(&self, key: StoreKey) -> Result<Option<serde_json::Value>, StoreError>;

    /// Write a batch atomically with respect to readers of this process.
    fn set_raw(&self, entries: Vec<(StoreKey, serde_json::Value)>) -> Result<(), StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Typed convenience wrapper over a [`DurableStore`].
#[derive(Clone)]
pub struct Store {
    inner: Arc<dyn DurableStore>,
}

impl Store {
    pub fn new(inner: Arc<dyn DurableStore>) -> Self {
        Self { inner }
    }

    pub fn get<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Option<T>, StoreError> {
        match self.inner.get_raw(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Read a record, constructing defaults when the key is missing or the
    /// stored value is malformed. Data-shape problems are recovered, not
    /// propagated.
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: StoreKey) -> T {
        match self.get::<T>(key) {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(err) => {
                tracing::warn!(key = key.as_str(), %err, "stored record malformed, rebuilding defaults");
                T::default()
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: StoreKey, value: &T) -> Result<(), StoreError> {
        self.inner
            .set_raw(vec![(key, serde_json::to_value(value)?)])
    }

    pub fn set_many(&self, entries: Vec<(StoreKey, serde_json::Value)>) -> Result<(), StoreError> {
        self.inner.set_raw(entries)
    }

    pub fn contains(&self, key: StoreKey) -> Result<bool, StoreError> {
        Ok(self.inner.get_raw(key)?.is_some())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.subscribe()
    }
}

/// Returns `~/.config/cadence[-dev]/` based on CADENCE_ENV, or the
/// directory named by CADENCE_DATA_DIR when set.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    let dir = if let Ok(explicit) = std::env::var("CADENCE_DATA_DIR") {
        PathBuf::from(explicit)
    } else {
        let base_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config");
        let env = std::env::var("CADENCE_ENV").unwrap_or_else(|_| "production".to_string());
        if env == "dev" {
            base_dir.join("cadence-dev")
        } else {
            base_dir.join("cadence")
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
