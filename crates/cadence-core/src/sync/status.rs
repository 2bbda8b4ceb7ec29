//! Coarse sync status surfaced to presentation.
//!
//! No individual failed field sync blocks local timer operation; the only
//! user-visible signal is this four-state cell.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Success,
    Error,
}

pub struct SyncStatusCell {
    tx: watch::Sender<SyncStatus>,
}

impl SyncStatusCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SyncStatus::Idle);
        Self { tx }
    }

    pub fn get(&self) -> SyncStatus {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.tx.subscribe()
    }

    pub fn set(&self, status: SyncStatus) {
        self.tx.send_replace(status);
    }

    /// Report success, decaying back to idle after two seconds unless a
    /// newer transition lands first.
    pub fn success_with_decay(self: &Arc<Self>) {
        self.set(SyncStatus::Success);
        let cell = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            if cell.get() == SyncStatus::Success {
                cell.set(SyncStatus::Idle);
            }
        });
    }
}

impl Default for SyncStatusCell {
    fn default() -> Self {
        Self::new()
    }
}
