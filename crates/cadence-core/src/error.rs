//! Core error types for cadence-core.
//!
//! This module defines the error hierarchy using thiserror. Transient
//! network failures and "not entitled" responses are ordinary values of
//! these types; invariant violations in persisted state are recovered in
//! place and never surface here.

use thiserror::Error;

/// Core error type for cadence-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Durable-store errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Synchronization errors
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Realtime channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Manual ledger edit errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] crate::stats::LedgerError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Durable-store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Synchronization errors.
///
/// `NotEntitled` is a steady-state condition for accounts without sync
/// access, not a failure.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sync endpoint returned HTTP {0}")]
    Http(u16),

    #[error("Account is not entitled to sync")]
    NotEntitled,

    #[error("Invalid sync endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Realtime channel errors.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Authentication timed out")]
    AuthTimeout,

    #[error("Transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Channel is not connected")]
    NotConnected,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
