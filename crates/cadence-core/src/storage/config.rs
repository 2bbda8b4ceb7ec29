//! TOML-based engine configuration.
//!
//! Holds the endpoints for the sync backend. Stored at
//! `~/.config/cadence/config.toml`; every field has a default so a missing
//! or partial file is fine.

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::StoreError;

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the REST sync surface.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// WebSocket endpoint of the realtime channel.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            ws_url: default_ws_url(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.usecadence.app".to_string()
}

fn default_ws_url() -> String {
    "wss://api.usecadence.app/ws".to_string()
}

impl EngineConfig {
    /// Load from the data directory, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load() -> Self {
        let Ok(dir) = data_dir() else {
            return Self::default();
        };
        let path = dir.join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|err| {
                tracing::warn!(%err, path = %path.display(), "config file malformed, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let path = data_dir()?.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)
            .map_err(|err| StoreError::Io(std::io::Error::other(err)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
