//! Blocked-website list, shared across devices.
//!
//! The actual tab-redirection machinery lives in the presentation layer;
//! this engine owns the synced data model and the membership query.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockedWebsites {
    pub websites: BTreeSet<String>,
    pub enabled: bool,
}

impl BlockedWebsites {
    pub fn add(&mut self, website: impl Into<String>) {
        let website = website.into();
        if !website.trim().is_empty() {
            self.websites.insert(website);
        }
    }

    pub fn remove(&mut self, website: &str) {
        self.websites.remove(website);
    }

    /// Membership check with `www.` normalization and parent-domain matching:
    /// blocking `example.com` also blocks `www.example.com` and
    /// `sub.example.com`.
    pub fn is_blocked(&self, hostname: &str) -> bool {
        let normalized = strip_www(hostname);

        if self.websites.contains(normalized) || self.websites.contains(hostname) {
            return true;
        }

        self.websites.iter().any(|blocked| {
            let blocked_normalized = strip_www(blocked);
            normalized.ends_with(&format!(".{blocked_normalized}"))
                || normalized.ends_with(&format!(".{blocked}"))
        })
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}
