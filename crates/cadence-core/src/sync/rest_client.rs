//! HTTP client for the remote sync surface.
//!
//! All requests carry the account's bearer token. HTTP 403 means the
//! account is not entitled to sync, a steady-state condition the caller
//! treats as "nothing to do".

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::blocklist::BlockedWebsites;
use crate::error::SyncError;
use crate::settings::Settings;
use crate::stats::{DailyStats, DailyStatsRecord, HistoricalDay, HistoricalDayRecord};

/// Full account snapshot exchanged with `GET|PUT /sync`.
///
/// The ledger fields use the tolerant record forms: a partial record from
/// another client is dropped or read as absent instead of failing the
/// whole snapshot parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSnapshot {
    pub settings: Option<Settings>,
    pub blocked_websites: Option<BlockedWebsites>,
    pub daily_stats: Option<DailyStatsRecord>,
    pub historical_stats: Option<Vec<HistoricalDayRecord>>,
}

pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, SyncError> {
        // Validate eagerly so a bad config fails at construction, not per call.
        Url::parse(base_url)?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    /// Fetch the full remote snapshot. `Ok(None)` means the account has
    /// never synced; `Err(NotEntitled)` means it may not sync at all.
    pub async fn fetch_snapshot(&self) -> Result<Option<SyncSnapshot>, SyncError> {
        let response = self.request(Method::GET, "/sync").send().await?;
        match response.status() {
            StatusCode::FORBIDDEN => Err(SyncError::NotEntitled),
            status if !status.is_success() => Err(SyncError::Http(status.as_u16())),
            _ => {
                let envelope: serde_json::Value = response.json().await?;
                if envelope["success"] == json!(true) && !envelope["data"].is_null() {
                    Ok(Some(serde_json::from_value(envelope["data"].clone())?))
                } else {
                    Ok(None)
                }
            }
        }
    }

    pub async fn push_snapshot(&self, snapshot: &SyncSnapshot) -> Result<(), SyncError> {
        let response = self
            .request(Method::PUT, "/sync")
            .json(snapshot)
            .send()
            .await?;
        ensure_ok(&response)
    }

    pub async fn put_daily_stats(&self, daily: &DailyStats) -> Result<(), SyncError> {
        let response = self
            .request(Method::PUT, "/sync/daily-stats")
            .json(daily)
            .send()
            .await?;
        ensure_ok(&response)
    }

    pub async fn post_historical_day(&self, day: &HistoricalDay) -> Result<(), SyncError> {
        let response = self
            .request(Method::POST, "/sync/historical-stats/day")
            .json(day)
            .send()
            .await?;
        ensure_ok(&response)
    }

    pub async fn put_settings(&self, settings: &Settings) -> Result<(), SyncError> {
        let response = self
            .request(Method::PUT, "/sync/settings")
            .json(settings)
            .send()
            .await?;
        ensure_ok(&response)
    }

    pub async fn add_blocked_website(&self, website: &str) -> Result<(), SyncError> {
        let response = self
            .request(Method::POST, "/sync/blocked-website")
            .json(&json!({ "website": website }))
            .send()
            .await?;
        ensure_ok(&response)
    }

    pub async fn delete_blocked_website(&self, website: &str) -> Result<(), SyncError> {
        let response = self
            .request(Method::DELETE, "/sync/blocked-website")
            .json(&json!({ "website": website }))
            .send()
            .await?;
        ensure_ok(&response)
    }

    pub async fn toggle_blocked_websites(&self, enabled: bool) -> Result<(), SyncError> {
        let response = self
            .request(Method::PUT, "/sync/blocked-websites/toggle")
            .json(&json!({ "enabled": enabled }))
            .send()
            .await?;
        ensure_ok(&response)
    }
}

fn ensure_ok(response: &reqwest::Response) -> Result<(), SyncError> {
    match response.status() {
        StatusCode::FORBIDDEN => Err(SyncError::NotEntitled),
        status if !status.is_success() => Err(SyncError::Http(status.as_u16())),
        _ => Ok(()),
    }
}
