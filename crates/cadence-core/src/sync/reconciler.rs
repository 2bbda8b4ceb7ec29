//! Pull-then-decide reconciliation of local and remote state.
//!
//! Runs once at cold start and whenever the realtime channel cannot be
//! established. The merged result is persisted locally before any push-back
//! so observers never see state that is not yet durable.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::blocklist::BlockedWebsites;
use crate::clock::Clock;
use crate::error::SyncError;
use crate::settings::Settings;
use crate::stats::{close_day_if_needed, DailyStats, HistoricalDay, HistoricalStats};
use crate::storage::{Store, StoreKey};
use crate::sync::merge::{merge_daily, merge_historical};
use crate::sync::rest_client::{RestClient, SyncSnapshot};
use crate::sync::status::{SyncStatus, SyncStatusCell};

pub struct Reconciler {
    store: Store,
    clock: Arc<dyn Clock>,
    status: Arc<SyncStatusCell>,
}

impl Reconciler {
    pub fn new(store: Store, clock: Arc<dyn Clock>, status: Arc<SyncStatusCell>) -> Self {
        Self {
            store,
            clock,
            status,
        }
    }

    /// Merge local and remote truth, pushing back whatever the remote is
    /// missing. A `NotEntitled` response is a quiet no-op.
    pub async fn reconcile(&self, client: &RestClient) -> Result<(), SyncError> {
        self.status.set(SyncStatus::Syncing);
        match self.run(client).await {
            Ok(()) => {
                self.status.success_with_decay();
                Ok(())
            }
            Err(SyncError::NotEntitled) => {
                self.status.set(SyncStatus::Idle);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%err, "reconciliation failed, keeping last-known-good local state");
                self.status.set(SyncStatus::Error);
                Err(err)
            }
        }
    }

    async fn run(&self, client: &RestClient) -> Result<(), SyncError> {
        let today = self.clock.today();

        let mut settings: Settings = self.store.get_or_default(StoreKey::Settings);
        let mut blocked: BlockedWebsites = self.store.get_or_default(StoreKey::BlockedWebsites);
        let mut historical: HistoricalStats = self.store.get_or_default(StoreKey::HistoricalStats);
        let mut daily = self.load_daily(today);
        close_day_if_needed(&mut daily, &mut historical, today);

        let Some(remote) = client.fetch_snapshot().await? else {
            // Never synced before: this device seeds the remote truth.
            self.persist(&settings, &blocked, &daily, &historical)?;
            let snapshot = SyncSnapshot {
                settings: Some(settings),
                blocked_websites: Some(blocked),
                daily_stats: Some(daily.into()),
                historical_stats: Some(historical.to_wire()),
            };
            tracing::info!("no remote snapshot, seeding from local state");
            return client.push_snapshot(&snapshot).await;
        };

        // Rarely edited concurrently: the most recently synced device wins.
        if let Some(remote_settings) = remote.settings {
            settings = remote_settings;
        }
        if let Some(remote_blocked) = remote.blocked_websites {
            blocked = remote_blocked;
        }

        let remote_daily = remote.daily_stats.and_then(|record| {
            let parsed = record.into_daily();
            if parsed.is_none() {
                tracing::warn!("remote daily stats record lacks a date, ignoring it");
            }
            parsed
        });

        let mut push_daily = false;
        let mut archived: Option<NaiveDate> = None;
        if let Some(remote_daily) = remote_daily {
            let outcome = merge_daily(&daily, &remote_daily, today);
            daily = outcome.merged;
            push_daily = outcome.push_daily;
            if let Some((date, sessions)) = outcome.archive_day {
                historical.insert_day(date, sessions);
                archived = Some(date);
            }
        }

        let mut push_days = Vec::new();
        let remote_had_historical = remote.historical_stats.is_some();
        if let Some(remote_wire) = remote.historical_stats {
            let outcome =
                merge_historical(&historical, &HistoricalStats::from_wire(remote_wire), today);
            historical = outcome.merged;
            push_days = outcome.push_days;
        }
        if let Some(date) = archived {
            if !push_days.contains(&date) {
                push_days.push(date);
            }
        }

        // Keep the history view's copy of the open day in step, matching
        // what a full remote adoption would have produced.
        if remote_had_historical {
            historical.insert_day(daily.date, daily.completed_sessions.clone());
        }

        self.persist(&settings, &blocked, &daily, &historical)?;

        if push_daily {
            client.put_daily_stats(&daily).await?;
        }
        for date in push_days {
            let sessions = historical.days.get(&date).cloned().unwrap_or_default();
            client
                .post_historical_day(&HistoricalDay {
                    date,
                    completed_sessions: sessions,
                })
                .await?;
        }

        Ok(())
    }

    fn load_daily(&self, today: NaiveDate) -> DailyStats {
        match self.store.get::<DailyStats>(StoreKey::DailyStats) {
            Ok(Some(daily)) => daily,
            Ok(None) => DailyStats::new(today),
            Err(err) => {
                tracing::warn!(%err, "daily stats record malformed, starting a fresh day");
                DailyStats::new(today)
            }
        }
    }

    fn persist(
        &self,
        settings: &Settings,
        blocked: &BlockedWebsites,
        daily: &DailyStats,
        historical: &HistoricalStats,
    ) -> Result<(), SyncError> {
        self.store.set_many(vec![
            (StoreKey::Settings, serde_json::to_value(settings)?),
            (StoreKey::BlockedWebsites, serde_json::to_value(blocked)?),
            (StoreKey::DailyStats, serde_json::to_value(daily)?),
            (StoreKey::HistoricalStats, serde_json::to_value(historical)?),
        ])?;
        Ok(())
    }
}
