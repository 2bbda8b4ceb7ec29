//! Pure merge rules for reconciliation.
//!
//! Settings and the blocked-website list are adopted from the remote
//! wholesale, so only the two ledgers need real merge logic. Completed
//! sessions are keyed by their start instant; on a key conflict the local
//! record wins.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::stats::{CompletedSession, DailyStats, HistoricalStats};

/// Union of two session lists, deduplicated by `timeStarted` (local
/// preferred on conflict), sorted ascending by start instant.
pub fn union_sessions(
    local: &[CompletedSession],
    remote: &[CompletedSession],
) -> Vec<CompletedSession> {
    let mut by_start: BTreeMap<DateTime<Utc>, CompletedSession> = BTreeMap::new();
    for session in remote {
        by_start.insert(session.time_started, session.clone());
    }
    for session in local {
        by_start.insert(session.time_started, session.clone());
    }
    by_start.into_values().collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyMergeOutcome {
    pub merged: DailyStats,
    /// A stale remote day to archive into history (and push back).
    pub archive_day: Option<(NaiveDate, Vec<CompletedSession>)>,
    /// Whether the merged daily ledger differs from what the remote holds.
    pub push_daily: bool,
}

/// Merge the daily ledgers. The caller must have rolled the local ledger
/// over to `today` first.
pub fn merge_daily(local: &DailyStats, remote: &DailyStats, today: NaiveDate) -> DailyMergeOutcome {
    let local_today: &[CompletedSession] = if local.date == today {
        &local.completed_sessions
    } else {
        &[]
    };

    if remote.date != today {
        // The remote day is stale: archive it and keep whatever was already
        // recorded locally today instead of resetting to empty.
        let archive_day = (!remote.completed_sessions.is_empty())
            .then(|| (remote.date, remote.completed_sessions.clone()));
        return DailyMergeOutcome {
            merged: DailyStats {
                date: today,
                completed_sessions: local_today.to_vec(),
            },
            archive_day,
            push_daily: true,
        };
    }

    let merged_sessions = union_sessions(local_today, &remote.completed_sessions);
    let push_daily = merged_sessions.len() != remote.completed_sessions.len();
    DailyMergeOutcome {
        merged: DailyStats {
            date: today,
            completed_sessions: merged_sessions,
        },
        archive_day: None,
        push_daily,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalMergeOutcome {
    pub merged: HistoricalStats,
    /// Days the remote is missing and should receive.
    pub push_days: Vec<NaiveDate>,
}

/// Merge the historical ledgers: union of date keys. For a date present on
/// both sides the remote list is authoritative (closed days stop mutating
/// once synced), except "today", which defers to the daily rule and keeps
/// the local list.
pub fn merge_historical(
    local: &HistoricalStats,
    remote: &HistoricalStats,
    today: NaiveDate,
) -> HistoricalMergeOutcome {
    let mut merged = remote.clone();
    let mut push_days = Vec::new();

    for (date, sessions) in &local.days {
        if *date == today {
            merged.insert_day(*date, sessions.clone());
        } else if !remote.days.contains_key(date) {
            merged.insert_day(*date, sessions.clone());
            push_days.push(*date);
        }
    }

    HistoricalMergeOutcome { merged, push_days }
}
