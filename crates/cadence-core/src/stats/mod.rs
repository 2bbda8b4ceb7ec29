//! Daily and historical completed-session ledgers.
//!
//! Exactly one [`DailyStats`] is current at a time. When the engine first
//! observes a calendar day newer than the ledger's date, the stale day is
//! closed into [`HistoricalStats`] wholesale. Completed sessions are
//! deduplicated by their start instant: two sessions cannot start at the
//! same moment on one account, so `timeStarted` is a natural key.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Immutable record of one finished Focus phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSession {
    /// Target duration of the completed phase, seconds.
    pub total_time: u32,
    pub time_started: DateTime<Utc>,
    pub time_ended: DateTime<Utc>,
    #[serde(default = "default_project")]
    pub project: String,
}

fn default_project() -> String {
    "General".to_string()
}

/// The current day's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: NaiveDate,
    #[serde(default)]
    pub completed_sessions: Vec<CompletedSession>,
}

impl DailyStats {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            completed_sessions: Vec::new(),
        }
    }

    pub fn contains_start(&self, time_started: DateTime<Utc>) -> bool {
        self.completed_sessions
            .iter()
            .any(|s| s.time_started == time_started)
    }

    /// Append, skipping a record whose start instant is already present so
    /// the operation can be replayed safely.
    pub fn append(&mut self, session: CompletedSession) {
        if !self.contains_start(session.time_started) {
            self.completed_sessions.push(session);
        }
    }
}

/// Closed days, keyed by date. Append-only at the day level: a date's list
/// is replaced wholesale when re-synced but is logically immutable history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoricalStats {
    pub days: BTreeMap<NaiveDate, Vec<CompletedSession>>,
}

impl HistoricalStats {
    pub fn insert_day(&mut self, date: NaiveDate, sessions: Vec<CompletedSession>) {
        self.days.insert(date, sessions);
    }

    /// Remote snapshots carry history as an array of day records.
    pub fn to_wire(&self) -> Vec<HistoricalDayRecord> {
        self.days
            .iter()
            .map(|(date, sessions)| HistoricalDayRecord {
                date: Some(*date),
                completed_sessions: sessions.clone(),
            })
            .collect()
    }

    /// Records without a date are dropped rather than failing the sync;
    /// absent session lists read as empty.
    pub fn from_wire(days: Vec<HistoricalDayRecord>) -> Self {
        let mut stats = Self::default();
        for day in days {
            let Some(date) = day.date else {
                tracing::warn!("dropping historical day record without a date");
                continue;
            };
            stats.days.insert(date, day.completed_sessions);
        }
        stats
    }
}

/// One closed day as pushed to the remote day endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalDay {
    pub date: NaiveDate,
    #[serde(default)]
    pub completed_sessions: Vec<CompletedSession>,
}

/// One day inside a remote snapshot's history array. Every field is
/// tolerant: other clients (or an older server) may emit partial records,
/// and one bad entry must not abort an otherwise-valid sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoricalDayRecord {
    pub date: Option<NaiveDate>,
    pub completed_sessions: Vec<CompletedSession>,
}

/// The daily ledger inside a remote snapshot, tolerant for the same
/// reason. A record without a date reads as "no remote daily present".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyStatsRecord {
    pub date: Option<NaiveDate>,
    pub completed_sessions: Vec<CompletedSession>,
}

impl DailyStatsRecord {
    pub fn into_daily(self) -> Option<DailyStats> {
        self.date.map(|date| DailyStats {
            date,
            completed_sessions: self.completed_sessions,
        })
    }
}

impl From<DailyStats> for DailyStatsRecord {
    fn from(daily: DailyStats) -> Self {
        Self {
            date: Some(daily.date),
            completed_sessions: daily.completed_sessions,
        }
    }
}

/// Close the daily ledger into history if its date has fallen behind
/// `today`. Returns the closed date, or `None` when the ledger was already
/// current. Idempotent for a fixed `today`.
pub fn close_day_if_needed(
    daily: &mut DailyStats,
    historical: &mut HistoricalStats,
    today: NaiveDate,
) -> Option<NaiveDate> {
    if daily.date == today {
        return None;
    }
    let closed = daily.date;
    historical.insert_day(closed, std::mem::take(&mut daily.completed_sessions));
    daily.date = today;
    Some(closed)
}

/// A manual, retroactive ledger edit requested outside the engine.
#[derive(Debug, Clone)]
pub enum LedgerEdit {
    Append(CompletedSession),
    ReplaceAt(usize, CompletedSession),
    RemoveAt(usize),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Index {index} out of bounds for {date} (length: {len})")]
    OutOfBounds {
        date: NaiveDate,
        index: usize,
        len: usize,
    },
    #[error("No recorded sessions for {0}")]
    UnknownDay(NaiveDate),
}

/// Apply an edit to whichever ledger owns `date`. Edits to today's list
/// also refresh the historical mirror when one is materially present.
pub fn apply_edit(
    daily: &mut DailyStats,
    historical: &mut HistoricalStats,
    today: NaiveDate,
    date: NaiveDate,
    edit: LedgerEdit,
) -> Result<(), LedgerError> {
    close_day_if_needed(daily, historical, today);

    if date == today {
        apply_to_list(&mut daily.completed_sessions, date, edit)?;
        if historical.days.contains_key(&date) {
            historical.insert_day(date, daily.completed_sessions.clone());
        }
        return Ok(());
    }

    match edit {
        LedgerEdit::Append(session) => {
            let list = historical.days.entry(date).or_default();
            if !list.iter().any(|s| s.time_started == session.time_started) {
                list.push(session);
            }
            Ok(())
        }
        other => {
            let list = historical
                .days
                .get_mut(&date)
                .ok_or(LedgerError::UnknownDay(date))?;
            apply_to_list(list, date, other)
        }
    }
}

fn apply_to_list(
    list: &mut Vec<CompletedSession>,
    date: NaiveDate,
    edit: LedgerEdit,
) -> Result<(), LedgerError> {
    match edit {
        LedgerEdit::Append(session) => {
            if !list.iter().any(|s| s.time_started == session.time_started) {
                list.push(session);
            }
            Ok(())
        }
        LedgerEdit::ReplaceAt(index, session) => {
            let len = list.len();
            *list
                .get_mut(index)
                .ok_or(LedgerError::OutOfBounds { date, index, len })? = session;
            Ok(())
        }
        LedgerEdit::RemoveAt(index) => {
            if index >= list.len() {
                return Err(LedgerError::OutOfBounds {
                    date,
                    index,
                    len: list.len(),
                });
            }
            list.remove(index);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session(started_minute: u32) -> CompletedSession {
        CompletedSession {
            total_time: 1500,
            time_started: Utc
                .with_ymd_and_hms(2026, 3, 1, 9, started_minute, 0)
                .unwrap(),
            time_ended: Utc
                .with_ymd_and_hms(2026, 3, 1, 9, started_minute + 25, 0)
                .unwrap(),
            project: "General".into(),
        }
    }

    #[test]
    fn rollover_archives_stale_day() {
        let mut daily = DailyStats::new(date(2026, 3, 1));
        daily.append(session(0));
        daily.append(session(30));
        let mut historical = HistoricalStats::default();

        let closed = close_day_if_needed(&mut daily, &mut historical, date(2026, 3, 2));

        assert_eq!(closed, Some(date(2026, 3, 1)));
        assert_eq!(daily.date, date(2026, 3, 2));
        assert!(daily.completed_sessions.is_empty());
        assert_eq!(historical.days[&date(2026, 3, 1)].len(), 2);
    }

    #[test]
    fn rollover_is_idempotent() {
        let mut daily = DailyStats::new(date(2026, 3, 1));
        daily.append(session(0));
        let mut historical = HistoricalStats::default();

        close_day_if_needed(&mut daily, &mut historical, date(2026, 3, 2));
        let daily_after_first = daily.clone();
        let historical_after_first = historical.clone();

        let closed = close_day_if_needed(&mut daily, &mut historical, date(2026, 3, 2));

        assert_eq!(closed, None);
        assert_eq!(daily, daily_after_first);
        assert_eq!(historical, historical_after_first);
    }

    #[test]
    fn append_deduplicates_by_start_instant() {
        let mut daily = DailyStats::new(date(2026, 3, 1));
        daily.append(session(0));
        daily.append(session(0));
        assert_eq!(daily.completed_sessions.len(), 1);
    }

    #[test]
    fn edit_today_refreshes_historical_mirror() {
        let today = date(2026, 3, 1);
        let mut daily = DailyStats::new(today);
        daily.append(session(0));
        let mut historical = HistoricalStats::default();
        historical.insert_day(today, daily.completed_sessions.clone());

        apply_edit(
            &mut daily,
            &mut historical,
            today,
            today,
            LedgerEdit::Append(session(30)),
        )
        .unwrap();

        assert_eq!(daily.completed_sessions.len(), 2);
        assert_eq!(historical.days[&today].len(), 2);
    }

    #[test]
    fn edit_today_without_mirror_leaves_history_alone() {
        let today = date(2026, 3, 1);
        let mut daily = DailyStats::new(today);
        let mut historical = HistoricalStats::default();

        apply_edit(
            &mut daily,
            &mut historical,
            today,
            today,
            LedgerEdit::Append(session(0)),
        )
        .unwrap();

        assert_eq!(daily.completed_sessions.len(), 1);
        assert!(historical.days.is_empty());
    }

    #[test]
    fn edit_closed_day_routes_to_history() {
        let today = date(2026, 3, 2);
        let mut daily = DailyStats::new(today);
        let mut historical = HistoricalStats::default();
        historical.insert_day(date(2026, 3, 1), vec![session(0)]);

        apply_edit(
            &mut daily,
            &mut historical,
            today,
            date(2026, 3, 1),
            LedgerEdit::RemoveAt(0),
        )
        .unwrap();

        assert!(historical.days[&date(2026, 3, 1)].is_empty());
    }

    #[test]
    fn replace_out_of_bounds_is_an_error() {
        let today = date(2026, 3, 2);
        let mut daily = DailyStats::new(today);
        let mut historical = HistoricalStats::default();
        historical.insert_day(date(2026, 3, 1), vec![session(0)]);

        let err = apply_edit(
            &mut daily,
            &mut historical,
            today,
            date(2026, 3, 1),
            LedgerEdit::ReplaceAt(5, session(30)),
        )
        .unwrap_err();

        assert!(matches!(err, LedgerError::OutOfBounds { index: 5, .. }));
    }

    #[test]
    fn wire_round_trip() {
        let mut historical = HistoricalStats::default();
        historical.insert_day(date(2026, 3, 1), vec![session(0)]);
        historical.insert_day(date(2026, 3, 2), vec![]);

        let wire = historical.to_wire();
        assert_eq!(wire.len(), 2);
        assert_eq!(HistoricalStats::from_wire(wire), historical);
    }

    #[test]
    fn from_wire_drops_records_without_a_date() {
        let wire: Vec<HistoricalDayRecord> = serde_json::from_value(serde_json::json!([
            {"date": "2026-03-01", "completedSessions": [session(0)]},
            {"completedSessions": [session(30)]},
            {"date": "2026-03-02"}
        ]))
        .unwrap();

        let historical = HistoricalStats::from_wire(wire);

        assert_eq!(historical.days.len(), 2);
        assert_eq!(historical.days[&date(2026, 3, 1)].len(), 1);
        // Absent session list reads as empty.
        assert!(historical.days[&date(2026, 3, 2)].is_empty());
    }

    #[test]
    fn daily_record_without_a_date_reads_as_absent() {
        let record: DailyStatsRecord =
            serde_json::from_value(serde_json::json!({"completedSessions": [session(0)]}))
                .unwrap();
        assert!(record.into_daily().is_none());

        let record: DailyStatsRecord =
            serde_json::from_value(serde_json::json!({"date": "2026-03-01"})).unwrap();
        let daily = record.into_daily().unwrap();
        assert_eq!(daily.date, date(2026, 3, 1));
        assert!(daily.completed_sessions.is_empty());
    }

    #[test]
    fn daily_stats_serializes_date_as_plain_string() {
        let daily = DailyStats::new(date(2026, 3, 1));
        let json = serde_json::to_value(&daily).unwrap();
        assert_eq!(json["date"], "2026-03-01");
        assert_eq!(json["completedSessions"], serde_json::json!([]));
    }
}
