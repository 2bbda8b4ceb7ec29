//! Session state machine.
//!
//! The session is a wall-clock-based state machine: elapsed time is derived
//! from `accumulated_seconds` plus the age of the current run segment, so
//! the record stays accurate across process suspension. Derived values are
//! never persisted.
//!
//! ## State
//!
//! ```text
//! Stopped -> Running <-> Paused -> Stopped
//! ```
//!
//! `run_started_at` is non-null if and only if the session is Running.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::settings::Settings;

/// What the timer is currently measuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Focus,
    ShortBreak,
    LongBreak,
}

/// Whether the phase clock is advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Stopped,
    Running,
    Paused,
}

/// Which break a focus completion (or an explicit command) routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakKind {
    Short,
    Long,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub phase: Phase,
    pub status: Status,
    /// Seconds counted before the current run segment began.
    pub accumulated_seconds: u32,
    /// Start of the current run segment; `Some` iff Running.
    pub run_started_at: Option<DateTime<Utc>>,
    /// Start of the current phase. Carried into the completed-session
    /// record as `timeStarted`.
    pub created_at: DateTime<Utc>,
    pub project: String,
    pub focus_duration: u32,
    pub short_break_duration: u32,
    pub long_break_duration: u32,
}

impl Default for Session {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            phase: Phase::Focus,
            status: Status::Stopped,
            accumulated_seconds: 0,
            run_started_at: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            project: Settings::DEFAULT_PROJECT.to_string(),
            focus_duration: settings.focus_time,
            short_break_duration: settings.short_break_time,
            long_break_duration: settings.long_break_time,
        }
    }
}

impl Session {
    /// Dormant Focus session seeded from the current settings.
    pub fn new(settings: &Settings, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            project: settings.selected_project.clone(),
            focus_duration: settings.focus_time,
            short_break_duration: settings.short_break_time,
            long_break_duration: settings.long_break_time,
            ..Self::default()
        }
    }

    // ── Derived values ───────────────────────────────────────────────

    pub fn elapsed(&self, now: DateTime<Utc>) -> u32 {
        let mut total = self.accumulated_seconds;
        if self.status == Status::Running {
            if let Some(started) = self.run_started_at {
                let running = (now - started).num_seconds().clamp(0, i64::from(u32::MAX));
                total = total.saturating_add(running as u32);
            }
        }
        total
    }

    /// Target duration of the current phase, seconds.
    pub fn total_time(&self) -> u32 {
        match self.phase {
            Phase::Focus => self.focus_duration,
            Phase::ShortBreak => self.short_break_duration,
            Phase::LongBreak => self.long_break_duration,
        }
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> u32 {
        self.total_time().saturating_sub(self.elapsed(now))
    }

    pub fn is_complete(&self, now: DateTime<Utc>) -> bool {
        self.elapsed(now) >= self.total_time()
    }

    pub fn is_break(&self) -> bool {
        matches!(self.phase, Phase::ShortBreak | Phase::LongBreak)
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Begin a fresh Focus phase, running.
    pub fn start(&mut self, settings: &Settings, now: DateTime<Utc>) {
        self.phase = Phase::Focus;
        self.focus_duration = settings.focus_time;
        self.reset_phase_clock(now, Status::Running);
    }

    /// No-op unless Running.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.status != Status::Running {
            return;
        }
        self.accumulated_seconds = self.elapsed(now);
        self.run_started_at = None;
        self.status = Status::Paused;
    }

    /// No-op unless Paused.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if self.status != Status::Paused {
            return;
        }
        self.run_started_at = Some(now);
        self.status = Status::Running;
    }

    /// Back to a dormant Focus phase. "Stopped" is dormant, not deleted.
    pub fn stop(&mut self, settings: &Settings, now: DateTime<Utc>) {
        self.phase = Phase::Focus;
        self.focus_duration = settings.focus_time;
        self.reset_phase_clock(now, Status::Stopped);
    }

    /// Abandon an in-progress break. No-op during Focus.
    pub fn skip_break(&mut self, settings: &Settings, now: DateTime<Utc>) {
        if !self.is_break() {
            return;
        }
        self.stop(settings, now);
    }

    /// Begin a break phase, running.
    pub fn start_break(&mut self, kind: BreakKind, settings: &Settings, now: DateTime<Utc>) {
        match kind {
            BreakKind::Short => {
                self.phase = Phase::ShortBreak;
                self.short_break_duration = settings.short_break_time;
            }
            BreakKind::Long => {
                self.phase = Phase::LongBreak;
                self.long_break_duration = settings.long_break_time;
            }
        }
        self.reset_phase_clock(now, Status::Running);
    }

    /// No timer effect.
    pub fn set_project(&mut self, project: impl Into<String>) {
        self.project = project.into();
    }

    /// Phase-completion transition. `completed_today` counts today's
    /// completed sessions including the one just recorded; a count that is
    /// an exact multiple of the long-break interval routes to a long break.
    pub fn advance_after_completion(
        &mut self,
        settings: &Settings,
        completed_today: usize,
        now: DateTime<Utc>,
    ) {
        let auto_start = match self.phase {
            Phase::Focus => {
                let interval = settings.effective_long_break_interval() as usize;
                if settings.long_break_enabled && completed_today % interval == 0 {
                    self.phase = Phase::LongBreak;
                    self.long_break_duration = settings.long_break_time;
                } else {
                    self.phase = Phase::ShortBreak;
                    self.short_break_duration = settings.short_break_time;
                }
                settings.break_auto_start
            }
            Phase::ShortBreak | Phase::LongBreak => {
                self.phase = Phase::Focus;
                self.focus_duration = settings.focus_time;
                settings.focus_auto_start
            }
        };
        let status = if auto_start {
            Status::Running
        } else {
            Status::Stopped
        };
        self.reset_phase_clock(now, status);
    }

    /// Recovery rule applied on process resume or whenever a load finds a
    /// run-segment timestamp that the status does not justify. The in-flight
    /// segment is folded into `accumulated_seconds` and the session is
    /// demoted to Paused, so suspended time is neither lost nor counted
    /// twice. Returns whether the record was adjusted.
    pub fn recover(&mut self, now: DateTime<Utc>) -> bool {
        match (self.status, self.run_started_at) {
            (Status::Running, Some(_)) => {
                self.accumulated_seconds = self.elapsed(now);
                self.run_started_at = None;
                self.status = Status::Paused;
                true
            }
            (Status::Running, None) => {
                self.status = Status::Paused;
                true
            }
            (Status::Stopped | Status::Paused, Some(started)) => {
                let in_flight = (now - started).num_seconds().clamp(0, i64::from(u32::MAX));
                self.accumulated_seconds = self.accumulated_seconds.saturating_add(in_flight as u32);
                self.run_started_at = None;
                self.status = Status::Paused;
                true
            }
            _ => false,
        }
    }

    fn reset_phase_clock(&mut self, now: DateTime<Utc>, status: Status) {
        self.accumulated_seconds = 0;
        self.created_at = now;
        self.status = status;
        self.run_started_at = match status {
            Status::Running => Some(now),
            Status::Stopped | Status::Paused => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn running_session(now: DateTime<Utc>) -> Session {
        let settings = Settings::default();
        let mut session = Session::new(&settings, now);
        session.start(&settings, now);
        session
    }

    #[test]
    fn elapsed_counts_current_run_segment() {
        let session = running_session(at(0));
        assert_eq!(session.elapsed(at(0)), 0);
        assert_eq!(session.elapsed(at(90)), 90);
        assert_eq!(session.remaining(at(90)), 1500 - 90);
    }

    #[test]
    fn elapsed_ignores_clock_regression() {
        let session = running_session(at(100));
        assert_eq!(session.elapsed(at(40)), 0);
    }

    #[test]
    fn pause_freezes_the_clock() {
        let mut session = running_session(at(0));
        session.pause(at(60));
        assert_eq!(session.status, Status::Paused);
        assert_eq!(session.run_started_at, None);
        assert_eq!(session.elapsed(at(600)), 60);
    }

    #[test]
    fn pause_when_not_running_is_a_no_op() {
        let settings = Settings::default();
        let mut session = Session::new(&settings, at(0));
        let before = session.clone();
        session.pause(at(10));
        assert_eq!(session, before);
    }

    #[test]
    fn resume_opens_a_new_segment() {
        let mut session = running_session(at(0));
        session.pause(at(60));
        session.resume(at(300));
        assert_eq!(session.status, Status::Running);
        assert_eq!(session.elapsed(at(330)), 90);
    }

    #[test]
    fn pause_resume_does_not_move_phase_start() {
        let mut session = running_session(at(0));
        session.pause(at(60));
        session.resume(at(300));
        assert_eq!(session.created_at, at(0));
    }

    #[test]
    fn stop_resets_to_dormant_focus() {
        let settings = Settings::default();
        let mut session = running_session(at(0));
        session.start_break(BreakKind::Short, &settings, at(100));
        session.stop(&settings, at(200));
        assert_eq!(session.phase, Phase::Focus);
        assert_eq!(session.status, Status::Stopped);
        assert_eq!(session.accumulated_seconds, 0);
        assert_eq!(session.run_started_at, None);
        assert_eq!(session.created_at, at(200));
    }

    #[test]
    fn skip_break_only_applies_during_breaks() {
        let settings = Settings::default();
        let mut session = running_session(at(0));
        let before = session.clone();
        session.skip_break(&settings, at(50));
        assert_eq!(session, before);

        session.start_break(BreakKind::Long, &settings, at(100));
        session.skip_break(&settings, at(150));
        assert_eq!(session.phase, Phase::Focus);
        assert_eq!(session.status, Status::Stopped);
    }

    #[test]
    fn is_complete_at_exact_target() {
        let mut session = running_session(at(0));
        session.accumulated_seconds = 1499;
        session.run_started_at = Some(at(0));
        assert!(!session.is_complete(at(0)));
        assert!(session.is_complete(at(2)));
    }

    #[test]
    fn focus_completion_routes_by_interval_modulo() {
        let settings = Settings {
            long_break_enabled: true,
            long_break_interval: 4,
            ..Settings::default()
        };
        for (count, expected) in [
            (1, Phase::ShortBreak),
            (3, Phase::ShortBreak),
            (4, Phase::LongBreak),
            (5, Phase::ShortBreak),
            (8, Phase::LongBreak),
            (12, Phase::LongBreak),
        ] {
            let mut session = running_session(at(0));
            session.advance_after_completion(&settings, count, at(1500));
            assert_eq!(session.phase, expected, "count {count}");
        }
    }

    #[test]
    fn long_break_requires_enablement() {
        let settings = Settings {
            long_break_enabled: false,
            long_break_interval: 4,
            ..Settings::default()
        };
        let mut session = running_session(at(0));
        session.advance_after_completion(&settings, 4, at(1500));
        assert_eq!(session.phase, Phase::ShortBreak);
    }

    #[test]
    fn break_auto_start_controls_post_focus_status() {
        let auto = Settings {
            break_auto_start: true,
            ..Settings::default()
        };
        let mut session = running_session(at(0));
        session.advance_after_completion(&auto, 1, at(1500));
        assert_eq!(session.status, Status::Running);
        assert_eq!(session.run_started_at, Some(at(1500)));

        let manual = Settings {
            break_auto_start: false,
            ..Settings::default()
        };
        let mut session = running_session(at(0));
        session.advance_after_completion(&manual, 1, at(1500));
        assert_eq!(session.status, Status::Stopped);
        assert_eq!(session.run_started_at, None);
    }

    #[test]
    fn break_completion_returns_to_focus() {
        let settings = Settings {
            focus_auto_start: false,
            ..Settings::default()
        };
        let mut session = running_session(at(0));
        session.start_break(BreakKind::Short, &settings, at(0));
        session.advance_after_completion(&settings, 1, at(300));
        assert_eq!(session.phase, Phase::Focus);
        assert_eq!(session.status, Status::Stopped);
        assert_eq!(session.accumulated_seconds, 0);
    }

    #[test]
    fn recover_folds_in_flight_segment_for_running() {
        let mut session = running_session(at(0));
        session.accumulated_seconds = 100;
        session.run_started_at = Some(at(0));
        assert!(session.recover(at(40)));
        assert_eq!(session.status, Status::Paused);
        assert_eq!(session.accumulated_seconds, 140);
        assert_eq!(session.run_started_at, None);
    }

    #[test]
    fn recover_handles_stopped_with_dangling_run_start() {
        let mut session = running_session(at(0));
        session.status = Status::Stopped;
        session.accumulated_seconds = 30;
        session.run_started_at = Some(at(0));
        assert!(session.recover(at(50)));
        assert_eq!(session.status, Status::Paused);
        assert_eq!(session.accumulated_seconds, 80);
        assert_eq!(session.run_started_at, None);
    }

    #[test]
    fn recover_handles_running_without_run_start() {
        let mut session = running_session(at(0));
        session.run_started_at = None;
        assert!(session.recover(at(10)));
        assert_eq!(session.status, Status::Paused);
    }

    #[test]
    fn recover_leaves_consistent_records_alone() {
        let settings = Settings::default();
        let mut stopped = Session::new(&settings, at(0));
        assert!(!stopped.recover(at(100)));

        let mut paused = running_session(at(0));
        paused.pause(at(50));
        let before = paused.clone();
        assert!(!paused.recover(at(100)));
        assert_eq!(paused, before);
    }

    #[test]
    fn wire_format_uses_documented_field_names() {
        let session = running_session(at(0));
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["phase"], "focus");
        assert_eq!(json["status"], "running");
        assert!(json.get("accumulatedSeconds").is_some());
        assert!(json.get("runStartedAt").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("focusDuration").is_some());
    }

    #[test]
    fn partial_record_recovers_field_defaults() {
        let json = r#"{"phase": "shortBreak", "status": "paused", "accumulatedSeconds": 42}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.phase, Phase::ShortBreak);
        assert_eq!(session.accumulated_seconds, 42);
        assert_eq!(session.project, "General");
        assert_eq!(session.focus_duration, 1500);
    }

    proptest! {
        /// Pause/resume is lossless and additive: total elapsed equals the
        /// sum of the running segments regardless of the gaps between them.
        #[test]
        fn pause_resume_is_additive(segments in proptest::collection::vec((1i64..600, 0i64..600), 1..8)) {
            let settings = Settings::default();
            let mut session = Session::new(&settings, at(0));
            session.start(&settings, at(0));

            let mut cursor = 0i64;
            let mut expected = 0u32;
            for (run, gap) in segments {
                cursor += run;
                expected += run as u32;
                session.pause(at(cursor));
                cursor += gap;
                session.resume(at(cursor));
            }
            prop_assert_eq!(session.elapsed(at(cursor)), expected);
        }

        /// `is_complete` is monotonic in `now` for a fixed session.
        #[test]
        fn completion_is_monotonic(accumulated in 0u32..2000, probe_a in 0i64..4000, probe_b in 0i64..4000) {
            let mut session = running_session(at(0));
            session.accumulated_seconds = accumulated;
            let (earlier, later) = if probe_a <= probe_b { (probe_a, probe_b) } else { (probe_b, probe_a) };
            if session.is_complete(at(earlier)) {
                prop_assert!(session.is_complete(at(later)));
            }
        }
    }
}
