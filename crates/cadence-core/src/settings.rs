//! User-tunable timer behavior, shared across devices.
//!
//! Settings are a synced field: the reconciler adopts the remote copy
//! wholesale, so this struct must deserialize records written by any
//! device generation. Missing fields fall back to defaults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Focus phase target, seconds.
    pub focus_time: u32,
    /// Short break target, seconds.
    pub short_break_time: u32,
    /// Long break target, seconds.
    pub long_break_time: u32,
    /// Every Nth completed session of the day routes to a long break.
    pub long_break_interval: u32,
    pub long_break_enabled: bool,
    pub break_auto_start: bool,
    pub focus_auto_start: bool,
    pub notifications_enabled: bool,
    pub sound_enabled: bool,
    pub sound_volume: f32,
    pub daily_sessions_goal: u32,
    pub projects: Vec<String>,
    pub selected_project: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            focus_time: 25 * 60,
            short_break_time: 5 * 60,
            long_break_time: 15 * 60,
            long_break_interval: 4,
            long_break_enabled: false,
            break_auto_start: true,
            focus_auto_start: false,
            notifications_enabled: true,
            sound_enabled: true,
            sound_volume: 0.7,
            daily_sessions_goal: 10,
            projects: vec![Settings::DEFAULT_PROJECT.to_string()],
            selected_project: Settings::DEFAULT_PROJECT.to_string(),
        }
    }
}

impl Settings {
    pub const DEFAULT_PROJECT: &'static str = "General";

    /// Interval guarded against a zero stored by a buggy or legacy writer.
    pub fn effective_long_break_interval(&self) -> u32 {
        self.long_break_interval.max(1)
    }
}
