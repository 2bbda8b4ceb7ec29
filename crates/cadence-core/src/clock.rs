//! Wall-clock abstraction.
//!
//! All time arithmetic in the engine goes through [`Clock`] so tests can
//! drive completion, rollover, and recovery deterministically.

use std::sync::Mutex;

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar day in the local timezone. Day rollover is keyed on
    /// this value, not on UTC.
    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&Local).date_naive()
    }
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests.
///
/// `today()` reports the UTC calendar day of the held instant unless
/// overridden, so tests are independent of the host timezone.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    today: Mutex<Option<NaiveDate>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            today: Mutex::new(None),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut guard = self.now.lock().unwrap();
        *guard += chrono::Duration::seconds(secs);
    }

    /// Pin `today()` independently of `now()`, e.g. to simulate a missed
    /// midnight while the host was suspended.
    pub fn set_today(&self, date: NaiveDate) {
        *self.today.lock().unwrap() = Some(date);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn today(&self) -> NaiveDate {
        self.today
            .lock()
            .unwrap()
            .unwrap_or_else(|| self.now().date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
        let before = clock.now();
        clock.advance_secs(90);
        assert_eq!((clock.now() - before).num_seconds(), 90);
    }

    #[test]
    fn manual_clock_today_override() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        clock.set_today(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }
}
