//! Periodic driver that re-evaluates the session against the wall clock.
//!
//! The driver owns no timer logic itself: once per second it invokes the
//! tick callback, which loads the session, checks completion, and reports
//! whether the driver should keep going. At most one driver task exists at
//! a time; `start` while running is a no-op.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What a tick decided about the driver's future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The session is no longer advancing; the driver stops itself.
    Stop,
}

#[derive(Debug, Default)]
pub struct TimerDriver {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the 1 Hz tick task. Returns `false` when a driver is already
    /// running (idempotent start: no second ticker is ever created).
    pub fn start<F, Fut>(&self, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickOutcome> + Send,
    {
        let mut guard = self.handle.lock().unwrap();
        if guard.as_ref().is_some_and(|task| !task.is_finished()) {
            return false;
        }
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // After a host suspension, catch up with one tick rather than a burst.
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tick().await == TickOutcome::Stop {
                    break;
                }
            }
        });
        *guard = Some(task);
        true
    }

    pub fn stop(&self) {
        if let Some(task) = self.handle.lock().unwrap().take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn start_is_idempotent() {
        let driver = TimerDriver::new();
        assert!(driver.start(|| async { TickOutcome::Continue }));
        assert!(!driver.start(|| async { TickOutcome::Continue }));
        assert!(driver.is_running());
        driver.stop();
    }

    #[tokio::test]
    async fn driver_stops_itself_on_stop_outcome() {
        let driver = TimerDriver::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        driver.start(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                TickOutcome::Stop
            }
        });
        // The interval's first tick fires immediately.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        assert!(!driver.is_running());
    }

    #[tokio::test]
    async fn stopped_driver_can_be_restarted() {
        let driver = TimerDriver::new();
        driver.start(|| async { TickOutcome::Stop });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(driver.start(|| async { TickOutcome::Continue }));
        driver.stop();
        assert!(!driver.is_running());
    }
}
