//! Engine coordinator.
//!
//! The engine is the single logical owner of the session record: the
//! action dispatcher, the timer driver's tick, and the realtime channel's
//! inbound handler all funnel through one mutation lock, so every change
//! is a read-modify-write critical section. Every mutation persists before
//! it emits or pushes anywhere.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::account::UserAccount;
use crate::blocklist::BlockedWebsites;
use crate::clock::Clock;
use crate::error::{CoreError, SyncError};
use crate::events::EngineEvent;
use crate::realtime::{ChannelConfig, ChannelState, ClientFrame, RealtimeHandle, ServerFrame};
use crate::settings::Settings;
use crate::stats::{
    apply_edit, close_day_if_needed, CompletedSession, DailyStats, HistoricalDay, HistoricalStats,
    LedgerEdit,
};
use crate::storage::{EngineConfig, Store, StoreKey};
use crate::sync::{Reconciler, RestClient, SyncStatus, SyncStatusCell};
use crate::timer::{BreakKind, Phase, Session, Status, TickOutcome, TimerDriver};

const WATCHDOG_PERIOD: Duration = Duration::from_secs(60);

/// User-initiated commands, as the presentation layer sends them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    StartTimer,
    PauseTimer,
    ResumeTimer,
    StopTimer,
    StartShortBreak,
    StartLongBreak,
    SkipBreak,
    UpdateSessionProject { project: String },
}

pub struct Engine {
    store: Store,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    driver: TimerDriver,
    events: broadcast::Sender<EngineEvent>,
    /// Session critical section; see the module docs.
    mutation: Mutex<()>,
    realtime: RealtimeHandle,
    sync_status: Arc<SyncStatusCell>,
    watchdog: StdMutex<Option<JoinHandle<()>>>,
    inbound_pump: StdMutex<Option<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(store: Store, clock: Arc<dyn Clock>, config: EngineConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            store,
            clock,
            config,
            driver: TimerDriver::new(),
            events,
            mutation: Mutex::new(()),
            realtime: RealtimeHandle::new(),
            sync_status: Arc::new(SyncStatusCell::new()),
            watchdog: StdMutex::new(None),
            inbound_pump: StdMutex::new(None),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync_status.get()
    }

    pub fn sync_status_watch(&self) -> watch::Receiver<SyncStatus> {
        self.sync_status.subscribe()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Cold-start initialization: seed missing records with defaults,
    /// apply the suspend-recovery rule, roll the statistics day over, and
    /// persist. Never starts the timer driver; a session that was Running
    /// when the host went away comes back Paused, and only an explicit
    /// resume or an authoritative remote update may restart it.
    pub async fn bootstrap(&self) -> Result<(), CoreError> {
        let _guard = self.mutation.lock().await;
        let now = self.clock.now();
        let today = self.clock.today();

        let settings: Settings = self.store.get_or_default(StoreKey::Settings);
        let blocked: BlockedWebsites = self.store.get_or_default(StoreKey::BlockedWebsites);
        let mut session = match self.store.get::<Session>(StoreKey::Session) {
            Ok(Some(session)) => session,
            Ok(None) => Session::new(&settings, now),
            Err(err) => {
                tracing::warn!(%err, "session record malformed, rebuilding defaults");
                Session::new(&settings, now)
            }
        };
        if session.recover(now) {
            tracing::warn!("session recovered after process resume, demoted to paused");
        }

        let mut daily = self.load_daily(today);
        let mut historical: HistoricalStats = self.store.get_or_default(StoreKey::HistoricalStats);
        close_day_if_needed(&mut daily, &mut historical, today);

        self.store.set_many(vec![
            (StoreKey::Settings, serde_json::to_value(&settings)?),
            (StoreKey::BlockedWebsites, serde_json::to_value(&blocked)?),
            (StoreKey::Session, serde_json::to_value(&session)?),
            (StoreKey::DailyStats, serde_json::to_value(&daily)?),
            (StoreKey::HistoricalStats, serde_json::to_value(&historical)?),
        ])?;
        self.emit_session(&session);
        Ok(())
    }

    /// Stop every background activity this engine owns.
    pub async fn shutdown(&self) {
        self.driver.stop();
        if let Some(task) = self.watchdog.lock().unwrap().take() {
            task.abort();
        }
        self.realtime.reset().await;
        if let Some(task) = self.inbound_pump.lock().unwrap().take() {
            task.abort();
        }
    }

    // ── Action dispatch ──────────────────────────────────────────────

    pub async fn dispatch(self: &Arc<Self>, command: Command) -> Result<(), CoreError> {
        let session = {
            let _guard = self.mutation.lock().await;
            let now = self.clock.now();
            let settings: Settings = self.store.get_or_default(StoreKey::Settings);
            let mut session = self.load_session(&settings);

            let frame = match &command {
                Command::StartTimer => {
                    session.start(&settings, now);
                    Some(ClientFrame::SessionStart {
                        project: Some(session.project.clone()),
                        focus_duration: Some(session.focus_duration),
                        short_break_duration: Some(session.short_break_duration),
                        long_break_duration: Some(session.long_break_duration),
                    })
                }
                Command::PauseTimer => {
                    session.pause(now);
                    Some(ClientFrame::SessionPause)
                }
                Command::ResumeTimer => {
                    session.resume(now);
                    Some(ClientFrame::SessionResume)
                }
                Command::StopTimer => {
                    session.stop(&settings, now);
                    Some(ClientFrame::SessionStop)
                }
                Command::StartShortBreak => {
                    session.start_break(BreakKind::Short, &settings, now);
                    Some(ClientFrame::SessionTransitionToBreak {
                        break_type: BreakKind::Short,
                        auto_start: true,
                    })
                }
                Command::StartLongBreak => {
                    session.start_break(BreakKind::Long, &settings, now);
                    Some(ClientFrame::SessionTransitionToBreak {
                        break_type: BreakKind::Long,
                        auto_start: true,
                    })
                }
                Command::SkipBreak => {
                    session.skip_break(&settings, now);
                    Some(ClientFrame::SessionSkip)
                }
                Command::UpdateSessionProject { project } => {
                    session.set_project(project.clone());
                    Some(ClientFrame::SessionUpdateProject {
                        project: project.clone(),
                    })
                }
            };

            self.store.set(StoreKey::Session, &session)?;
            self.emit_session(&session);
            self.push_frame(frame).await;
            session
        };
        self.sync_driver(&session);
        Ok(())
    }

    // ── Timer tick ───────────────────────────────────────────────────

    /// One driver tick: evaluate completion at the current wall-clock
    /// instant and perform the phase transition when due.
    pub async fn tick(self: &Arc<Self>) -> Result<TickOutcome, CoreError> {
        let _guard = self.mutation.lock().await;
        let now = self.clock.now();
        let today = self.clock.today();
        let settings: Settings = self.store.get_or_default(StoreKey::Settings);
        let mut session = self.load_session(&settings);

        if session.status != Status::Running {
            return Ok(TickOutcome::Stop);
        }
        if !session.is_complete(now) {
            // Nothing stored changes; presentation repaints the derived
            // remaining time from the emitted record.
            self.emit_session(&session);
            return Ok(TickOutcome::Continue);
        }

        let mut daily = self.load_daily(today);
        let mut historical: HistoricalStats = self.store.get_or_default(StoreKey::HistoricalStats);
        let rolled = close_day_if_needed(&mut daily, &mut historical, today);
        if let Some(closed) = rolled {
            tracing::debug!(%closed, "statistics day rolled over");
        }

        let finished_phase = session.phase;
        let mut completed = None;
        if finished_phase == Phase::Focus {
            let record = CompletedSession {
                total_time: session.total_time(),
                time_started: session.created_at,
                time_ended: now,
                project: session.project.clone(),
            };
            daily.append(record.clone());
            completed = Some(record);
        }
        session.advance_after_completion(&settings, daily.completed_sessions.len(), now);

        let mut entries = vec![
            (StoreKey::Session, serde_json::to_value(&session)?),
            (StoreKey::DailyStats, serde_json::to_value(&daily)?),
        ];
        if rolled.is_some() {
            entries.push((StoreKey::HistoricalStats, serde_json::to_value(&historical)?));
        }
        self.store.set_many(entries)?;

        self.emit_session(&session);
        if let Some(record) = completed {
            let _ = self.events.send(EngineEvent::SessionCompleted { completed: record });
        }

        let frame = if finished_phase == Phase::Focus {
            ClientFrame::SessionTransitionToBreak {
                break_type: if session.phase == Phase::LongBreak {
                    BreakKind::Long
                } else {
                    BreakKind::Short
                },
                auto_start: session.status == Status::Running,
            }
        } else if session.status == Status::Running {
            ClientFrame::SessionStart {
                project: Some(session.project.clone()),
                focus_duration: Some(session.focus_duration),
                short_break_duration: Some(session.short_break_duration),
                long_break_duration: Some(session.long_break_duration),
            }
        } else {
            ClientFrame::SessionStop
        };
        self.push_frame(Some(frame)).await;

        Ok(if session.status == Status::Running {
            TickOutcome::Continue
        } else {
            TickOutcome::Stop
        })
    }

    // ── Remote updates ───────────────────────────────────────────────

    /// Apply an authoritative session update from another device. A `None`
    /// payload means the session was stopped elsewhere. Updates are
    /// persisted and emitted but never pushed back to the channel.
    pub async fn apply_remote_update(
        self: &Arc<Self>,
        remote: Option<Session>,
    ) -> Result<(), CoreError> {
        let session = {
            let _guard = self.mutation.lock().await;
            let now = self.clock.now();
            let settings: Settings = self.store.get_or_default(StoreKey::Settings);
            let mut session = self.load_session(&settings);

            match remote {
                None => session.stop(&settings, now),
                Some(remote) => {
                    // When both devices are running the same phase, keep the
                    // local run anchor so the dial does not jump with the
                    // clock skew between devices. Otherwise re-anchor the
                    // remote run segment to this device's clock.
                    let preserve = session.status == Status::Running
                        && remote.status == Status::Running
                        && session.phase == remote.phase;
                    let local_run_started = session.run_started_at;
                    session = remote;
                    session.run_started_at = match session.status {
                        Status::Running if preserve => local_run_started,
                        Status::Running => Some(now),
                        Status::Stopped | Status::Paused => None,
                    };
                }
            }

            self.store.set(StoreKey::Session, &session)?;
            self.emit_session(&session);
            session
        };
        self.sync_driver(&session);
        Ok(())
    }

    /// Record a focus session that finished on another device.
    pub async fn apply_remote_completed(&self, record: CompletedSession) -> Result<(), CoreError> {
        let _guard = self.mutation.lock().await;
        let today = self.clock.today();
        let mut daily = self.load_daily(today);
        let mut historical: HistoricalStats = self.store.get_or_default(StoreKey::HistoricalStats);
        let rolled = close_day_if_needed(&mut daily, &mut historical, today);

        if daily.contains_start(record.time_started) {
            return Ok(());
        }
        daily.append(record.clone());

        let mut entries = vec![(StoreKey::DailyStats, serde_json::to_value(&daily)?)];
        if rolled.is_some() {
            entries.push((StoreKey::HistoricalStats, serde_json::to_value(&historical)?));
        }
        self.store.set_many(entries)?;
        let _ = self.events.send(EngineEvent::SessionCompleted { completed: record });
        Ok(())
    }

    async fn handle_inbound(self: &Arc<Self>, frame: ServerFrame) {
        let result = match frame {
            ServerFrame::AuthSuccess {
                connections,
                session,
                ..
            } => {
                tracing::info!(connections, "realtime channel authenticated");
                self.apply_remote_update(session).await
            }
            ServerFrame::SessionUpdate { session } | ServerFrame::SessionResponse { session } => {
                self.apply_remote_update(session).await
            }
            ServerFrame::SessionAck {
                success: true,
                session: Some(session),
            } => self.apply_remote_update(Some(session)).await,
            ServerFrame::SessionAck { success: true, .. } => Ok(()),
            ServerFrame::SessionAck { success: false, .. } => {
                tracing::warn!("remote rejected a session action");
                Ok(())
            }
            ServerFrame::SessionCompleted { completed } => {
                self.apply_remote_completed(completed).await
            }
            ServerFrame::SessionError { message } | ServerFrame::Error { message } => {
                tracing::warn!(error = %message, "error frame from remote");
                Ok(())
            }
            ServerFrame::AuthError { message } => {
                tracing::warn!(error = %message, "authentication error frame");
                Ok(())
            }
            ServerFrame::Pong { .. } => Ok(()),
        };
        if let Err(err) = result {
            tracing::warn!(%err, "failed to apply inbound frame");
        }
    }

    // ── Synchronization ──────────────────────────────────────────────

    /// Bring the account online: reconcile over REST, then try to raise
    /// the realtime channel, then arm the liveness watchdog. Failures are
    /// logged and leave the engine in local-only mode; they never block
    /// timer operation.
    pub async fn go_online(self: &Arc<Self>) {
        if self.sync_token().is_none() {
            return;
        }
        if let Err(err) = self.reconcile().await {
            tracing::warn!(%err, "cold-start reconciliation failed");
        }
        match self.connect_realtime().await {
            Ok(true) => {}
            Ok(false) => tracing::debug!("account not eligible for realtime sync"),
            Err(err) => tracing::warn!(%err, "realtime channel unavailable, staying on polling"),
        }
        self.start_watchdog();
    }

    /// Pull-then-decide merge against the REST surface.
    pub async fn reconcile(&self) -> Result<(), CoreError> {
        let Some(token) = self.sync_token() else {
            return Ok(());
        };
        let client = RestClient::new(&self.config.api_base_url, token)?;
        let reconciler = Reconciler::new(
            self.store.clone(),
            Arc::clone(&self.clock),
            Arc::clone(&self.sync_status),
        );
        reconciler.reconcile(&client).await?;
        Ok(())
    }

    /// Establish the realtime channel if the account is eligible. Returns
    /// `Ok(false)` when sync is not available for this account.
    pub async fn connect_realtime(self: &Arc<Self>) -> Result<bool, CoreError> {
        let Some(token) = self.sync_token() else {
            return Ok(false);
        };
        if let Some(channel) = self.realtime.current().await {
            if channel.state() != ChannelState::Disconnected {
                return Ok(true);
            }
        }

        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
        let (_, created) = self
            .realtime
            .get_or_connect(
                ChannelConfig::new(self.config.ws_url.clone()),
                token,
                inbound_tx,
            )
            .await?;
        if created {
            let engine = Arc::clone(self);
            let pump = tokio::spawn(async move {
                while let Some(frame) = inbound_rx.recv().await {
                    engine.handle_inbound(frame).await;
                }
            });
            if let Some(old) = self.inbound_pump.lock().unwrap().replace(pump) {
                old.abort();
            }
        }
        Ok(true)
    }

    /// Arm the 60 s liveness check. A channel that believes itself open but
    /// is no longer authenticated (typically after the host was suspended)
    /// is torn down and rebuilt; when rebuilding fails, state converges via
    /// reconciliation instead.
    pub fn start_watchdog(self: &Arc<Self>) {
        let mut guard = self.watchdog.lock().unwrap();
        if guard.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let engine = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(WATCHDOG_PERIOD);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            interval.tick().await; // the immediate first tick
            loop {
                interval.tick().await;
                engine.watchdog_check().await;
            }
        }));
    }

    async fn watchdog_check(self: &Arc<Self>) {
        if self.sync_token().is_none() {
            return;
        }
        let healthy = match self.realtime.current().await {
            Some(channel) => channel.is_connected(),
            None => false,
        };
        if healthy {
            return;
        }
        tracing::info!("liveness watchdog forcing a fresh connect cycle");
        self.realtime.reset().await;
        if let Err(err) = self.connect_realtime().await {
            tracing::warn!(%err, "watchdog reconnect failed, reconciling instead");
            if let Err(err) = self.reconcile().await {
                tracing::warn!(%err, "fallback reconciliation failed");
            }
        }
    }

    // ── Settings, block list, ledger edits ───────────────────────────

    pub async fn update_settings(&self, settings: Settings) -> Result<(), CoreError> {
        self.store.set(StoreKey::Settings, &settings)?;
        self.push_rest(|client| async move { client.put_settings(&settings).await })
            .await;
        Ok(())
    }

    pub async fn add_blocked_website(&self, website: String) -> Result<(), CoreError> {
        let mut blocked: BlockedWebsites = self.store.get_or_default(StoreKey::BlockedWebsites);
        blocked.add(website.clone());
        self.store.set(StoreKey::BlockedWebsites, &blocked)?;
        self.push_rest(|client| async move { client.add_blocked_website(&website).await })
            .await;
        Ok(())
    }

    pub async fn remove_blocked_website(&self, website: String) -> Result<(), CoreError> {
        let mut blocked: BlockedWebsites = self.store.get_or_default(StoreKey::BlockedWebsites);
        blocked.remove(&website);
        self.store.set(StoreKey::BlockedWebsites, &blocked)?;
        self.push_rest(|client| async move { client.delete_blocked_website(&website).await })
            .await;
        Ok(())
    }

    pub async fn set_blocking_enabled(&self, enabled: bool) -> Result<(), CoreError> {
        let mut blocked: BlockedWebsites = self.store.get_or_default(StoreKey::BlockedWebsites);
        blocked.enabled = enabled;
        self.store.set(StoreKey::BlockedWebsites, &blocked)?;
        self.push_rest(|client| async move { client.toggle_blocked_websites(enabled).await })
            .await;
        Ok(())
    }

    /// Manual, retroactive ledger edit. Routes to whichever ledger owns
    /// `date` and pushes the affected record when the account syncs.
    pub async fn edit_ledger(&self, date: NaiveDate, edit: LedgerEdit) -> Result<(), CoreError> {
        let (push_daily, push_day) = {
            let _guard = self.mutation.lock().await;
            let today = self.clock.today();
            let mut daily = self.load_daily(today);
            let mut historical: HistoricalStats =
                self.store.get_or_default(StoreKey::HistoricalStats);
            apply_edit(&mut daily, &mut historical, today, date, edit)?;
            self.store.set_many(vec![
                (StoreKey::DailyStats, serde_json::to_value(&daily)?),
                (StoreKey::HistoricalStats, serde_json::to_value(&historical)?),
            ])?;
            if date == today {
                (Some(daily), None)
            } else {
                let sessions = historical.days.get(&date).cloned().unwrap_or_default();
                (
                    None,
                    Some(HistoricalDay {
                        date,
                        completed_sessions: sessions,
                    }),
                )
            }
        };

        if let Some(daily) = push_daily {
            self.push_rest(|client| async move { client.put_daily_stats(&daily).await })
                .await;
        }
        if let Some(day) = push_day {
            self.push_rest(|client| async move { client.post_historical_day(&day).await })
                .await;
        }
        Ok(())
    }

    // ── Snapshots for presentation ───────────────────────────────────

    pub fn snapshot_session(&self) -> Session {
        let settings: Settings = self.store.get_or_default(StoreKey::Settings);
        self.load_session(&settings)
    }

    pub fn snapshot_daily(&self) -> DailyStats {
        self.load_daily(self.clock.today())
    }

    pub fn snapshot_historical(&self) -> HistoricalStats {
        self.store.get_or_default(StoreKey::HistoricalStats)
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    pub fn timer_running(&self) -> bool {
        self.driver.is_running()
    }

    /// Start the driver for a session that is already Running, e.g. after
    /// an explicit resume on a freshly booted host.
    pub fn start_driver_if_running(self: &Arc<Self>) {
        let session = self.snapshot_session();
        self.sync_driver(&session);
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn load_session(&self, settings: &Settings) -> Session {
        match self.store.get::<Session>(StoreKey::Session) {
            Ok(Some(session)) => session,
            Ok(None) => Session::new(settings, self.clock.now()),
            Err(err) => {
                tracing::warn!(%err, "session record malformed, rebuilding defaults");
                Session::new(settings, self.clock.now())
            }
        }
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

    fn emit_session(&self, session: &Session) {
        let _ = self.events.send(EngineEvent::UpdateSession {
            session: session.clone(),
        });
    }

    fn sync_token(&self) -> Option<String> {
        let account: UserAccount = self.store.get_or_default(StoreKey::User);
        account.sync_token().map(str::to_string)
    }

    /// Queue a frame on the realtime channel when one is up. Failures are
    /// ordinary transient conditions: the ledger and session are already
    /// durable locally, and reconciliation will converge later.
    async fn push_frame(&self, frame: Option<ClientFrame>) {
        let Some(frame) = frame else { return };
        let Some(channel) = self.realtime.current().await else {
            return;
        };
        if let Err(err) = channel.send(frame) {
            tracing::debug!(%err, "session action not mirrored to channel");
        }
    }

    fn sync_driver(self: &Arc<Self>, session: &Session) {
        if session.status == Status::Running {
            let engine = Arc::clone(self);
            self.driver.start(move || {
                let engine = Arc::clone(&engine);
                async move {
                    match engine.tick().await {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            tracing::warn!(%err, "timer tick failed");
                            TickOutcome::Continue
                        }
                    }
                }
            });
        } else {
            self.driver.stop();
        }
    }

    async fn push_rest<F, Fut>(&self, op: F)
    where
        F: FnOnce(RestClient) -> Fut,
        Fut: std::future::Future<Output = Result<(), SyncError>>,
    {
        let Some(token) = self.sync_token() else {
            return;
        };
        let client = match RestClient::new(&self.config.api_base_url, token) {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(%err, "sync endpoint misconfigured");
                return;
            }
        };
        self.sync_status.set(SyncStatus::Syncing);
        match op(client).await {
            Ok(()) => self.sync_status.success_with_decay(),
            Err(SyncError::NotEntitled) => self.sync_status.set(SyncStatus::Idle),
            Err(err) => {
                tracing::warn!(%err, "sync push failed");
                self.sync_status.set(SyncStatus::Error);
            }
        }
    }
}
