//! # Cadence Core Library
//!
//! This library provides the core business logic for the Cadence focus timer:
//! a wall-clock-accurate session state machine, daily/historical statistics,
//! and a multi-device synchronization layer. Presentation (dials, charts,
//! notifications) is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Session Model**: A timestamp-based state machine. Elapsed and remaining
//!   time are derived from stored timestamps, so the timer survives process
//!   suspension without losing or double-counting time.
//! - **Timer Driver**: A 1 Hz driver that re-evaluates the session against
//!   the clock and performs phase transitions.
//! - **Stats Ledger**: Completed-session records for the current day plus a
//!   date-keyed history, with rollover at local midnight.
//! - **Sync Reconciler**: Pull-then-decide merge of local and remote state
//!   over a REST surface, used at cold start and as the fallback when the
//!   realtime channel is down.
//! - **Realtime Channel**: Authenticated WebSocket connection that mirrors
//!   session actions across devices, with keep-alive and backoff reconnect.
//!
//! ## Key Components
//!
//! - [`Engine`]: Coordinator owning the session critical section
//! - [`Session`]: Core timer state machine
//! - [`Reconciler`]: Local/remote state merge
//! - [`RealtimeChannel`]: Persistent bidirectional connection
//! - [`DurableStore`]: Abstract persistent key-value store

pub mod account;
pub mod blocklist;
pub mod clock;
pub mod engine;
pub mod error;
pub mod events;
pub mod realtime;
pub mod settings;
pub mod stats;
pub mod storage;
pub mod sync;
pub mod timer;

pub use account::UserAccount;
pub use blocklist::BlockedWebsites;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Command, Engine};
pub use error::{ChannelError, CoreError, StoreError, SyncError};
pub use events::EngineEvent;
pub use realtime::{ChannelConfig, ChannelState, RealtimeChannel, RealtimeHandle};
pub use settings::Settings;
pub use stats::{
    CompletedSession, DailyStats, DailyStatsRecord, HistoricalDay, HistoricalDayRecord,
    HistoricalStats,
};
pub use storage::{DurableStore, EngineConfig, FileStore, MemoryStore, Store, StoreKey};
pub use sync::{Reconciler, RestClient, SyncStatus};
pub use timer::{Phase, Session, Status, TickOutcome, TimerDriver};
