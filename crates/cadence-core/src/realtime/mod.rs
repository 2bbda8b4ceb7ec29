//! Realtime synchronization channel.
//!
//! A single authenticated WebSocket connection per process mirrors session
//! actions across the account's devices. Local state is always mutated and
//! persisted first; the channel carries notifications, and inbound updates
//! are applied without re-emitting to the channel.

mod channel;
mod frames;
mod handle;

pub use channel::{backoff_delay, ChannelConfig, ChannelState, RealtimeChannel};
pub use frames::{parse_server_frame, ClientFrame, ServerFrame};
pub use handle::RealtimeHandle;
