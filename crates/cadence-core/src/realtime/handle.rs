//! Process-owned handle for the realtime channel.
//!
//! The bootstrap owns exactly one of these and passes it to the components
//! that need the channel; there is no ambient global lookup. `reset` tears
//! the channel down and clears the slot.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use super::channel::{ChannelConfig, ChannelState, RealtimeChannel};
use super::frames::ServerFrame;
use crate::error::ChannelError;

#[derive(Default)]
pub struct RealtimeHandle {
    inner: Mutex<Option<Arc<RealtimeChannel>>>,
}

impl RealtimeHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent get-or-create: a channel that is still alive is reused
    /// (and the returned flag is `false`); otherwise a fresh connect cycle
    /// runs and `inbound` becomes the new channel's frame sink.
    pub async fn get_or_connect(
        &self,
        config: ChannelConfig,
        token: String,
        inbound: mpsc::UnboundedSender<ServerFrame>,
    ) -> Result<(Arc<RealtimeChannel>, bool), ChannelError> {
        let mut guard = self.inner.lock().await;
        if let Some(channel) = guard.as_ref() {
            if channel.state() != ChannelState::Disconnected {
                return Ok((Arc::clone(channel), false));
            }
        }
        let channel = RealtimeChannel::connect(config, token, inbound).await?;
        *guard = Some(Arc::clone(&channel));
        Ok((channel, true))
    }

    pub async fn current(&self) -> Option<Arc<RealtimeChannel>> {
        self.inner.lock().await.clone()
    }

    /// Disconnect and clear. The next `get_or_connect` starts from scratch.
    pub async fn reset(&self) {
        if let Some(channel) = self.inner.lock().await.take() {
            channel.disconnect();
        }
    }
}
