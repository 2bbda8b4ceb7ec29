//! Persistent bidirectional connection to the remote authority.
//!
//! One long-lived connection per process. The connect handshake sends an
//! auth frame and waits (bounded) for the verdict; after that a supervisor
//! task owns the socket, the keep-alive cadence, and the reconnect policy.
//! Unintentional closes reconnect with exponential backoff; an intentional
//! disconnect aborts the supervisor, which atomically cancels any pending
//! reconnect and keep-alive timers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::frames::{parse_server_frame, ClientFrame, ServerFrame};
use crate::error::ChannelError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: String,
    pub auth_timeout: Duration,
    pub ping_interval: Duration,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub max_reconnect_attempts: u32,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_timeout: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            max_reconnect_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
    Closing,
}

/// Delay before reconnect attempt `attempt` (1-based): doubling from the
/// base, capped.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(cap)
}

#[derive(Debug)]
pub struct RealtimeChannel {
    config: ChannelConfig,
    token: String,
    outbound: mpsc::UnboundedSender<ClientFrame>,
    state: watch::Sender<ChannelState>,
    intentional: AtomicBool,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeChannel {
    /// Open the transport, authenticate, and hand the socket to the
    /// supervisor. Auth failure or timeout rejects the attempt; the caller
    /// decides whether to retry.
    pub async fn connect(
        config: ChannelConfig,
        token: String,
        inbound: mpsc::UnboundedSender<ServerFrame>,
    ) -> Result<Arc<Self>, ChannelError> {
        let (state, _) = watch::channel(ChannelState::Disconnected);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let stream = Self::establish(&config, &token, &state, &inbound).await?;

        let channel = Arc::new(Self {
            config,
            token,
            outbound,
            state,
            intentional: AtomicBool::new(false),
            supervisor: Mutex::new(None),
        });
        let task = tokio::spawn(Self::supervise(
            Arc::clone(&channel),
            stream,
            outbound_rx,
            inbound,
        ));
        *channel.supervisor.lock().unwrap() = Some(task);
        Ok(channel)
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn state_watch(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Queue a frame for the writer task. Never blocks; the frame is lost
    /// only if the channel is already down, which the caller treats like
    /// any other transient network failure.
    pub fn send(&self, frame: ClientFrame) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        self.outbound
            .send(frame)
            .map_err(|_| ChannelError::NotConnected)
    }

    /// Intentional disconnect: suppresses the automatic-reconnect path and
    /// cancels pending reconnect and keep-alive timers with the socket.
    pub fn disconnect(&self) {
        self.intentional.store(true, Ordering::SeqCst);
        self.state.send_replace(ChannelState::Closing);
        if let Some(task) = self.supervisor.lock().unwrap().take() {
            task.abort();
        }
        self.state.send_replace(ChannelState::Disconnected);
    }

    async fn establish(
        config: &ChannelConfig,
        token: &str,
        state: &watch::Sender<ChannelState>,
        inbound: &mpsc::UnboundedSender<ServerFrame>,
    ) -> Result<WsStream, ChannelError> {
        state.send_replace(ChannelState::Connecting);
        let (mut stream, _) = match connect_async(config.url.as_str()).await {
            Ok(connected) => connected,
            Err(err) => {
                state.send_replace(ChannelState::Disconnected);
                return Err(ChannelError::Transport(err));
            }
        };

        state.send_replace(ChannelState::Authenticating);
        let auth = serde_json::to_string(&ClientFrame::Auth {
            token: token.to_string(),
        })?;
        if let Err(err) = stream.send(Message::Text(auth)).await {
            state.send_replace(ChannelState::Disconnected);
            return Err(ChannelError::Transport(err));
        }

        match tokio::time::timeout(config.auth_timeout, Self::wait_for_auth(&mut stream)).await {
            Ok(Ok(grant)) => {
                state.send_replace(ChannelState::Connected);
                // The authoritative session reaches the engine like any
                // other inbound update.
                let _ = inbound.send(grant);
                Ok(stream)
            }
            Ok(Err(err)) => {
                state.send_replace(ChannelState::Disconnected);
                Err(err)
            }
            Err(_) => {
                state.send_replace(ChannelState::Disconnected);
                Err(ChannelError::AuthTimeout)
            }
        }
    }

    async fn wait_for_auth(stream: &mut WsStream) -> Result<ServerFrame, ChannelError> {
        while let Some(message) = stream.next().await {
            if let Message::Text(text) = message? {
                match parse_server_frame(&text) {
                    Some(grant @ ServerFrame::AuthSuccess { .. }) => return Ok(grant),
                    Some(ServerFrame::AuthError { message }) => {
                        return Err(ChannelError::AuthFailed(message))
                    }
                    _ => {}
                }
            }
        }
        Err(ChannelError::NotConnected)
    }

    async fn supervise(
        channel: Arc<Self>,
        first: WsStream,
        mut outbound_rx: mpsc::UnboundedReceiver<ClientFrame>,
        inbound: mpsc::UnboundedSender<ServerFrame>,
    ) {
        let mut stream = Some(first);
        let mut attempts: u32 = 0;
        loop {
            let active = match stream.take() {
                Some(active) => active,
                None => {
                    attempts += 1;
                    if attempts > channel.config.max_reconnect_attempts {
                        tracing::warn!(
                            attempts = channel.config.max_reconnect_attempts,
                            "reconnect attempts exhausted"
                        );
                        break;
                    }
                    let delay = backoff_delay(
                        attempts,
                        channel.config.base_backoff,
                        channel.config.max_backoff,
                    );
                    tracing::info!(
                        attempt = attempts,
                        max = channel.config.max_reconnect_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "scheduling reconnect"
                    );
                    tokio::time::sleep(delay).await;
                    if channel.intentional.load(Ordering::SeqCst) {
                        break;
                    }
                    match Self::establish(&channel.config, &channel.token, &channel.state, &inbound)
                        .await
                    {
                        Ok(reconnected) => {
                            attempts = 0;
                            reconnected
                        }
                        Err(err) => {
                            tracing::warn!(%err, "reconnect attempt failed");
                            continue;
                        }
                    }
                }
            };

            Self::run_connection(&channel, active, &mut outbound_rx, &inbound).await;
            channel.state.send_replace(ChannelState::Disconnected);
            if channel.intentional.load(Ordering::SeqCst) {
                break;
            }
        }
        channel.state.send_replace(ChannelState::Disconnected);
    }

    /// Drive one live connection until it closes.
    async fn run_connection(
        channel: &Arc<Self>,
        stream: WsStream,
        outbound_rx: &mut mpsc::UnboundedReceiver<ClientFrame>,
        inbound: &mpsc::UnboundedSender<ServerFrame>,
    ) {
        let (mut sink, mut reader) = stream.split();
        let mut ping = tokio::time::interval_at(
            tokio::time::Instant::now() + channel.config.ping_interval,
            channel.config.ping_interval,
        );

        loop {
            tokio::select! {
                frame = outbound_rx.recv() => {
                    let Some(frame) = frame else { break };
                    match serde_json::to_string(&frame) {
                        Ok(text) => {
                            if sink.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => tracing::warn!(%err, "failed to encode outbound frame"),
                    }
                }
                _ = ping.tick() => {
                    let Ok(text) = serde_json::to_string(&ClientFrame::Ping) else { continue };
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                message = reader.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(frame) = parse_server_frame(&text) {
                                if inbound.send(frame).is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            tracing::warn!(%err, "transport error");
                            break;
                        }
                    }
                }
            }
        }
        let _ = sink.close().await;
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        if let Some(task) = self.supervisor.lock().unwrap().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        let base = Duration::from_secs(1);
        let cap = Duration::from_secs(30);
        let delays: Vec<u64> = (1..=5)
            .map(|attempt| backoff_delay(attempt, base, cap).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn backoff_is_capped() {
        let base = Duration::from_secs(1);
        let cap = Duration::from_secs(30);
        assert_eq!(backoff_delay(6, base, cap), Duration::from_secs(30));
        assert_eq!(backoff_delay(40, base, cap), Duration::from_secs(30));
    }
}
