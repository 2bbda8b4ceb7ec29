//! Wire frames for the realtime channel.
//!
//! Outbound frames serialize as `{"type": "...", "data": {...}}` with the
//! data object omitted for unit commands. Inbound frames are dispatched on
//! their `type` string; unrecognized types are ignored, not fatal.

use serde::Serialize;

use crate::stats::CompletedSession;
use crate::timer::{BreakKind, Session};

/// Frames this client sends. None of them block on a reply: state is
/// updated optimistically and locally first, and the later acknowledgment
/// reconciles if needed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientFrame {
    #[serde(rename = "auth")]
    Auth { token: String },
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "session:start", rename_all = "camelCase")]
    SessionStart {
        #[serde(skip_serializing_if = "Option::is_none")]
        project: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        focus_duration: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        short_break_duration: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        long_break_duration: Option<u32>,
    },
    #[serde(rename = "session:pause")]
    SessionPause,
    #[serde(rename = "session:resume")]
    SessionResume,
    #[serde(rename = "session:stop")]
    SessionStop,
    #[serde(rename = "session:skip")]
    SessionSkip,
    #[serde(rename = "session:update-project")]
    SessionUpdateProject { project: String },
    #[serde(rename = "session:transition-to-break", rename_all = "camelCase")]
    SessionTransitionToBreak {
        break_type: BreakKind,
        auto_start: bool,
    },
}

/// Frames the remote authority sends.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    AuthSuccess {
        user_id: String,
        connections: u32,
        /// Authoritative current session; `None` means no session is live.
        session: Option<Session>,
    },
    AuthError {
        message: String,
    },
    Pong {
        timestamp: i64,
    },
    /// `None` means the session was stopped elsewhere.
    SessionUpdate {
        session: Option<Session>,
    },
    SessionResponse {
        session: Option<Session>,
    },
    SessionAck {
        success: bool,
        session: Option<Session>,
    },
    SessionError {
        message: String,
    },
    /// A focus session finished on another device.
    SessionCompleted {
        completed: CompletedSession,
    },
    Error {
        message: String,
    },
}

/// Parse an inbound frame. Returns `None` for malformed payloads and for
/// message types this client does not know.
pub fn parse_server_frame(text: &str) -> Option<ServerFrame> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let frame = match value.get("type")?.as_str()? {
        "auth:success" => ServerFrame::AuthSuccess {
            user_id: value["userId"].as_str()?.to_string(),
            connections: value["connections"].as_u64().unwrap_or(0) as u32,
            session: parse_session_field(&value["session"])?,
        },
        "auth:error" => ServerFrame::AuthError {
            message: message_of(&value),
        },
        "pong" => ServerFrame::Pong {
            timestamp: value["timestamp"].as_i64().unwrap_or(0),
        },
        "session:update" => ServerFrame::SessionUpdate {
            session: parse_session_field(&value["data"])?,
        },
        "session:response" => ServerFrame::SessionResponse {
            session: parse_session_field(&value["data"])?,
        },
        "session:ack" => ServerFrame::SessionAck {
            success: value["success"].as_bool().unwrap_or(false),
            session: parse_session_field(&value["data"])?,
        },
        "session:error" => ServerFrame::SessionError {
            message: message_of(&value),
        },
        "session:completed" => ServerFrame::SessionCompleted {
            completed: serde_json::from_value(value["data"].clone()).ok()?,
        },
        "error" => ServerFrame::Error {
            message: message_of(&value),
        },
        _ => return None,
    };
    Some(frame)
}

/// `Some(None)` is an explicit null (session stopped); `None` is a payload
/// that failed to decode and must not be mistaken for a stop.
fn parse_session_field(value: &serde_json::Value) -> Option<Option<Session>> {
    if value.is_null() {
        return Some(None);
    }
    serde_json::from_value(value.clone()).ok().map(Some)
}

fn message_of(value: &serde_json::Value) -> String {
    value["message"].as_str().unwrap_or_default().to_string()
}
