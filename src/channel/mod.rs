//! Realtime state channel: a path-addressed, last-writer-wins JSON tree.
//!
//! DESIGN
//! ======
//! Paths are slash-separated keys (`rooms/r1/battle/players/u1`). A write at
//! `P` replaces the subtree at `P`; writing `null` or an empty object removes
//! it, and parents left empty are pruned. Subscribers register a prefix and
//! receive a [`ChannelEvent`] for every write that touches it:
//! - writes at or below the prefix arrive at their own path,
//! - writes above the prefix arrive at the prefix with its new value.
//!
//! Remove-on-disconnect registrations are scoped to a session id chosen by
//! the caller (one per websocket, one per in-process room session) and run
//! when that session disconnects.

pub mod memory;

pub use memory::MemoryChannel;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::frame::ErrorCode;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
    #[error("channel closed")]
    Closed,
}

impl ErrorCode for ChannelError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) => "E_INVALID_PATH",
            Self::Closed => "E_CHANNEL_CLOSED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// One change notification. `value` is `None` when the path was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub path: String,
    pub value: Option<Value>,
}

/// Receiving end of a prefix subscription. Dropping it unsubscribes.
pub struct Subscription {
    prefix: String,
    rx: mpsc::Receiver<ChannelEvent>,
}

impl Subscription {
    #[must_use]
    pub fn new(prefix: String, rx: mpsc::Receiver<ChannelEvent>) -> Self {
        Self { prefix, rx }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Next event, or `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.rx.recv().await
    }

    /// Next already-queued event without waiting.
    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(_) => None,
        }
    }
}

#[async_trait::async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// One-shot read.
    async fn get(&self, path: &str) -> Result<Option<Value>, ChannelError>;

    async fn set(&self, path: &str, value: Value) -> Result<(), ChannelError>;

    /// Merge `fields` into the object at `path`; `null` fields are removed.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), ChannelError>;

    async fn remove(&self, path: &str) -> Result<(), ChannelError>;

    /// Write `value` only if nothing exists at `path`. Returns `None` when
    /// the write happened, otherwise the value already there.
    async fn set_if_absent(&self, path: &str, value: Value) -> Result<Option<Value>, ChannelError>;

    /// Remove `path` when `session` disconnects.
    async fn remove_on_disconnect(&self, session: Uuid, path: &str) -> Result<(), ChannelError>;

    /// Drop one registration made with [`RealtimeChannel::remove_on_disconnect`].
    /// Unknown registrations are ignored.
    async fn cancel_on_disconnect(&self, session: Uuid, path: &str) -> Result<(), ChannelError>;

    /// Run and forget every registration held by `session`.
    async fn disconnect(&self, session: Uuid);

    /// Watch `prefix`. The current value, if any, is delivered first.
    async fn subscribe(&self, prefix: &str) -> Result<Subscription, ChannelError>;
}

/// Split a path into its non-empty segments.
///
/// # Errors
///
/// Returns [`ChannelError::InvalidPath`] for an empty path or an empty
/// segment (`a//b`).
pub fn segments(path: &str) -> Result<Vec<&str>, ChannelError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(ChannelError::InvalidPath(path.to_string()));
    }
    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(ChannelError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

/// Channel prefix holding one room's state.
#[must_use]
pub fn room_prefix(room: &str) -> String {
    format!("rooms/{}", room.trim_matches('/'))
}

/// Join room-scoped paths: `scoped("rooms/r1", "battle")`.
#[must_use]
pub fn scoped(prefix: &str, path: &str) -> String {
    let path = path.trim_matches('/');
    if path.is_empty() { prefix.to_string() } else { format!("{prefix}/{path}") }
}

/// Inverse of [`scoped`]. `None` when `path` is not under `prefix`.
#[must_use]
pub fn unscoped<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    if path == prefix {
        return Some("");
    }
    path.strip_prefix(prefix).and_then(|rest| rest.strip_prefix('/'))
}
