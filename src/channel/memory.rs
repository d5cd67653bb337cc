//! In-process [`RealtimeChannel`]: one JSON tree behind a mutex.
//!
//! Writes and their notifications happen under the same lock, so every
//! subscriber sees writes in the order they were applied. Delivery uses
//! `try_send`; a subscriber that falls `queue_depth` events behind loses
//! events rather than stalling writers.

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;

use std::collections::HashMap;

use serde_json::{Map, Value};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ChannelError, ChannelEvent, RealtimeChannel, Subscription, segments};

struct Subscriber {
    prefix: Vec<String>,
    tx: mpsc::Sender<ChannelEvent>,
}

#[derive(Default)]
struct Inner {
    tree: Map<String, Value>,
    subscribers: Vec<Subscriber>,
    on_disconnect: HashMap<Uuid, Vec<String>>,
}

pub struct MemoryChannel {
    inner: Mutex<Inner>,
    queue_depth: usize,
}

impl MemoryChannel {
    #[must_use]
    pub fn new(queue_depth: usize) -> Self {
        Self { inner: Mutex::new(Inner::default()), queue_depth: queue_depth.max(1) }
    }

    /// Number of live subscriptions. Closed receivers are counted until the
    /// next write notices them.
    pub async fn subscriber_count(&self) -> usize {
        self.inner.lock().await.subscribers.len()
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SUBSCRIBER_QUEUE_DEPTH)
    }
}

#[async_trait::async_trait]
impl RealtimeChannel for MemoryChannel {
    async fn get(&self, path: &str) -> Result<Option<Value>, ChannelError> {
        let segs = segments(path)?;
        let inner = self.inner.lock().await;
        Ok(lookup(&inner.tree, &segs).cloned())
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), ChannelError> {
        let segs = segments(path)?;
        let mut inner = self.inner.lock().await;
        inner.write(&segs, Some(value));
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), ChannelError> {
        let segs = segments(path)?;
        let mut inner = self.inner.lock().await;
        let mut merged = match lookup(&inner.tree, &segs) {
            Some(Value::Object(existing)) => existing.clone(),
            _ => Map::new(),
        };
        for (key, value) in fields {
            if value.is_null() {
                merged.remove(&key);
            } else {
                merged.insert(key, value);
            }
        }
        inner.write(&segs, Some(Value::Object(merged)));
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), ChannelError> {
        let segs = segments(path)?;
        let mut inner = self.inner.lock().await;
        inner.write(&segs, None);
        Ok(())
    }

    async fn set_if_absent(&self, path: &str, value: Value) -> Result<Option<Value>, ChannelError> {
        let segs = segments(path)?;
        let mut inner = self.inner.lock().await;
        if let Some(existing) = lookup(&inner.tree, &segs) {
            return Ok(Some(existing.clone()));
        }
        inner.write(&segs, Some(value));
        Ok(None)
    }

    async fn remove_on_disconnect(&self, session: Uuid, path: &str) -> Result<(), ChannelError> {
        segments(path)?;
        let mut inner = self.inner.lock().await;
        let paths = inner.on_disconnect.entry(session).or_default();
        if !paths.iter().any(|p| p == path) {
            paths.push(path.to_string());
        }
        Ok(())
    }

    async fn cancel_on_disconnect(&self, session: Uuid, path: &str) -> Result<(), ChannelError> {
        segments(path)?;
        let mut inner = self.inner.lock().await;
        if let Some(paths) = inner.on_disconnect.get_mut(&session) {
            paths.retain(|p| p != path);
            if paths.is_empty() {
                inner.on_disconnect.remove(&session);
            }
        }
        Ok(())
    }

    async fn disconnect(&self, session: Uuid) {
        let mut inner = self.inner.lock().await;
        let Some(paths) = inner.on_disconnect.remove(&session) else {
            return;
        };
        debug!(%session, count = paths.len(), "channel: running disconnect cleanup");
        for path in paths {
            if let Ok(segs) = segments(&path) {
                inner.write(&segs, None);
            }
        }
    }

    async fn subscribe(&self, prefix: &str) -> Result<Subscription, ChannelError> {
        let segs = segments(prefix)?;
        let (tx, rx) = mpsc::channel(self.queue_depth);
        let mut inner = self.inner.lock().await;
        if let Some(current) = lookup(&inner.tree, &segs) {
            let initial = ChannelEvent { path: segs.join("/"), value: Some(current.clone()) };
            if tx.try_send(initial).is_err() {
                warn!(prefix, "channel: initial event dropped");
            }
        }
        inner.subscribers.push(Subscriber { prefix: segs.iter().map(|s| (*s).to_string()).collect(), tx });
        Ok(Subscription::new(segs.join("/"), rx))
    }
}

// =============================================================================
// TREE
// =============================================================================

impl Inner {
    /// Apply a write and notify watchers. `None` or a vacant value removes.
    fn write(&mut self, segs: &[&str], value: Option<Value>) {
        let value = value.filter(|v| !is_vacant(v));
        write_at(&mut self.tree, segs, value);
        self.notify(segs);
    }

    fn notify(&mut self, written: &[&str]) {
        let tree = &self.tree;
        self.subscribers.retain(|sub| {
            let target: Vec<&str> = if is_prefix(&sub.prefix, written) {
                written.to_vec()
            } else if is_strict_ancestor(written, &sub.prefix) {
                sub.prefix.iter().map(String::as_str).collect()
            } else {
                return !sub.tx.is_closed();
            };
            let event = ChannelEvent { path: target.join("/"), value: lookup(tree, &target).cloned() };
            match sub.tx.try_send(event) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(event)) => {
                    warn!(prefix = %sub.prefix.join("/"), path = %event.path, "channel: subscriber queue full, event dropped");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}

fn is_vacant(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// `prefix` is an ancestor of (or equal to) `path`.
fn is_prefix(prefix: &[String], path: &[&str]) -> bool {
    prefix.len() <= path.len() && prefix.iter().zip(path).all(|(a, b)| a == b)
}

/// `path` is a strict ancestor of `prefix`.
fn is_strict_ancestor(path: &[&str], prefix: &[String]) -> bool {
    path.len() < prefix.len() && path.iter().zip(prefix).all(|(a, b)| a == b)
}

fn lookup<'a>(tree: &'a Map<String, Value>, segs: &[&str]) -> Option<&'a Value> {
    let (last, parents) = segs.split_last()?;
    let mut map = tree;
    for seg in parents {
        match map.get(*seg) {
            Some(Value::Object(child)) => map = child,
            _ => return None,
        }
    }
    map.get(*last)
}

/// Set or remove the node at `segs`, creating intermediate objects on write
/// and pruning ancestors left empty by a removal.
fn write_at(map: &mut Map<String, Value>, segs: &[&str], value: Option<Value>) {
    let Some((head, rest)) = segs.split_first() else {
        return;
    };
    if rest.is_empty() {
        match value {
            Some(v) => {
                map.insert((*head).to_string(), v);
            }
            None => {
                map.remove(*head);
            }
        }
        return;
    }

    let slot = map.entry((*head).to_string()).or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        if value.is_none() {
            return;
        }
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(child) = slot {
        write_at(child, rest, value);
        if child.is_empty() {
            map.remove(*head);
        }
    }
}
