//! Fire-and-forget dispatch of engine sync ops.
//!
//! DESIGN
//! ======
//! The engine never awaits the network. Ops go into a bounded queue drained
//! by a single task, which keeps them in emission order. Enqueueing never
//! blocks: a full queue drops the op with a warning. Failed writes are
//! logged and never retried.

#[cfg(test)]
#[path = "sync_writer_test.rs"]
mod tests;

use std::sync::Arc;

use canvas::sync::SyncOp;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::channel::{ChannelError, RealtimeChannel, scoped};

enum Job {
    Op(SyncOp),
    Flush(oneshot::Sender<()>),
}

pub struct SyncWriter {
    tx: mpsc::Sender<Job>,
    task: JoinHandle<()>,
}

impl SyncWriter {
    /// Start the drain task. `room_prefix` scopes every op path
    /// (`rooms/{room}`); `session` owns remove-on-disconnect registrations.
    #[must_use]
    pub fn spawn(channel: Arc<dyn RealtimeChannel>, room_prefix: String, session: Uuid, depth: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Job>(depth.max(1));
        let task = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    Job::Op(op) => {
                        let verb = op.verb();
                        let path = op.path().to_string();
                        if let Err(e) = apply(channel.as_ref(), &room_prefix, session, op).await {
                            warn!(error = %e, verb, path = %path, "sync: write failed");
                        }
                    }
                    Job::Flush(done) => {
                        if done.send(()).is_err() {
                            debug!("sync: flush waiter went away");
                        }
                    }
                }
            }
        });
        Self { tx, task }
    }

    /// Queue `op` without waiting.
    pub fn dispatch(&self, op: SyncOp) {
        match self.tx.try_send(Job::Op(op)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(Job::Op(op))) => {
                warn!(verb = op.verb(), path = %op.path(), "sync: queue full, op dropped");
            }
            Err(_) => warn!("sync: writer stopped, op dropped"),
        }
    }

    /// Wait until every op queued before this call has been attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Job::Flush(done_tx)).await.is_err() {
            return;
        }
        if done_rx.await.is_err() {
            debug!("sync: writer stopped before flush");
        }
    }

    /// Drain what is queued and stop.
    pub async fn shutdown(self) {
        let Self { tx, task } = self;
        drop(tx);
        if let Err(e) = task.await {
            warn!(error = %e, "sync: writer task failed");
        }
    }
}

/// Perform one op against the channel under `room_prefix`.
///
/// # Errors
///
/// Propagates the channel error. An occupied `SetIfAbsent` is not an error.
pub async fn apply(
    channel: &dyn RealtimeChannel,
    room_prefix: &str,
    session: Uuid,
    op: SyncOp,
) -> Result<(), ChannelError> {
    let path = scoped(room_prefix, &op.path().to_string());
    match op {
        SyncOp::Set { value, .. } => channel.set(&path, value).await,
        SyncOp::Update { fields, .. } => channel.update(&path, fields).await,
        SyncOp::Remove { .. } => channel.remove(&path).await,
        SyncOp::SetIfAbsent { value, .. } => {
            if channel.set_if_absent(&path, value).await?.is_some() {
                debug!(path = %path, "sync: set_if_absent found an existing value");
            }
            Ok(())
        }
        SyncOp::RemoveOnDisconnect { .. } => channel.remove_on_disconnect(session, &path).await,
    }
}
