//! Verification driver: lock, oracle check, countdown.
//!
//! DESIGN
//! ======
//! The shared `verification` record is the room's lock: whoever creates it
//! (set-if-absent) owns verification until the record is deleted. The owner:
//! 1. registers remove-on-disconnect, tying the record to its session,
//! 2. asks the oracle using the chat alone,
//! 3. if the oracle wants to see the board, renders the shared strokes and asks again,
//! 4. publishes the verdict. Unsolved records stay until the owner acknowledges.
//!    Solved records are shown for a moment, then the owner counts 3→0 once per
//!    second, holds zero briefly so every peer sees it, and deletes the record.
//!
//! Peers never talk to the driver; they watch the record and start the
//! battle themselves when they observe countdown zero.

#[cfg(test)]
#[path = "verification_test.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use canvas::clock::now_ms;
use canvas::consts::{COUNTDOWN_HOLD_MS, COUNTDOWN_START, COUNTDOWN_STEP_MS, SOLVED_DISPLAY_MS};
use canvas::doc::{Stroke, StrokeStore};
use canvas::records::{VerificationRecord, VerificationUpdate};
use canvas::render::raster::{Snapshot, export_snapshot};
use canvas::sync::{self, RoomPath, SyncError};
use canvas::verify::can_acquire;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::channel::{ChannelError, RealtimeChannel, scoped};
use crate::frame::ErrorCode;
use crate::oracle::{ChatLine, OracleError, TutoringOracle, Verdict, VerifyRequest};

pub const CHECKING_MESSAGE: &str = "Checking your solution...";
pub const BOARD_MESSAGE: &str = "Taking a look at your whiteboard...";

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Encode(#[from] SyncError),

    #[error("verification task aborted")]
    Aborted,
}

impl ErrorCode for VerifyError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Channel(e) => e.error_code(),
            Self::Encode(_) => "E_RECORD_ENCODE",
            Self::Aborted => "E_VERIFY_ABORTED",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Channel(e) => e.retryable(),
            Self::Encode(_) | Self::Aborted => false,
        }
    }
}

/// Delays of the solved path. Defaults match what every peer expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub solved_display: Duration,
    pub countdown_step: Duration,
    pub hold: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            solved_display: Duration::from_millis(SOLVED_DISPLAY_MS),
            countdown_step: Duration::from_millis(COUNTDOWN_STEP_MS),
            hold: Duration::from_millis(COUNTDOWN_HOLD_MS),
        }
    }
}

/// Who is asking and about what.
#[derive(Debug, Clone)]
pub struct VerifyContext {
    pub user_id: String,
    pub username: String,
    pub problem: String,
    pub history: Vec<ChatLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Another member holds the lock. Nothing was written.
    Busy,
    /// Verdict published; waiting for the owner's acknowledgment.
    Unsolved(String),
    /// Countdown finished and the record was deleted.
    Solved,
}

#[derive(Clone)]
pub struct Verifier {
    channel: Arc<dyn RealtimeChannel>,
    oracle: Arc<dyn TutoringOracle>,
    room_prefix: String,
    session: Uuid,
    timings: Timings,
}

impl Verifier {
    #[must_use]
    pub fn new(
        channel: Arc<dyn RealtimeChannel>,
        oracle: Arc<dyn TutoringOracle>,
        room_prefix: impl Into<String>,
        session: Uuid,
    ) -> Self {
        Self { channel, oracle, room_prefix: room_prefix.into(), session, timings: Timings::default() }
    }

    #[must_use]
    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    fn record_path(&self) -> String {
        scoped(&self.room_prefix, &RoomPath::Verification.to_string())
    }

    /// Run the whole handshake in a background task.
    #[must_use]
    pub fn spawn(&self, ctx: VerifyContext) -> VerificationHandle {
        let verifier = self.clone();
        let user_id = ctx.user_id.clone();
        let task = tokio::spawn(async move { verifier.run(ctx).await });
        VerificationHandle { task, channel: self.channel.clone(), path: self.record_path(), session: self.session, user_id }
    }

    /// Run the handshake to completion.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError`] if a record write fails. Oracle failures are
    /// not errors; they become an unsolved verdict.
    pub async fn run(&self, ctx: VerifyContext) -> Result<VerifyOutcome, VerifyError> {
        let path = self.record_path();
        if !self.acquire(&ctx, &path).await? {
            info!(user = %ctx.user_id, "verify: lock held by another member");
            return Ok(VerifyOutcome::Busy);
        }
        self.channel.remove_on_disconnect(self.session, &path).await?;

        let verdict = match self.ask(&ctx, &path).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "verify: oracle failed");
                Verdict { solved: false, needs_whiteboard: false, message: format!("Verification failed: {e}") }
            }
        };

        if !verdict.solved {
            self.publish(&path, VerificationUpdate {
                message: Some(verdict.message.clone()),
                solved: Some(false),
                ..VerificationUpdate::default()
            })
            .await?;
            return Ok(VerifyOutcome::Unsolved(verdict.message));
        }

        self.publish(&path, VerificationUpdate {
            message: Some(verdict.message.clone()),
            solved: Some(true),
            ..VerificationUpdate::default()
        })
        .await?;
        tokio::time::sleep(self.timings.solved_display).await;

        for n in (0..=COUNTDOWN_START).rev() {
            self.publish(&path, VerificationUpdate { countdown: Some(n), ..VerificationUpdate::default() }).await?;
            if n > 0 {
                tokio::time::sleep(self.timings.countdown_step).await;
            }
        }
        tokio::time::sleep(self.timings.hold).await;
        self.channel.remove(&path).await?;
        self.channel.cancel_on_disconnect(self.session, &path).await?;
        info!(user = %ctx.user_id, "verify: solved, countdown complete");
        Ok(VerifyOutcome::Solved)
    }

    /// Take the lock, or confirm we already hold it.
    async fn acquire(&self, ctx: &VerifyContext, path: &str) -> Result<bool, VerifyError> {
        let record = VerificationRecord::checking(&ctx.user_id, &ctx.username, CHECKING_MESSAGE, now_ms());
        let value = sync::encode(&record)?;
        let Some(existing) = self.channel.set_if_absent(path, value.clone()).await? else {
            return Ok(true);
        };
        let existing: Option<VerificationRecord> = sync::decode(Some(existing));
        if !can_acquire(existing.as_ref(), &ctx.user_id) {
            return Ok(false);
        }
        self.channel.set(path, value).await?;
        Ok(true)
    }

    /// Chat-only check, then one retry with the board if the oracle asks.
    async fn ask(&self, ctx: &VerifyContext, path: &str) -> Result<Verdict, OracleError> {
        let request = VerifyRequest { problem: ctx.problem.clone(), history: ctx.history.clone(), image: None };
        let verdict = self.oracle.verify(request.clone()).await?;
        if verdict.solved || !verdict.needs_whiteboard {
            return Ok(verdict);
        }

        let update = VerificationUpdate { message: Some(BOARD_MESSAGE.into()), ..VerificationUpdate::default() };
        if let Err(e) = self.publish(path, update).await {
            warn!(error = %e, "verify: status update failed");
        }
        match board_snapshot(self.channel.as_ref(), &self.room_prefix).await {
            Some(image) => self.oracle.verify(VerifyRequest { image: Some(image), ..request }).await,
            None => Ok(verdict),
        }
    }

    async fn publish(&self, path: &str, mut update: VerificationUpdate) -> Result<(), VerifyError> {
        update.timestamp = Some(now_ms());
        let fields = sync::encode_fields(&update)?;
        self.channel.update(path, fields).await?;
        Ok(())
    }
}

/// Raster of the room's shared strokes, or `None` for an empty board.
/// Read and export failures are logged and read as no board.
pub async fn board_snapshot(channel: &dyn RealtimeChannel, room_prefix: &str) -> Option<Snapshot> {
    let path = scoped(room_prefix, &RoomPath::Whiteboard.to_string());
    let strokes = match channel.get(&path).await {
        Ok(value) => sync::decode_children::<Stroke>(value),
        Err(e) => {
            warn!(error = %e, "verify: whiteboard read failed");
            return None;
        }
    };
    let mut store = StrokeStore::new();
    store.load_snapshot(strokes.into_iter().map(|(_, stroke)| stroke).collect());
    match export_snapshot(&store) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, "verify: snapshot export failed");
            None
        }
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// A running verification. Dropping the handle leaves the task running.
pub struct VerificationHandle {
    task: JoinHandle<Result<VerifyOutcome, VerifyError>>,
    channel: Arc<dyn RealtimeChannel>,
    path: String,
    session: Uuid,
    user_id: String,
}

impl VerificationHandle {
    /// Wait for the outcome. Call at most once.
    ///
    /// # Errors
    ///
    /// Returns the error from the run, or [`VerifyError::Aborted`] if the
    /// task was aborted or panicked.
    pub async fn join(&mut self) -> Result<VerifyOutcome, VerifyError> {
        match (&mut self.task).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "verify: task ended abnormally");
                Err(VerifyError::Aborted)
            }
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop mid-flight and release the lock if this user still holds it.
    ///
    /// # Errors
    ///
    /// Returns the channel error if the release fails.
    pub async fn cancel(self) -> Result<(), ChannelError> {
        self.task.abort();
        release_if_owner(self.channel.as_ref(), &self.path, &self.user_id).await?;
        self.channel.cancel_on_disconnect(self.session, &self.path).await
    }
}

/// Delete an unsolved record owned by `user_id` and drop `session`'s
/// disconnect registration for it. Returns whether anything was removed.
///
/// # Errors
///
/// Returns the channel error from the read or the removal.
pub async fn acknowledge(
    channel: &dyn RealtimeChannel,
    room_prefix: &str,
    session: Uuid,
    user_id: &str,
) -> Result<bool, ChannelError> {
    let path = scoped(room_prefix, &RoomPath::Verification.to_string());
    let record: Option<VerificationRecord> = sync::decode(channel.get(&path).await?);
    match record {
        Some(r) if r.user_id == user_id && r.solved == Some(false) => {
            channel.remove(&path).await?;
            channel.cancel_on_disconnect(session, &path).await?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

async fn release_if_owner(channel: &dyn RealtimeChannel, path: &str, user_id: &str) -> Result<bool, ChannelError> {
    let record: Option<VerificationRecord> = sync::decode(channel.get(path).await?);
    if record.is_some_and(|r| r.user_id == user_id) {
        channel.remove(path).await?;
        return Ok(true);
    }
    Ok(false)
}
