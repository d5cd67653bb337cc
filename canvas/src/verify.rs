//! Local view of the shared verification record.
//!
//! The record under `verification` is both the lock ("who is verifying") and
//! the status every peer renders. Only the owning peer writes it; everyone
//! derives the same [`VerifyPhase`] from it. When a peer observes the
//! countdown reach zero it starts the battle from its own stroke snapshot,
//! exactly once per countdown.

#[cfg(test)]
#[path = "verify_test.rs"]
mod verify_test;

use crate::records::VerificationRecord;

/// Phase derived from the current record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyPhase {
    /// No record: anyone may start verifying.
    Idle,
    /// The owner is waiting on the tutoring oracle.
    Checking,
    /// The oracle said the work is not done; shown until the owner acknowledges.
    Unsolved,
    /// Solved verdict on display before the countdown.
    Solved,
    /// Countdown value published by the owner.
    Countdown(u32),
}

impl VerifyPhase {
    #[must_use]
    pub fn of(record: Option<&VerificationRecord>) -> Self {
        let Some(rec) = record else {
            return Self::Idle;
        };
        if let Some(n) = rec.countdown {
            return Self::Countdown(n);
        }
        match rec.solved {
            Some(true) => Self::Solved,
            Some(false) => Self::Unsolved,
            None => Self::Checking,
        }
    }
}

/// Whether `user_id` may take the lock given what is stored now.
#[must_use]
pub fn can_acquire(existing: Option<&VerificationRecord>, user_id: &str) -> bool {
    existing.is_none_or(|rec| rec.user_id == user_id)
}

/// Tracks the last observed record for one peer.
#[derive(Debug, Clone)]
pub struct VerifyView {
    local_user: String,
    record: Option<VerificationRecord>,
    battle_fired: bool,
}

impl VerifyView {
    #[must_use]
    pub fn new(local_user: impl Into<String>) -> Self {
        Self { local_user: local_user.into(), record: None, battle_fired: false }
    }

    /// Record the latest shared value. Returns `true` exactly once per
    /// countdown, on the first observation of `countdown == 0`.
    pub fn observe(&mut self, record: Option<VerificationRecord>) -> bool {
        let at_zero = record.as_ref().is_some_and(|r| r.countdown == Some(0));
        self.record = record;
        if !at_zero {
            self.battle_fired = false;
            return false;
        }
        if self.battle_fired {
            return false;
        }
        self.battle_fired = true;
        true
    }

    #[must_use]
    pub fn phase(&self) -> VerifyPhase {
        VerifyPhase::of(self.record.as_ref())
    }

    #[must_use]
    pub fn record(&self) -> Option<&VerificationRecord> {
        self.record.as_ref()
    }

    /// Status text for the overlay, `None` when idle.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.message.as_str())
    }

    #[must_use]
    pub fn is_mine(&self) -> bool {
        self.record.as_ref().is_some_and(|r| r.user_id == self.local_user)
    }

    /// Someone else holds the lock; local verify requests are no-ops.
    #[must_use]
    pub fn is_locked_by_other(&self) -> bool {
        !can_acquire(self.record.as_ref(), &self.local_user)
    }

    /// The local user owns an unsolved verdict and must dismiss it.
    #[must_use]
    pub fn needs_ack(&self) -> bool {
        self.is_mine() && self.phase() == VerifyPhase::Unsolved
    }
}
