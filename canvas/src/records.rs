//! Wire records for the non-entity room paths.
//!
//! Each shared path has one explicit DTO. Optional fields are skipped when
//! absent so an encoded record never carries nulls.

#[cfg(test)]
#[path = "records_test.rs"]
mod records_test;

use serde::{Deserialize, Serialize};

/// `cursors/{userId}`: a peer's pointer in world space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorRecord {
    pub x: f64,
    pub y: f64,
    pub username: String,
    pub color: String,
    /// Milliseconds since Unix epoch when the cursor was published.
    pub timestamp: i64,
}

impl CursorRecord {
    /// Whether the cursor is too old to show at `now_ms`.
    #[must_use]
    pub fn is_stale(&self, now_ms: i64) -> bool {
        now_ms - self.timestamp > crate::consts::CURSOR_STALE_MS
    }
}

/// `verification`: the singleton lock naming the peer currently verifying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    pub user_id: String,
    pub username: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub awaiting_teacher: Option<bool>,
    pub timestamp: i64,
}

impl VerificationRecord {
    /// A fresh lock record in the checking state.
    #[must_use]
    pub fn checking(user_id: impl Into<String>, username: impl Into<String>, message: impl Into<String>, now_ms: i64) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            message: message.into(),
            solved: None,
            countdown: None,
            awaiting_teacher: None,
            timestamp: now_ms,
        }
    }
}

/// Partial update for the verification record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// `battle/gameState`: terminal flags, set at most once per battle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateRecord {
    pub game_over: bool,
    pub game_won: bool,
}

/// Health fields of `battle/players/{userId}` any peer may write.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerHealthUpdate {
    pub health: f64,
    pub is_alive: bool,
}

/// Position fields of an owner-authored record (player or projectile).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub x: f64,
    pub y: f64,
}
