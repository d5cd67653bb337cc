//! Profile store seam: the room core's narrow view of user profiles.
//!
//! Account management lives elsewhere. The room only needs to read a
//! display profile, grant XP, and record achievements after a battle.

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::frame::ErrorCode;

/// XP granted to each present member when a battle is won.
pub const BATTLE_VICTORY_XP: u64 = 100;

/// Achievement recorded on a member's first battle victory.
pub const FIRST_VICTORY: &str = "first-victory";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("profile not found: {0}")]
    NotFound(String),

    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

impl ErrorCode for ProfileError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_PROFILE_NOT_FOUND",
            Self::Unavailable(_) => "E_PROFILE_UNAVAILABLE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub achievements: Vec<String>,
}

impl Profile {
    #[must_use]
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), username: username.into(), ..Self::default() }
    }
}

#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, ProfileError>;

    /// Add `amount` XP. Returns the new total.
    async fn grant_xp(&self, user_id: &str, amount: u64) -> Result<u64, ProfileError>;

    /// Record an achievement. Returns `false` if it was already recorded.
    async fn record_achievement(&self, user_id: &str, achievement: &str) -> Result<bool, ProfileError>;
}

/// In-process store used by the dev server and tests.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<HashMap<String, Profile>>,
}

impl MemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: Profile) {
        self.profiles.lock().await.insert(profile.user_id.clone(), profile);
    }
}

#[async_trait::async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, ProfileError> {
        Ok(self.profiles.lock().await.get(user_id).cloned())
    }

    async fn grant_xp(&self, user_id: &str, amount: u64) -> Result<u64, ProfileError> {
        let mut profiles = self.profiles.lock().await;
        let profile = profiles.get_mut(user_id).ok_or_else(|| ProfileError::NotFound(user_id.to_string()))?;
        profile.xp = profile.xp.saturating_add(amount);
        info!(user = user_id, amount, total = profile.xp, "profile: xp granted");
        Ok(profile.xp)
    }

    async fn record_achievement(&self, user_id: &str, achievement: &str) -> Result<bool, ProfileError> {
        let mut profiles = self.profiles.lock().await;
        let profile = profiles.get_mut(user_id).ok_or_else(|| ProfileError::NotFound(user_id.to_string()))?;
        if profile.achievements.iter().any(|a| a == achievement) {
            return Ok(false);
        }
        profile.achievements.push(achievement.to_string());
        info!(user = user_id, achievement, "profile: achievement recorded");
        Ok(true)
    }
}

/// Reward one member for a won battle: XP plus the first-victory achievement.
///
/// # Errors
///
/// Returns the store's error; XP may already have been granted when the
/// achievement write fails.
pub async fn reward_victory(store: &dyn ProfileStore, user_id: &str) -> Result<u64, ProfileError> {
    let total = store.grant_xp(user_id, BATTLE_VICTORY_XP).await?;
    store.record_achievement(user_id, FIRST_VICTORY).await?;
    Ok(total)
}
