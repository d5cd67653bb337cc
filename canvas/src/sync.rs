//! Room key paths, write disciplines, and the sync operations the engines emit.
//!
//! DESIGN
//! ======
//! The engines never talk to the realtime channel directly. They emit
//! [`SyncOp`]s addressed by a typed [`RoomPath`] and the host dispatches them
//! fire-and-forget. Every path carries a [`Discipline`]; [`SyncGuard`] checks
//! each op against it before it leaves the engine, so a peer can only write
//! what the ownership rules allow (owner-only positions, any-writer deletes,
//! host-only enemy snapshots, create-if-absent verification lock).

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A key path relative to the room root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomPath {
    /// `whiteboard`: the whole stroke collection.
    Whiteboard,
    /// `whiteboard/{strokeId}`
    Stroke(String),
    /// `cursors`
    Cursors,
    /// `cursors/{userId}`
    Cursor(String),
    /// `verification`: the singleton lock record.
    Verification,
    /// `battle`: root of all battle state.
    Battle,
    /// `battle/players`
    Players,
    /// `battle/players/{userId}`
    Player(String),
    /// `battle/enemies`
    Enemies,
    /// `battle/enemies/{enemyId}`
    Enemy(String),
    /// `battle/projectiles`
    Projectiles,
    /// `battle/projectiles/{projectileId}`
    Projectile(String),
    /// `battle/gameState`
    GameState,
    /// `presence`
    Presence,
    /// `presence/{userId}`
    PresenceMember(String),
    /// `chat`
    Chat,
}

impl fmt::Display for RoomPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whiteboard => f.write_str("whiteboard"),
            Self::Stroke(id) => write!(f, "whiteboard/{id}"),
            Self::Cursors => f.write_str("cursors"),
            Self::Cursor(uid) => write!(f, "cursors/{uid}"),
            Self::Verification => f.write_str("verification"),
            Self::Battle => f.write_str("battle"),
            Self::Players => f.write_str("battle/players"),
            Self::Player(uid) => write!(f, "battle/players/{uid}"),
            Self::Enemies => f.write_str("battle/enemies"),
            Self::Enemy(id) => write!(f, "battle/enemies/{id}"),
            Self::Projectiles => f.write_str("battle/projectiles"),
            Self::Projectile(id) => write!(f, "battle/projectiles/{id}"),
            Self::GameState => f.write_str("battle/gameState"),
            Self::Presence => f.write_str("presence"),
            Self::PresenceMember(uid) => write!(f, "presence/{uid}"),
            Self::Chat => f.write_str("chat"),
        }
    }
}

impl RoomPath {
    /// Parse a room-relative path. Deeper paths (a single field of a record)
    /// and unknown roots return `None`.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let path = match segments.as_slice() {
            ["whiteboard"] => Self::Whiteboard,
            ["whiteboard", id] => Self::Stroke((*id).to_string()),
            ["cursors"] => Self::Cursors,
            ["cursors", uid] => Self::Cursor((*uid).to_string()),
            ["verification"] => Self::Verification,
            ["battle"] => Self::Battle,
            ["battle", "players"] => Self::Players,
            ["battle", "players", uid] => Self::Player((*uid).to_string()),
            ["battle", "enemies"] => Self::Enemies,
            ["battle", "enemies", id] => Self::Enemy((*id).to_string()),
            ["battle", "projectiles"] => Self::Projectiles,
            ["battle", "projectiles", id] => Self::Projectile((*id).to_string()),
            ["battle", "gameState"] => Self::GameState,
            ["presence"] => Self::Presence,
            ["presence", uid] => Self::PresenceMember((*uid).to_string()),
            ["chat"] => Self::Chat,
            _ => return None,
        };
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(path)
    }

    /// The write discipline that governs this path.
    #[must_use]
    pub fn discipline(&self) -> Discipline {
        match self {
            Self::Stroke(_) | Self::Cursor(_) | Self::Player(_) | Self::Projectile(_) | Self::PresenceMember(_) => {
                Discipline::ExclusiveOwner
            }
            Self::Enemy(_) => Discipline::AnyWriterDelete,
            Self::Enemies => Discipline::HostSnapshot,
            Self::Verification => Discipline::MutualExclusion,
            Self::Whiteboard
            | Self::Cursors
            | Self::Battle
            | Self::Players
            | Self::Projectiles
            | Self::GameState
            | Self::Presence
            | Self::Chat => Discipline::LastWriterWins,
        }
    }
}

/// Access discipline for a shared path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    /// Only the owning peer creates or rewrites the record. Player health and
    /// projectile hit-deletion are the two sanctioned exceptions.
    ExclusiveOwner,
    /// Created by the host at battle start; any peer may delete on a kill.
    AnyWriterDelete,
    /// Whole-collection overwrite reserved for the elected host.
    HostSnapshot,
    /// Create-if-absent lock held by one owner until released.
    MutualExclusion,
    /// Plain last-writer-wins.
    LastWriterWins,
}

/// Player fields any peer may write (damage is applied by whoever sees the hit).
pub const SHARED_PLAYER_FIELDS: [&str; 2] = ["health", "isAlive"];

/// A write against the realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOp {
    /// Replace the value at `path`.
    Set { path: RoomPath, value: serde_json::Value },
    /// Merge `fields` into the record at `path`.
    Update { path: RoomPath, fields: serde_json::Map<String, serde_json::Value> },
    /// Delete `path` and everything below it.
    Remove { path: RoomPath },
    /// Write `value` only if nothing is stored at `path`.
    SetIfAbsent { path: RoomPath, value: serde_json::Value },
    /// Delete `path` when this peer's connection drops.
    RemoveOnDisconnect { path: RoomPath },
}

impl SyncOp {
    #[must_use]
    pub fn path(&self) -> &RoomPath {
        match self {
            Self::Set { path, .. }
            | Self::Update { path, .. }
            | Self::Remove { path }
            | Self::SetIfAbsent { path, .. }
            | Self::RemoveOnDisconnect { path } => path,
        }
    }

    /// Short verb for logs.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Set { .. } => "set",
            Self::Update { .. } => "update",
            Self::Remove { .. } => "remove",
            Self::SetIfAbsent { .. } => "set_if_absent",
            Self::RemoveOnDisconnect { .. } => "on_disconnect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("{verb} on {path} requires ownership (owner {owner:?}, local {local})")]
    NotOwner { verb: &'static str, path: String, owner: Option<String>, local: String },
    #[error("{verb} on {path} is reserved for the host")]
    NotHost { verb: &'static str, path: String },
    #[error("{verb} is not allowed on {path}")]
    NotPermitted { verb: &'static str, path: String },
    #[error("record encode failed: {0}")]
    Encode(String),
}

/// Serialize a record for a `Set`.
///
/// # Errors
///
/// Returns [`SyncError::Encode`] if serialization fails.
pub fn encode<T: Serialize>(record: &T) -> Result<serde_json::Value, SyncError> {
    serde_json::to_value(record).map_err(|e| SyncError::Encode(e.to_string()))
}

/// Serialize a partial record for an `Update`. It must encode to an object.
///
/// # Errors
///
/// Returns [`SyncError::Encode`] if serialization fails or is not an object.
pub fn encode_fields<T: Serialize>(partial: &T) -> Result<serde_json::Map<String, serde_json::Value>, SyncError> {
    match encode(partial)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(SyncError::Encode(format!("expected object, got {other}"))),
    }
}

/// Checks ops against path disciplines for one local peer.
#[derive(Debug, Clone)]
pub struct SyncGuard {
    local_user: String,
    is_host: bool,
}

impl SyncGuard {
    #[must_use]
    pub fn new(local_user: impl Into<String>, is_host: bool) -> Self {
        Self { local_user: local_user.into(), is_host }
    }

    #[must_use]
    pub fn local_user(&self) -> &str {
        &self.local_user
    }

    #[must_use]
    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn set_host(&mut self, is_host: bool) {
        self.is_host = is_host;
    }

    /// Check `op` against its path discipline. `owner` is the owning user of
    /// the record being written, when the caller knows it.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] naming the violated rule.
    pub fn authorize(&self, op: &SyncOp, owner: Option<&str>) -> Result<(), SyncError> {
        let path = op.path();
        let verb = op.verb();
        let is_owner = owner == Some(self.local_user.as_str());
        let not_owner = || SyncError::NotOwner {
            verb,
            path: path.to_string(),
            owner: owner.map(str::to_string),
            local: self.local_user.clone(),
        };

        match path.discipline() {
            Discipline::LastWriterWins => Ok(()),
            Discipline::ExclusiveOwner => match op {
                _ if is_owner => Ok(()),
                SyncOp::Update { path: RoomPath::Player(_), fields }
                    if fields.keys().all(|k| SHARED_PLAYER_FIELDS.contains(&k.as_str())) =>
                {
                    Ok(())
                }
                SyncOp::Remove { path: RoomPath::Projectile(_) } => Ok(()),
                _ => Err(not_owner()),
            },
            Discipline::AnyWriterDelete => match op {
                SyncOp::Remove { .. } => Ok(()),
                SyncOp::Set { .. } | SyncOp::Update { .. } if self.is_host => Ok(()),
                SyncOp::Set { .. } | SyncOp::Update { .. } => Err(SyncError::NotHost { verb, path: path.to_string() }),
                _ => Err(SyncError::NotPermitted { verb, path: path.to_string() }),
            },
            Discipline::HostSnapshot => match op {
                SyncOp::Remove { .. } => Ok(()),
                SyncOp::Set { .. } if self.is_host => Ok(()),
                SyncOp::Set { .. } => Err(SyncError::NotHost { verb, path: path.to_string() }),
                _ => Err(SyncError::NotPermitted { verb, path: path.to_string() }),
            },
            Discipline::MutualExclusion => match op {
                SyncOp::SetIfAbsent { .. } => Ok(()),
                _ if is_owner => Ok(()),
                _ => Err(not_owner()),
            },
        }
    }
}

/// Decode a value observed on the channel. Absent or malformed values read as `None`.
#[must_use]
pub fn decode<T: DeserializeOwned>(value: Option<serde_json::Value>) -> Option<T> {
    match serde_json::from_value(value?) {
        Ok(record) => Some(record),
        Err(_) => None,
    }
}

/// Decode every child of a collection value keyed by id, skipping malformed entries.
#[must_use]
pub fn decode_children<T: DeserializeOwned>(value: Option<serde_json::Value>) -> Vec<(String, T)> {
    let Some(serde_json::Value::Object(map)) = value else {
        return Vec::new();
    };
    map.into_iter().filter_map(|(key, v)| decode(Some(v)).map(|record| (key, record))).collect()
}
