//! Battle mode: strokes become enemies, members become players.
//!
//! DESIGN
//! ======
//! Every peer runs the full simulation locally each animation frame and
//! publishes only what it is allowed to write: its own player and projectiles,
//! health drains it observes, enemy deletions it detects, and (for the elected
//! host) a periodic wholesale enemy snapshot. There is no authoritative server;
//! peers converge through per-entity paths and idempotent deletes.
//!
//! Enemy ids derive from stroke ids, so every peer spawns the same enemy set
//! from its own stroke snapshot without waiting on the host.

pub mod entities;
pub mod reconcile;
pub mod rules;
pub mod sim;
pub mod spawn;

pub use entities::{Enemy, Player, Projectile};
pub use rules::BattleRules;
pub use sim::{BattleCore, BattleSetup, FrameInput};

use crate::sync::{RoomPath, SyncOp};

/// Ops that wipe the room back to a blank whiteboard after a battle.
#[must_use]
pub fn clear_room_ops() -> Vec<SyncOp> {
    vec![
        SyncOp::Remove { path: RoomPath::Battle },
        SyncOp::Remove { path: RoomPath::Whiteboard },
        SyncOp::Remove { path: RoomPath::Chat },
    ]
}
