//! Folding remote channel changes into the local battle state.
//!
//! Each entity kind has its own merge rule: enemies follow the host snapshot
//! but never revive a kill, players mirror their owner's position and take the
//! lowest health anyone reported, projectiles mirror their owner. The first
//! terminal flag seen wins.

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod reconcile_test;

use serde_json::Value;

use super::entities::{Enemy, Player, Projectile};
use super::sim::BattleCore;
use crate::engine::Action;
use crate::records::GameStateRecord;
use crate::sync::{RoomPath, decode, decode_children};

impl BattleCore {
    /// Apply a change observed on the realtime channel.
    pub fn apply_remote(&mut self, path: &RoomPath, value: Option<Value>) -> Vec<Action> {
        match path {
            RoomPath::Battle if value.is_none() => vec![Action::ReturnToWhiteboard],
            RoomPath::GameState => self.merge_game_state(decode(value)),
            RoomPath::Enemies => self.merge_enemy_snapshot(value),
            RoomPath::Enemy(id) => {
                match decode::<Enemy>(value) {
                    Some(enemy) if !self.killed.contains(id) => {
                        self.enemies.insert(id.clone(), enemy);
                    }
                    Some(_) => {}
                    None => {
                        self.enemies.remove(id);
                        self.killed.insert(id.clone());
                    }
                }
                vec![Action::RenderNeeded]
            }
            RoomPath::Players => {
                for (id, player) in decode_children::<Player>(value) {
                    self.merge_player(&id, Some(player));
                }
                vec![Action::RenderNeeded]
            }
            RoomPath::Player(id) => {
                self.merge_player(id, decode(value));
                vec![Action::RenderNeeded]
            }
            RoomPath::Projectiles => {
                let remote = decode_children::<Projectile>(value);
                let local_id = self.local_id.clone();
                self.projectiles.retain(|id, p| p.owner_id == local_id || remote.iter().any(|(rid, _)| rid == id));
                for (id, projectile) in remote {
                    self.merge_projectile(&id, Some(projectile));
                }
                vec![Action::RenderNeeded]
            }
            RoomPath::Projectile(id) => {
                self.merge_projectile(id, decode(value));
                vec![Action::RenderNeeded]
            }
            _ => Vec::new(),
        }
    }

    fn merge_game_state(&mut self, record: Option<GameStateRecord>) -> Vec<Action> {
        let Some(record) = record else {
            return Vec::new();
        };
        if !(record.game_over || record.game_won) || !self.is_running() {
            return Vec::new();
        }
        // Never hold both flags: a won record wins over a simultaneous loss.
        self.game_won = record.game_won;
        self.game_over = !record.game_won;
        self.victory_announced = true;
        vec![Action::BattleEnded { won: self.game_won, announcer: false }, Action::RenderNeeded]
    }

    fn merge_enemy_snapshot(&mut self, value: Option<Value>) -> Vec<Action> {
        let remote = decode_children::<Enemy>(value);
        let mut actions = Vec::new();

        self.enemies.retain(|id, _| remote.iter().any(|(rid, _)| rid == id));
        if !self.is_host() {
            for (id, enemy) in remote.iter().filter(|(id, _)| !self.killed.contains(id)) {
                self.enemies.insert(id.clone(), enemy.clone());
            }
        }

        // The snapshot can empty out before the local loop notices. A wiped
        // team has already lost, so only a live player can claim the win.
        if remote.is_empty()
            && self.initialized
            && !self.victory_announced
            && self.players.values().any(|p| p.is_alive)
        {
            self.announce(true, &mut actions);
        }
        actions.push(Action::RenderNeeded);
        actions
    }

    fn merge_player(&mut self, id: &str, remote: Option<Player>) {
        let Some(remote) = remote else {
            self.players.remove(id);
            return;
        };
        let Some(local) = self.players.get_mut(id) else {
            self.players.insert(id.to_string(), remote);
            return;
        };
        if id != self.local_id {
            local.x = remote.x;
            local.y = remote.y;
        }
        local.health = local.health.min(remote.health);
        local.is_alive = local.is_alive && remote.is_alive && local.health > 0.0;
    }

    fn merge_projectile(&mut self, id: &str, remote: Option<Projectile>) {
        match remote {
            Some(p) if p.owner_id == self.local_id => {}
            Some(p) => {
                self.projectiles.insert(id.to_string(), p);
            }
            None => {
                self.projectiles.remove(id);
            }
        }
    }
}
