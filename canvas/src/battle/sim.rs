//! Per-frame battle simulation for one local peer.

#[cfg(test)]
#[path = "sim_test.rs"]
mod sim_test;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use super::entities::{Enemy, Player, Projectile};
use super::rules::BattleRules;
use super::spawn::{spawn_enemies, spawn_players};
use crate::camera::{Camera, Point};
use crate::doc::Stroke;
use crate::engine::Action;
use crate::geom::Bounds;
use crate::presence::{LocalUser, Member, elect_host};
use crate::records::{GameStateRecord, PlayerHealthUpdate, PositionUpdate};
use crate::sync::{RoomPath, SyncGuard, SyncOp, encode, encode_fields};

/// Local input sampled once per animation frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInput {
    /// Movement axis in `-1.0..=1.0`, right positive.
    pub move_x: f64,
    /// Movement axis in `-1.0..=1.0`, down positive.
    pub move_y: f64,
    /// Pointer position in screen space.
    pub aim_screen: Point,
    /// Primary button held.
    pub fire: bool,
}

/// Everything a peer needs to enter a battle.
pub struct BattleSetup<'a> {
    pub local: &'a LocalUser,
    pub members: &'a [Member],
    /// The peer's own last-known whiteboard strokes.
    pub strokes: &'a [Stroke],
    /// World-space region players spawn in (the visible whiteboard).
    pub area: Bounds,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub rules: BattleRules,
}

/// Local simulation state for one battle instance.
pub struct BattleCore {
    pub rules: BattleRules,
    pub camera: Camera,
    pub(crate) viewport_width: f64,
    pub(crate) viewport_height: f64,
    pub(crate) local_id: String,
    pub(crate) guard: SyncGuard,
    pub(crate) players: BTreeMap<String, Player>,
    pub(crate) enemies: BTreeMap<String, Enemy>,
    pub(crate) projectiles: BTreeMap<String, Projectile>,
    /// Enemies this peer has seen destroyed; stale snapshots never revive them.
    pub(crate) killed: HashSet<String>,
    pub(crate) initialized: bool,
    pub(crate) game_over: bool,
    pub(crate) game_won: bool,
    pub(crate) victory_announced: bool,
    exited: bool,
    pub(crate) aim_world: Point,
    last_shot_ms: Option<i64>,
    last_projectile_sync_ms: Option<i64>,
    last_enemy_sync_ms: Option<i64>,
    last_position_sync_ms: Option<i64>,
}

impl BattleCore {
    /// Spawn entities and return the ops that publish this peer's share of them:
    /// its own player, and the enemy snapshot when it is the host.
    pub fn start(setup: BattleSetup<'_>, rng: &mut impl Rng) -> (Self, Vec<Action>) {
        let mut members: Vec<Member> = setup.members.to_vec();
        if !members.iter().any(|m| m.id == setup.local.id) {
            members.push(setup.local.as_member());
        }
        let is_host = elect_host(members.iter().map(|m| m.id.as_str())) == Some(setup.local.id.as_str());

        let enemies = spawn_enemies(setup.strokes, &setup.rules);
        let players = spawn_players(&members, setup.area, &setup.rules, rng);

        let mut core = Self {
            camera: Camera::default(),
            viewport_width: setup.viewport_width,
            viewport_height: setup.viewport_height,
            local_id: setup.local.id.clone(),
            guard: SyncGuard::new(setup.local.id.clone(), is_host),
            players: players.into_iter().map(|p| (p.id.clone(), p)).collect(),
            enemies: enemies.into_iter().map(|e| (e.id.clone(), e)).collect(),
            projectiles: BTreeMap::new(),
            killed: HashSet::new(),
            initialized: false,
            game_over: false,
            game_won: false,
            victory_announced: false,
            exited: false,
            aim_world: Point::default(),
            last_shot_ms: None,
            last_projectile_sync_ms: None,
            last_enemy_sync_ms: None,
            last_position_sync_ms: None,
            rules: setup.rules,
        };
        core.recenter();

        let mut actions = Vec::new();
        if let Some(me) = core.players.get(&core.local_id) {
            let path = RoomPath::Player(me.id.clone());
            core.emit_record(SyncOp::RemoveOnDisconnect { path: path.clone() }, Some(&me.id), &mut actions);
            core.emit_set(path, me, Some(&me.id), &mut actions);
        }
        if is_host {
            core.emit_set(RoomPath::Enemies, &core.enemies, None, &mut actions);
        }
        core.initialized = true;
        actions.push(Action::RenderNeeded);
        (core, actions)
    }

    /// The frame loop should keep running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.game_over && !self.game_won && !self.exited
    }

    /// Leave early. The returned ops clear the room and send every peer back
    /// to the whiteboard; no terminal flag is announced.
    pub fn exit(&mut self) -> Vec<Action> {
        self.exited = true;
        self.victory_announced = true;
        super::clear_room_ops().into_iter().map(Action::Sync).collect()
    }

    #[must_use]
    pub fn is_host(&self) -> bool {
        self.guard.is_host()
    }

    #[must_use]
    pub fn game_state(&self) -> GameStateRecord {
        GameStateRecord { game_over: self.game_over, game_won: self.game_won }
    }

    #[must_use]
    pub fn players(&self) -> &BTreeMap<String, Player> {
        &self.players
    }

    #[must_use]
    pub fn enemies(&self) -> &BTreeMap<String, Enemy> {
        &self.enemies
    }

    #[must_use]
    pub fn projectiles(&self) -> &BTreeMap<String, Projectile> {
        &self.projectiles
    }

    #[must_use]
    pub fn local_player(&self) -> Option<&Player> {
        self.players.get(&self.local_id)
    }

    #[must_use]
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// World-space aim point for the local aim line.
    #[must_use]
    pub fn aim_world(&self) -> Point {
        self.aim_world
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport_width = width;
        self.viewport_height = height;
        self.recenter();
    }

    /// Membership changed mid-battle: re-run host election over who is left.
    pub fn set_present(&mut self, ids: &[String]) {
        let is_host = elect_host(ids.iter().map(String::as_str)) == Some(self.local_id.as_str());
        self.guard.set_host(is_host);
    }

    // =========================================================================
    // FRAME
    // =========================================================================

    /// Advance one animation frame. Returns nothing once the battle is over.
    pub fn tick(&mut self, now_ms: i64, input: &FrameInput) -> Vec<Action> {
        if !self.is_running() {
            return Vec::new();
        }
        let mut actions = Vec::new();

        self.move_local_player(now_ms, input, &mut actions);
        self.aim_world = self.camera.screen_to_world(input.aim_screen);
        if input.fire {
            self.fire(now_ms, &mut actions);
        }
        self.advance_projectiles(now_ms, &mut actions);
        self.advance_enemies(&mut actions);
        self.resolve_projectile_hits(&mut actions);
        self.publish_enemy_snapshot(now_ms, &mut actions);
        self.check_terminal(&mut actions);

        actions.push(Action::RenderNeeded);
        actions
    }

    fn move_local_player(&mut self, now_ms: i64, input: &FrameInput, actions: &mut Vec<Action>) {
        let Some(me) = self.players.get_mut(&self.local_id) else {
            return;
        };
        if !me.is_alive {
            return;
        }
        let Some(dir) = Point::new(input.move_x, input.move_y).normalized() else {
            return;
        };
        me.x += dir.x * me.speed;
        me.y += dir.y * me.speed;
        let (path, update) = (RoomPath::Player(me.id.clone()), PositionUpdate { x: me.x, y: me.y });
        self.recenter();

        if due(self.last_position_sync_ms, now_ms, self.rules.position_sync_ms) {
            self.last_position_sync_ms = Some(now_ms);
            let owner = self.local_id.clone();
            self.emit_update(path, &update, Some(&owner), actions);
        }
    }

    fn fire(&mut self, now_ms: i64, actions: &mut Vec<Action>) {
        if !due(self.last_shot_ms, now_ms, self.rules.shot_cooldown_ms) {
            return;
        }
        let Some(me) = self.players.get(&self.local_id).filter(|p| p.is_alive) else {
            return;
        };
        let Some(dir) = self.aim_world.sub(me.pos()).normalized() else {
            return;
        };
        let velocity = dir.scale(self.rules.projectile_speed);
        let projectile = Projectile {
            id: Uuid::new_v4().to_string(),
            x: me.x,
            y: me.y,
            vx: velocity.x,
            vy: velocity.y,
            radius: self.rules.projectile_radius,
            color: me.color.clone(),
            owner_id: self.local_id.clone(),
        };
        self.last_shot_ms = Some(now_ms);
        self.emit_set(RoomPath::Projectile(projectile.id.clone()), &projectile, Some(&self.local_id), actions);
        self.projectiles.insert(projectile.id.clone(), projectile);
    }

    fn advance_projectiles(&mut self, now_ms: i64, actions: &mut Vec<Action>) {
        let origin = self.local_player().map(Player::pos).unwrap_or_default();
        let max_sq = self.rules.projectile_max_distance * self.rules.projectile_max_distance;
        let sync_due = due(self.last_projectile_sync_ms, now_ms, self.rules.projectile_sync_ms);

        let mut retired = Vec::new();
        let mut owned_positions = Vec::new();
        for projectile in self.projectiles.values_mut() {
            projectile.advance();
            let owned = projectile.owner_id == self.local_id;
            if projectile.pos().dist_sq(origin) > max_sq {
                retired.push((projectile.id.clone(), owned));
            } else if owned && sync_due {
                owned_positions.push((projectile.id.clone(), PositionUpdate { x: projectile.x, y: projectile.y }));
            }
        }

        for (id, owned) in retired {
            self.projectiles.remove(&id);
            if owned {
                let owner = self.local_id.clone();
                self.emit_record(SyncOp::Remove { path: RoomPath::Projectile(id) }, Some(&owner), actions);
            }
        }
        if sync_due && !owned_positions.is_empty() {
            self.last_projectile_sync_ms = Some(now_ms);
            let owner = self.local_id.clone();
            for (id, update) in owned_positions {
                self.emit_update(RoomPath::Projectile(id), &update, Some(&owner), actions);
            }
        }
    }

    fn advance_enemies(&mut self, actions: &mut Vec<Action>) {
        let targets: Vec<(String, Point, f64)> =
            self.players.values().filter(|p| p.is_alive).map(|p| (p.id.clone(), p.pos(), p.radius)).collect();
        let trigger_sq = self.rules.trigger_radius * self.rules.trigger_radius;

        let mut hits: Vec<String> = Vec::new();
        for enemy in self.enemies.values_mut() {
            let nearest = targets.iter().min_by(|a, b| enemy.center.dist_sq(a.1).total_cmp(&enemy.center.dist_sq(b.1)));
            let Some((player_id, pos, radius)) = nearest else {
                enemy.rebuild_path();
                continue;
            };
            enemy.step_toward(*pos);
            enemy.grow();
            enemy.rebuild_path();
            if enemy.center.dist_sq(*pos) <= trigger_sq && enemy.touches(*pos, *radius) {
                hits.push(player_id.clone());
            }
        }

        // Overlap drains every frame; one update per damaged player.
        let mut damaged = BTreeSet::new();
        for id in hits {
            if let Some(player) = self.players.get_mut(&id)
                && player.take_damage(self.rules.damage_per_frame)
            {
                damaged.insert(id);
            }
        }
        for id in damaged {
            let Some(player) = self.players.get(&id) else {
                continue;
            };
            let update = PlayerHealthUpdate { health: player.health, is_alive: player.is_alive };
            let owner = player.id.clone();
            self.emit_update(RoomPath::Player(id), &update, Some(&owner), actions);
        }
    }

    fn resolve_projectile_hits(&mut self, actions: &mut Vec<Action>) {
        let broad_sq = self.rules.broad_phase_radius * self.rules.broad_phase_radius;
        let mut spent = Vec::new();
        for projectile in self.projectiles.values() {
            let pos = projectile.pos();
            let hit = self
                .enemies
                .values()
                .filter(|e| e.center.dist_sq(pos) <= broad_sq)
                .find(|e| e.touches(pos, projectile.radius))
                .map(|e| e.id.clone());
            if let Some(enemy_id) = hit {
                spent.push((projectile.id.clone(), projectile.owner_id.clone(), enemy_id));
            }
        }

        for (projectile_id, owner_id, enemy_id) in spent {
            // Two projectiles may reach the same enemy in one frame.
            if self.enemies.remove(&enemy_id).is_some() {
                self.killed.insert(enemy_id.clone());
                self.emit_record(SyncOp::Remove { path: RoomPath::Enemy(enemy_id) }, None, actions);
            }
            self.projectiles.remove(&projectile_id);
            self.emit_record(SyncOp::Remove { path: RoomPath::Projectile(projectile_id) }, Some(&owner_id), actions);
        }
    }

    fn publish_enemy_snapshot(&mut self, now_ms: i64, actions: &mut Vec<Action>) {
        if !self.guard.is_host() || !due(self.last_enemy_sync_ms, now_ms, self.rules.enemy_sync_ms) {
            return;
        }
        self.last_enemy_sync_ms = Some(now_ms);
        self.emit_set(RoomPath::Enemies, &self.enemies, None, actions);
    }

    /// Defeat when nobody is alive, victory when no enemies remain. Announced
    /// at most once per battle.
    fn check_terminal(&mut self, actions: &mut Vec<Action>) {
        if !self.initialized || self.victory_announced {
            return;
        }
        if !self.players.values().any(|p| p.is_alive) {
            self.announce(false, actions);
        } else if self.enemies.is_empty() {
            self.announce(true, actions);
        }
    }

    pub(crate) fn announce(&mut self, won: bool, actions: &mut Vec<Action>) {
        self.victory_announced = true;
        self.game_won = won;
        self.game_over = !won;
        let record = self.game_state();
        self.emit_set(RoomPath::GameState, &record, None, actions);
        actions.push(Action::BattleEnded { won, announcer: true });
    }

    pub(crate) fn recenter(&mut self) {
        if let Some(me) = self.players.get(&self.local_id) {
            let pos = me.pos();
            self.camera.center_on(pos, self.viewport_width, self.viewport_height);
        }
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    fn emit_set<T: Serialize>(&self, path: RoomPath, record: &T, owner: Option<&str>, actions: &mut Vec<Action>) {
        match encode(record) {
            Ok(value) => self.emit_record(SyncOp::Set { path, value }, owner, actions),
            Err(e) => actions.push(Action::SyncRejected(e)),
        }
    }

    fn emit_update<T: Serialize>(&self, path: RoomPath, partial: &T, owner: Option<&str>, actions: &mut Vec<Action>) {
        match encode_fields(partial) {
            Ok(fields) => self.emit_record(SyncOp::Update { path, fields }, owner, actions),
            Err(e) => actions.push(Action::SyncRejected(e)),
        }
    }

    pub(crate) fn emit_record(&self, op: SyncOp, owner: Option<&str>, actions: &mut Vec<Action>) {
        match self.guard.authorize(&op, owner) {
            Ok(()) => actions.push(Action::Sync(op)),
            Err(e) => actions.push(Action::SyncRejected(e)),
        }
    }
}

/// Whether an interval of `every_ms` has elapsed since `last`.
fn due(last: Option<i64>, now_ms: i64, every_ms: i64) -> bool {
    last.is_none_or(|t| now_ms - t >= every_ms)
}
