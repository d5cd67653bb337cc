use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::battle::{BattleCore, BattleRules, BattleSetup, FrameInput};
use crate::camera::Point;
use crate::clock;
use crate::doc::Stroke;
use crate::input::Button;
use crate::presence::{LocalUser, Member, present_ids};
use crate::render::canvas2d::{AvatarCache, Canvas2dPainter};
use crate::render::raster::{Snapshot, SnapshotError};
use crate::render::visible_bounds;
use crate::sync::{RoomPath, SyncError, SyncOp};
use crate::whiteboard::WhiteboardCore;

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Write to the realtime channel, fire-and-forget.
    Sync(SyncOp),
    /// A write the local peer is not allowed to make; log it and move on.
    SyncRejected(SyncError),
    /// Redraw on the next animation frame.
    RenderNeeded,
    /// Redraw synchronously (pan feedback).
    RenderNow,
    /// Route pointer events from the window until released (pan in progress).
    CapturePointer,
    ReleasePointer,
    /// The verification countdown reached zero on this peer.
    StartBattle(Vec<Stroke>),
    /// The local battle is running; start the frame loop.
    BattleStarted,
    /// A terminal flag was set. `announcer` is true on the peer that broadcast it.
    BattleEnded { won: bool, announcer: bool },
    /// Battle state was cleared; show the whiteboard again.
    ReturnToWhiteboard,
}

/// Core engine state: all logic that doesn't depend on the canvas element.
///
/// Owns the whiteboard for the whole session and a battle while one runs.
/// Separated from `Engine` so it can be tested without WASM/browser dependencies.
pub struct EngineCore {
    pub whiteboard: WhiteboardCore,
    pub battle: Option<BattleCore>,
    pub rules: BattleRules,
    profiles: BTreeMap<String, Member>,
    present: Vec<String>,
    rng: StdRng,
}

impl EngineCore {
    #[must_use]
    pub fn new(user: LocalUser, rules: BattleRules) -> Self {
        Self::with_rng(user, rules, StdRng::from_rng(&mut rand::rng()))
    }

    /// Deterministic spawn positions, for replays and tests.
    #[must_use]
    pub fn with_seed(user: LocalUser, rules: BattleRules, seed: u64) -> Self {
        Self::with_rng(user, rules, StdRng::seed_from_u64(seed))
    }

    fn with_rng(user: LocalUser, rules: BattleRules, rng: StdRng) -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(user.id.clone(), user.as_member());
        Self { whiteboard: WhiteboardCore::new(user), battle: None, rules, profiles, present: Vec::new(), rng }
    }

    // --- Membership ---

    /// Record display details for a member (username, avatar).
    pub fn set_profile(&mut self, member: Member) {
        self.profiles.insert(member.id.clone(), member);
    }

    /// Present members in id order. Unknown profiles fall back to the id.
    #[must_use]
    pub fn members(&self) -> Vec<Member> {
        self.present
            .iter()
            .map(|id| {
                self.profiles
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| Member { id: id.clone(), username: id.clone(), avatar_url: None })
            })
            .collect()
    }

    #[must_use]
    pub fn present(&self) -> &[String] {
        &self.present
    }

    // --- Mode ---

    #[must_use]
    pub fn in_battle(&self) -> bool {
        self.battle.is_some()
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.whiteboard.set_viewport(width, height);
        if let Some(battle) = &mut self.battle {
            battle.set_viewport(width, height);
        }
    }

    /// Enter battle from the given stroke snapshot.
    pub fn start_battle(&mut self, strokes: &[Stroke]) -> Vec<Action> {
        let wb = &self.whiteboard;
        let area = visible_bounds(&wb.camera, wb.viewport_width, wb.viewport_height);
        let members = self.members();
        let setup = BattleSetup {
            local: wb.user(),
            members: &members,
            strokes,
            area,
            viewport_width: wb.viewport_width,
            viewport_height: wb.viewport_height,
            rules: self.rules.clone(),
        };
        let (battle, mut actions) = BattleCore::start(setup, &mut self.rng);
        self.battle = Some(battle);
        actions.push(Action::BattleStarted);
        actions
    }

    /// Manual exit: clears the room for everyone.
    pub fn exit_battle(&mut self) -> Vec<Action> {
        match &mut self.battle {
            Some(battle) => battle.exit(),
            None => Vec::new(),
        }
    }

    fn end_battle(&mut self) {
        self.battle = None;
        self.whiteboard.reset();
    }

    // --- Frame ---

    pub fn tick(&mut self, now_ms: i64, input: &FrameInput) -> Vec<Action> {
        match &mut self.battle {
            Some(battle) => battle.tick(now_ms, input),
            None => Vec::new(),
        }
    }

    // --- Remote updates ---

    /// Route a channel change to whichever mode cares about it.
    pub fn apply_remote(&mut self, path: &RoomPath, value: Option<Value>) -> Vec<Action> {
        let actions = match path {
            RoomPath::Presence => {
                self.present = value.as_ref().map(present_ids).unwrap_or_default();
                self.sync_host();
                return Vec::new();
            }
            RoomPath::PresenceMember(uid) => {
                let here = value.as_ref().and_then(Value::as_bool).unwrap_or(false);
                self.present.retain(|id| id != uid);
                if here {
                    self.present.push(uid.clone());
                    self.present.sort();
                }
                self.sync_host();
                return Vec::new();
            }
            RoomPath::Battle
            | RoomPath::Players
            | RoomPath::Player(_)
            | RoomPath::Enemies
            | RoomPath::Enemy(_)
            | RoomPath::Projectiles
            | RoomPath::Projectile(_)
            | RoomPath::GameState => match &mut self.battle {
                Some(battle) => battle.apply_remote(path, value),
                None => Vec::new(),
            },
            _ => self.whiteboard.apply_remote(path, value),
        };
        self.settle(actions)
    }

    /// Act on mode transitions requested by the sub-engines; pass the rest on.
    fn settle(&mut self, actions: Vec<Action>) -> Vec<Action> {
        let mut out = Vec::with_capacity(actions.len());
        for action in actions {
            match action {
                Action::StartBattle(strokes) if self.battle.is_none() => out.extend(self.start_battle(&strokes)),
                Action::StartBattle(_) => {}
                Action::ReturnToWhiteboard => {
                    self.end_battle();
                    out.push(Action::ReturnToWhiteboard);
                    out.push(Action::RenderNeeded);
                }
                other => out.push(other),
            }
        }
        out
    }

    fn sync_host(&mut self) {
        if let Some(battle) = &mut self.battle {
            battle.set_present(&self.present);
        }
    }
}

/// The full canvas engine. Wraps `EngineCore` and owns the browser canvas element.
pub struct Engine {
    canvas: HtmlCanvasElement,
    avatars: AvatarCache,
    pub core: EngineCore,
}

impl Engine {
    /// Create a new engine bound to the given canvas element.
    #[must_use]
    pub fn new(canvas: HtmlCanvasElement, user: LocalUser) -> Self {
        Self { canvas, avatars: AvatarCache::default(), core: EngineCore::new(user, BattleRules::default()) }
    }

    // --- Viewport ---

    /// Resize the backing store and both engines' viewports (CSS pixels).
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64) {
        self.canvas.set_width(width_css.max(0.0) as u32);
        self.canvas.set_height(height_css.max(0.0) as u32);
        self.core.set_viewport(width_css, height_css);
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button) -> Vec<Action> {
        self.core.whiteboard.on_pointer_down(screen_pt, button)
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point) -> Vec<Action> {
        self.core.whiteboard.on_pointer_move(screen_pt, clock::now_ms())
    }

    pub fn on_pointer_up(&mut self, button: Button) -> Vec<Action> {
        self.core.whiteboard.on_pointer_up(button, clock::now_ms())
    }

    pub fn on_pointer_leave(&mut self) -> Vec<Action> {
        self.core.whiteboard.on_pointer_leave(clock::now_ms())
    }

    pub fn undo(&mut self) -> Vec<Action> {
        self.core.whiteboard.undo()
    }

    pub fn redo(&mut self) -> Vec<Action> {
        self.core.whiteboard.redo()
    }

    /// One animation frame of battle.
    pub fn tick(&mut self, input: &FrameInput) -> Vec<Action> {
        self.core.tick(clock::now_ms(), input)
    }

    pub fn apply_remote(&mut self, path: &RoomPath, value: Option<Value>) -> Vec<Action> {
        self.core.apply_remote(path, value)
    }

    pub fn exit_battle(&mut self) -> Vec<Action> {
        self.core.exit_battle()
    }

    /// Pull accessor for the tutoring integration.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if PNG encoding fails.
    pub fn snapshot(&self) -> Result<Option<Snapshot>, SnapshotError> {
        self.core.whiteboard.snapshot()
    }

    // --- Render ---

    /// Draw whichever mode is active.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the 2D context is unavailable or any `Canvas2D` call fails.
    pub fn render(&mut self) -> Result<(), JsValue> {
        let ctx = self
            .canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
            .dyn_into::<CanvasRenderingContext2d>()?;
        let size = (f64::from(self.canvas.width()), f64::from(self.canvas.height()));
        let mut painter = Canvas2dPainter::new(&ctx, &mut self.avatars, size);
        match &self.core.battle {
            Some(battle) => crate::render::draw_battle(&mut painter, battle),
            None => crate::render::draw_whiteboard(&mut painter, &self.core.whiteboard, clock::now_ms()),
        }
    }
}
