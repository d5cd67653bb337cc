//! Whiteboard input engine: strokes, pan, undo/redo, cursors, verification view.
//!
//! All handlers take an explicit `now_ms` and return [`Action`]s; the host
//! dispatches sync ops fire-and-forget and redraws on request. Local commits
//! are applied optimistically, so the echo from the channel is a no-op.

#[cfg(test)]
#[path = "whiteboard_test.rs"]
mod whiteboard_test;

use std::collections::HashMap;

use uuid::Uuid;

use crate::camera::{Camera, Point};
use crate::consts::{BACKGROUND_COLOR, MIN_STROKE_POINTS};
use crate::cursor::CursorThrottle;
use crate::doc::{Stroke, StrokeKind, StrokeStore};
use crate::engine::Action;
use crate::input::{Button, InputState, PanState, Tool, UiState};
use crate::presence::LocalUser;
use crate::records::{CursorRecord, VerificationRecord};
use crate::render::raster::{Snapshot, SnapshotError};
use crate::shapes::generate_shape;
use crate::sync::{RoomPath, SyncGuard, SyncOp, decode, decode_children, encode};
use crate::verify::VerifyView;

/// Whiteboard state for one local peer.
pub struct WhiteboardCore {
    pub doc: StrokeStore,
    pub camera: Camera,
    pub ui: UiState,
    pub input: InputState,
    pub pan: PanState,
    pub viewport_width: f64,
    pub viewport_height: f64,
    user: LocalUser,
    guard: SyncGuard,
    redo_stack: Vec<Stroke>,
    cursor: CursorThrottle,
    remote_cursors: HashMap<String, CursorRecord>,
    verification: VerifyView,
}

impl WhiteboardCore {
    #[must_use]
    pub fn new(user: LocalUser) -> Self {
        Self {
            doc: StrokeStore::new(),
            camera: Camera::default(),
            ui: UiState::default(),
            input: InputState::Idle,
            pan: PanState::Idle,
            viewport_width: 0.0,
            viewport_height: 0.0,
            guard: SyncGuard::new(user.id.clone(), false),
            verification: VerifyView::new(user.id.clone()),
            user,
            redo_stack: Vec::new(),
            cursor: CursorThrottle::default(),
            remote_cursors: HashMap::new(),
        }
    }

    #[must_use]
    pub fn user(&self) -> &LocalUser {
        &self.user
    }

    #[must_use]
    pub fn verification(&self) -> &VerifyView {
        &self.verification
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.ui.tool = tool;
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.ui.color = color.into();
    }

    pub fn set_brush_size(&mut self, size: f64) {
        self.ui.brush_size = size;
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport_width = width;
        self.viewport_height = height;
    }

    /// Ops to run once on joining: drop our cursor if the connection dies.
    #[must_use]
    pub fn join_ops(&self) -> Vec<Action> {
        let mut actions = Vec::new();
        let op = SyncOp::RemoveOnDisconnect { path: RoomPath::Cursor(self.user.id.clone()) };
        self.emit(op, Some(&self.user.id), &mut actions);
        actions
    }

    // --- Pointer input ---

    pub fn on_pointer_down(&mut self, screen: Point, button: Button) -> Vec<Action> {
        if button.pans() {
            self.pan = PanState::Panning { last_screen: screen };
            return vec![Action::CapturePointer];
        }
        let world = self.camera.screen_to_world(screen);
        self.input = InputState::Drawing { tool: self.ui.tool, start: world, path: vec![world] };
        vec![Action::RenderNeeded]
    }

    pub fn on_pointer_move(&mut self, screen: Point, now_ms: i64) -> Vec<Action> {
        let mut actions = Vec::new();

        if let PanState::Panning { last_screen } = self.pan {
            self.camera.pan_by(screen.x - last_screen.x, screen.y - last_screen.y);
            self.pan = PanState::Panning { last_screen: screen };
            actions.push(Action::RenderNow);
        }

        let world = self.camera.screen_to_world(screen);
        if self.cursor.should_send(screen, now_ms) {
            self.publish_cursor(world, now_ms, &mut actions);
        }

        if let InputState::Drawing { tool, start, path } = &mut self.input {
            match tool.shape() {
                Some(shape) => *path = generate_shape(shape, *start, world),
                None => path.push(world),
            }
            actions.push(Action::RenderNeeded);
        }

        actions
    }

    pub fn on_pointer_up(&mut self, button: Button, now_ms: i64) -> Vec<Action> {
        if button.pans() {
            if matches!(self.pan, PanState::Panning { .. }) {
                self.pan = PanState::Idle;
                return vec![Action::ReleasePointer, Action::RenderNeeded];
            }
            return Vec::new();
        }
        self.commit_stroke(now_ms)
    }

    /// Pointer left the canvas: a stroke in progress is committed, a pan keeps going.
    pub fn on_pointer_leave(&mut self, now_ms: i64) -> Vec<Action> {
        if matches!(self.input, InputState::Drawing { .. }) {
            return self.commit_stroke(now_ms);
        }
        Vec::new()
    }

    /// Publish the in-progress stroke if it has enough points, and clear the preview.
    pub fn commit_stroke(&mut self, now_ms: i64) -> Vec<Action> {
        let InputState::Drawing { tool, path, .. } = std::mem::take(&mut self.input) else {
            return Vec::new();
        };
        if path.len() < MIN_STROKE_POINTS {
            return vec![Action::RenderNeeded];
        }

        let color = if tool == Tool::Eraser { BACKGROUND_COLOR.to_string() } else { self.ui.color.clone() };
        let stroke = Stroke {
            id: Uuid::new_v4().to_string(),
            path,
            color,
            brush_size: self.ui.brush_size,
            timestamp: now_ms,
            kind: StrokeKind::Path,
            owner_id: self.user.id.clone(),
        };

        let mut actions = Vec::new();
        self.redo_stack.clear();
        self.publish_stroke(&stroke, &mut actions);
        self.doc.insert(stroke);
        actions.push(Action::RenderNeeded);
        actions
    }

    // --- Undo / redo ---

    /// Remove the newest stroke drawn by the local user, wherever it sits in
    /// the shared history.
    pub fn undo(&mut self) -> Vec<Action> {
        let Some(id) = self.doc.last_owned_by(&self.user.id).map(|s| s.id.clone()) else {
            return Vec::new();
        };
        let Some(stroke) = self.doc.remove(&id) else {
            return Vec::new();
        };
        let mut actions = Vec::new();
        self.emit(SyncOp::Remove { path: RoomPath::Stroke(id) }, Some(&stroke.owner_id), &mut actions);
        self.redo_stack.push(stroke);
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Re-publish the last undone stroke under its original id.
    pub fn redo(&mut self) -> Vec<Action> {
        let Some(stroke) = self.redo_stack.pop() else {
            return Vec::new();
        };
        if stroke.owner_id != self.user.id {
            self.redo_stack.push(stroke);
            return Vec::new();
        }
        let mut actions = Vec::new();
        self.publish_stroke(&stroke, &mut actions);
        self.doc.insert(stroke);
        actions.push(Action::RenderNeeded);
        actions
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    // --- Remote updates ---

    /// Apply a change observed on the realtime channel.
    pub fn apply_remote(&mut self, path: &RoomPath, value: Option<serde_json::Value>) -> Vec<Action> {
        match path {
            RoomPath::Whiteboard => {
                let strokes: Vec<Stroke> = decode_children(value).into_iter().map(|(_, s)| s).collect();
                if strokes.iter().any(|s| self.is_foreign_new(s)) {
                    self.redo_stack.clear();
                }
                self.doc.load_snapshot(strokes);
                vec![Action::RenderNeeded]
            }
            RoomPath::Stroke(id) => {
                match decode::<Stroke>(value) {
                    Some(stroke) => {
                        if self.is_foreign_new(&stroke) {
                            self.redo_stack.clear();
                        }
                        self.doc.insert(stroke);
                    }
                    None => {
                        self.doc.remove(id);
                    }
                }
                vec![Action::RenderNeeded]
            }
            RoomPath::Cursors => {
                self.remote_cursors = decode_children::<CursorRecord>(value)
                    .into_iter()
                    .filter(|(uid, _)| *uid != self.user.id)
                    .collect();
                vec![Action::RenderNeeded]
            }
            RoomPath::Cursor(uid) if *uid != self.user.id => {
                match decode::<CursorRecord>(value) {
                    Some(cursor) => self.remote_cursors.insert(uid.clone(), cursor),
                    None => self.remote_cursors.remove(uid),
                };
                vec![Action::RenderNeeded]
            }
            RoomPath::Verification => {
                let record = decode::<VerificationRecord>(value);
                if self.verification.observe(record) {
                    return vec![Action::StartBattle(self.doc.to_vec()), Action::RenderNeeded];
                }
                vec![Action::RenderNeeded]
            }
            _ => Vec::new(),
        }
    }

    /// Remote cursors fresh enough to draw at `now_ms`.
    #[must_use]
    pub fn visible_cursors(&self, now_ms: i64) -> Vec<(&str, &CursorRecord)> {
        let mut cursors: Vec<(&str, &CursorRecord)> = self
            .remote_cursors
            .iter()
            .filter(|(_, c)| !c.is_stale(now_ms))
            .map(|(uid, c)| (uid.as_str(), c))
            .collect();
        cursors.sort_by(|a, b| a.0.cmp(b.0));
        cursors
    }

    /// Current preview path of the stroke being drawn, if any.
    #[must_use]
    pub fn preview(&self) -> Option<(&[Point], Tool)> {
        match &self.input {
            InputState::Drawing { tool, path, .. } => Some((path.as_slice(), *tool)),
            InputState::Idle => None,
        }
    }

    /// Raster of every committed stroke for the tutoring oracle. Pull-based:
    /// nothing is rendered until a caller asks.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if PNG encoding fails.
    pub fn snapshot(&self) -> Result<Option<Snapshot>, SnapshotError> {
        crate::render::raster::export_snapshot(&self.doc)
    }

    /// Forget all local drawing state after a battle.
    pub fn reset(&mut self) {
        self.doc.clear();
        self.redo_stack.clear();
        self.input = InputState::Idle;
    }

    // --- Helpers ---

    /// A stroke we have not seen before, drawn by someone else.
    fn is_foreign_new(&self, stroke: &Stroke) -> bool {
        stroke.owner_id != self.user.id && !self.doc.contains(&stroke.id)
    }

    fn publish_cursor(&self, world: Point, now_ms: i64, actions: &mut Vec<Action>) {
        let record = CursorRecord {
            x: world.x,
            y: world.y,
            username: self.user.username.clone(),
            color: self.user.color.clone(),
            timestamp: now_ms,
        };
        match encode(&record) {
            Ok(value) => {
                let op = SyncOp::Set { path: RoomPath::Cursor(self.user.id.clone()), value };
                self.emit(op, Some(&self.user.id), actions);
            }
            Err(e) => actions.push(Action::SyncRejected(e)),
        }
    }

    fn publish_stroke(&self, stroke: &Stroke, actions: &mut Vec<Action>) {
        match encode(stroke) {
            Ok(value) => {
                let op = SyncOp::Set { path: RoomPath::Stroke(stroke.id.clone()), value };
                self.emit(op, Some(&stroke.owner_id), actions);
            }
            Err(e) => actions.push(Action::SyncRejected(e)),
        }
    }

    fn emit(&self, op: SyncOp, owner: Option<&str>, actions: &mut Vec<Action>) {
        match self.guard.authorize(&op, owner) {
            Ok(()) => actions.push(Action::Sync(op)),
            Err(e) => actions.push(Action::SyncRejected(e)),
        }
    }
}
