//! Document model: committed whiteboard strokes and the in-memory store.
//!
//! A `Stroke` is the wire shape of one drawing under `whiteboard/{id}`. It is
//! immutable once published; undo deletes it and redo re-inserts it under the
//! same id. The `StrokeStore` mirrors the shared collection locally and
//! answers the ownership-scoped queries undo needs.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::camera::Point;
use crate::consts::MIN_STROKE_POINTS;
use crate::geom::Bounds;

/// Unique identifier for a stroke.
pub type StrokeId = String;

/// Discriminator carried on the wire. Only freehand paths exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeKind {
    #[default]
    Path,
}

/// A committed drawing in world-space coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    /// Unique identifier, also the key under `whiteboard/`.
    pub id: StrokeId,
    /// Ordered world-space points.
    pub path: Vec<Point>,
    /// CSS color string.
    pub color: String,
    /// Line width in world units.
    pub brush_size: f64,
    /// Milliseconds since Unix epoch at commit time.
    pub timestamp: i64,
    #[serde(rename = "type", default)]
    pub kind: StrokeKind,
    /// User who drew it. Never changes.
    pub owner_id: String,
}

impl Stroke {
    /// Whether the stroke has enough points to render or to become an enemy.
    #[must_use]
    pub fn is_drawable(&self) -> bool {
        self.path.len() >= MIN_STROKE_POINTS
    }
}

/// In-memory store of committed strokes.
pub struct StrokeStore {
    strokes: HashMap<StrokeId, Stroke>,
}

impl StrokeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { strokes: HashMap::new() }
    }

    /// Insert or replace a stroke by id.
    pub fn insert(&mut self, stroke: Stroke) {
        self.strokes.insert(stroke.id.clone(), stroke);
    }

    /// Remove a stroke by id, returning it if it was present.
    pub fn remove(&mut self, id: &str) -> Option<Stroke> {
        self.strokes.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Stroke> {
        self.strokes.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.strokes.contains_key(id)
    }

    /// Replace all strokes with a full snapshot.
    pub fn load_snapshot(&mut self, strokes: Vec<Stroke>) {
        self.strokes.clear();
        for stroke in strokes {
            self.strokes.insert(stroke.id.clone(), stroke);
        }
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
    }

    /// All strokes ordered by `(timestamp, id)`, oldest first. This is draw order.
    #[must_use]
    pub fn chronological(&self) -> Vec<&Stroke> {
        let mut strokes: Vec<&Stroke> = self.strokes.values().collect();
        strokes.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        strokes
    }

    /// Owned copies in draw order, used as the battle-start snapshot.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Stroke> {
        self.chronological().into_iter().cloned().collect()
    }

    /// The most recent stroke drawn by `owner_id`, ignoring everyone else's.
    #[must_use]
    pub fn last_owned_by(&self, owner_id: &str) -> Option<&Stroke> {
        self.strokes
            .values()
            .filter(|s| s.owner_id == owner_id)
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))
    }

    /// Bounding box over every point of every stroke, `None` when empty.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.strokes.values().flat_map(|s| s.path.iter()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

impl Default for StrokeStore {
    fn default() -> Self {
        Self::new()
    }
}
