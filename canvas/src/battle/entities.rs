//! Battle entities. Each one serializes directly as its wire record under
//! `battle/{players,enemies,projectiles}/{id}`.

#[cfg(test)]
#[path = "entities_test.rs"]
mod entities_test;

use serde::{Deserialize, Serialize};

use crate::camera::Point;
use crate::geom::{centroid, circle_hits_path};

/// A stroke turned hostile. `path` is always `center + original_path * scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enemy {
    pub id: String,
    pub path: Vec<Point>,
    /// Points relative to the spawn centroid at scale 1.0.
    pub original_path: Vec<Point>,
    pub center: Point,
    pub color: String,
    pub speed: f64,
    pub scale: f64,
    pub max_scale: f64,
    pub growth_rate: f64,
    pub health: f64,
}

impl Enemy {
    /// Build an enemy from absolute stroke points. `None` for an empty path.
    #[must_use]
    pub fn from_path(id: String, path: &[Point], color: String, speed: f64, health: f64) -> Option<Self> {
        let center = centroid(path)?;
        let original_path = path.iter().map(|p| p.sub(center)).collect();
        Some(Self {
            id,
            path: path.to_vec(),
            original_path,
            center,
            color,
            speed,
            scale: 1.0,
            max_scale: 1.0,
            growth_rate: 0.0,
            health,
        })
    }

    /// Recompute the absolute path from center, scale, and the original shape.
    pub fn rebuild_path(&mut self) {
        let (center, scale) = (self.center, self.scale);
        self.path = self.original_path.iter().map(|p| center.add(p.scale(scale))).collect();
    }

    /// Move the centroid one `speed` step toward `target`.
    pub fn step_toward(&mut self, target: Point) {
        if let Some(dir) = target.sub(self.center).normalized() {
            self.center = self.center.add(dir.scale(self.speed));
        }
    }

    /// Grow by `growth_rate`, capped at `max_scale`.
    pub fn grow(&mut self) {
        self.scale = (self.scale + self.growth_rate).min(self.max_scale).max(self.scale);
    }

    /// Whether a circle overlaps any segment of the current path.
    #[must_use]
    pub fn touches(&self, center: Point, radius: f64) -> bool {
        circle_hits_path(center, radius, &self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub color: String,
    pub speed: f64,
    pub is_alive: bool,
    pub health: f64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Player {
    #[must_use]
    pub fn pos(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Drain `amount` health, clamped at zero. Returns `true` if health changed.
    pub fn take_damage(&mut self, amount: f64) -> bool {
        if !self.is_alive {
            return false;
        }
        let before = self.health;
        self.health = (self.health - amount).max(0.0);
        if self.health <= 0.0 {
            self.is_alive = false;
        }
        self.health < before
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projectile {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub radius: f64,
    pub color: String,
    pub owner_id: String,
}

impl Projectile {
    #[must_use]
    pub fn pos(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn advance(&mut self) {
        self.x += self.vx;
        self.y += self.vy;
    }
}
