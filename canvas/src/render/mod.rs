//! Rendering: draws whiteboard and battle scenes through a [`Painter`].
//!
//! Scenes receive read-only views of engine state and produce pixels; they
//! never mutate application state. The same scene code drives the browser
//! canvas ([`canvas2d::Canvas2dPainter`]) and the software rasterizer used for
//! snapshots ([`raster::RasterPainter`]).


pub mod canvas2d;
pub mod raster;

use crate::battle::{BattleCore, Player};
use crate::camera::{Camera, Point};
use crate::consts::{BACKGROUND_COLOR, GRID_COLOR, GRID_SPACING, PLAYER_MAX_HEALTH};
use crate::doc::Stroke;
use crate::geom::Bounds;
use crate::input::Tool;
use crate::whiteboard::WhiteboardCore;

const CURSOR_DOT_RADIUS: f64 = 5.0;
const LABEL_SIZE: f64 = 12.0;
const ENEMY_GLOW_BLUR: f64 = 12.0;
const ENEMY_LINE_WIDTH: f64 = 3.0;
const HP_BAR_WIDTH: f64 = 40.0;
const HP_BAR_HEIGHT: f64 = 5.0;
const HP_BAR_GAP: f64 = 8.0;
const AIM_LINE_ALPHA: f64 = 0.25;
const SELF_OUTLINE: &str = "#ffffff";
const OTHER_OUTLINE: &str = "#666680";
const HP_BACK: &str = "#3a3a55";
const HP_FRONT: &str = "#4ade80";
const BANNER_SIZE: f64 = 48.0;

/// Drawing surface the scenes render into.
///
/// Coordinates passed to drawing calls are transformed by the last
/// [`Painter::set_transform`]: `screen = world * scale + (tx, ty)`.
pub trait Painter {
    type Error;

    /// Surface size in pixels.
    fn size(&self) -> (f64, f64);

    /// Fill the whole surface, ignoring the transform.
    fn clear(&mut self, color: &str) -> Result<(), Self::Error>;

    fn set_transform(&mut self, scale: f64, tx: f64, ty: f64) -> Result<(), Self::Error>;

    fn polyline(&mut self, points: &[Point], color: &str, width: f64) -> Result<(), Self::Error>;

    fn fill_circle(&mut self, center: Point, radius: f64, color: &str) -> Result<(), Self::Error>;

    fn stroke_circle(&mut self, center: Point, radius: f64, color: &str, width: f64) -> Result<(), Self::Error>;

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str) -> Result<(), Self::Error>;

    /// Centered label. Surfaces without fonts may skip it.
    fn text(&mut self, text: &str, at: Point, color: &str, size: f64) -> Result<(), Self::Error>;

    /// Glow applied to subsequent strokes; `None` turns it off.
    fn set_glow(&mut self, color: Option<&str>, blur: f64);

    fn set_alpha(&mut self, alpha: f64);

    /// Draw `url` clipped to a circle. `Ok(false)` when the image is not
    /// available yet and the caller should fall back to a flat fill.
    fn avatar(&mut self, _url: &str, _center: Point, _radius: f64) -> Result<bool, Self::Error> {
        Ok(false)
    }
}

// =============================================================
// Whiteboard
// =============================================================

/// Background, grid, committed strokes, the local preview, and fresh remote cursors.
///
/// # Errors
///
/// Propagates the painter's error.
pub fn draw_whiteboard<P: Painter>(p: &mut P, wb: &WhiteboardCore, now_ms: i64) -> Result<(), P::Error> {
    let (w, h) = p.size();
    p.clear(BACKGROUND_COLOR)?;
    set_camera(p, &wb.camera)?;
    draw_grid(p, visible_bounds(&wb.camera, w, h))?;

    for stroke in wb.doc.chronological() {
        draw_stroke(p, stroke)?;
    }

    if let Some((path, tool)) = wb.preview() {
        let color = if tool == Tool::Eraser { BACKGROUND_COLOR } else { wb.ui.color.as_str() };
        if path.len() >= 2 {
            p.polyline(path, color, wb.ui.brush_size)?;
        }
    }

    for (_, cursor) in wb.visible_cursors(now_ms) {
        let at = Point::new(cursor.x, cursor.y);
        p.fill_circle(at, CURSOR_DOT_RADIUS, &cursor.color)?;
        p.text(&cursor.username, Point::new(at.x, at.y - CURSOR_DOT_RADIUS - LABEL_SIZE), &cursor.color, LABEL_SIZE)?;
    }
    Ok(())
}

/// One committed stroke. A single point draws nothing.
///
/// # Errors
///
/// Propagates the painter's error.
pub fn draw_stroke<P: Painter>(p: &mut P, stroke: &Stroke) -> Result<(), P::Error> {
    if !stroke.is_drawable() {
        return Ok(());
    }
    p.polyline(&stroke.path, &stroke.color, stroke.brush_size)
}

/// Grid lines covering `area` in world space.
///
/// # Errors
///
/// Propagates the painter's error.
pub fn draw_grid<P: Painter>(p: &mut P, area: Bounds) -> Result<(), P::Error> {
    let mut x = (area.min_x / GRID_SPACING).floor() * GRID_SPACING;
    while x <= area.max_x {
        p.polyline(&[Point::new(x, area.min_y), Point::new(x, area.max_y)], GRID_COLOR, 1.0)?;
        x += GRID_SPACING;
    }
    let mut y = (area.min_y / GRID_SPACING).floor() * GRID_SPACING;
    while y <= area.max_y {
        p.polyline(&[Point::new(area.min_x, y), Point::new(area.max_x, y)], GRID_COLOR, 1.0)?;
        y += GRID_SPACING;
    }
    Ok(())
}

// =============================================================
// Battle
// =============================================================

/// Grid, glowing enemies, projectiles, players, the local aim line, and the
/// result banner once the battle is decided.
///
/// # Errors
///
/// Propagates the painter's error.
pub fn draw_battle<P: Painter>(p: &mut P, battle: &BattleCore) -> Result<(), P::Error> {
    let (w, h) = p.size();
    p.clear(BACKGROUND_COLOR)?;
    set_camera(p, &battle.camera)?;
    draw_grid(p, visible_bounds(&battle.camera, w, h))?;

    for enemy in battle.enemies().values() {
        p.set_glow(Some(&enemy.color), ENEMY_GLOW_BLUR);
        if enemy.path.len() >= 2 {
            p.polyline(&enemy.path, &enemy.color, ENEMY_LINE_WIDTH)?;
        }
    }
    p.set_glow(None, 0.0);

    for projectile in battle.projectiles().values() {
        p.fill_circle(projectile.pos(), projectile.radius, &projectile.color)?;
    }

    for player in battle.players().values() {
        draw_player(p, player, player.id == battle.local_id())?;
    }

    if let Some(me) = battle.local_player().filter(|me| me.is_alive && battle.is_running()) {
        p.set_alpha(AIM_LINE_ALPHA);
        p.polyline(&[me.pos(), battle.aim_world()], &me.color, 1.0)?;
        p.set_alpha(1.0);
    }

    let state = battle.game_state();
    let banner = if state.game_won {
        Some(("Victory!", HP_FRONT))
    } else if state.game_over {
        Some(("Defeat", "#ff6b6b"))
    } else {
        None
    };
    if let Some((label, color)) = banner {
        p.set_transform(1.0, 0.0, 0.0)?;
        p.text(label, Point::new(w * 0.5, h * 0.5), color, BANNER_SIZE)?;
    }
    Ok(())
}

fn draw_player<P: Painter>(p: &mut P, player: &Player, is_self: bool) -> Result<(), P::Error> {
    let pos = player.pos();
    if !player.is_alive {
        p.set_alpha(0.3);
    }
    let drew_avatar = match &player.avatar_url {
        Some(url) => p.avatar(url, pos, player.radius)?,
        None => false,
    };
    if !drew_avatar {
        p.fill_circle(pos, player.radius, &player.color)?;
    }
    let outline = if is_self { SELF_OUTLINE } else { OTHER_OUTLINE };
    p.stroke_circle(pos, player.radius, outline, if is_self { 3.0 } else { 2.0 })?;

    let bar_x = pos.x - HP_BAR_WIDTH * 0.5;
    let bar_y = pos.y - player.radius - HP_BAR_GAP - HP_BAR_HEIGHT;
    let frac = (player.health / PLAYER_MAX_HEALTH).clamp(0.0, 1.0);
    p.fill_rect(bar_x, bar_y, HP_BAR_WIDTH, HP_BAR_HEIGHT, HP_BACK)?;
    p.fill_rect(bar_x, bar_y, HP_BAR_WIDTH * frac, HP_BAR_HEIGHT, HP_FRONT)?;
    p.text(&player.username, Point::new(pos.x, pos.y + player.radius + LABEL_SIZE), SELF_OUTLINE, LABEL_SIZE)?;
    p.set_alpha(1.0);
    Ok(())
}

// =============================================================
// Helpers
// =============================================================

fn set_camera<P: Painter>(p: &mut P, camera: &Camera) -> Result<(), P::Error> {
    p.set_transform(1.0, -camera.x, -camera.y)
}

/// World-space rectangle visible through `camera` on a `w` x `h` surface.
#[must_use]
pub fn visible_bounds(camera: &Camera, w: f64, h: f64) -> Bounds {
    let top_left = camera.screen_to_world(Point::new(0.0, 0.0));
    Bounds { min_x: top_left.x, min_y: top_left.y, max_x: top_left.x + w, max_y: top_left.y + h }
}
