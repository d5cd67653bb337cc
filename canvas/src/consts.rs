//! Shared numeric constants for the canvas crate.

// ── Whiteboard ──────────────────────────────────────────────────

/// A stroke needs at least this many points to be committed or to spawn an enemy.
pub const MIN_STROKE_POINTS: usize = 2;

/// Angular segments used when generating a circle path (plus one closing point).
pub const CIRCLE_SEGMENTS: usize = 36;

/// Canvas background. The eraser paints with this color.
pub const BACKGROUND_COLOR: &str = "#1a1a2e";

/// Grid line color drawn over the background.
pub const GRID_COLOR: &str = "#2a2a44";

/// World-space spacing between grid lines.
pub const GRID_SPACING: f64 = 40.0;

/// Default pen color for a fresh engine.
pub const DEFAULT_PEN_COLOR: &str = "#ffffff";

/// Default brush size in world units.
pub const DEFAULT_BRUSH_SIZE: f64 = 3.0;

// ── Cursors ─────────────────────────────────────────────────────

/// Minimum interval between two cursor broadcasts, in milliseconds.
pub const CURSOR_THROTTLE_MS: i64 = 50;

/// Movement below this many screen pixels on both axes is not broadcast.
pub const CURSOR_MIN_MOVE_PX: f64 = 2.0;

/// Remote cursors older than this are hidden.
pub const CURSOR_STALE_MS: i64 = 2000;

// ── Verification ────────────────────────────────────────────────

/// How long a solved verdict is displayed before the countdown starts.
pub const SOLVED_DISPLAY_MS: u64 = 2000;

/// First countdown value published after a solved verdict.
pub const COUNTDOWN_START: u32 = 3;

/// Interval between countdown decrements.
pub const COUNTDOWN_STEP_MS: u64 = 1000;

/// Hold at countdown zero before the record is deleted.
pub const COUNTDOWN_HOLD_MS: u64 = 200;

// ── Snapshot ────────────────────────────────────────────────────

/// World-space padding around the stroke bounding box in a snapshot.
pub const SNAPSHOT_PADDING: f64 = 40.0;

/// Longest raster dimension of an exported snapshot, in pixels.
pub const SNAPSHOT_MAX_SIZE: f64 = 1024.0;

// ── Battle ──────────────────────────────────────────────────────

/// Starting (and maximum) player health.
pub const PLAYER_MAX_HEALTH: f64 = 100.0;

/// Colors assigned to players in sorted member order.
pub const PLAYER_COLORS: [&str; 5] = ["#4ecdc4", "#ff6b6b", "#ffe66d", "#a29bfe", "#55efc4"];
