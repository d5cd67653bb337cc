//! Cursor broadcast throttling.

#[cfg(test)]
#[path = "cursor_test.rs"]
mod cursor_test;

use crate::camera::Point;
use crate::consts::{CURSOR_MIN_MOVE_PX, CURSOR_THROTTLE_MS};

/// Decides whether a pointer move is worth publishing.
///
/// At most one broadcast per [`CURSOR_THROTTLE_MS`], and none when the pointer
/// moved less than [`CURSOR_MIN_MOVE_PX`] on both axes since the last one.
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorThrottle {
    last: Option<(i64, Point)>,
}

impl CursorThrottle {
    /// Returns `true` (and records the send) if a broadcast should go out now.
    pub fn should_send(&mut self, screen: Point, now_ms: i64) -> bool {
        if let Some((sent_at, sent_pos)) = self.last {
            if now_ms - sent_at < CURSOR_THROTTLE_MS {
                return false;
            }
            let dx = (screen.x - sent_pos.x).abs();
            let dy = (screen.y - sent_pos.y).abs();
            if dx < CURSOR_MIN_MOVE_PX && dy < CURSOR_MIN_MOVE_PX {
                return false;
            }
        }
        self.last = Some((now_ms, screen));
        true
    }
}
