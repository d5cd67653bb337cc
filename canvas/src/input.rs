//! Input model: tools, mouse buttons, and the draw and pan state machines.
//!
//! Drawing and panning are tracked separately. A pan is driven by window-level
//! listeners for its whole lifetime, so it keeps working after the pointer
//! leaves the canvas, while a stroke in progress is committed on leave.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;
use crate::shapes::Shape;

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Freehand pen (default).
    #[default]
    Pen,
    /// Freehand stroke painted in the background color.
    Eraser,
    /// Parametric rectangle through two opposite corners.
    Rectangle,
    /// Parametric circle centered on the press point.
    Circle,
    /// Parametric isosceles triangle.
    Triangle,
}

impl Tool {
    /// The parametric shape this tool draws, `None` for freehand tools.
    #[must_use]
    pub fn shape(self) -> Option<Shape> {
        match self {
            Self::Pen | Self::Eraser => None,
            Self::Rectangle => Some(Shape::Rectangle),
            Self::Circle => Some(Shape::Circle),
            Self::Triangle => Some(Shape::Triangle),
        }
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

impl Button {
    /// Non-primary buttons pan the canvas.
    #[must_use]
    pub fn pans(self) -> bool {
        matches!(self, Self::Middle | Self::Secondary)
    }
}

/// Persistent drawing settings chosen in the toolbar.
#[derive(Debug, Clone)]
pub struct UiState {
    pub tool: Tool,
    /// Pen color as a CSS color string.
    pub color: String,
    /// Brush size in world units.
    pub brush_size: f64,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tool: Tool::default(),
            color: crate::consts::DEFAULT_PEN_COLOR.to_string(),
            brush_size: crate::consts::DEFAULT_BRUSH_SIZE,
        }
    }
}

/// The stroke being drawn between pointer-down and pointer-up.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No stroke in progress.
    #[default]
    Idle,
    /// A local preview stroke. Shapes regenerate `path` on every move.
    Drawing {
        /// Tool captured at pointer-down.
        tool: Tool,
        /// World-space press point.
        start: Point,
        /// Preview path in world space.
        path: Vec<Point>,
    },
}

/// Pan gesture state, independent of [`InputState`].
#[derive(Debug, Clone, Copy, Default)]
pub enum PanState {
    #[default]
    Idle,
    Panning {
        /// Screen-space position of the previous pointer event.
        last_screen: Point,
    },
}
