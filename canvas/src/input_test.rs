use super::*;

// =============================================================
// Tool
// =============================================================

#[test]
fn tool_default_is_pen() {
    assert_eq!(Tool::default(), Tool::Pen);
}

#[test]
fn freehand_tools_have_no_shape() {
    assert_eq!(Tool::Pen.shape(), None);
    assert_eq!(Tool::Eraser.shape(), None);
}

#[test]
fn shape_tools_map_to_shapes() {
    assert_eq!(Tool::Rectangle.shape(), Some(Shape::Rectangle));
    assert_eq!(Tool::Circle.shape(), Some(Shape::Circle));
    assert_eq!(Tool::Triangle.shape(), Some(Shape::Triangle));
}

// =============================================================
// Button
// =============================================================

#[test]
fn only_non_primary_buttons_pan() {
    assert!(!Button::Primary.pans());
    assert!(Button::Middle.pans());
    assert!(Button::Secondary.pans());
}

// =============================================================
// Defaults
// =============================================================

#[test]
fn ui_state_defaults() {
    let ui = UiState::default();
    assert_eq!(ui.tool, Tool::Pen);
    assert_eq!(ui.color, crate::consts::DEFAULT_PEN_COLOR);
    assert!((ui.brush_size - crate::consts::DEFAULT_BRUSH_SIZE).abs() < f64::EPSILON);
}

#[test]
fn input_and_pan_start_idle() {
    assert!(matches!(InputState::default(), InputState::Idle));
    assert!(matches!(PanState::default(), PanState::Idle));
}
