//! Parametric shape paths for the rectangle, circle and triangle tools.
//!
//! Shapes stay parametric until commit: every pointer move regenerates the
//! whole preview from the press point and the current point.

#[cfg(test)]
#[path = "shapes_test.rs"]
mod shapes_test;

use std::f64::consts::TAU;

use crate::camera::Point;
use crate::consts::CIRCLE_SEGMENTS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Rectangle,
    Circle,
    Triangle,
}

/// Generate the closed path for `shape` dragged from `start` to `current`.
#[must_use]
pub fn generate_shape(shape: Shape, start: Point, current: Point) -> Vec<Point> {
    match shape {
        Shape::Rectangle => vec![
            Point::new(start.x, start.y),
            Point::new(current.x, start.y),
            Point::new(current.x, current.y),
            Point::new(start.x, current.y),
            Point::new(start.x, start.y),
        ],
        Shape::Triangle => {
            let apex = Point::new((start.x + current.x) * 0.5, start.y);
            vec![apex, Point::new(current.x, current.y), Point::new(start.x, current.y), apex]
        }
        Shape::Circle => circle_path(start, current.sub(start).length()),
    }
}

/// `CIRCLE_SEGMENTS` uniform steps around `center`, closed back on the first point.
#[allow(clippy::cast_precision_loss)]
fn circle_path(center: Point, radius: f64) -> Vec<Point> {
    (0..=CIRCLE_SEGMENTS)
        .map(|i| {
            let angle = TAU * i as f64 / CIRCLE_SEGMENTS as f64;
            Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect()
}
