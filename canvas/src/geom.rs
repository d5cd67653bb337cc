//! Geometry helpers shared by the whiteboard and the battle simulation.
//!
//! Everything here is a pure function over world-space points: segment
//! distance, circle-versus-polyline overlap, path centroids, and bounding
//! boxes for snapshot export.

#[cfg(test)]
#[path = "geom_test.rs"]
mod geom_test;

use crate::camera::Point;

/// Squared distance from `p` to the closest point on segment `a`-`b`.
#[must_use]
pub fn dist_sq_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let ab = b.sub(a);
    let len_sq = ab.x * ab.x + ab.y * ab.y;
    if len_sq <= f64::EPSILON {
        return p.dist_sq(a);
    }
    let t = (((p.x - a.x) * ab.x + (p.y - a.y) * ab.y) / len_sq).clamp(0.0, 1.0);
    p.dist_sq(a.add(ab.scale(t)))
}

/// Whether a circle overlaps segment `a`-`b`.
#[must_use]
pub fn circle_hits_segment(center: Point, radius: f64, a: Point, b: Point) -> bool {
    dist_sq_to_segment(center, a, b) <= radius * radius
}

/// Whether a circle overlaps any segment of `path`.
///
/// A single-point path is tested as a point; an empty path never hits.
#[must_use]
pub fn circle_hits_path(center: Point, radius: f64, path: &[Point]) -> bool {
    match path {
        [] => false,
        [only] => center.dist_sq(*only) <= radius * radius,
        _ => path
            .windows(2)
            .any(|w| circle_hits_segment(center, radius, w[0], w[1])),
    }
}

/// Arithmetic mean of the path points, `None` for an empty path.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn centroid(path: &[Point]) -> Option<Point> {
    if path.is_empty() {
        return None;
    }
    let sum = path.iter().fold(Point::default(), |acc, p| acc.add(*p));
    Some(sum.scale(1.0 / path.len() as f64))
}

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Box covering every point, `None` when the iterator is empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self { min_x: first.x, min_y: first.y, max_x: first.x, max_y: first.y };
        for p in iter {
            bounds.include(*p);
        }
        Some(bounds)
    }

    /// Grow the box to cover `p`.
    pub fn include(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    #[must_use]
    pub fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    #[must_use]
    pub fn padded(self, pad: f64) -> Bounds {
        Bounds {
            min_x: self.min_x - pad,
            min_y: self.min_y - pad,
            max_x: self.max_x + pad,
            max_y: self.max_y + pad,
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}
