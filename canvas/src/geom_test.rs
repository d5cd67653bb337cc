#![allow(clippy::float_cmp)]

use super::*;

fn p(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

// =============================================================
// dist_sq_to_segment
// =============================================================

#[test]
fn distance_to_segment_interior() {
    assert_eq!(dist_sq_to_segment(p(5.0, 3.0), p(0.0, 0.0), p(10.0, 0.0)), 9.0);
}

#[test]
fn distance_to_segment_clamps_to_endpoints() {
    assert_eq!(dist_sq_to_segment(p(-3.0, 4.0), p(0.0, 0.0), p(10.0, 0.0)), 25.0);
    assert_eq!(dist_sq_to_segment(p(13.0, 4.0), p(0.0, 0.0), p(10.0, 0.0)), 25.0);
}

#[test]
fn distance_to_degenerate_segment_is_point_distance() {
    assert_eq!(dist_sq_to_segment(p(3.0, 4.0), p(0.0, 0.0), p(0.0, 0.0)), 25.0);
}

// =============================================================
// circle tests
// =============================================================

#[test]
fn circle_touching_segment_hits() {
    assert!(circle_hits_segment(p(5.0, 5.0), 5.0, p(0.0, 0.0), p(10.0, 0.0)));
    assert!(!circle_hits_segment(p(5.0, 5.1), 5.0, p(0.0, 0.0), p(10.0, 0.0)));
}

#[test]
fn circle_hits_any_path_segment() {
    let path = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0)];
    assert!(circle_hits_path(p(12.0, 8.0), 3.0, &path));
    assert!(!circle_hits_path(p(5.0, 5.0), 3.0, &path));
}

#[test]
fn empty_path_never_hits() {
    assert!(!circle_hits_path(p(0.0, 0.0), 100.0, &[]));
}

#[test]
fn single_point_path_tests_the_point() {
    assert!(circle_hits_path(p(0.0, 0.0), 2.0, &[p(1.0, 1.0)]));
    assert!(!circle_hits_path(p(0.0, 0.0), 1.0, &[p(1.0, 1.0)]));
}

// =============================================================
// centroid
// =============================================================

#[test]
fn centroid_of_square_loop_is_mean_of_points() {
    let path = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)];
    assert_eq!(centroid(&path), Some(p(5.0, 5.0)));
}

#[test]
fn centroid_of_empty_path_is_none() {
    assert_eq!(centroid(&[]), None);
}

// =============================================================
// Bounds
// =============================================================

#[test]
fn bounds_cover_all_points() {
    let pts = [p(3.0, -1.0), p(-2.0, 4.0), p(7.0, 2.0)];
    let b = Bounds::from_points(&pts).unwrap();
    assert_eq!(b, Bounds { min_x: -2.0, min_y: -1.0, max_x: 7.0, max_y: 4.0 });
    assert_eq!(b.width(), 9.0);
    assert_eq!(b.height(), 5.0);
}

#[test]
fn bounds_of_nothing_is_none() {
    let pts: [Point; 0] = [];
    assert!(Bounds::from_points(&pts).is_none());
}

#[test]
fn bounds_union_and_padding() {
    let a = Bounds { min_x: 0.0, min_y: 0.0, max_x: 1.0, max_y: 1.0 };
    let b = Bounds { min_x: -1.0, min_y: 2.0, max_x: 0.5, max_y: 3.0 };
    let u = a.union(b).padded(1.0);
    assert_eq!(u, Bounds { min_x: -2.0, min_y: -1.0, max_x: 2.0, max_y: 4.0 });
}
