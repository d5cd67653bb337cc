use base64::Engine as _;

use super::*;
use crate::camera::Point;
use crate::doc::{Stroke, StrokeKind};

fn stroke(id: &str, points: &[(f64, f64)], color: &str) -> Stroke {
    Stroke {
        id: id.into(),
        path: points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        color: color.into(),
        brush_size: 4.0,
        timestamp: 1,
        kind: StrokeKind::Path,
        owner_id: "a".into(),
    }
}

#[test]
fn parse_color_forms() {
    assert_eq!(parse_color("#ff0000"), Rgba([255, 0, 0, 255]));
    assert_eq!(parse_color("#0f0"), Rgba([0, 255, 0, 255]));
    assert_eq!(parse_color("#00000080"), Rgba([0, 0, 0, 128]));
    assert_eq!(parse_color("red"), Rgba([255, 255, 255, 255]));
    assert_eq!(parse_color("#zzzzzz"), Rgba([255, 255, 255, 255]));
}

#[test]
fn polyline_paints_pixels_along_segment() {
    let mut p = RasterPainter::new(20, 20);
    p.clear("#000000").unwrap();
    p.polyline(&[Point::new(2.0, 10.0), Point::new(18.0, 10.0)], "#ff0000", 2.0).unwrap();
    assert_eq!(p.image().get_pixel(10, 9), &Rgba([255, 0, 0, 255]));
    assert_eq!(p.image().get_pixel(10, 2), &Rgba([0, 0, 0, 255]));
}

#[test]
fn transform_applies_to_geometry() {
    let mut p = RasterPainter::new(20, 20);
    p.clear("#000000").unwrap();
    p.set_transform(0.5, 5.0, 5.0).unwrap();
    p.fill_circle(Point::new(10.0, 10.0), 4.0, "#ffffff").unwrap();
    assert_eq!(p.image().get_pixel(10, 10), &Rgba([255, 255, 255, 255]));
    assert_eq!(p.image().get_pixel(14, 14), &Rgba([0, 0, 0, 255]));
}

#[test]
fn alpha_blends_with_background() {
    let mut p = RasterPainter::new(4, 4);
    p.clear("#000000").unwrap();
    p.set_alpha(0.5);
    p.fill_rect(0.0, 0.0, 4.0, 4.0, "#ffffff").unwrap();
    assert_eq!(p.image().get_pixel(1, 1)[0], 128);
}

#[test]
fn empty_board_has_no_snapshot() {
    assert!(export_snapshot(&StrokeStore::new()).unwrap().is_none());
}

#[test]
fn snapshot_is_padded_and_decodable() {
    let mut doc = StrokeStore::new();
    doc.insert(stroke("s1", &[(100.0, 100.0), (200.0, 150.0)], "#ff0000"));
    let snap = export_snapshot(&doc).unwrap().unwrap();
    assert_eq!((snap.width, snap.height), (180, 130));

    let decoded = image::load_from_memory(&snap.png).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (180, 130));
    // Stroke starts at the padding offset.
    assert_eq!(decoded.get_pixel(41, 40), &Rgba([255, 0, 0, 255]));
    // Corner is background.
    assert_eq!(decoded.get_pixel(1, 1), &parse_color(BACKGROUND_COLOR));

    let b64 = snap.data_uri.strip_prefix("data:image/png;base64,").unwrap();
    assert_eq!(STANDARD.decode(b64).unwrap(), snap.png);
}

#[test]
fn large_board_is_scaled_to_max_size() {
    let mut doc = StrokeStore::new();
    doc.insert(stroke("s1", &[(0.0, 0.0), (4000.0, 1000.0)], "#ffffff"));
    let snap = export_snapshot(&doc).unwrap().unwrap();
    assert_eq!(snap.width, 1024);
    assert!(snap.height < 1024);
}

#[test]
fn single_point_strokes_are_skipped_but_bound_the_box() {
    let mut doc = StrokeStore::new();
    doc.insert(stroke("dot", &[(0.0, 0.0)], "#ff0000"));
    let snap = export_snapshot(&doc).unwrap().unwrap();
    assert_eq!((snap.width, snap.height), (80, 80));
    let decoded = image::load_from_memory(&snap.png).unwrap().to_rgba8();
    assert!(decoded.pixels().all(|px| px != &Rgba([255, 0, 0, 255])));
}
