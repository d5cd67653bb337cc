#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;

fn make_stroke(id: &str, owner: &str, ts: i64, path: Vec<Point>) -> Stroke {
    Stroke {
        id: id.into(),
        path,
        color: "#ffffff".into(),
        brush_size: 3.0,
        timestamp: ts,
        kind: StrokeKind::Path,
        owner_id: owner.into(),
    }
}

fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
    vec![Point::new(x0, y0), Point::new(x1, y1)]
}

// =============================================================
// Stroke serde
// =============================================================

#[test]
fn stroke_uses_camel_case_wire_names() {
    let stroke = make_stroke("s1", "alice", 42, line(0.0, 0.0, 1.0, 1.0));
    let value = serde_json::to_value(&stroke).unwrap();
    assert_eq!(value["brushSize"], json!(3.0));
    assert_eq!(value["ownerId"], json!("alice"));
    assert_eq!(value["type"], json!("path"));
    assert_eq!(value["path"][1], json!({"x": 1.0, "y": 1.0}));
}

#[test]
fn stroke_without_type_defaults_to_path() {
    let value = json!({
        "id": "s1",
        "path": [{"x": 0.0, "y": 0.0}],
        "color": "#000",
        "brushSize": 2.0,
        "timestamp": 1,
        "ownerId": "bob"
    });
    let stroke: Stroke = serde_json::from_value(value).unwrap();
    assert_eq!(stroke.kind, StrokeKind::Path);
    assert!(!stroke.is_drawable());
}

#[test]
fn two_point_stroke_is_drawable() {
    assert!(make_stroke("s", "a", 0, line(0.0, 0.0, 1.0, 0.0)).is_drawable());
}

// =============================================================
// StrokeStore
// =============================================================

#[test]
fn insert_get_remove() {
    let mut store = StrokeStore::new();
    store.insert(make_stroke("s1", "alice", 1, line(0.0, 0.0, 1.0, 1.0)));
    assert_eq!(store.len(), 1);
    assert!(store.contains("s1"));
    assert_eq!(store.get("s1").map(|s| s.owner_id.as_str()), Some("alice"));
    assert!(store.remove("s1").is_some());
    assert!(store.is_empty());
    assert!(store.remove("s1").is_none());
}

#[test]
fn insert_same_id_replaces() {
    let mut store = StrokeStore::new();
    store.insert(make_stroke("s1", "alice", 1, line(0.0, 0.0, 1.0, 1.0)));
    let mut again = make_stroke("s1", "alice", 1, line(5.0, 5.0, 6.0, 6.0));
    again.color = "#ff0000".into();
    store.insert(again);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("s1").map(|s| s.color.as_str()), Some("#ff0000"));
}

#[test]
fn chronological_orders_by_timestamp_then_id() {
    let mut store = StrokeStore::new();
    store.insert(make_stroke("b", "x", 5, line(0.0, 0.0, 1.0, 1.0)));
    store.insert(make_stroke("a", "x", 5, line(0.0, 0.0, 1.0, 1.0)));
    store.insert(make_stroke("c", "x", 1, line(0.0, 0.0, 1.0, 1.0)));
    let ids: Vec<&str> = store.chronological().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "a", "b"]);
}

#[test]
fn last_owned_by_skips_other_users() {
    let mut store = StrokeStore::new();
    store.insert(make_stroke("a1", "alice", 1, line(0.0, 0.0, 1.0, 1.0)));
    store.insert(make_stroke("b1", "bob", 2, line(0.0, 0.0, 1.0, 1.0)));
    store.insert(make_stroke("a0", "alice", 0, line(0.0, 0.0, 1.0, 1.0)));
    assert_eq!(store.last_owned_by("alice").map(|s| s.id.as_str()), Some("a1"));
    assert_eq!(store.last_owned_by("bob").map(|s| s.id.as_str()), Some("b1"));
    assert!(store.last_owned_by("carol").is_none());
}

#[test]
fn load_snapshot_replaces_everything() {
    let mut store = StrokeStore::new();
    store.insert(make_stroke("old", "x", 1, line(0.0, 0.0, 1.0, 1.0)));
    store.load_snapshot(vec![make_stroke("new", "y", 2, line(0.0, 0.0, 1.0, 1.0))]);
    assert!(!store.contains("old"));
    assert!(store.contains("new"));
}

#[test]
fn bounds_span_all_strokes() {
    let mut store = StrokeStore::new();
    assert!(store.bounds().is_none());
    store.insert(make_stroke("a", "x", 1, line(-10.0, 0.0, 5.0, 5.0)));
    store.insert(make_stroke("b", "x", 2, line(20.0, -3.0, 0.0, 8.0)));
    let b = store.bounds().unwrap();
    assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (-10.0, -3.0, 20.0, 8.0));
}
