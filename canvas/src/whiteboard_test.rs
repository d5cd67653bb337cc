#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;
use crate::records::VerificationRecord;

// =============================================================
// Helpers
// =============================================================

fn core(uid: &str) -> WhiteboardCore {
    let mut wb = WhiteboardCore::new(LocalUser::new(uid, uid.to_uppercase(), "#ff0000"));
    wb.set_viewport(800.0, 600.0);
    wb
}

/// Press, drag through `points`, release; all at `now_ms`.
fn draw(wb: &mut WhiteboardCore, points: &[(f64, f64)], now_ms: i64) -> Vec<Action> {
    let mut actions = Vec::new();
    let (first, rest) = points.split_first().unwrap();
    actions.extend(wb.on_pointer_down(Point::new(first.0, first.1), Button::Primary));
    for &(x, y) in rest {
        actions.extend(wb.on_pointer_move(Point::new(x, y), now_ms));
    }
    actions.extend(wb.on_pointer_up(Button::Primary, now_ms));
    actions
}

fn ops(actions: &[Action]) -> Vec<&SyncOp> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::Sync(op) => Some(op),
            _ => None,
        })
        .collect()
}

fn stroke_sets(actions: &[Action]) -> Vec<Stroke> {
    ops(actions)
        .into_iter()
        .filter_map(|op| match op {
            SyncOp::Set { path: RoomPath::Stroke(_), value } => serde_json::from_value(value.clone()).ok(),
            _ => None,
        })
        .collect()
}

fn remote_stroke(id: &str, owner: &str, ts: i64) -> serde_json::Value {
    json!({
        "id": id,
        "path": [{"x": 0.0, "y": 0.0}, {"x": 5.0, "y": 5.0}],
        "color": "#00ff00",
        "brushSize": 2.0,
        "timestamp": ts,
        "type": "path",
        "ownerId": owner,
    })
}

fn apply_stroke(wb: &mut WhiteboardCore, id: &str, owner: &str, ts: i64) {
    wb.apply_remote(&RoomPath::Stroke(id.into()), Some(remote_stroke(id, owner, ts)));
}

// =============================================================
// Commit
// =============================================================

#[test]
fn click_without_drag_commits_nothing() {
    let mut wb = core("a");
    let actions = draw(&mut wb, &[(10.0, 10.0)], 100);
    assert!(stroke_sets(&actions).is_empty());
    assert!(wb.doc.is_empty());
    assert!(wb.preview().is_none());
}

#[test]
fn drag_commits_owned_stroke() {
    let mut wb = core("a");
    let actions = draw(&mut wb, &[(0.0, 0.0), (10.0, 0.0), (20.0, 5.0)], 100);

    let sets = stroke_sets(&actions);
    assert_eq!(sets.len(), 1);
    let stroke = &sets[0];
    assert_eq!(stroke.owner_id, "a");
    assert_eq!(stroke.path.len(), 3);
    assert_eq!(stroke.timestamp, 100);
    assert!(wb.doc.contains(&stroke.id));
    assert!(wb.preview().is_none());
}

#[test]
fn stroke_points_are_world_space() {
    let mut wb = core("a");
    wb.camera = Camera::new(100.0, 50.0);
    let actions = draw(&mut wb, &[(0.0, 0.0), (10.0, 0.0)], 100);
    let stroke = &stroke_sets(&actions)[0];
    assert_eq!(stroke.path[0], Point::new(100.0, 50.0));
}

#[test]
fn eraser_paints_background() {
    let mut wb = core("a");
    wb.set_tool(Tool::Eraser);
    let actions = draw(&mut wb, &[(0.0, 0.0), (10.0, 0.0)], 100);
    assert_eq!(stroke_sets(&actions)[0].color, BACKGROUND_COLOR);
}

#[test]
fn shape_tool_regenerates_path_from_start() {
    let mut wb = core("a");
    wb.set_tool(Tool::Rectangle);
    let actions = draw(&mut wb, &[(0.0, 0.0), (3.0, 3.0), (7.0, 2.0), (10.0, 10.0)], 100);
    let stroke = &stroke_sets(&actions)[0];
    assert_eq!(
        stroke.path,
        vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(0.0, 0.0),
        ]
    );
}

// =============================================================
// Undo / redo
// =============================================================

#[test]
fn undo_only_touches_own_strokes() {
    let mut wb = core("a");
    let s1 = stroke_sets(&draw(&mut wb, &[(0.0, 0.0), (10.0, 0.0)], 100))[0].id.clone();
    apply_stroke(&mut wb, "s2", "b", 200);

    let actions = wb.undo();
    assert_eq!(ops(&actions), vec![&SyncOp::Remove { path: RoomPath::Stroke(s1.clone()) }]);
    assert!(!wb.doc.contains(&s1));
    assert!(wb.doc.contains("s2"));

    let actions = wb.redo();
    let restored = stroke_sets(&actions);
    assert_eq!(restored[0].id, s1);
    assert!(wb.doc.contains(&s1));
}

#[test]
fn foreign_stroke_before_redo_makes_redo_noop() {
    let mut wb = core("a");
    let s1 = stroke_sets(&draw(&mut wb, &[(0.0, 0.0), (10.0, 0.0)], 100))[0].id.clone();
    apply_stroke(&mut wb, "s2", "b", 200);
    wb.undo();
    apply_stroke(&mut wb, "s3", "b", 300);

    assert!(wb.redo().is_empty());
    assert!(!wb.doc.contains(&s1));
}

#[test]
fn commit_clears_redo() {
    let mut wb = core("a");
    draw(&mut wb, &[(0.0, 0.0), (10.0, 0.0)], 100);
    wb.undo();
    assert!(wb.can_redo());
    draw(&mut wb, &[(0.0, 0.0), (20.0, 0.0)], 200);
    assert!(!wb.can_redo());
}

#[test]
fn undo_with_no_own_strokes_is_noop() {
    let mut wb = core("a");
    apply_stroke(&mut wb, "s2", "b", 200);
    assert!(wb.undo().is_empty());
    assert!(wb.doc.contains("s2"));
}

#[test]
fn own_echo_does_not_clear_redo() {
    let mut wb = core("a");
    draw(&mut wb, &[(0.0, 0.0), (10.0, 0.0)], 100);
    let s2 = stroke_sets(&draw(&mut wb, &[(0.0, 0.0), (20.0, 0.0)], 200))[0].id.clone();
    wb.undo();
    apply_stroke(&mut wb, "other-of-mine", "a", 250);
    assert!(wb.can_redo());
    assert_eq!(stroke_sets(&wb.redo())[0].id, s2);
}

// =============================================================
// Pan
// =============================================================

#[test]
fn pan_moves_camera_not_strokes() {
    let mut wb = core("a");
    draw(&mut wb, &[(0.0, 0.0), (10.0, 0.0)], 100);
    let before: Vec<Stroke> = wb.doc.to_vec();

    assert_eq!(wb.on_pointer_down(Point::new(100.0, 100.0), Button::Secondary), vec![Action::CapturePointer]);
    let actions = wb.on_pointer_move(Point::new(130.0, 90.0), 1000);
    assert!(actions.contains(&Action::RenderNow));
    assert_eq!(wb.camera, Camera::new(-30.0, 10.0));
    assert_eq!(wb.doc.to_vec(), before);

    let actions = wb.on_pointer_up(Button::Secondary, 1100);
    assert_eq!(actions[0], Action::ReleasePointer);
    assert!(matches!(wb.pan, PanState::Idle));
}

#[test]
fn leaving_canvas_keeps_pan_but_commits_stroke() {
    let mut wb = core("a");
    wb.on_pointer_down(Point::new(0.0, 0.0), Button::Middle);
    assert!(wb.on_pointer_leave(100).is_empty());
    assert!(matches!(wb.pan, PanState::Panning { .. }));
    wb.on_pointer_up(Button::Middle, 100);

    wb.on_pointer_down(Point::new(0.0, 0.0), Button::Primary);
    wb.on_pointer_move(Point::new(10.0, 0.0), 200);
    let actions = wb.on_pointer_leave(300);
    assert_eq!(stroke_sets(&actions).len(), 1);
}

// =============================================================
// Cursors
// =============================================================

#[test]
fn cursor_published_in_world_space_and_throttled() {
    let mut wb = core("a");
    wb.camera = Camera::new(50.0, 0.0);
    let first = wb.on_pointer_move(Point::new(10.0, 10.0), 1000);
    match ops(&first).as_slice() {
        [SyncOp::Set { path: RoomPath::Cursor(uid), value }] => {
            assert_eq!(uid, "a");
            assert_eq!(value["x"], json!(60.0));
            assert_eq!(value["username"], json!("A"));
        }
        other => panic!("unexpected ops {other:?}"),
    }
    assert!(ops(&wb.on_pointer_move(Point::new(40.0, 40.0), 1020)).is_empty());
}

#[test]
fn stale_cursors_are_hidden() {
    let mut wb = core("a");
    let now = 10_000;
    for (uid, age) in [("b", 1999), ("c", 2001)] {
        let record = json!({"x": 1.0, "y": 2.0, "username": uid, "color": "#fff", "timestamp": now - age});
        wb.apply_remote(&RoomPath::Cursor(uid.into()), Some(record));
    }
    let visible: Vec<&str> = wb.visible_cursors(now).into_iter().map(|(uid, _)| uid).collect();
    assert_eq!(visible, vec!["b"]);
}

#[test]
fn own_cursor_is_never_shown() {
    let mut wb = core("a");
    let record = json!({"x": 1.0, "y": 2.0, "username": "A", "color": "#fff", "timestamp": 0});
    wb.apply_remote(&RoomPath::Cursors, Some(json!({"a": record})));
    assert!(wb.visible_cursors(0).is_empty());
}

#[test]
fn join_registers_cursor_cleanup() {
    let wb = core("a");
    assert_eq!(
        wb.join_ops(),
        vec![Action::Sync(SyncOp::RemoveOnDisconnect { path: RoomPath::Cursor("a".into()) })]
    );
}

// =============================================================
// Remote collection + verification
// =============================================================

#[test]
fn whiteboard_removal_clears_doc() {
    let mut wb = core("a");
    apply_stroke(&mut wb, "s1", "b", 1);
    wb.apply_remote(&RoomPath::Whiteboard, None);
    assert!(wb.doc.is_empty());
}

#[test]
fn countdown_zero_starts_battle_with_local_strokes() {
    let mut wb = core("a");
    apply_stroke(&mut wb, "s1", "b", 1);
    let mut record = VerificationRecord::checking("b", "B", "Starting", 5);
    record.solved = Some(true);
    record.countdown = Some(1);
    assert!(!wb.apply_remote(&RoomPath::Verification, Some(json!(record))).iter().any(|a| matches!(a, Action::StartBattle(_))));

    record.countdown = Some(0);
    let actions = wb.apply_remote(&RoomPath::Verification, Some(json!(record)));
    match &actions[0] {
        Action::StartBattle(strokes) => assert_eq!(strokes[0].id, "s1"),
        other => panic!("expected StartBattle, got {other:?}"),
    }
    let again = wb.apply_remote(&RoomPath::Verification, Some(json!(record)));
    assert!(!again.iter().any(|a| matches!(a, Action::StartBattle(_))));
}

// =============================================================
// Snapshot
// =============================================================

#[test]
fn snapshot_empty_board_is_none() {
    let wb = core("a");
    assert!(wb.snapshot().unwrap().is_none());
}

#[test]
fn snapshot_after_drawing_is_png() {
    let mut wb = core("a");
    draw(&mut wb, &[(0.0, 0.0), (100.0, 50.0)], 100);
    let snap = wb.snapshot().unwrap().unwrap();
    assert!(snap.data_uri.starts_with("data:image/png;base64,"));
    assert_eq!(snap.width, 180);
    assert_eq!(snap.height, 130);
}
