#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;
use crate::consts::PLAYER_MAX_HEALTH;
use crate::records::VerificationRecord;

// =============================================================
// Helpers
// =============================================================

fn core(uid: &str) -> EngineCore {
    let mut core = EngineCore::with_seed(LocalUser::new(uid, uid.to_uppercase(), "#fff"), BattleRules::default(), 42);
    core.set_viewport(800.0, 600.0);
    core
}

fn stroke_value(id: &str, points: &[(f64, f64)], ts: i64) -> Value {
    let path: Vec<Value> = points.iter().map(|&(x, y)| json!({"x": x, "y": y})).collect();
    json!({
        "id": id,
        "path": path,
        "color": "#ff0000",
        "brushSize": 3.0,
        "timestamp": ts,
        "type": "path",
        "ownerId": "a",
    })
}

fn countdown(n: u32) -> Value {
    let mut rec = VerificationRecord::checking("a", "A", "Solved!", 1);
    rec.solved = Some(true);
    rec.countdown = Some(n);
    json!(rec)
}

/// Two present members, three strokes by A (one single-point).
fn room_with_drawings(uid: &str) -> EngineCore {
    let mut core = core(uid);
    core.apply_remote(&RoomPath::Presence, Some(json!({"a": true, "b": true})));
    let strokes = [
        ("s1", vec![(0.0, 0.0), (50.0, 0.0)]),
        ("s2", vec![(300.0, 300.0)]),
        ("s3", vec![(100.0, 100.0), (120.0, 140.0), (90.0, 150.0)]),
    ];
    for (i, (id, points)) in strokes.iter().enumerate() {
        let ts = i64::try_from(i).unwrap();
        core.apply_remote(&RoomPath::Stroke((*id).into()), Some(stroke_value(id, points, ts)));
    }
    core
}

fn enter_battle(core: &mut EngineCore) -> Vec<Action> {
    let mut actions = Vec::new();
    for n in (0..=3).rev() {
        actions.extend(core.apply_remote(&RoomPath::Verification, Some(countdown(n))));
    }
    actions
}

fn has_sync(actions: &[Action], pred: impl Fn(&SyncOp) -> bool) -> bool {
    actions.iter().any(|a| matches!(a, Action::Sync(op) if pred(op)))
}

// =============================================================
// Presence
// =============================================================

#[test]
fn presence_collection_sets_members() {
    let mut core = core("a");
    core.apply_remote(&RoomPath::Presence, Some(json!({"b": true, "a": true, "c": false})));
    assert_eq!(core.present(), ["a", "b"]);
    let members = core.members();
    assert_eq!(members[0].username, "A");
    assert_eq!(members[1].username, "b");
}

#[test]
fn presence_member_join_and_leave() {
    let mut core = core("a");
    core.apply_remote(&RoomPath::PresenceMember("c".into()), Some(json!(true)));
    core.apply_remote(&RoomPath::PresenceMember("b".into()), Some(json!(true)));
    assert_eq!(core.present(), ["b", "c"]);
    core.apply_remote(&RoomPath::PresenceMember("c".into()), None);
    assert_eq!(core.present(), ["b"]);
}

#[test]
fn profiles_fill_member_names() {
    let mut core = core("a");
    core.set_profile(Member { id: "b".into(), username: "Bea".into(), avatar_url: Some("https://x/b.png".into()) });
    core.apply_remote(&RoomPath::Presence, Some(json!({"a": true, "b": true})));
    assert_eq!(core.members()[1].username, "Bea");
}

// =============================================================
// Battle start
// =============================================================

#[test]
fn countdown_zero_enters_battle_with_one_enemy_per_drawable_stroke() {
    let mut core = room_with_drawings("a");
    let actions = enter_battle(&mut core);

    assert!(actions.contains(&Action::BattleStarted));
    let battle = core.battle.as_ref().unwrap();
    let enemy_ids: Vec<&str> = battle.enemies().keys().map(String::as_str).collect();
    assert_eq!(enemy_ids, vec!["enemy-s1", "enemy-s3"]);
    assert_eq!(battle.players().len(), 2);
    for player in battle.players().values() {
        assert_eq!(player.health, PLAYER_MAX_HEALTH);
        assert!(player.is_alive);
    }
}

#[test]
fn host_publishes_enemies_and_own_player() {
    let mut core = room_with_drawings("a");
    let actions = enter_battle(&mut core);
    assert!(core.battle.as_ref().unwrap().is_host());
    assert!(has_sync(&actions, |op| matches!(op, SyncOp::Set { path: RoomPath::Enemies, .. })));
    assert!(has_sync(&actions, |op| matches!(op, SyncOp::Set { path: RoomPath::Player(uid), .. } if uid == "a")));
    assert!(!has_sync(&actions, |op| matches!(op, SyncOp::Set { path: RoomPath::Player(uid), .. } if uid == "b")));
}

#[test]
fn non_host_publishes_only_own_player() {
    let mut core = room_with_drawings("b");
    let actions = enter_battle(&mut core);
    assert!(!core.battle.as_ref().unwrap().is_host());
    assert!(!has_sync(&actions, |op| matches!(op, SyncOp::Set { path: RoomPath::Enemies, .. })));
    assert!(has_sync(&actions, |op| matches!(op, SyncOp::Set { path: RoomPath::Player(uid), .. } if uid == "b")));
    assert!(!actions.iter().any(|a| matches!(a, Action::SyncRejected(_))));
}

#[test]
fn second_countdown_during_battle_is_ignored() {
    let mut core = room_with_drawings("a");
    enter_battle(&mut core);
    core.apply_remote(&RoomPath::Verification, None);
    let actions = core.apply_remote(&RoomPath::Verification, Some(countdown(0)));
    assert!(!actions.contains(&Action::BattleStarted));
}

#[test]
fn battle_paths_ignored_on_whiteboard() {
    let mut core = core("a");
    assert!(core.apply_remote(&RoomPath::GameState, Some(json!({"gameOver": true, "gameWon": false}))).is_empty());
    assert!(!core.in_battle());
}

// =============================================================
// Battle end
// =============================================================

#[test]
fn battle_cleared_returns_to_blank_whiteboard() {
    let mut core = room_with_drawings("a");
    enter_battle(&mut core);

    let actions = core.apply_remote(&RoomPath::Battle, None);
    assert!(actions.contains(&Action::ReturnToWhiteboard));
    assert!(!core.in_battle());
    assert!(core.whiteboard.doc.is_empty());
}

#[test]
fn exit_battle_clears_room() {
    let mut core = room_with_drawings("b");
    enter_battle(&mut core);
    let actions = core.exit_battle();
    assert_eq!(
        actions,
        vec![
            Action::Sync(SyncOp::Remove { path: RoomPath::Battle }),
            Action::Sync(SyncOp::Remove { path: RoomPath::Whiteboard }),
            Action::Sync(SyncOp::Remove { path: RoomPath::Chat }),
        ]
    );
    assert!(!core.battle.as_ref().unwrap().is_running());
    assert!(core.tick(1000, &FrameInput::default()).is_empty());
}

#[test]
fn exit_without_battle_is_noop() {
    let mut core = core("a");
    assert!(core.exit_battle().is_empty());
}

#[test]
fn host_handover_when_host_leaves() {
    let mut core = room_with_drawings("b");
    enter_battle(&mut core);
    core.apply_remote(&RoomPath::PresenceMember("a".into()), None);
    assert!(core.battle.as_ref().unwrap().is_host());
}
