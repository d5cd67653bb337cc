use serde_json::json;

use super::*;

fn fields(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

// =============================================================
// RoomPath
// =============================================================

#[test]
fn paths_display_relative_to_room() {
    assert_eq!(RoomPath::Stroke("s1".into()).to_string(), "whiteboard/s1");
    assert_eq!(RoomPath::Cursor("u1".into()).to_string(), "cursors/u1");
    assert_eq!(RoomPath::Verification.to_string(), "verification");
    assert_eq!(RoomPath::Player("u1".into()).to_string(), "battle/players/u1");
    assert_eq!(RoomPath::Enemy("e1".into()).to_string(), "battle/enemies/e1");
    assert_eq!(RoomPath::Projectile("p1".into()).to_string(), "battle/projectiles/p1");
    assert_eq!(RoomPath::GameState.to_string(), "battle/gameState");
    assert_eq!(RoomPath::PresenceMember("u1".into()).to_string(), "presence/u1");
}

#[test]
fn parse_inverts_display() {
    let paths = [
        RoomPath::Whiteboard,
        RoomPath::Stroke("abc".into()),
        RoomPath::Cursors,
        RoomPath::Cursor("u".into()),
        RoomPath::Verification,
        RoomPath::Battle,
        RoomPath::Players,
        RoomPath::Player("u".into()),
        RoomPath::Enemies,
        RoomPath::Enemy("enemy-1".into()),
        RoomPath::Projectiles,
        RoomPath::Projectile("p".into()),
        RoomPath::GameState,
        RoomPath::Presence,
        RoomPath::PresenceMember("u".into()),
        RoomPath::Chat,
    ];
    for path in paths {
        assert_eq!(RoomPath::parse(&path.to_string()), Some(path.clone()));
    }
}

#[test]
fn parse_rejects_unknown_and_field_paths() {
    assert_eq!(RoomPath::parse("nope"), None);
    assert_eq!(RoomPath::parse("battle/players/u1/health"), None);
    assert_eq!(RoomPath::parse("whiteboard//x"), None);
}

#[test]
fn parse_tolerates_surrounding_slashes() {
    assert_eq!(RoomPath::parse("/verification/"), Some(RoomPath::Verification));
}

#[test]
fn disciplines_per_path() {
    assert_eq!(RoomPath::Player("u".into()).discipline(), Discipline::ExclusiveOwner);
    assert_eq!(RoomPath::Projectile("p".into()).discipline(), Discipline::ExclusiveOwner);
    assert_eq!(RoomPath::Enemy("e".into()).discipline(), Discipline::AnyWriterDelete);
    assert_eq!(RoomPath::Enemies.discipline(), Discipline::HostSnapshot);
    assert_eq!(RoomPath::Verification.discipline(), Discipline::MutualExclusion);
    assert_eq!(RoomPath::GameState.discipline(), Discipline::LastWriterWins);
}

// =============================================================
// SyncGuard
// =============================================================

#[test]
fn owner_may_set_own_player() {
    let guard = SyncGuard::new("alice", false);
    let op = SyncOp::Set { path: RoomPath::Player("alice".into()), value: json!({}) };
    assert!(guard.authorize(&op, Some("alice")).is_ok());
}

#[test]
fn non_owner_may_not_move_someone_elses_player() {
    let guard = SyncGuard::new("alice", true);
    let op = SyncOp::Update { path: RoomPath::Player("bob".into()), fields: fields(json!({"x": 1.0, "y": 2.0})) };
    assert!(matches!(guard.authorize(&op, Some("bob")), Err(SyncError::NotOwner { .. })));
}

#[test]
fn any_peer_may_write_player_health() {
    let guard = SyncGuard::new("alice", false);
    let op = SyncOp::Update {
        path: RoomPath::Player("bob".into()),
        fields: fields(json!({"health": 50.0, "isAlive": true})),
    };
    assert!(guard.authorize(&op, Some("bob")).is_ok());
}

#[test]
fn any_peer_may_delete_a_projectile_but_not_move_it() {
    let guard = SyncGuard::new("alice", false);
    let remove = SyncOp::Remove { path: RoomPath::Projectile("p".into()) };
    assert!(guard.authorize(&remove, Some("bob")).is_ok());
    let update = SyncOp::Update { path: RoomPath::Projectile("p".into()), fields: fields(json!({"x": 1.0})) };
    assert!(guard.authorize(&update, Some("bob")).is_err());
}

#[test]
fn enemy_snapshot_is_host_only() {
    let op = SyncOp::Set { path: RoomPath::Enemies, value: json!({}) };
    assert!(SyncGuard::new("a", true).authorize(&op, None).is_ok());
    assert!(matches!(SyncGuard::new("b", false).authorize(&op, None), Err(SyncError::NotHost { .. })));
}

#[test]
fn any_peer_may_delete_an_enemy() {
    let op = SyncOp::Remove { path: RoomPath::Enemy("e".into()) };
    assert!(SyncGuard::new("b", false).authorize(&op, None).is_ok());
}

#[test]
fn verification_lock_rules() {
    let guard = SyncGuard::new("alice", false);
    let acquire = SyncOp::SetIfAbsent { path: RoomPath::Verification, value: json!({}) };
    assert!(guard.authorize(&acquire, None).is_ok());
    let release = SyncOp::Remove { path: RoomPath::Verification };
    assert!(guard.authorize(&release, Some("alice")).is_ok());
    assert!(guard.authorize(&release, Some("bob")).is_err());
}

#[test]
fn last_writer_wins_paths_accept_anything() {
    let guard = SyncGuard::new("alice", false);
    let op = SyncOp::Set { path: RoomPath::GameState, value: json!({"gameOver": true, "gameWon": false}) };
    assert!(guard.authorize(&op, None).is_ok());
}

// =============================================================
// encode
// =============================================================

#[test]
fn encode_fields_requires_object() {
    assert!(encode_fields(&json!({"a": 1})).is_ok());
    assert!(matches!(encode_fields(&5), Err(SyncError::Encode(_))));
}

#[test]
fn op_path_and_verb() {
    let op = SyncOp::RemoveOnDisconnect { path: RoomPath::Cursor("u".into()) };
    assert_eq!(op.path(), &RoomPath::Cursor("u".into()));
    assert_eq!(op.verb(), "on_disconnect");
}
