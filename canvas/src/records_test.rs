use serde_json::json;

use super::*;

#[test]
fn cursor_staleness_boundary() {
    let cursor = CursorRecord { x: 0.0, y: 0.0, username: "a".into(), color: "#fff".into(), timestamp: 10_000 };
    assert!(!cursor.is_stale(10_000 + 1999));
    assert!(!cursor.is_stale(10_000 + 2000));
    assert!(cursor.is_stale(10_000 + 2001));
}

#[test]
fn checking_record_omits_unset_fields() {
    let rec = VerificationRecord::checking("u1", "Ada", "Checking chat...", 5);
    let value = serde_json::to_value(&rec).unwrap();
    assert_eq!(
        value,
        json!({"userId": "u1", "username": "Ada", "message": "Checking chat...", "timestamp": 5})
    );
}

#[test]
fn verification_record_reads_countdown() {
    let rec: VerificationRecord = serde_json::from_value(json!({
        "userId": "u1",
        "username": "Ada",
        "message": "Solved!",
        "solved": true,
        "countdown": 2,
        "timestamp": 9
    }))
    .unwrap();
    assert_eq!(rec.solved, Some(true));
    assert_eq!(rec.countdown, Some(2));
    assert_eq!(rec.awaiting_teacher, None);
}

#[test]
fn verification_update_encodes_only_present_fields() {
    let update = VerificationUpdate { countdown: Some(1), ..Default::default() };
    assert_eq!(serde_json::to_value(update).unwrap(), json!({"countdown": 1}));
}

#[test]
fn game_state_wire_names() {
    let rec = GameStateRecord { game_over: false, game_won: true };
    assert_eq!(serde_json::to_value(rec).unwrap(), json!({"gameOver": false, "gameWon": true}));
}

#[test]
fn health_update_wire_names() {
    let rec = PlayerHealthUpdate { health: 42.5, is_alive: true };
    assert_eq!(serde_json::to_value(rec).unwrap(), json!({"health": 42.5, "isAlive": true}));
}
