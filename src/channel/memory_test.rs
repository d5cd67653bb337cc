use serde_json::json;

use super::*;

fn obj(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

// =============================================================================
// Reads and writes
// =============================================================================

#[tokio::test]
async fn set_then_get_nested() {
    let ch = MemoryChannel::default();
    ch.set("rooms/r1/whiteboard/s1", json!({"id": "s1"})).await.unwrap();
    assert_eq!(ch.get("rooms/r1/whiteboard/s1").await.unwrap(), Some(json!({"id": "s1"})));
    assert_eq!(ch.get("rooms/r1/whiteboard").await.unwrap(), Some(json!({"s1": {"id": "s1"}})));
    assert_eq!(ch.get("rooms/r2").await.unwrap(), None);
}

#[tokio::test]
async fn removing_last_child_prunes_parents() {
    let ch = MemoryChannel::default();
    ch.set("rooms/r1/battle/enemies/e1", json!({"id": "e1"})).await.unwrap();
    ch.remove("rooms/r1/battle/enemies/e1").await.unwrap();
    assert_eq!(ch.get("rooms/r1/battle/enemies").await.unwrap(), None);
    assert_eq!(ch.get("rooms/r1").await.unwrap(), None);
}

#[tokio::test]
async fn null_and_empty_object_remove() {
    let ch = MemoryChannel::default();
    ch.set("a/b", json!(1)).await.unwrap();
    ch.set("a/b", Value::Null).await.unwrap();
    assert_eq!(ch.get("a/b").await.unwrap(), None);

    ch.set("a/c", json!({"x": 1})).await.unwrap();
    ch.set("a/c", json!({})).await.unwrap();
    assert_eq!(ch.get("a/c").await.unwrap(), None);
}

#[tokio::test]
async fn writing_below_a_scalar_replaces_it() {
    let ch = MemoryChannel::default();
    ch.set("a", json!(5)).await.unwrap();
    ch.remove("a/b").await.unwrap();
    assert_eq!(ch.get("a").await.unwrap(), Some(json!(5)));
    ch.set("a/b", json!(true)).await.unwrap();
    assert_eq!(ch.get("a").await.unwrap(), Some(json!({"b": true})));
}

#[tokio::test]
async fn update_merges_and_drops_null_fields() {
    let ch = MemoryChannel::default();
    ch.set("p/u1", json!({"x": 1, "y": 2, "health": 100})).await.unwrap();
    ch.update("p/u1", obj(json!({"x": 5, "health": null}))).await.unwrap();
    assert_eq!(ch.get("p/u1").await.unwrap(), Some(json!({"x": 5, "y": 2})));

    ch.update("p/u2", obj(json!({"health": 50}))).await.unwrap();
    assert_eq!(ch.get("p/u2").await.unwrap(), Some(json!({"health": 50})));
}

#[tokio::test]
async fn set_if_absent_returns_existing() {
    let ch = MemoryChannel::default();
    assert_eq!(ch.set_if_absent("v", json!({"userId": "a"})).await.unwrap(), None);
    assert_eq!(ch.set_if_absent("v", json!({"userId": "b"})).await.unwrap(), Some(json!({"userId": "a"})));
    assert_eq!(ch.get("v").await.unwrap(), Some(json!({"userId": "a"})));
}

#[tokio::test]
async fn concurrent_set_if_absent_has_one_winner() {
    let ch = std::sync::Arc::new(MemoryChannel::default());
    let mut handles = Vec::new();
    for uid in ["a", "b", "c", "d"] {
        let ch = ch.clone();
        handles.push(tokio::spawn(async move { ch.set_if_absent("lock", json!(uid)).await.unwrap().is_none() }));
    }
    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn invalid_paths_are_rejected() {
    let ch = MemoryChannel::default();
    assert_eq!(ch.set("", json!(1)).await, Err(ChannelError::InvalidPath(String::new())));
    assert!(matches!(ch.get("a//b").await, Err(ChannelError::InvalidPath(_))));
    assert!(ch.subscribe("/").await.is_err());
}

// =============================================================================
// Subscriptions
// =============================================================================

#[tokio::test]
async fn subscriber_sees_current_value_first() {
    let ch = MemoryChannel::default();
    ch.set("rooms/r1/verification", json!({"userId": "a"})).await.unwrap();
    let mut sub = ch.subscribe("rooms/r1").await.unwrap();
    let first = sub.try_recv().unwrap();
    assert_eq!(first.path, "rooms/r1");
    assert_eq!(first.value, Some(json!({"verification": {"userId": "a"}})));
    assert!(sub.try_recv().is_none());
}

#[tokio::test]
async fn writes_below_prefix_arrive_at_their_path() {
    let ch = MemoryChannel::default();
    let mut sub = ch.subscribe("rooms/r1").await.unwrap();
    ch.set("rooms/r1/cursors/b", json!({"x": 1})).await.unwrap();
    ch.update("rooms/r1/cursors/b", obj(json!({"y": 2}))).await.unwrap();
    ch.remove("rooms/r1/cursors/b").await.unwrap();

    let events: Vec<ChannelEvent> = std::iter::from_fn(|| sub.try_recv()).collect();
    assert_eq!(
        events,
        vec![
            ChannelEvent { path: "rooms/r1/cursors/b".into(), value: Some(json!({"x": 1})) },
            ChannelEvent { path: "rooms/r1/cursors/b".into(), value: Some(json!({"x": 1, "y": 2})) },
            ChannelEvent { path: "rooms/r1/cursors/b".into(), value: None },
        ]
    );
}

#[tokio::test]
async fn writes_above_prefix_arrive_at_prefix() {
    let ch = MemoryChannel::default();
    ch.set("rooms/r1/battle/gameState", json!({"gameOver": false, "gameWon": false})).await.unwrap();
    let mut sub = ch.subscribe("rooms/r1/battle/gameState").await.unwrap();
    sub.try_recv();

    ch.remove("rooms/r1/battle").await.unwrap();
    assert_eq!(sub.try_recv(), Some(ChannelEvent { path: "rooms/r1/battle/gameState".into(), value: None }));
}

#[tokio::test]
async fn unrelated_paths_are_silent() {
    let ch = MemoryChannel::default();
    let mut sub = ch.subscribe("rooms/r1").await.unwrap();
    ch.set("rooms/r10/chat", json!("hi")).await.unwrap();
    ch.set("rooms/r2/chat", json!("hi")).await.unwrap();
    assert!(sub.try_recv().is_none());
}

#[tokio::test]
async fn dropped_subscription_is_pruned_on_next_write() {
    let ch = MemoryChannel::default();
    let sub = ch.subscribe("rooms/r1").await.unwrap();
    assert_eq!(ch.subscriber_count().await, 1);
    drop(sub);
    ch.set("rooms/r1/chat", json!("x")).await.unwrap();
    assert_eq!(ch.subscriber_count().await, 0);
}

#[tokio::test]
async fn full_queue_drops_without_blocking() {
    let ch = MemoryChannel::new(2);
    let mut sub = ch.subscribe("c").await.unwrap();
    for i in 0..5 {
        ch.set("c/n", json!(i)).await.unwrap();
    }
    let seen: Vec<ChannelEvent> = std::iter::from_fn(|| sub.try_recv()).collect();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].value, Some(json!(0)));
    assert_eq!(ch.subscriber_count().await, 1);
}

// =============================================================================
// Disconnect
// =============================================================================

#[tokio::test]
async fn disconnect_removes_registered_paths() {
    let ch = MemoryChannel::default();
    let session = Uuid::new_v4();
    let other = Uuid::new_v4();
    ch.set("rooms/r1/presence/a", json!(true)).await.unwrap();
    ch.set("rooms/r1/presence/b", json!(true)).await.unwrap();
    ch.remove_on_disconnect(session, "rooms/r1/presence/a").await.unwrap();
    ch.remove_on_disconnect(session, "rooms/r1/presence/a").await.unwrap();
    ch.remove_on_disconnect(other, "rooms/r1/presence/b").await.unwrap();

    let mut sub = ch.subscribe("rooms/r1/presence").await.unwrap();
    sub.try_recv();
    ch.disconnect(session).await;

    assert_eq!(ch.get("rooms/r1/presence").await.unwrap(), Some(json!({"b": true})));
    assert_eq!(sub.try_recv(), Some(ChannelEvent { path: "rooms/r1/presence/a".into(), value: None }));
    assert!(sub.try_recv().is_none());

    ch.disconnect(session).await;
    assert!(sub.try_recv().is_none());
}

#[tokio::test]
async fn disconnect_releases_lock_written_later() {
    let ch = MemoryChannel::default();
    let session = Uuid::new_v4();
    ch.set_if_absent("rooms/r1/verification", json!({"userId": "a"})).await.unwrap();
    ch.remove_on_disconnect(session, "rooms/r1/verification").await.unwrap();
    ch.disconnect(session).await;
    assert_eq!(ch.set_if_absent("rooms/r1/verification", json!({"userId": "b"})).await.unwrap(), None);
}

#[tokio::test]
async fn cancelled_registration_no_longer_fires() {
    let ch = MemoryChannel::default();
    let session = Uuid::new_v4();
    ch.remove_on_disconnect(session, "rooms/r1/verification").await.unwrap();
    ch.remove_on_disconnect(session, "rooms/r1/presence/a").await.unwrap();
    ch.cancel_on_disconnect(session, "rooms/r1/verification").await.unwrap();
    ch.cancel_on_disconnect(Uuid::new_v4(), "rooms/r1/presence/a").await.unwrap();

    ch.set("rooms/r1/verification", json!({"userId": "b"})).await.unwrap();
    ch.set("rooms/r1/presence/a", json!(true)).await.unwrap();
    ch.disconnect(session).await;

    assert_eq!(ch.get("rooms/r1/verification").await.unwrap(), Some(json!({"userId": "b"})));
    assert_eq!(ch.get("rooms/r1/presence/a").await.unwrap(), None);
    assert!(ch.cancel_on_disconnect(session, "a//b").await.is_err());
}
