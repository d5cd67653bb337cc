use super::*;

#[test]
fn request_sets_fields() {
    let frame = Frame::request("channel:get", Data::new());
    assert_eq!(frame.syscall, "channel:get");
    assert_eq!(frame.status, Status::Request);
    assert!(frame.parent_id.is_none());
    assert!(frame.room.is_none());
    assert!(frame.ts > 0);
}

#[test]
fn reply_inherits_context() {
    let req = Frame::request("channel:set", Data::new()).with_room("r1");
    let item = req.item(Data::new());
    assert_eq!(item.parent_id, Some(req.id));
    assert_eq!(item.room.as_deref(), Some("r1"));
    assert_eq!(item.syscall, "channel:set");
    assert_eq!(item.status, Status::Item);

    let done = req.done_with(Data::from([("value".into(), serde_json::json!(3))]));
    assert_eq!(done.status, Status::Done);
    assert_eq!(done.data["value"], serde_json::json!(3));
}

#[test]
fn terminal_statuses() {
    assert!(Status::Done.is_terminal());
    assert!(Status::Error.is_terminal());
    assert!(!Status::Request.is_terminal());
    assert!(!Status::Item.is_terminal());
}

#[test]
fn prefix_and_op() {
    let frame = Frame::request("channel:set_if_absent", Data::new());
    assert_eq!(frame.prefix(), "channel");
    assert_eq!(frame.op(), "set_if_absent");

    let frame = Frame::request("noseparator", Data::new());
    assert_eq!(frame.prefix(), "noseparator");
    assert_eq!(frame.op(), "");
}

#[test]
fn minimal_client_frame_parses() {
    let raw = r#"{"id":"6f1c1d0e-54a4-4b8e-9a3e-2d1f5bb1f0aa","syscall":"channel:get","status":"request","data":{"path":"verification"}}"#;
    let frame: Frame = serde_json::from_str(raw).unwrap();
    assert_eq!(frame.str_field(FRAME_PATH), Some("verification"));
    assert!(frame.parent_id.is_none());
    assert_eq!(frame.ts, 0);
}

#[test]
fn error_from_typed() {
    #[derive(Debug, thiserror::Error)]
    #[error("not found")]
    struct NotFound;

    impl ErrorCode for NotFound {
        fn error_code(&self) -> &'static str {
            "E_NOT_FOUND"
        }
    }

    let req = Frame::request("channel:get", Data::new());
    let err = req.error_from(&NotFound);
    assert_eq!(err.status, Status::Error);
    assert_eq!(err.str_field(FRAME_CODE), Some("E_NOT_FOUND"));
    assert_eq!(err.str_field(FRAME_MESSAGE), Some("not found"));
    assert_eq!(err.data.get(FRAME_RETRYABLE).and_then(serde_json::Value::as_bool), Some(false));
}
