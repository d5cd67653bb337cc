//! WebSocket handler: one realtime channel session per socket.
//!
//! DESIGN
//! ======
//! On upgrade, generates a session id and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Subscription events and deferred replies → forward to client
//!
//! Handlers validate, touch the channel, and return an `Outcome`. The
//! dispatch layer turns it into the reply frame. Slow work (oracle calls)
//! replies later through the connection's outbound queue.
//!
//! Paths on the wire are relative to the room; the relay scopes them under
//! `rooms/{room}` so a socket can never touch another room.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `session`, `room`, `enemyGrowth`
//! 2. Client sends `channel:*`, `verify:*`, `tutor:*` frames → reply
//! 3. `channel:subscribe` starts pushing `channel:changed` frames
//! 4. Close → stop forwarding, cancel verification, run disconnect cleanup

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::channel::{Subscription, room_prefix, scoped, segments, unscoped};
use crate::frame::{Data, FRAME_CODE, FRAME_MESSAGE, FRAME_PATH, FRAME_VALUE, Frame, Status};
use crate::oracle::{ChatLine, TutorRequest};
use crate::verification::{self, VerifyContext, VerifyOutcome, Verifier, board_snapshot};

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions.
enum Outcome {
    /// Send done+data to sender.
    Reply(Data),
    /// Send empty done to sender.
    Done,
    /// The handler queued its own reply on the outbound channel.
    Deferred,
}

/// Per-socket state.
struct Connection {
    room: String,
    prefix: String,
    session: Uuid,
    client_tx: mpsc::Sender<Frame>,
    forwards: Vec<JoinHandle<()>>,
    /// Fires to cancel this socket's running verification.
    verification: Option<oneshot::Sender<()>>,
}

impl Connection {
    fn new(room: &str, client_tx: mpsc::Sender<Frame>) -> Self {
        Self {
            room: room.to_string(),
            prefix: room_prefix(room),
            session: Uuid::new_v4(),
            client_tx,
            forwards: Vec::new(),
            verification: None,
        }
    }

    fn verifying(&self) -> bool {
        self.verification.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Stop forwarding, cancel verification, and run disconnect cleanup.
    async fn close(mut self, state: &AppState) {
        for task in self.forwards.drain(..) {
            task.abort();
        }
        if let Some(cancel) = self.verification.take()
            && cancel.send(()).is_err()
        {
            debug!(session = %self.session, "ws: verification already finished");
        }
        state.channel.disconnect(self.session).await;
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, Path(room): Path<String>, ws: WebSocketUpgrade) -> Response {
    if !segments(&room).is_ok_and(|s| s.len() == 1) {
        return (StatusCode::BAD_REQUEST, "invalid room").into_response();
    }
    ws.on_upgrade(move |socket| run_ws(socket, state, room))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, room: String) {
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.outbound_depth.max(1));
    let mut conn = Connection::new(&room, client_tx);

    let welcome = Frame::request("session:connected", Data::new())
        .with_room(room.clone())
        .with_data("session", conn.session.to_string())
        .with_data("room", room.clone())
        .with_data("enemyGrowth", state.battle_rules.growth_enabled);
    if send_frame(&mut socket, &welcome).await.is_err() {
        conn.close(&state).await;
        return;
    }

    info!(session = %conn.session, %room, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_inbound_text(&state, &mut conn, text.as_str()).await;
                        if send_all(&mut socket, &replies).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    let session = conn.session;
    conn.close(&state).await;
    info!(%session, %room, "ws: client disconnected");
}

async fn send_all(socket: &mut WebSocket, frames: &[Frame]) -> Result<(), ()> {
    for frame in frames {
        send_frame(socket, frame).await?;
    }
    Ok(())
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// Kept apart from the socket so tests can drive dispatch directly.
async fn process_inbound_text(state: &AppState, conn: &mut Connection, text: &str) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(session = %conn.session, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data(FRAME_MESSAGE, format!("invalid json: {e}"));
            return vec![err];
        }
    };
    req.room = Some(conn.room.clone());

    let prefix = req.prefix();
    debug!(session = %conn.session, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let result = match prefix {
        "channel" => handle_channel(state, conn, &req).await,
        "verify" => handle_verify(state, conn, &req).await,
        "tutor" => handle_tutor(state, conn, &req),
        _ => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Ok(Outcome::Deferred) => vec![],
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// CHANNEL HANDLERS
// =============================================================================

async fn handle_channel(state: &AppState, conn: &mut Connection, req: &Frame) -> Result<Outcome, Frame> {
    let rel = req.str_field(FRAME_PATH).unwrap_or("");
    let op = req.op();
    if rel.trim_matches('/').is_empty() && op != "subscribe" && op != "get" {
        return Err(req.error("path required"));
    }
    let path = scoped(&conn.prefix, rel);
    if let Err(e) = segments(&path) {
        return Err(req.error_from(&e));
    }
    let value = req.data.get(FRAME_VALUE).cloned().filter(|v| !v.is_null());
    let channel = &state.channel;

    match op {
        "get" => {
            let current = channel.get(&path).await.map_err(|e| req.error_from(&e))?;
            Ok(Outcome::Reply(value_data(current)))
        }
        "set" => {
            let value = value.unwrap_or(Value::Null);
            channel.set(&path, value).await.map_err(|e| req.error_from(&e))?;
            Ok(Outcome::Done)
        }
        "update" => {
            let Some(Value::Object(fields)) = value else {
                return Err(req.error("value must be an object"));
            };
            channel.update(&path, fields).await.map_err(|e| req.error_from(&e))?;
            Ok(Outcome::Done)
        }
        "remove" => {
            channel.remove(&path).await.map_err(|e| req.error_from(&e))?;
            Ok(Outcome::Done)
        }
        "set_if_absent" => {
            let Some(value) = value else {
                return Err(req.error("value required"));
            };
            let existing = channel.set_if_absent(&path, value).await.map_err(|e| req.error_from(&e))?;
            let mut data = value_data(existing.clone());
            data.insert("written".into(), Value::Bool(existing.is_none()));
            Ok(Outcome::Reply(data))
        }
        "on_disconnect" => {
            channel.remove_on_disconnect(conn.session, &path).await.map_err(|e| req.error_from(&e))?;
            Ok(Outcome::Done)
        }
        "cancel_on_disconnect" => {
            channel.cancel_on_disconnect(conn.session, &path).await.map_err(|e| req.error_from(&e))?;
            Ok(Outcome::Done)
        }
        "subscribe" => {
            let subscription = channel.subscribe(&path).await.map_err(|e| req.error_from(&e))?;
            let task = tokio::spawn(forward(subscription, conn.prefix.clone(), conn.room.clone(), conn.client_tx.clone()));
            conn.forwards.push(task);
            let mut data = Data::new();
            data.insert(FRAME_PATH.into(), Value::String(rel.trim_matches('/').to_string()));
            Ok(Outcome::Reply(data))
        }
        _ => Err(req.error(format!("unknown channel op: {op}"))),
    }
}

fn value_data(value: Option<Value>) -> Data {
    let mut data = Data::new();
    data.insert(FRAME_VALUE.into(), value.unwrap_or(Value::Null));
    data
}

/// Push subscription events to the socket as `channel:changed` until either side closes.
async fn forward(mut subscription: Subscription, prefix: String, room: String, client_tx: mpsc::Sender<Frame>) {
    while let Some(event) = subscription.recv().await {
        let path = unscoped(&prefix, &event.path).unwrap_or(&event.path).to_string();
        let frame = Frame::request("channel:changed", value_data(event.value))
            .with_room(room.clone())
            .with_data(FRAME_PATH, path);
        if client_tx.send(frame).await.is_err() {
            break;
        }
    }
}

// =============================================================================
// VERIFY HANDLERS
// =============================================================================

fn user_id(req: &Frame) -> Option<String> {
    req.from.clone().or_else(|| req.str_field("userId").map(str::to_string)).filter(|id| !id.is_empty())
}

fn history(req: &Frame) -> Vec<ChatLine> {
    match req.data.get("history") {
        Some(raw) => match serde_json::from_value(raw.clone()) {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, "ws: malformed history ignored");
                Vec::new()
            }
        },
        None => Vec::new(),
    }
}

async fn handle_verify(state: &AppState, conn: &mut Connection, req: &Frame) -> Result<Outcome, Frame> {
    let Some(user) = user_id(req) else {
        return Err(req.error("userId required"));
    };

    match req.op() {
        "start" => {
            let Some(problem) = req.str_field("problem") else {
                return Err(req.error("problem required"));
            };
            if conn.verifying() {
                return Err(req.error("verification already running"));
            }
            let ctx = VerifyContext {
                username: req.str_field("username").unwrap_or(&user).to_string(),
                user_id: user,
                problem: problem.to_string(),
                history: history(req),
            };
            let verifier = Verifier::new(state.channel.clone(), state.oracle.clone(), conn.prefix.clone(), conn.session);
            let (cancel_tx, cancel_rx) = oneshot::channel();
            conn.verification = Some(cancel_tx);
            tokio::spawn(run_verification(verifier, ctx, req.clone(), conn.client_tx.clone(), cancel_rx));
            Ok(Outcome::Deferred)
        }
        "ack" => {
            let removed = verification::acknowledge(state.channel.as_ref(), &conn.prefix, conn.session, &user)
                .await
                .map_err(|e| req.error_from(&e))?;
            let mut data = Data::new();
            data.insert("removed".into(), Value::Bool(removed));
            Ok(Outcome::Reply(data))
        }
        op => Err(req.error(format!("unknown verify op: {op}"))),
    }
}

/// Run one verification and reply with its outcome, unless cancelled first.
async fn run_verification(
    verifier: Verifier,
    ctx: VerifyContext,
    req: Frame,
    client_tx: mpsc::Sender<Frame>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let mut handle = verifier.spawn(ctx);
    let reply = tokio::select! {
        result = handle.join() => Some(match result {
            Ok(outcome) => req.done_with(outcome_data(&outcome)),
            Err(e) => req.error_from(&e),
        }),
        Ok(()) = cancel_rx => None,
    };

    match reply {
        Some(frame) => {
            if client_tx.send(frame).await.is_err() {
                debug!("ws: verify reply dropped, client gone");
            }
        }
        None => {
            if let Err(e) = handle.cancel().await {
                warn!(error = %e, "ws: verification release failed");
            }
        }
    }
}

fn outcome_data(outcome: &VerifyOutcome) -> Data {
    let mut data = Data::new();
    let (status, message) = match outcome {
        VerifyOutcome::Busy => ("busy", None),
        VerifyOutcome::Unsolved(message) => ("unsolved", Some(message.clone())),
        VerifyOutcome::Solved => ("solved", None),
    };
    data.insert("outcome".into(), Value::String(status.into()));
    if let Some(message) = message {
        data.insert(FRAME_MESSAGE.into(), Value::String(message));
    }
    data
}

// =============================================================================
// TUTOR HANDLERS
// =============================================================================

fn handle_tutor(state: &AppState, conn: &Connection, req: &Frame) -> Result<Outcome, Frame> {
    if req.op() != "ask" {
        return Err(req.error(format!("unknown tutor op: {}", req.op())));
    }
    let Some(problem) = req.str_field("problem") else {
        return Err(req.error("problem required"));
    };
    let members = req
        .data
        .get("members")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let request = TutorRequest {
        problem: problem.to_string(),
        history: history(req),
        image: None,
        members,
        member_change: req.str_field("memberChange").map(str::to_string),
    };

    let state = state.clone();
    let prefix = conn.prefix.clone();
    let client_tx = conn.client_tx.clone();
    let req = req.clone();
    tokio::spawn(async move {
        let request = TutorRequest { image: board_snapshot(state.channel.as_ref(), &prefix).await, ..request };
        let frame = match state.oracle.ask_tutor(request).await {
            Ok(reply) => req.done_with(Data::from([("content".to_string(), Value::String(reply.content))])),
            Err(e) => req.error_from(&e),
        };
        if client_tx.send(frame).await.is_err() {
            debug!("ws: tutor reply dropped, client gone");
        }
    });
    Ok(Outcome::Deferred)
}

// =============================================================================
// SEND
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame.data.get(FRAME_CODE).and_then(|v| v.as_str()).unwrap_or("-");
        let message = frame.data.get(FRAME_MESSAGE).and_then(|v| v.as_str()).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else if frame.syscall == "channel:changed" {
        debug!(id = %frame.id, path = frame.str_field(FRAME_PATH).unwrap_or("-"), "ws: push change");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|e| {
        warn!(error = %e, "ws: send failed");
    })
}
