//! Room session: one local user wired to one room.
//!
//! DESIGN
//! ======
//! `RoomSession` is the native host for `canvas::engine::EngineCore`. It
//! plays the role the browser shell plays for the wasm build:
//! - subscribes to `rooms/{room}` and routes every change into the engine,
//! - dispatches the engine's sync ops through a [`SyncWriter`],
//! - joins presence with a remove-on-disconnect registration,
//! - drives verification and tutoring through the oracle,
//! - after a battle it announced, waits out the result screen and clears
//!   the room, granting XP on victory.
//!
//! Channel events arrive at absolute paths. A room-root event (the initial
//! snapshot, or the whole room being removed) is fanned out to each
//! top-level child. Events below a record (a single field) are resolved by
//! re-reading the nearest record path.

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use canvas::battle::{FrameInput, clear_room_ops};
use canvas::camera::Point;
use canvas::clock::now_ms;
use canvas::engine::{Action, EngineCore};
use canvas::input::Button;
use canvas::presence::Member;
use canvas::sync::{self, RoomPath};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel::{ChannelError, ChannelEvent, RealtimeChannel, Subscription, room_prefix, scoped, unscoped};
use crate::oracle::{ChatLine, OracleError, TutorReply, TutorRequest, TutoringOracle};
use crate::profile::{ProfileStore, reward_victory};
use crate::sync_writer::{SyncWriter, apply};
use crate::verification::{self, VerificationHandle, VerifyContext, Verifier, VerifyError};

/// How long the victory/defeat banner stays up before the announcer clears the room.
pub const RESULT_DISPLAY: Duration = Duration::from_secs(3);

/// Author shown on tutor replies.
pub const TUTOR_NAME: &str = "Tutor";

const CHAT_ROOT: &str = "chat";

/// Top-level room children, in fan-out order.
const ROOTS: [RoomPath; 6] =
    [RoomPath::Presence, RoomPath::Whiteboard, RoomPath::Cursors, RoomPath::Verification, RoomPath::Battle, RoomPath::Chat];

/// Everything a session needs besides the engine.
#[derive(Clone)]
pub struct RoomDeps {
    pub channel: Arc<dyn RealtimeChannel>,
    pub oracle: Arc<dyn TutoringOracle>,
    pub profiles: Option<Arc<dyn ProfileStore>>,
    pub sync_queue_depth: usize,
    pub result_display: Duration,
}

impl RoomDeps {
    #[must_use]
    pub fn new(channel: Arc<dyn RealtimeChannel>, oracle: Arc<dyn TutoringOracle>) -> Self {
        Self {
            channel,
            oracle,
            profiles: None,
            sync_queue_depth: crate::config::DEFAULT_SYNC_QUEUE_DEPTH,
            result_display: RESULT_DISPLAY,
        }
    }

    #[must_use]
    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileStore>) -> Self {
        self.profiles = Some(profiles);
        self
    }
}

pub struct RoomSession {
    engine: EngineCore,
    deps: RoomDeps,
    prefix: String,
    session: Uuid,
    writer: SyncWriter,
    subscription: Subscription,
    /// Chat lines keyed by id; ids sort chronologically.
    chat: BTreeMap<String, ChatLine>,
    known_members: BTreeSet<String>,
    /// Latest join/leave note, handed to the next tutor request.
    member_change: Option<String>,
    verification: Option<VerificationHandle>,
    pending_clear: Option<JoinHandle<()>>,
    chat_seq: AtomicU64,
}

impl RoomSession {
    /// Subscribe to `room`, announce presence, and apply the current state.
    ///
    /// # Errors
    ///
    /// Returns the channel error if the subscription or presence writes fail.
    pub async fn join(room: &str, engine: EngineCore, deps: RoomDeps) -> Result<Self, ChannelError> {
        let prefix = room_prefix(room);
        let session = Uuid::new_v4();
        let subscription = deps.channel.subscribe(&prefix).await?;
        let writer = SyncWriter::spawn(deps.channel.clone(), prefix.clone(), session, deps.sync_queue_depth);

        let presence = scoped(&prefix, &RoomPath::PresenceMember(engine.whiteboard.user().id.clone()).to_string());
        deps.channel.remove_on_disconnect(session, &presence).await?;
        deps.channel.set(&presence, Value::Bool(true)).await?;

        let mut room = Self {
            engine,
            deps,
            prefix,
            session,
            writer,
            subscription,
            chat: BTreeMap::new(),
            known_members: BTreeSet::new(),
            member_change: None,
            verification: None,
            pending_clear: None,
            chat_seq: AtomicU64::new(0),
        };
        let join = room.engine.whiteboard.join_ops();
        room.dispatch(join).await;
        room.pump().await;
        info!(room = %room.prefix, user = %room.user_id(), session = %room.session, "room: joined");
        Ok(room)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn engine(&self) -> &EngineCore {
        &self.engine
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.engine.whiteboard.user().id
    }

    #[must_use]
    pub fn session(&self) -> Uuid {
        self.session
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Chat history, oldest first.
    #[must_use]
    pub fn chat(&self) -> Vec<ChatLine> {
        self.chat.values().cloned().collect()
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Apply every event already queued. Returns how many were applied.
    pub async fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.subscription.try_recv() {
            self.apply_event(event).await;
            applied += 1;
        }
        applied
    }

    /// Wait for the next event and apply it. `false` once the channel is gone.
    pub async fn next_event(&mut self) -> bool {
        match self.subscription.recv().await {
            Some(event) => {
                self.apply_event(event).await;
                true
            }
            None => false,
        }
    }

    async fn apply_event(&mut self, event: ChannelEvent) {
        let Some(rel) = unscoped(&self.prefix, &event.path).map(str::to_string) else {
            debug!(path = %event.path, "room: event outside room ignored");
            return;
        };

        if rel.is_empty() {
            self.apply_root(event.value).await;
            return;
        }
        if rel == CHAT_ROOT || rel.starts_with("chat/") {
            let line: Vec<&str> = rel.splitn(3, '/').collect();
            if line.len() < 3 {
                self.apply_chat(&rel, event.value);
                return;
            }
            let record = format!("{CHAT_ROOT}/{}", line[1]);
            match self.deps.channel.get(&scoped(&self.prefix, &record)).await {
                Ok(value) => self.apply_chat(&record, value),
                Err(e) => warn!(error = %e, path = %rel, "room: chat re-read failed"),
            }
            return;
        }
        if let Some(path) = RoomPath::parse(&rel) {
            self.apply_path(path, event.value).await;
            return;
        }
        // A single field changed; re-read the record it belongs to.
        let Some(path) = nearest_record(&rel) else {
            debug!(path = %rel, "room: unknown path ignored");
            return;
        };
        match self.deps.channel.get(&scoped(&self.prefix, &path.to_string())).await {
            Ok(value) => self.apply_path(path, value).await,
            Err(e) => warn!(error = %e, path = %rel, "room: record re-read failed"),
        }
    }

    async fn apply_root(&mut self, value: Option<Value>) {
        let mut children = match value {
            Some(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        for root in ROOTS {
            let child = children.remove(&root.to_string());
            if root == RoomPath::Chat {
                self.apply_chat(CHAT_ROOT, child);
            } else {
                self.apply_path(root, child).await;
            }
        }
    }

    async fn apply_path(&mut self, path: RoomPath, value: Option<Value>) {
        let presence = matches!(path, RoomPath::Presence | RoomPath::PresenceMember(_));
        let actions = self.engine.apply_remote(&path, value);
        if presence {
            self.refresh_members().await;
        }
        self.dispatch(actions).await;
    }

    fn apply_chat(&mut self, rel: &str, value: Option<Value>) {
        match rel.strip_prefix("chat/") {
            Some(id) => match sync::decode::<ChatLine>(value) {
                Some(line) => {
                    self.chat.insert(id.to_string(), line);
                }
                None => {
                    self.chat.remove(id);
                }
            },
            None => self.chat = sync::decode_children::<ChatLine>(value).into_iter().collect(),
        }
    }

    /// Load profiles for newcomers and note who joined or left.
    async fn refresh_members(&mut self) {
        let present: BTreeSet<String> = self.engine.present().iter().cloned().collect();
        let joined: Vec<String> = present.difference(&self.known_members).cloned().collect();
        let left: Vec<String> = self.known_members.difference(&present).cloned().collect();

        if let Some(store) = self.deps.profiles.clone() {
            for id in &joined {
                match store.get_profile(id).await {
                    Ok(Some(profile)) => self.engine.set_profile(Member {
                        id: profile.user_id,
                        username: profile.username,
                        avatar_url: profile.avatar_url,
                    }),
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, user = %id, "room: profile lookup failed"),
                }
            }
        }

        let members = self.engine.members();
        let name = |id: &String| members.iter().find(|m| &m.id == id).map_or_else(|| id.clone(), |m| m.username.clone());
        let me = self.user_id();
        let mut notes: Vec<String> =
            joined.iter().filter(|id| id.as_str() != me).map(|id| format!("{} joined the room.", name(id))).collect();
        notes.extend(left.iter().map(|id| format!("{id} left the room.")));
        if !notes.is_empty() {
            self.member_change = Some(notes.join(" "));
        }
        self.known_members = present;
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Carry out engine actions. Rendering and pointer capture have no
    /// meaning without a canvas and are skipped.
    pub async fn dispatch(&mut self, actions: Vec<Action>) {
        let mut queue = std::collections::VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Sync(op) => self.writer.dispatch(op),
                Action::SyncRejected(e) => warn!(error = %e, "room: sync op rejected"),
                Action::StartBattle(strokes) => {
                    if !self.engine.in_battle() {
                        queue.extend(self.engine.start_battle(&strokes));
                    }
                }
                Action::BattleStarted => {
                    info!(room = %self.prefix, members = self.engine.present().len(), "room: battle started");
                }
                Action::BattleEnded { won, announcer } => {
                    info!(room = %self.prefix, won, announcer, "room: battle ended");
                    if announcer {
                        if won {
                            self.reward_members().await;
                        }
                        self.schedule_clear();
                    }
                }
                Action::ReturnToWhiteboard => info!(room = %self.prefix, "room: back to whiteboard"),
                Action::RenderNeeded | Action::RenderNow | Action::CapturePointer | Action::ReleasePointer => {}
            }
        }
    }

    async fn reward_members(&self) {
        let Some(store) = &self.deps.profiles else {
            return;
        };
        for id in self.engine.present() {
            if let Err(e) = reward_victory(store.as_ref(), id).await {
                warn!(error = %e, user = %id, "room: victory reward failed");
            }
        }
    }

    /// Clear the room once the result banner has been shown.
    fn schedule_clear(&mut self) {
        if self.pending_clear.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let channel = self.deps.channel.clone();
        let prefix = self.prefix.clone();
        let session = self.session;
        let hold = self.deps.result_display;
        self.pending_clear = Some(tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            for op in clear_room_ops() {
                let path = op.path().to_string();
                if let Err(e) = apply(channel.as_ref(), &prefix, session, op).await {
                    warn!(error = %e, path = %path, "room: clear failed");
                }
            }
            info!(room = %prefix, "room: cleared after battle");
        }));
    }

    /// Wait until every dispatched sync op has been attempted.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    // --- Whiteboard input, for hosts without a DOM ---

    pub async fn pointer_down(&mut self, screen: Point, button: Button) {
        let actions = self.engine.whiteboard.on_pointer_down(screen, button);
        self.dispatch(actions).await;
    }

    pub async fn pointer_move(&mut self, screen: Point) {
        let actions = self.engine.whiteboard.on_pointer_move(screen, now_ms());
        self.dispatch(actions).await;
    }

    pub async fn pointer_up(&mut self, button: Button) {
        let actions = self.engine.whiteboard.on_pointer_up(button, now_ms());
        self.dispatch(actions).await;
    }

    /// Advance the battle one frame.
    pub async fn tick(&mut self, input: &FrameInput) {
        let actions = self.engine.tick(now_ms(), input);
        self.dispatch(actions).await;
    }

    /// Leave the battle early; every peer returns to the whiteboard.
    pub async fn exit_battle(&mut self) {
        let actions = self.engine.exit_battle();
        self.dispatch(actions).await;
    }

    // =========================================================================
    // CHAT, TUTOR, VERIFICATION
    // =========================================================================

    /// Post a chat line as the local user.
    ///
    /// # Errors
    ///
    /// Returns the channel error if the write fails.
    pub async fn say(&self, content: &str) -> Result<(), ChannelError> {
        let line = ChatLine {
            author: self.engine.whiteboard.user().username.clone(),
            content: content.to_string(),
            from_tutor: false,
        };
        self.post(line).await
    }

    async fn post(&self, line: ChatLine) -> Result<(), ChannelError> {
        let seq = self.chat_seq.fetch_add(1, Ordering::Relaxed);
        let id = format!("{:013}-{seq:06}-{}", now_ms(), self.user_id());
        let value = match sync::encode(&line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "room: chat encode failed");
                return Ok(());
            }
        };
        self.deps.channel.set(&scoped(&self.prefix, &format!("{CHAT_ROOT}/{id}")), value).await
    }

    /// Ask the tutor about `problem` with the current chat and board, and
    /// post the reply to the chat.
    ///
    /// # Errors
    ///
    /// Returns the oracle error; nothing is posted in that case.
    pub async fn ask_tutor(&mut self, problem: &str) -> Result<TutorReply, OracleError> {
        let image = match self.engine.whiteboard.snapshot() {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, "room: snapshot failed, asking without the board");
                None
            }
        };
        let request = TutorRequest {
            problem: problem.to_string(),
            history: self.chat(),
            image,
            members: self.engine.members().into_iter().map(|m| m.username).collect(),
            member_change: self.member_change.take(),
        };
        let reply = self.deps.oracle.ask_tutor(request).await?;
        let line = ChatLine { author: TUTOR_NAME.to_string(), content: reply.content.clone(), from_tutor: true };
        if let Err(e) = self.post(line).await {
            warn!(error = %e, "room: tutor reply not posted");
        }
        Ok(reply)
    }

    /// Start checking `problem` in the background. Ignored while a check
    /// started here is still running.
    pub fn verify(&mut self, problem: &str) -> bool {
        if self.verification.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("room: verification already running");
            return false;
        }
        let user = self.engine.whiteboard.user();
        let ctx = VerifyContext {
            user_id: user.id.clone(),
            username: user.username.clone(),
            problem: problem.to_string(),
            history: self.chat(),
        };
        let verifier = Verifier::new(self.deps.channel.clone(), self.deps.oracle.clone(), self.prefix.clone(), self.session);
        self.verification = Some(verifier.spawn(ctx));
        true
    }

    /// Wait for the check started by [`RoomSession::verify`].
    ///
    /// # Errors
    ///
    /// Returns the run's error. `Ok(None)` when nothing was started.
    pub async fn verification_outcome(&mut self) -> Result<Option<verification::VerifyOutcome>, VerifyError> {
        match self.verification.take() {
            Some(mut handle) => handle.join().await.map(Some),
            None => Ok(None),
        }
    }

    /// Dismiss our own unsolved verdict.
    ///
    /// # Errors
    ///
    /// Returns the channel error from the read or removal.
    pub async fn acknowledge(&self) -> Result<bool, ChannelError> {
        verification::acknowledge(self.deps.channel.as_ref(), &self.prefix, self.session, self.user_id()).await
    }

    // =========================================================================
    // LEAVE
    // =========================================================================

    /// Flush pending writes and run this session's disconnect cleanup.
    pub async fn leave(mut self) {
        if let Some(handle) = self.verification.take()
            && !handle.is_finished()
            && let Err(e) = handle.cancel().await
        {
            warn!(error = %e, "room: verification release failed");
        }
        if let Some(task) = self.pending_clear.take() {
            task.abort();
        }
        let Self { writer, deps, session, prefix, .. } = self;
        writer.shutdown().await;
        deps.channel.disconnect(session).await;
        info!(room = %prefix, %session, "room: left");
    }
}

/// Nearest ancestor of `rel` that names a whole record.
fn nearest_record(rel: &str) -> Option<RoomPath> {
    let mut segs: Vec<&str> = rel.split('/').collect();
    while segs.len() > 1 {
        segs.pop();
        if let Some(path) = RoomPath::parse(&segs.join("/")) {
            return Some(path);
        }
    }
    None
}
