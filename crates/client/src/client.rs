//! The reconstructor: consumes wire frames and drives the conversation.
//!
//! One background task parses incoming lines and dispatches them under
//! the state mutex; `seq` is assigned there, so it is strictly
//! monotonic in true arrival order across live and replayed frames.
//! Internal state is always updated; hidden modes only gate what is
//! emitted to the host.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use gb_domain::{now_ms, Error, HiddenMode, Result};
use gb_protocol::methods;
use gb_protocol::payload::{
    chunk_text, prompt_text, response_stop_reason, selected_outcome, PermissionRequest,
    PromptItem, PromptMeta, PromptParams, SessionUpdate, StructuredEvent, ToolCallPatch,
    ToolCallStart,
};
use gb_protocol::{Frame, ReplayEnvelope, ReplayQuery, RequestId};

use crate::conversation::{AssistantMessage, ChatMessage, Conversation, PartKind, UserMessage};
use crate::events::{ClientEvent, EventMeta, PendingApproval};
use crate::rectify;
use crate::title;
use crate::toolcall::{ToolCall, ToolStatus};
use crate::transport::Transport;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Options
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Bridge WebSocket URL.
    pub url: String,
    /// Working directory sent with `session/new`.
    pub cwd: String,
    /// Model hint sent with `session/new`.
    pub model: Option<String>,
    /// Context lines for computed unified diffs.
    pub diff_context: usize,
    /// Resume an existing downstream session instead of opening one.
    pub session_id: Option<String>,
    /// Replay window requested on connection.
    pub replay: ReplayQuery,
    /// Open a session automatically after connecting.
    pub handshake: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:4444/ws".into(),
            cwd: ".".into(),
            model: None,
            diff_context: 3,
            session_id: None,
            replay: ReplayQuery::default(),
            handshake: true,
        }
    }
}

impl ClientOptions {
    /// Set the diff context line count, clamping negatives to zero.
    pub fn with_diff_context(mut self, lines: i64) -> Self {
        self.diff_context = lines.max(0) as usize;
        self
    }

    fn full_url(&self) -> String {
        if self.replay.is_empty() {
            self.url.clone()
        } else {
            format!("{}?{}", self.url, self.replay.to_query_string())
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// State
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
struct ReplayCtx {
    timestamp_ms: i64,
    replay_id: String,
}

struct ClientState {
    conversation: Conversation,
    seq: u64,
    minted: u64,
    in_turn: bool,
    current_assistant: Option<usize>,
    session_id: Option<String>,
    turn_hidden: HiddenMode,
    pending_approval: Option<PendingApproval>,
    /// Set while a replay envelope is being processed: substitutes the
    /// time source so minted identifiers are reproducible, and threads
    /// the replay id into event metadata.
    replay: Option<ReplayCtx>,
    diff_context: usize,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl ClientState {
    fn now(&self) -> i64 {
        self.replay
            .as_ref()
            .map(|r| r.timestamp_ms)
            .unwrap_or_else(now_ms)
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn meta(&mut self) -> EventMeta {
        EventMeta {
            seq: self.next_seq(),
            timestamp_ms: self.now(),
            replay_id: self.replay.as_ref().map(|r| r.replay_id.clone()),
        }
    }

    fn mint_id(&mut self, prefix: &str) -> String {
        self.minted += 1;
        format!("{prefix}_{}_{}", self.now(), self.minted)
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    /// Index of the turn's assistant message, creating it on first use.
    fn ensure_assistant(&mut self) -> usize {
        if let Some(index) = self.current_assistant {
            return index;
        }
        let hidden = self.turn_hidden.suppresses_assistant();
        let timestamp = self.now();
        let seq = self.next_seq();
        let id = self.mint_id("msg");
        self.conversation
            .messages
            .push(ChatMessage::Assistant(AssistantMessage::new(
                id, hidden, timestamp, seq,
            )));
        let index = self.conversation.messages.len() - 1;
        self.current_assistant = Some(index);
        index
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct AgentClient {
    transport: Arc<Transport>,
    state: Arc<Mutex<ClientState>>,
    options: ClientOptions,
}

impl AgentClient {
    /// Connect in the background and return the client plus the event
    /// stream the host consumes.
    pub fn connect(options: ClientOptions) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (incoming_tx, mut incoming_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Transport::connect(options.full_url(), incoming_tx));

        let state = Arc::new(Mutex::new(ClientState {
            conversation: Conversation::default(),
            seq: 0,
            minted: 0,
            in_turn: false,
            current_assistant: None,
            session_id: options.session_id.clone(),
            turn_hidden: HiddenMode::None,
            pending_approval: None,
            replay: None,
            diff_context: options.diff_context,
            events: events_tx,
        }));

        let dispatch_state = state.clone();
        let dispatch_transport = transport.clone();
        tokio::spawn(async move {
            while let Some(text) = incoming_rx.recv().await {
                match Frame::parse(&text) {
                    Ok(frame) => handle_frame(&dispatch_state, &dispatch_transport, frame),
                    Err(e) => tracing::warn!(error = %e, "dropping unparseable frame"),
                }
            }
        });

        let client = Self {
            transport,
            state,
            options,
        };
        if client.options.handshake && client.options.session_id.is_none() {
            client.spawn_handshake();
        }
        (client, events_rx)
    }

    fn spawn_handshake(&self) {
        let transport = self.transport.clone();
        let state = self.state.clone();
        let cwd = self.options.cwd.clone();
        let model = self.options.model.clone();
        tokio::spawn(async move {
            let mut params = json!({ "cwd": cwd });
            if let Some(model) = model {
                params["model"] = json!(model);
            }
            match transport.request(methods::SESSION_NEW, params).await {
                Ok(result) => {
                    if let Some(sid) = result.get("sessionId").and_then(Value::as_str) {
                        state.lock().session_id = Some(sid.to_owned());
                        tracing::info!(session_id = %sid, "session established");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "session/new failed"),
            }
        });
    }

    /// Submit a prompt. The user message is recorded locally right away;
    /// the turn ends when the agent signals it.
    pub fn prompt(&self, text: &str) -> Result<()> {
        self.prompt_hidden(text, HiddenMode::None)
    }

    /// Submit a prompt with a hidden mode attached to its turn.
    pub fn prompt_hidden(&self, text: &str, hidden: HiddenMode) -> Result<()> {
        let session_id = {
            let mut st = self.state.lock();
            st.turn_hidden = hidden;
            st.in_turn = true;
            st.current_assistant = None;
            let meta = st.meta();
            let id = st.mint_id("user");
            let message = UserMessage {
                id,
                text: text.to_owned(),
                hidden: hidden.suppresses_user(),
                timestamp_ms: meta.timestamp_ms,
                seq: meta.seq,
            };
            st.conversation
                .messages
                .push(ChatMessage::User(message.clone()));
            if !hidden.suppresses_user() {
                st.emit(ClientEvent::UserMessage { message, meta });
            }
            st.session_id.clone()
        };

        let mut item = PromptItem::text(text);
        if hidden != HiddenMode::None {
            item.meta = Some(PromptMeta {
                hidden: Some(hidden),
            });
        }
        let prompt = PromptParams {
            session_id,
            prompt: vec![item],
        };
        let params = serde_json::to_value(&prompt).unwrap_or_else(|_| json!({}));

        if self.transport.is_disposed() {
            return Err(Error::Closed);
        }
        let transport = self.transport.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            match transport.request(methods::SESSION_PROMPT, params).await {
                Ok(result) => finish_turn(&state, response_stop_reason(&result)),
                Err(e) => {
                    tracing::warn!(error = %e, "prompt request failed");
                    finish_turn(&state, None);
                }
            }
        });
        Ok(())
    }

    /// Cancel the current turn. Optimistic: the local turn state ends
    /// immediately with reason `canceled`, without waiting for the agent.
    pub fn cancel(&self) -> Result<()> {
        let session_id = self.state.lock().session_id.clone();
        let mut params = json!({});
        if let Some(sid) = session_id {
            params["sessionId"] = json!(sid);
        }
        self.transport.notify(methods::SESSION_CANCEL, params)?;
        finish_turn(&self.state, Some("canceled".into()));
        Ok(())
    }

    /// Answer the pending approval with the chosen option.
    pub fn resolve_permission(&self, option_id: &str) -> Result<()> {
        let (approval, session_id) = {
            let mut st = self.state.lock();
            let approval = st
                .pending_approval
                .take()
                .ok_or_else(|| Error::Other("no pending approval".into()))?;
            (approval, st.session_id.clone())
        };
        respond_permission(
            &self.transport,
            approval.request_id,
            option_id,
            session_id.as_deref(),
        )
    }

    /// Snapshot of the rebuilt conversation.
    pub fn conversation(&self) -> Conversation {
        self.state.lock().conversation.clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.lock().session_id.clone()
    }

    pub fn pending_approval(&self) -> Option<PendingApproval> {
        self.state.lock().pending_approval.clone()
    }

    pub fn in_turn(&self) -> bool {
        self.state.lock().in_turn
    }

    /// Close the transport; pending requests reject with a closed error.
    pub fn dispose(&self) {
        self.transport.dispose();
    }

    #[cfg(test)]
    fn inject(&self, frame: Frame) {
        handle_frame(&self.state, &self.transport, frame);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Frame dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn handle_frame(state: &Arc<Mutex<ClientState>>, transport: &Arc<Transport>, frame: Frame) {
    match frame {
        Frame::Notification { method, params } => {
            let params = params.unwrap_or(Value::Null);
            match method.as_str() {
                methods::SESSION_UPDATE => handle_update(state, &params),
                methods::AUTH_URL => handle_auth_url(state, &params),
                methods::BRIDGE_STRUCTURED_EVENT => handle_structured(state, &params),
                methods::BRIDGE_REPLAY => handle_replay(state, transport, params),
                methods::SESSION_PROMPT => synth_user_message(state, Some(&params)),
                other => tracing::debug!(method = other, "ignoring notification"),
            }
        }
        Frame::Request { id, method, params } => {
            if method == methods::SESSION_REQUEST_PERMISSION {
                handle_permission(state, transport, id, params.unwrap_or_else(|| json!({})));
            } else {
                tracing::debug!(method = %method, "ignoring request");
            }
        }
        // Responses to our requests never reach this point; a response
        // seen here belongs to another client and is dropped.
        Frame::Response { .. } => {}
    }
}

fn handle_update(state: &Arc<Mutex<ClientState>>, params: &Value) {
    let Some(update) = SessionUpdate::from_params(params) else {
        tracing::debug!("unrecognized session update, ignoring");
        return;
    };
    match update {
        SessionUpdate::AgentMessageChunk { content } => {
            apply_chunk(state, PartKind::Text, &content)
        }
        SessionUpdate::AgentThoughtChunk { content } => {
            apply_chunk(state, PartKind::Thought, &content)
        }
        SessionUpdate::ToolCall(start) => apply_tool_call(state, start),
        SessionUpdate::ToolCallUpdate(patch) => apply_tool_patch(state, patch),
        SessionUpdate::EndOfTurn => finish_turn(state, None),
    }
}

fn apply_chunk(state: &Arc<Mutex<ClientState>>, kind: PartKind, content: &Value) {
    let Some(chunk) = chunk_text(content) else {
        return;
    };

    let mut st = state.lock();
    let suppress = st.turn_hidden.suppresses_assistant();
    let index = st.ensure_assistant();
    let meta = st.meta();

    let st = &mut *st;
    let ChatMessage::Assistant(msg) = &mut st.conversation.messages[index] else {
        return;
    };

    // "Current" part: the last one, only when it is of the same kind.
    let open = msg
        .content
        .last()
        .map(|part| part.kind_matches(kind))
        .unwrap_or(false);
    if !open {
        msg.open_part(kind);
    }
    let Some(part) = msg.current_part_mut(kind) else {
        return;
    };

    // Rectification is scoped to the current part, not the flat
    // accumulator.
    let delta = rectify::new_segment(part, &chunk);
    part.push_str(&delta);
    let full = match kind {
        PartKind::Text => {
            msg.text.push_str(&delta);
            msg.text.clone()
        }
        PartKind::Thought => {
            msg.thought.push_str(&delta);
            msg.thought.clone()
        }
    };
    msg.seq = meta.seq;
    let message_id = msg.id.clone();

    if !suppress && !delta.is_empty() {
        let _ = st.events.send(ClientEvent::AssistantDelta {
            message_id,
            kind,
            delta,
            full,
            meta,
        });
    }
}

fn apply_tool_call(state: &Arc<Mutex<ClientState>>, start: ToolCallStart) {
    let mut st = state.lock();

    // A repeated id mutates the existing call instead of violating
    // per-message id uniqueness.
    let exists = st
        .current_assistant
        .and_then(|index| match &mut st.conversation.messages[index] {
            ChatMessage::Assistant(msg) => msg.tool_call_mut(&start.id).map(|_| ()),
            _ => None,
        })
        .is_some();
    if exists {
        drop(st);
        apply_tool_patch(
            state,
            ToolCallPatch {
                id: start.id,
                title: start.title,
                status: start.status,
                content: start.content,
            },
        );
        return;
    }

    let suppress = st.turn_hidden.suppresses_assistant();
    let diff_context = st.diff_context;
    let index = st.ensure_assistant();
    let meta = st.meta();

    let title_str = start.title.clone().unwrap_or_default();
    let parsed = title::parse_title(&title_str);
    let status = start
        .status
        .as_deref()
        .and_then(ToolStatus::parse)
        .unwrap_or(ToolStatus::Queued);
    let mut call = ToolCall {
        id: start.id,
        name: start
            .kind
            .unwrap_or_else(|| first_word(&parsed.input)),
        title: title_str,
        status,
        input: parsed.input,
        args: parsed.args,
        description: parsed.description,
        working_dir: parsed.working_dir,
        result: String::new(),
        diff: None,
        timestamp_ms: meta.timestamp_ms,
        seq: meta.seq,
    };
    if let Some(content) = &start.content {
        call.apply_content(content, diff_context);
    }

    let message_id = {
        let st = &mut *st;
        let ChatMessage::Assistant(msg) = &mut st.conversation.messages[index] else {
            return;
        };
        msg.push_tool_call(call.clone());
        msg.seq = meta.seq;
        msg.id.clone()
    };

    if !suppress {
        st.emit(ClientEvent::ToolCallUpdated {
            message_id: message_id.clone(),
            call: call.clone(),
            meta,
        });
        if call.status.is_terminal() {
            let meta = st.meta();
            st.emit(ClientEvent::ToolCompleted {
                message_id,
                call,
                meta,
            });
        }
    }
}

fn apply_tool_patch(state: &Arc<Mutex<ClientState>>, patch: ToolCallPatch) {
    let mut st = state.lock();
    let suppress = st.turn_hidden.suppresses_assistant();
    let diff_context = st.diff_context;
    let Some(index) = st.current_assistant else {
        tracing::debug!(id = %patch.id, "tool update without an assistant message");
        return;
    };
    let meta = st.meta();

    let (message_id, call) = {
        let st = &mut *st;
        let ChatMessage::Assistant(msg) = &mut st.conversation.messages[index] else {
            return;
        };
        let msg_id = msg.id.clone();
        let Some(call) = msg.tool_call_mut(&patch.id) else {
            tracing::debug!(id = %patch.id, "tool update for unknown call");
            return;
        };
        if let Some(status) = patch.status.as_deref().and_then(ToolStatus::parse) {
            call.status = status;
        }
        if let Some(title) = &patch.title {
            call.title = title.clone();
        }
        if let Some(content) = &patch.content {
            call.apply_content(content, diff_context);
        }
        call.seq = meta.seq;
        let call = call.clone();
        msg.seq = meta.seq;
        (msg_id, call)
    };

    if !suppress {
        st.emit(ClientEvent::ToolCallUpdated {
            message_id: message_id.clone(),
            call: call.clone(),
            meta,
        });
        if call.status.is_terminal() {
            let meta = st.meta();
            st.emit(ClientEvent::ToolCompleted {
                message_id,
                call,
                meta,
            });
        }
    }
}

/// End the turn: finalize the assistant message (final-text event fires
/// exactly once per message) and emit the turn-completed signal.
fn finish_turn(state: &Arc<Mutex<ClientState>>, reason: Option<String>) {
    let mut st = state.lock();
    if !st.in_turn && st.current_assistant.is_none() {
        return;
    }
    st.in_turn = false;
    let suppress = st.turn_hidden.suppresses_assistant();

    if let Some(index) = st.current_assistant.take() {
        let meta = st.meta();
        let st = &mut *st;
        if let ChatMessage::Assistant(msg) = &mut st.conversation.messages[index] {
            if msg.stop_reason.is_none() {
                msg.stop_reason = reason.clone();
            }
            msg.seq = meta.seq;
            if !suppress {
                let _ = st.events.send(ClientEvent::AssistantFinal {
                    message: msg.clone(),
                    meta,
                });
            }
        }
    }

    let meta = st.meta();
    st.emit(ClientEvent::TurnCompleted { reason, meta });
}

fn handle_auth_url(state: &Arc<Mutex<ClientState>>, params: &Value) {
    let Some(url) = params.get("url").and_then(Value::as_str) else {
        return;
    };
    let mut st = state.lock();
    let meta = st.meta();
    st.emit(ClientEvent::AuthUrl {
        url: url.to_owned(),
        meta,
    });
}

fn handle_structured(state: &Arc<Mutex<ClientState>>, params: &Value) {
    let event: StructuredEvent = match serde_json::from_value(params.clone()) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "malformed structured event");
            return;
        }
    };
    let mut st = state.lock();
    let suppress = st.turn_hidden.suppresses_assistant();
    let meta = st.meta();
    if !suppress {
        st.emit(ClientEvent::StructuredEvent { event, meta });
    }
}

fn handle_permission(
    state: &Arc<Mutex<ClientState>>,
    transport: &Arc<Transport>,
    id: RequestId,
    params: Value,
) {
    let request: PermissionRequest = serde_json::from_value(params).unwrap_or_default();
    let mut st = state.lock();
    let session_id = st.session_id.clone();

    if st.turn_hidden.suppresses_assistant() {
        // Hidden turn: pick the first deny/reject option and resolve
        // without surfacing anything.
        let choice = request
            .options
            .iter()
            .find(|o| o.is_denial())
            .or_else(|| request.options.first());
        match choice {
            Some(option) => {
                if let Err(e) =
                    respond_permission(transport, id, &option.option_id, session_id.as_deref())
                {
                    tracing::warn!(error = %e, "failed to auto-reject permission request");
                } else {
                    tracing::debug!(option = %option.option_id, "auto-rejected hidden-turn tool approval");
                }
            }
            None => tracing::warn!("hidden-turn permission request carries no options"),
        }
        return;
    }

    let meta = st.meta();
    let tool_call = tool_call_from_value(
        request.tool_call.as_ref(),
        meta.timestamp_ms,
        meta.seq,
        st.diff_context,
    );
    let approval = PendingApproval {
        request_id: id,
        tool_call,
        options: request.options,
    };
    st.pending_approval = Some(approval.clone());
    st.emit(ClientEvent::PermissionRequested { approval, meta });
}

fn respond_permission(
    transport: &Transport,
    request_id: RequestId,
    option_id: &str,
    session_id: Option<&str>,
) -> Result<()> {
    let mut result = selected_outcome(option_id);
    if let Some(sid) = session_id {
        result["sessionId"] = json!(sid);
    }
    transport.send_frame(&Frame::response_ok(request_id, result))?;

    // Redundant mirror notification; some agents only honor one of the
    // two signals.
    let mut params = selected_outcome(option_id);
    if let Some(sid) = session_id {
        params["sessionId"] = json!(sid);
    }
    transport.notify(methods::SESSION_PROVIDE_PERMISSION, params)
}

fn tool_call_from_value(
    value: Option<&Value>,
    timestamp_ms: i64,
    seq: u64,
    diff_context: usize,
) -> ToolCall {
    let value = value.cloned().unwrap_or_else(|| json!({}));
    let id = value
        .get("toolCallId")
        .or_else(|| value.get("id"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let title_str = value
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let parsed = title::parse_title(&title_str);
    let status = value
        .get("status")
        .and_then(Value::as_str)
        .and_then(ToolStatus::parse)
        .unwrap_or(ToolStatus::Queued);
    let mut call = ToolCall {
        id,
        name: value
            .get("kind")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| first_word(&parsed.input)),
        title: title_str,
        status,
        input: parsed.input,
        args: parsed.args,
        description: parsed.description,
        working_dir: parsed.working_dir,
        result: String::new(),
        diff: None,
        timestamp_ms,
        seq,
    };
    if let Some(content) = value.get("content") {
        call.apply_content(content, diff_context);
    }
    call
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Replay intake
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn handle_replay(state: &Arc<Mutex<ClientState>>, transport: &Arc<Transport>, params: Value) {
    let Some(envelope) = ReplayEnvelope::from_params(&params) else {
        tracing::warn!("malformed replay envelope");
        return;
    };
    let Some((frame, _turn, hidden, timestamp, replay_id)) = envelope.open() else {
        tracing::warn!("replay envelope holds no frame");
        return;
    };

    {
        let mut st = state.lock();
        st.replay = Some(ReplayCtx {
            timestamp_ms: timestamp,
            replay_id,
        });
        // Reconstitute the originating turn's hidden behavior.
        st.turn_hidden = hidden;
    }

    if frame.method() == Some(methods::SESSION_PROMPT) {
        synth_user_message(state, frame.params());
    } else {
        handle_frame(state, transport, frame);
    }

    state.lock().replay = None;
}

/// A prompt observed from history or from a peer becomes a locally
/// synthesized user message opening a new turn.
fn synth_user_message(state: &Arc<Mutex<ClientState>>, params: Option<&Value>) {
    let text = params.map(prompt_text).unwrap_or_default();
    let mut st = state.lock();
    st.in_turn = true;
    st.current_assistant = None;
    let hidden = st.turn_hidden;
    let meta = st.meta();
    let id = st.mint_id("user");
    let message = UserMessage {
        id,
        text,
        hidden: hidden.suppresses_user(),
        timestamp_ms: meta.timestamp_ms,
        seq: meta.seq,
    };
    st.conversation
        .messages
        .push(ChatMessage::User(message.clone()));
    if !hidden.suppresses_user() {
        st.emit(ClientEvent::UserMessage { message, meta });
    }
}

fn first_word(s: &str) -> String {
    s.split_whitespace().next().unwrap_or_default().to_owned()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
