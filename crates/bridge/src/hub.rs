//! Session/turn multiplexer.
//!
//! Inbound: frames from any client are classified — auth-code
//! submissions pass the gate, prompts bump the turn counter and echo to
//! peers, everything else goes to the agent's stdin verbatim (or is
//! dropped while the auth gate is closed).
//!
//! Outbound: frames from the agent run through the tag transform where
//! applicable, stream-of-record frames land in the ring tagged with the
//! current turn and hidden mode, and everything fans out to every
//! connected client.

use serde_json::{json, Value};
use uuid::Uuid;

use gb_domain::now_ms;
use gb_protocol::methods;
use gb_protocol::payload::{
    self, message_chunk_params, prompt_hidden_mode, strip_prompt_meta, StructuredEvent,
};
use gb_protocol::{Frame, ReplayEnvelope, ReplayQuery};

use crate::checkpoint;
use crate::ring::EventRecord;
use crate::state::BridgeState;
use crate::tagparse::Part;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inbound (client → agent)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Handle one wire line from a connected client.
pub async fn on_client_frame(state: &BridgeState, client_id: Uuid, text: &str) {
    let frame = match Frame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(client = %client_id, error = %e, "dropping unparseable client frame");
            return;
        }
    };

    match frame.method() {
        Some(methods::SUBMIT_AUTH_CODE) => {
            submit_auth_code(state, &frame).await;
        }
        Some(methods::AUTHENTICATE) => {
            // Allowed through the gate untouched.
            forward_to_agent(state, &frame).await;
        }
        Some(methods::SESSION_PROMPT) => {
            let gated = state.with_shared(|shared| shared.auth_url.is_some());
            if gated {
                tracing::warn!(client = %client_id, "dropping prompt while auth is pending");
                return;
            }
            handle_prompt(state, client_id, frame).await;
        }
        _ => {
            let gated = state.with_shared(|shared| shared.auth_url.is_some());
            if gated {
                tracing::warn!(
                    client = %client_id,
                    method = frame.method().unwrap_or("<response>"),
                    "dropping frame while auth is pending"
                );
                return;
            }
            forward_to_agent(state, &frame).await;
        }
    }
}

async fn submit_auth_code(state: &BridgeState, frame: &Frame) {
    let code = frame
        .params()
        .and_then(|p| p.get("code"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_owned();
    if code.is_empty() {
        tracing::warn!("auth-code submission without a code");
        return;
    }

    let was_gated = state.with_shared(|shared| shared.auth_url.take().is_some());
    if !was_gated {
        tracing::warn!("auth-code submission while no auth is pending, ignoring");
        return;
    }

    // The agent reads the code as a raw line, not a JSON frame.
    if state.write_stdin(code).await {
        tracing::info!("auth code forwarded to agent, gate cleared");
    } else {
        tracing::warn!("agent is down, auth code lost");
    }
}

async fn handle_prompt(state: &BridgeState, client_id: Uuid, frame: Frame) {
    let mut params = frame.params().cloned().unwrap_or_else(|| json!({}));
    let hidden = prompt_hidden_mode(&params);
    strip_prompt_meta(&mut params);

    let stripped = match frame {
        Frame::Request { id, method, .. } => Frame::Request {
            id,
            method,
            params: Some(params),
        },
        Frame::Notification { method, .. } => Frame::Notification {
            method,
            params: Some(params),
        },
        response @ Frame::Response { .. } => response,
    };

    let timestamp = now_ms();
    let (turn, echo) = state.with_shared(|shared| {
        shared.turn += 1;
        shared.hidden.insert(shared.turn, hidden);
        shared.ring.push(EventRecord {
            timestamp_ms: timestamp,
            turn: shared.turn,
            hidden,
            frame: stripped.clone(),
        });
        shared.prune_hidden();
        (
            shared.turn,
            ReplayEnvelope::wrap(&stripped, timestamp, 0, shared.turn, hidden).to_wire(),
        )
    });

    tracing::debug!(turn, hidden = hidden.as_str(), "prompt accepted");

    // Real-time peer echo: every other client sees the prompt wrapped in
    // a replay envelope carrying the fresh turn id and hidden mode.
    state.clients.broadcast(&echo, Some(client_id));

    forward_to_agent(state, &stripped).await;
}

async fn forward_to_agent(state: &BridgeState, frame: &Frame) {
    if !state.write_stdin(frame.to_wire()).await {
        tracing::warn!(
            method = frame.method().unwrap_or("<response>"),
            "agent is down, dropping client frame"
        );
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outbound (agent → clients)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Handle one JSON-RPC frame from the agent's stdout.
pub async fn on_subprocess_frame(state: &BridgeState, frame: Frame) {
    // Emulated fs tools never leave the bridge.
    if let Frame::Request { id, method, params } = &frame {
        match method.as_str() {
            methods::FS_READ_TEXT_FILE => {
                let response =
                    crate::fstools::handle_read(&state.project_root, id.clone(), params.clone())
                        .await;
                state.write_stdin(response.to_wire()).await;
                return;
            }
            methods::FS_WRITE_TEXT_FILE => {
                let (response, written) =
                    crate::fstools::handle_write(&state.project_root, id.clone(), params.clone())
                        .await;
                if let Some(path) = written {
                    state.with_shared(|shared| {
                        shared.modified.insert(path);
                    });
                }
                state.write_stdin(response.to_wire()).await;
                return;
            }
            _ => {}
        }
    }

    // Track the downstream session id from session/new responses.
    if let Frame::Response {
        result: Some(result),
        ..
    } = &frame
    {
        if let Some(sid) = result.get("sessionId").and_then(Value::as_str) {
            state.with_shared(|shared| shared.session_id = Some(sid.to_owned()));
            tracing::info!(session_id = %sid, "agent session established");
        }
    }

    let stop = is_stop_frame(&frame);
    let mut out: Vec<Frame> = Vec::new();

    if let Some(text) = message_chunk_text(&frame) {
        match state.with_shared(|shared| {
            shared
                .transform
                .as_mut()
                .map(|parser| parser.push_chunk(&text))
        }) {
            Some(parts) => out.extend(frames_from_parts(&frame, parts)),
            None => out.push(frame),
        }
    } else {
        if stop {
            // Release any in-flight transform state ahead of the stop
            // frame so no text is stranded.
            let flushed = state
                .with_shared(|shared| shared.transform.as_mut().and_then(|parser| parser.flush()));
            if let Some(text) = flushed {
                let sid = state.with_shared(|shared| shared.session_id.clone());
                out.push(Frame::notification(
                    methods::SESSION_UPDATE,
                    message_chunk_params(sid.as_deref(), &text),
                ));
            }
        }
        out.push(frame);
    }

    let timestamp = now_ms();
    for frame in &out {
        record_and_broadcast(state, frame, timestamp);
    }

    if stop {
        finish_turn(state).await;
    }
}

/// Auth URL detected by the line framer: close the gate and announce.
pub async fn on_auth_url(state: &BridgeState, url: String) {
    state.with_shared(|shared| shared.auth_url = Some(url.clone()));
    tracing::info!(url = %url, "agent requires authentication");
    let frame = Frame::notification(methods::AUTH_URL, json!({ "url": url }));
    record_and_broadcast(state, &frame, now_ms());
}

/// Authentication failure spotted in the agent's output: surface it to
/// clients as a typed event. The caller kills the agent afterwards so
/// the restart path clears transient state.
pub fn broadcast_auth_failure(state: &BridgeState, line: &str) {
    let event = StructuredEvent {
        event_type: "auth_error".into(),
        payload: None,
        error: Some(line.to_owned()),
        raw: line.to_owned(),
    };
    let frame = Frame::notification(
        methods::BRIDGE_STRUCTURED_EVENT,
        serde_json::to_value(&event).unwrap_or(Value::Null),
    );
    record_and_broadcast(state, &frame, now_ms());
}

fn record_and_broadcast(state: &BridgeState, frame: &Frame, timestamp: i64) {
    if is_stream_of_record(frame) {
        state.with_shared(|shared| {
            let turn = shared.turn;
            let hidden = shared.current_hidden();
            shared.ring.push(EventRecord {
                timestamp_ms: timestamp,
                turn,
                hidden,
                frame: frame.clone(),
            });
            shared.prune_hidden();
        });
    }
    state.clients.broadcast(&frame.to_wire(), None);
}

async fn finish_turn(state: &BridgeState) {
    let (turn, modified) = state.with_shared(|shared| {
        (shared.turn, std::mem::take(&mut shared.modified))
    });
    if modified.is_empty() {
        return;
    }
    let Some(config) = state.config.checkpoint.clone() else {
        return;
    };
    let files: Vec<String> = modified
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    tokio::spawn(async move {
        checkpoint::fire(&config, turn, &files).await;
    });
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Frame classification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Frames worth replaying to a late joiner.
pub fn is_stream_of_record(frame: &Frame) -> bool {
    match frame {
        Frame::Notification { method, .. } => matches!(
            method.as_str(),
            methods::SESSION_UPDATE
                | methods::AUTH_URL
                | methods::BRIDGE_STRUCTURED_EVENT
                | methods::SESSION_PROMPT
        ),
        Frame::Request { method, .. } => matches!(
            method.as_str(),
            methods::SESSION_REQUEST_PERMISSION | methods::SESSION_PROMPT
        ),
        Frame::Response { .. } => false,
    }
}

/// End of the current turn: an `end_of_turn` session update, or a
/// response carrying a stop reason.
pub fn is_stop_frame(frame: &Frame) -> bool {
    match frame {
        Frame::Notification { method, params, .. } if method == methods::SESSION_UPDATE => params
            .as_ref()
            .and_then(|p| p.get("update"))
            .and_then(|u| u.get("sessionUpdate"))
            .and_then(Value::as_str)
            == Some(methods::UPDATE_END_OF_TURN),
        Frame::Response {
            result: Some(result),
            ..
        } => payload::response_stop_reason(result).is_some(),
        _ => false,
    }
}

/// The text of an outgoing assistant message chunk, if this frame is one.
fn message_chunk_text(frame: &Frame) -> Option<String> {
    if frame.method() != Some(methods::SESSION_UPDATE) {
        return None;
    }
    let update = frame.params()?.get("update")?;
    if update.get("sessionUpdate").and_then(Value::as_str) != Some("agent_message_chunk") {
        return None;
    }
    payload::chunk_text(update.get("content")?)
}

/// Re-serialize transform parts into wire frames, preserving position.
/// The first text part reuses the original frame; later text parts
/// become fresh chunk frames; event parts become structured-event
/// notifications.
fn frames_from_parts(original: &Frame, parts: Vec<Part>) -> Vec<Frame> {
    let mut out = Vec::with_capacity(parts.len());
    let mut reused_original = false;
    for part in parts {
        match part {
            Part::Text(text) => {
                let frame = if !reused_original {
                    reused_original = true;
                    rewrite_chunk_text(original, &text)
                } else {
                    let sid = original
                        .params()
                        .and_then(|p| p.get("sessionId"))
                        .and_then(Value::as_str)
                        .map(str::to_owned);
                    Frame::notification(
                        methods::SESSION_UPDATE,
                        message_chunk_params(sid.as_deref(), &text),
                    )
                };
                out.push(frame);
            }
            Part::Event(event) => {
                out.push(Frame::notification(
                    methods::BRIDGE_STRUCTURED_EVENT,
                    serde_json::to_value(&event).unwrap_or(Value::Null),
                ));
            }
        }
    }
    out
}

fn rewrite_chunk_text(original: &Frame, text: &str) -> Frame {
    let mut params = original.params().cloned().unwrap_or_else(|| json!({}));
    params["update"]["content"] = json!({ "type": "text", "text": text });
    match original {
        Frame::Request { id, method, .. } => Frame::Request {
            id: id.clone(),
            method: method.clone(),
            params: Some(params),
        },
        _ => Frame::Notification {
            method: methods::SESSION_UPDATE.into(),
            params: Some(params),
        },
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Replay
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute the replay envelopes for a new connection, in stored order.
pub fn replay_lines(state: &BridgeState, query: &ReplayQuery) -> Vec<String> {
    let slice = state.with_shared(|shared| shared.ring.replay_slice(query));
    slice
        .iter()
        .enumerate()
        .map(|(index, record)| {
            ReplayEnvelope::wrap(
                &record.frame,
                record.timestamp_ms,
                index,
                record.turn,
                record.hidden,
            )
            .to_wire()
        })
        .collect()
}

/// The pending auth URL, re-announced after replay.
pub fn pending_auth_line(state: &BridgeState) -> Option<String> {
    state.with_shared(|shared| {
        shared
            .auth_url
            .as_ref()
            .map(|url| Frame::notification(methods::AUTH_URL, json!({ "url": url })).to_wire())
    })
}
