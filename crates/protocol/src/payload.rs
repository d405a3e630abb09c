//! Typed payloads for the methods the bridge and client understand.
//!
//! Everything here tolerates extra fields — the downstream agent's
//! protocol grows over time and unknown additions must pass through.

use gb_domain::HiddenMode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prompt
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptParams {
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub prompt: Vec<PromptItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptItem {
    #[serde(rename = "type", default = "d_text")]
    pub item_type: String,
    #[serde(default)]
    pub text: String,
    /// Bridge-level hints, stripped before the frame reaches the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PromptMeta>,
}

impl PromptItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            item_type: d_text(),
            text: text.into(),
            meta: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<HiddenMode>,
}

fn d_text() -> String {
    "text".into()
}

/// Read the hidden-mode hint from the first prompt item's metadata.
pub fn prompt_hidden_mode(params: &Value) -> HiddenMode {
    params
        .get("prompt")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|item| item.get("meta"))
        .and_then(|meta| meta.get("hidden"))
        .and_then(Value::as_str)
        .map(HiddenMode::parse)
        .unwrap_or_default()
}

/// Remove bridge-level metadata from every prompt item in place.
pub fn strip_prompt_meta(params: &mut Value) {
    if let Some(items) = params.get_mut("prompt").and_then(Value::as_array_mut) {
        for item in items {
            if let Some(obj) = item.as_object_mut() {
                obj.remove("meta");
            }
        }
    }
}

/// Concatenated text of all prompt items.
pub fn prompt_text(params: &Value) -> String {
    params
        .get("prompt")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session updates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The streaming update kinds inside `session/update` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "sessionUpdate", rename_all = "snake_case")]
pub enum SessionUpdate {
    AgentMessageChunk {
        #[serde(default)]
        content: Value,
    },
    AgentThoughtChunk {
        #[serde(default)]
        content: Value,
    },
    ToolCall(ToolCallStart),
    ToolCallUpdate(ToolCallPatch),
    EndOfTurn,
}

impl SessionUpdate {
    /// Pull the typed update out of `session/update` params.
    pub fn from_params(params: &Value) -> Option<Self> {
        params
            .get("update")
            .and_then(|u| serde_json::from_value(u.clone()).ok())
    }

    /// The discriminator string as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionUpdate::AgentMessageChunk { .. } => "agent_message_chunk",
            SessionUpdate::AgentThoughtChunk { .. } => "agent_thought_chunk",
            SessionUpdate::ToolCall(_) => "tool_call",
            SessionUpdate::ToolCallUpdate(_) => "tool_call_update",
            SessionUpdate::EndOfTurn => "end_of_turn",
        }
    }
}

/// Build `session/update` params for an assistant text chunk.
pub fn message_chunk_params(session_id: Option<&str>, text: &str) -> Value {
    let mut params = json!({
        "update": {
            "sessionUpdate": "agent_message_chunk",
            "content": { "type": "text", "text": text },
        }
    });
    if let Some(sid) = session_id {
        params["sessionId"] = json!(sid);
    }
    params
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCallStart {
    #[serde(rename = "toolCallId", alias = "id")]
    pub id: String,
    pub title: Option<String>,
    pub kind: Option<String>,
    pub status: Option<String>,
    pub content: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCallPatch {
    #[serde(rename = "toolCallId", alias = "id")]
    pub id: String,
    pub title: Option<String>,
    pub status: Option<String>,
    pub content: Option<Value>,
}

/// Extract chunk text from the `content` field of a streaming update.
/// Accepts a bare string, a `{text}` container, or an array of either.
pub fn chunk_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("text").and_then(Value::as_str).map(str::to_owned),
        Value::Array(items) => {
            let mut out = String::new();
            for item in items {
                if let Some(t) = chunk_text(item) {
                    out.push_str(&t);
                }
            }
            if out.is_empty() {
                None
            } else {
                Some(out)
            }
        }
        _ => None,
    }
}

/// The stop reason inside a prompt response's result, if any.
pub fn response_stop_reason(result: &Value) -> Option<String> {
    result
        .get("stopReason")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Permissions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PermissionRequest {
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(rename = "toolCall", skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<Value>,
    pub options: Vec<PermissionOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PermissionOption {
    #[serde(rename = "optionId", alias = "id")]
    pub option_id: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl PermissionOption {
    /// Options whose kind means "do not run the tool".
    pub fn is_denial(&self) -> bool {
        self.kind.starts_with("deny") || self.kind.starts_with("reject")
    }
}

/// The `{outcome:{outcome:"selected", optionId}}` result shape used both in
/// the response to `session/request_permission` and in the
/// `session/provide_permission` mirror notification.
pub fn selected_outcome(option_id: &str) -> Value {
    json!({ "outcome": { "outcome": "selected", "optionId": option_id } })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Structured events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A typed event extracted from a tagged region of the assistant text
/// stream. `payload` is set when the captured region parsed as JSON,
/// `error` when it did not; `raw` always preserves the captured text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub raw: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_mode_read_from_first_item() {
        let params = json!({
            "sessionId": "s1",
            "prompt": [
                { "type": "text", "text": "hi", "meta": { "hidden": "user" } },
                { "type": "text", "text": "more", "meta": { "hidden": "turn" } },
            ]
        });
        assert_eq!(prompt_hidden_mode(&params), HiddenMode::User);
    }

    #[test]
    fn hidden_mode_defaults_to_none() {
        let params = json!({ "prompt": [{ "type": "text", "text": "hi" }] });
        assert_eq!(prompt_hidden_mode(&params), HiddenMode::None);
        assert_eq!(prompt_hidden_mode(&json!({})), HiddenMode::None);
    }

    #[test]
    fn strip_meta_removes_all_items() {
        let mut params = json!({
            "prompt": [
                { "type": "text", "text": "a", "meta": { "hidden": "turn" } },
                { "type": "text", "text": "b" },
            ]
        });
        strip_prompt_meta(&mut params);
        assert!(params["prompt"][0].get("meta").is_none());
        assert_eq!(params["prompt"][0]["text"], "a");
        assert_eq!(params["prompt"][1]["text"], "b");
    }

    #[test]
    fn update_dispatch() {
        let params = json!({
            "sessionId": "s",
            "update": {
                "sessionUpdate": "agent_message_chunk",
                "content": { "type": "text", "text": "hello" },
            }
        });
        let update = SessionUpdate::from_params(&params).unwrap();
        match &update {
            SessionUpdate::AgentMessageChunk { content } => {
                assert_eq!(chunk_text(content).as_deref(), Some("hello"));
            }
            other => panic!("expected message chunk, got {other:?}"),
        }
        assert_eq!(update.kind(), "agent_message_chunk");
    }

    #[test]
    fn tool_call_accepts_both_id_spellings() {
        let a: ToolCallStart =
            serde_json::from_value(json!({ "sessionUpdate": "x", "toolCallId": "t1" })).unwrap();
        assert_eq!(a.id, "t1");
        let b: ToolCallStart = serde_json::from_value(json!({ "id": "t2" })).unwrap();
        assert_eq!(b.id, "t2");
    }

    #[test]
    fn end_of_turn_parses() {
        let params = json!({ "update": { "sessionUpdate": "end_of_turn" } });
        assert!(matches!(
            SessionUpdate::from_params(&params),
            Some(SessionUpdate::EndOfTurn)
        ));
    }

    #[test]
    fn unknown_update_kind_is_none() {
        let params = json!({ "update": { "sessionUpdate": "plan_delta" } });
        assert!(SessionUpdate::from_params(&params).is_none());
    }

    #[test]
    fn chunk_text_shapes() {
        assert_eq!(chunk_text(&json!("plain")).as_deref(), Some("plain"));
        assert_eq!(
            chunk_text(&json!({ "type": "text", "text": "boxed" })).as_deref(),
            Some("boxed")
        );
        assert_eq!(
            chunk_text(&json!([{ "text": "a" }, "b"])).as_deref(),
            Some("ab")
        );
        assert_eq!(chunk_text(&json!(42)), None);
    }

    #[test]
    fn denial_kinds() {
        let opt = |kind: &str| PermissionOption {
            option_id: "o".into(),
            kind: kind.into(),
            label: None,
        };
        assert!(opt("deny").is_denial());
        assert!(opt("deny_always").is_denial());
        assert!(opt("reject_once").is_denial());
        assert!(!opt("allow_once").is_denial());
        assert!(!opt("allow_always").is_denial());
    }

    #[test]
    fn selected_outcome_shape() {
        let outcome = selected_outcome("opt-1");
        assert_eq!(outcome["outcome"]["outcome"], "selected");
        assert_eq!(outcome["outcome"]["optionId"], "opt-1");
    }

    #[test]
    fn stop_reason_extraction() {
        assert_eq!(
            response_stop_reason(&json!({ "stopReason": "end_turn" })).as_deref(),
            Some("end_turn")
        );
        assert_eq!(response_stop_reason(&json!({})), None);
    }

    #[test]
    fn message_chunk_params_shape() {
        let params = message_chunk_params(Some("s9"), "tail");
        assert_eq!(params["sessionId"], "s9");
        assert_eq!(params["update"]["sessionUpdate"], "agent_message_chunk");
        assert_eq!(params["update"]["content"]["text"], "tail");
    }
}
