//! Ordered in-memory conversation model.
//!
//! The `content` sequence is canonical: text, thought, and tool-call
//! parts appear in the order they streamed. The flat `text`/`thought`
//! accumulators are maintained alongside for consumers that predate the
//! ordered model. Tool calls are owned by `content`; lookups go through
//! an index scan, never a second owner.

use crate::toolcall::ToolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Text,
    Thought,
}

/// One segment of an assistant message, in stream order.
#[derive(Debug, Clone)]
pub enum Part {
    Text(String),
    Thought(String),
    ToolCall(ToolCall),
}

impl Part {
    pub fn kind_matches(&self, kind: PartKind) -> bool {
        matches!(
            (self, kind),
            (Part::Text(_), PartKind::Text) | (Part::Thought(_), PartKind::Thought)
        )
    }
}

#[derive(Debug, Clone)]
pub struct AssistantMessage {
    pub id: String,
    pub content: Vec<Part>,
    /// Flat text accumulator, kept for backward-compatible consumers.
    pub text: String,
    /// Flat thought accumulator, kept for backward-compatible consumers.
    pub thought: String,
    pub stop_reason: Option<String>,
    pub hidden: bool,
    pub timestamp_ms: i64,
    /// Arrival order; bumped on every update to this message.
    pub seq: u64,
}

impl AssistantMessage {
    pub fn new(id: String, hidden: bool, timestamp_ms: i64, seq: u64) -> Self {
        Self {
            id,
            content: Vec::new(),
            text: String::new(),
            thought: String::new(),
            stop_reason: None,
            hidden,
            timestamp_ms,
            seq,
        }
    }

    /// The open part of `kind`: the last part, only when it is of the
    /// same kind. A tool call (or a part of the other kind) in last
    /// position means the next chunk opens a fresh part.
    pub fn current_part_mut(&mut self, kind: PartKind) -> Option<&mut String> {
        match (self.content.last_mut(), kind) {
            (Some(Part::Text(s)), PartKind::Text) => Some(s),
            (Some(Part::Thought(s)), PartKind::Thought) => Some(s),
            _ => None,
        }
    }

    /// Open a new empty part of `kind` and return it.
    pub fn open_part(&mut self, kind: PartKind) -> &mut String {
        let part = match kind {
            PartKind::Text => Part::Text(String::new()),
            PartKind::Thought => Part::Thought(String::new()),
        };
        self.content.push(part);
        match self.content.last_mut() {
            Some(Part::Text(s)) | Some(Part::Thought(s)) => s,
            _ => unreachable!("just pushed a text/thought part"),
        }
    }

    pub fn push_tool_call(&mut self, call: ToolCall) {
        self.content.push(Part::ToolCall(call));
    }

    /// Tool call by id. Ids are unique within a message; first match wins.
    pub fn tool_call_mut(&mut self, id: &str) -> Option<&mut ToolCall> {
        self.content.iter_mut().find_map(|part| match part {
            Part::ToolCall(call) if call.id == id => Some(call),
            _ => None,
        })
    }

    /// All tool calls, in stream order.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.content
            .iter()
            .filter_map(|part| match part {
                Part::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct UserMessage {
    pub id: String,
    pub text: String,
    pub hidden: bool,
    pub timestamp_ms: i64,
    pub seq: u64,
}

#[derive(Debug, Clone)]
pub enum ChatMessage {
    User(UserMessage),
    Assistant(AssistantMessage),
}

impl ChatMessage {
    pub fn seq(&self) -> u64 {
        match self {
            ChatMessage::User(m) => m.seq,
            ChatMessage::Assistant(m) => m.seq,
        }
    }
}

/// The rebuilt conversation, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolcall::ToolStatus;

    fn tool(id: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: "shell".into(),
            title: "ls".into(),
            status: ToolStatus::Running,
            input: "ls".into(),
            args: None,
            description: None,
            working_dir: None,
            result: String::new(),
            diff: None,
            timestamp_ms: 0,
            seq: 0,
        }
    }

    #[test]
    fn current_part_requires_matching_kind() {
        let mut msg = AssistantMessage::new("m1".into(), false, 0, 0);
        assert!(msg.current_part_mut(PartKind::Text).is_none());

        msg.open_part(PartKind::Text).push_str("hello");
        assert!(msg.current_part_mut(PartKind::Text).is_some());
        assert!(msg.current_part_mut(PartKind::Thought).is_none());
    }

    #[test]
    fn tool_call_closes_open_parts() {
        let mut msg = AssistantMessage::new("m1".into(), false, 0, 0);
        msg.open_part(PartKind::Text).push_str("before");
        msg.push_tool_call(tool("t1"));
        // The text part is no longer current; a new chunk opens a new part.
        assert!(msg.current_part_mut(PartKind::Text).is_none());
        msg.open_part(PartKind::Text).push_str("after");
        assert_eq!(msg.content.len(), 3);
    }

    #[test]
    fn tool_call_lookup_by_id() {
        let mut msg = AssistantMessage::new("m1".into(), false, 0, 0);
        msg.push_tool_call(tool("a"));
        msg.open_part(PartKind::Thought).push_str("hm");
        msg.push_tool_call(tool("b"));

        assert!(msg.tool_call_mut("a").is_some());
        assert!(msg.tool_call_mut("b").is_some());
        assert!(msg.tool_call_mut("c").is_none());
        assert_eq!(msg.tool_calls().len(), 2);
        assert_eq!(msg.tool_calls()[1].id, "b");
    }

    #[test]
    fn conversation_ordering_by_seq() {
        let mut conversation = Conversation::default();
        conversation.messages.push(ChatMessage::User(UserMessage {
            id: "u1".into(),
            text: "hi".into(),
            hidden: false,
            timestamp_ms: 1,
            seq: 1,
        }));
        conversation
            .messages
            .push(ChatMessage::Assistant(AssistantMessage::new(
                "a1".into(),
                false,
                2,
                2,
            )));
        assert_eq!(conversation.len(), 2);
        assert!(conversation.messages[0].seq() < conversation.messages[1].seq());
    }
}
