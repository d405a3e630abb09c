//! Notification surface for the host application.
//!
//! Every event carries an [`EventMeta`] with a strictly monotonic `seq`
//! and the receive timestamp. Hosts interleaving chat messages with
//! side-channel events must sort by `seq`; timestamps are advisory
//! because they are fixed at object creation (and, for replayed frames,
//! taken from the envelope).

use gb_protocol::{PermissionOption, RequestId, StructuredEvent};

use crate::conversation::{AssistantMessage, PartKind, UserMessage};
use crate::toolcall::ToolCall;

/// Ordering metadata attached to every emitted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMeta {
    /// Strictly monotonic arrival order, authoritative for interleaving.
    pub seq: u64,
    /// Receive time, or the original timestamp for replayed frames.
    pub timestamp_ms: i64,
    /// Replay envelope id when this event came out of history.
    pub replay_id: Option<String>,
}

/// A tool approval waiting for the host's decision.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub request_id: RequestId,
    pub tool_call: ToolCall,
    pub options: Vec<PermissionOption>,
}

/// Everything the reconstructor surfaces to the host.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A user prompt was recorded (local send, peer echo, or replay).
    UserMessage { message: UserMessage, meta: EventMeta },
    /// New text or thought appended to the current part.
    AssistantDelta {
        message_id: String,
        kind: PartKind,
        delta: String,
        /// The flat accumulator after appending.
        full: String,
        meta: EventMeta,
    },
    /// The assistant message was finalized; fired exactly once per
    /// message, at end of turn.
    AssistantFinal {
        message: AssistantMessage,
        meta: EventMeta,
    },
    /// A tool call appeared or changed.
    ToolCallUpdated {
        message_id: String,
        call: ToolCall,
        meta: EventMeta,
    },
    /// A tool call reached a terminal status.
    ToolCompleted {
        message_id: String,
        call: ToolCall,
        meta: EventMeta,
    },
    /// The turn ended; `reason` is the stop reason when one was given,
    /// or `canceled` for a local cancellation.
    TurnCompleted {
        reason: Option<String>,
        meta: EventMeta,
    },
    /// The agent asks for tool approval.
    PermissionRequested {
        approval: PendingApproval,
        meta: EventMeta,
    },
    /// Side-channel event extracted from the assistant text stream.
    StructuredEvent {
        event: StructuredEvent,
        meta: EventMeta,
    },
    /// The agent published its OAuth URL.
    AuthUrl { url: String, meta: EventMeta },
}

impl ClientEvent {
    pub fn meta(&self) -> &EventMeta {
        match self {
            ClientEvent::UserMessage { meta, .. }
            | ClientEvent::AssistantDelta { meta, .. }
            | ClientEvent::AssistantFinal { meta, .. }
            | ClientEvent::ToolCallUpdated { meta, .. }
            | ClientEvent::ToolCompleted { meta, .. }
            | ClientEvent::TurnCompleted { meta, .. }
            | ClientEvent::PermissionRequested { meta, .. }
            | ClientEvent::StructuredEvent { meta, .. }
            | ClientEvent::AuthUrl { meta, .. } => meta,
        }
    }
}
