//! Client-side reconstructor for the gembridge wire protocol.
//!
//! Consumes frames over a WebSocket, rebuilds an ordered in-memory
//! conversation (text, thoughts, and tool calls interleaved the way
//! they streamed), rectifies overlapping chunks, tracks tool-call
//! lifecycles and pending approvals, and surfaces everything to the
//! host through a notification channel with strict arrival ordering.

pub mod client;
pub mod conversation;
pub mod events;
pub mod history;
pub mod rectify;
pub mod title;
pub mod toolcall;
pub mod transport;

pub use client::{AgentClient, ClientOptions};
pub use conversation::{AssistantMessage, ChatMessage, Conversation, Part, PartKind, UserMessage};
pub use events::{ClientEvent, EventMeta, PendingApproval};
pub use history::fetch_history;
pub use toolcall::{DiffInfo, ToolCall, ToolStatus};
