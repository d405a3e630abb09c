//! Wire protocol for the gembridge: JSON-RPC 2.0 frames, the method
//! names that cross the bridge, and the typed payloads both sides use.
//!
//! Every transport datagram carries exactly one JSON-RPC 2.0 object.
//! Frames with unknown methods are forwarded verbatim — params stay
//! `serde_json::Value` so nothing is lost in transit.

pub mod frame;
pub mod methods;
pub mod payload;
pub mod replay;

pub use frame::{codes, Frame, RequestId, RpcError};
pub use payload::{
    chunk_text, PermissionOption, PermissionRequest, PromptItem, PromptMeta, PromptParams,
    SessionUpdate, StructuredEvent, ToolCallPatch, ToolCallStart,
};
pub use replay::{ReplayEnvelope, ReplayQuery, META_HIDDEN, META_TURN};
