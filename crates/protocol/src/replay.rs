//! Replay envelopes and the connection-time replay query.
//!
//! A `bridge/replay` frame wraps a stored historical frame. The original
//! turn id and hidden mode ride inside `data` as non-protocol fields
//! (underscore-prefixed) so a reconnecting client can reconstitute
//! per-turn hidden behavior without a side channel.

use gb_domain::HiddenMode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::frame::Frame;
use crate::methods;

/// Key for the originating turn id inside enveloped data.
pub const META_TURN: &str = "_turn";
/// Key for the originating hidden mode inside enveloped data.
pub const META_HIDDEN: &str = "_hidden";

/// Params of a `bridge/replay` notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayEnvelope {
    /// Original emission timestamp, ms since epoch.
    pub timestamp: i64,
    /// The stored frame, annotated with [`META_TURN`] and [`META_HIDDEN`].
    pub data: Value,
    #[serde(rename = "replayId")]
    pub replay_id: String,
}

impl ReplayEnvelope {
    /// Wrap a stored frame for delivery. `index` disambiguates entries
    /// sharing a millisecond.
    pub fn wrap(
        frame: &Frame,
        timestamp: i64,
        index: usize,
        turn: i64,
        hidden: HiddenMode,
    ) -> Frame {
        let mut data = frame.to_value();
        annotate(&mut data, turn, hidden);
        let envelope = ReplayEnvelope {
            timestamp,
            data,
            replay_id: format!("{timestamp}-{index}"),
        };
        Frame::notification(
            methods::BRIDGE_REPLAY,
            serde_json::to_value(envelope).unwrap_or(Value::Null),
        )
    }

    /// Parse the params of a `bridge/replay` notification.
    pub fn from_params(params: &Value) -> Option<Self> {
        serde_json::from_value(params.clone()).ok()
    }

    /// Strip the metadata fields out of `data` and return them together
    /// with the inner frame.
    pub fn open(mut self) -> Option<(Frame, i64, HiddenMode, i64, String)> {
        let (turn, hidden) = extract_meta(&mut self.data);
        let frame = Frame::from_value(self.data).ok()?;
        Some((frame, turn, hidden, self.timestamp, self.replay_id))
    }
}

/// Add turn/hidden metadata to an enveloped frame object.
pub fn annotate(data: &mut Value, turn: i64, hidden: HiddenMode) {
    if let Some(obj) = data.as_object_mut() {
        obj.insert(META_TURN.into(), json!(turn));
        obj.insert(META_HIDDEN.into(), json!(hidden.as_str()));
    }
}

/// Remove and return turn/hidden metadata from an enveloped frame object.
pub fn extract_meta(data: &mut Value) -> (i64, HiddenMode) {
    let mut turn = 0;
    let mut hidden = HiddenMode::None;
    if let Some(obj) = data.as_object_mut() {
        if let Some(t) = obj.remove(META_TURN).and_then(|v| v.as_i64()) {
            turn = t;
        }
        if let Some(h) = obj.remove(META_HIDDEN) {
            if let Some(s) = h.as_str() {
                hidden = HiddenMode::parse(s);
            }
        }
    }
    (turn, hidden)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Replay query
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connection-time replay window. `limit` counts distinct turns, not
/// frames; `since`/`before` are exclusive millisecond bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<i64>,
}

impl ReplayQuery {
    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.since.is_none() && self.before.is_none()
    }

    /// Render as URL query parameters (no leading `?`).
    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::new();
        if let Some(l) = self.limit {
            parts.push(format!("limit={l}"));
        }
        if let Some(s) = self.since {
            parts.push(format!("since={s}"));
        }
        if let Some(b) = self.before {
            parts.push(format!("before={b}"));
        }
        parts.join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_and_open_roundtrip() {
        let inner = Frame::notification("session/update", json!({"update": {"sessionUpdate": "end_of_turn"}}));
        let envelope = ReplayEnvelope::wrap(&inner, 1_700_000_000_123, 4, 7, HiddenMode::User);

        let params = envelope.params().unwrap();
        let parsed = ReplayEnvelope::from_params(params).unwrap();
        assert_eq!(parsed.replay_id, "1700000000123-4");
        assert_eq!(parsed.timestamp, 1_700_000_000_123);
        // Metadata rides inside data.
        assert_eq!(parsed.data[META_TURN], 7);
        assert_eq!(parsed.data[META_HIDDEN], "user");

        let (frame, turn, hidden, ts, replay_id) = parsed.open().unwrap();
        assert_eq!(frame, inner);
        assert_eq!(turn, 7);
        assert_eq!(hidden, HiddenMode::User);
        assert_eq!(ts, 1_700_000_000_123);
        assert_eq!(replay_id, "1700000000123-4");
    }

    #[test]
    fn open_strips_meta_from_inner_frame() {
        let inner = Frame::notification("session/prompt", json!({"prompt": []}));
        let envelope = ReplayEnvelope::wrap(&inner, 10, 0, 1, HiddenMode::Turn);
        let parsed = ReplayEnvelope::from_params(envelope.params().unwrap()).unwrap();
        let (frame, ..) = parsed.open().unwrap();
        let value = frame.to_value();
        assert!(value.get(META_TURN).is_none());
        assert!(value.get(META_HIDDEN).is_none());
    }

    #[test]
    fn extract_meta_defaults() {
        let mut data = json!({"jsonrpc": "2.0", "method": "m"});
        let (turn, hidden) = extract_meta(&mut data);
        assert_eq!(turn, 0);
        assert_eq!(hidden, HiddenMode::None);
    }

    #[test]
    fn query_string_rendering() {
        let query = ReplayQuery {
            limit: Some(3),
            since: Some(100),
            before: None,
        };
        assert_eq!(query.to_query_string(), "limit=3&since=100");
        assert!(ReplayQuery::default().is_empty());
        assert_eq!(ReplayQuery::default().to_query_string(), "");
    }
}
