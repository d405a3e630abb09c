//! JSON-RPC 2.0 frame as a tagged sum.
//!
//! The wire shape is the flat JSON-RPC object; in memory we split it into
//! the three variants so handlers can match on structure instead of
//! sniffing optional fields.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Bridge-local error codes, plus the JSON-RPC standard ones we reuse.
pub mod codes {
    /// Invalid params — also used for a tool path escaping the project root.
    pub const INVALID_PARAMS: i64 = -32602;
    /// File-tool I/O failure.
    pub const FILE_IO: i64 = -32000;
    pub const PARSE_ERROR: i64 = -32700;
    pub const METHOD_NOT_FOUND: i64 = -32601;
}

/// Request identifier: string or integer per JSON-RPC 2.0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Num(i64),
    Str(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Num(n) => write!(f, "{n}"),
            RequestId::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Num(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::Str(s.to_owned())
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }

    pub fn file_io(message: impl Into<String>) -> Self {
        Self::new(codes::FILE_IO, message)
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// A single wire frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Has an `id` and a `method` — expects a response.
    Request {
        id: RequestId,
        method: String,
        params: Option<Value>,
    },
    /// Has a `method` but no `id` — fire-and-forget.
    Notification {
        method: String,
        params: Option<Value>,
    },
    /// Has an `id` and either `result` or `error`.
    Response {
        id: RequestId,
        result: Option<Value>,
        error: Option<RpcError>,
    },
}

impl Frame {
    pub fn request(id: impl Into<RequestId>, method: impl Into<String>, params: Value) -> Self {
        Frame::Request {
            id: id.into(),
            method: method.into(),
            params: Some(params),
        }
    }

    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Frame::Notification {
            method: method.into(),
            params: Some(params),
        }
    }

    pub fn response_ok(id: RequestId, result: Value) -> Self {
        Frame::Response {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn response_err(id: RequestId, error: RpcError) -> Self {
        Frame::Response {
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            Frame::Request { method, .. } | Frame::Notification { method, .. } => Some(method),
            Frame::Response { .. } => None,
        }
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Frame::Request { id, .. } | Frame::Response { id, .. } => Some(id),
            Frame::Notification { .. } => None,
        }
    }

    pub fn params(&self) -> Option<&Value> {
        match self {
            Frame::Request { params, .. } | Frame::Notification { params, .. } => params.as_ref(),
            Frame::Response { .. } => None,
        }
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Frame::Response { .. })
    }

    /// Parse a frame from its wire text.
    pub fn parse(s: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(s).map_err(|e| e.to_string())?;
        Self::from_value(value)
    }

    /// Classify a raw JSON object into a frame variant.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let Value::Object(mut map) = value else {
            return Err("frame is not a JSON object".into());
        };

        match map.get("jsonrpc").and_then(Value::as_str) {
            Some("2.0") => {}
            Some(other) => return Err(format!("unsupported jsonrpc version '{other}'")),
            None => return Err("missing jsonrpc field".into()),
        }

        let id = match map.remove("id") {
            Some(v) => Some(
                serde_json::from_value::<RequestId>(v)
                    .map_err(|_| "id must be a string or integer".to_string())?,
            ),
            None => None,
        };
        let method = match map.remove("method") {
            Some(Value::String(m)) => Some(m),
            Some(_) => return Err("method must be a string".into()),
            None => None,
        };
        let params = map.remove("params");

        match (method, id) {
            (Some(method), Some(id)) => Ok(Frame::Request { id, method, params }),
            (Some(method), None) => Ok(Frame::Notification { method, params }),
            (None, Some(id)) => {
                let error = match map.remove("error") {
                    Some(v) => Some(
                        serde_json::from_value::<RpcError>(v)
                            .map_err(|e| format!("malformed error object: {e}"))?,
                    ),
                    None => None,
                };
                let result = map.remove("result");
                Ok(Frame::Response { id, result, error })
            }
            (None, None) => Err("frame has neither method nor id".into()),
        }
    }

    /// Serialize back to the flat JSON-RPC object.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("jsonrpc".into(), json!("2.0"));
        match self {
            Frame::Request { id, method, params } => {
                map.insert("id".into(), serde_json::to_value(id).unwrap_or(Value::Null));
                map.insert("method".into(), json!(method));
                if let Some(p) = params {
                    map.insert("params".into(), p.clone());
                }
            }
            Frame::Notification { method, params } => {
                map.insert("method".into(), json!(method));
                if let Some(p) = params {
                    map.insert("params".into(), p.clone());
                }
            }
            Frame::Response { id, result, error } => {
                map.insert("id".into(), serde_json::to_value(id).unwrap_or(Value::Null));
                if let Some(e) = error {
                    map.insert("error".into(), serde_json::to_value(e).unwrap_or(Value::Null));
                } else {
                    // A success response always carries `result`, even when null.
                    map.insert("result".into(), result.clone().unwrap_or(Value::Null));
                }
            }
        }
        Value::Object(map)
    }

    /// Wire text, one line, no trailing newline.
    pub fn to_wire(&self) -> String {
        self.to_value().to_string()
    }
}

impl Serialize for Frame {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Frame {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Frame::from_value(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_request() {
        let frame =
            Frame::parse(r#"{"jsonrpc":"2.0","id":7,"method":"session/new","params":{"cwd":"/p"}}"#)
                .unwrap();
        match frame {
            Frame::Request { id, method, params } => {
                assert_eq!(id, RequestId::Num(7));
                assert_eq!(method, "session/new");
                assert_eq!(params.unwrap()["cwd"], "/p");
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn parse_notification() {
        let frame = Frame::parse(r#"{"jsonrpc":"2.0","method":"session/update"}"#).unwrap();
        assert!(matches!(frame, Frame::Notification { .. }));
        assert_eq!(frame.method(), Some("session/update"));
        assert!(frame.id().is_none());
    }

    #[test]
    fn parse_string_id() {
        let frame = Frame::parse(r#"{"jsonrpc":"2.0","id":"req-1","method":"m"}"#).unwrap();
        assert_eq!(frame.id(), Some(&RequestId::Str("req-1".into())));
    }

    #[test]
    fn parse_response_with_error() {
        let frame =
            Frame::parse(r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32602,"message":"bad path"}}"#)
                .unwrap();
        match frame {
            Frame::Response { error: Some(e), .. } => {
                assert_eq!(e.code, codes::INVALID_PARAMS);
                assert_eq!(e.message, "bad path");
            }
            other => panic!("expected error response, got {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_version() {
        assert!(Frame::parse(r#"{"id":1,"method":"m"}"#).is_err());
        assert!(Frame::parse(r#"{"jsonrpc":"1.0","id":1,"method":"m"}"#).is_err());
    }

    #[test]
    fn rejects_bare_object() {
        assert!(Frame::parse(r#"{"jsonrpc":"2.0"}"#).is_err());
    }

    #[test]
    fn null_result_survives_roundtrip() {
        let frame = Frame::response_ok(RequestId::Num(5), Value::Null);
        let wire = frame.to_wire();
        assert!(wire.contains("\"result\":null"));
        let back = Frame::parse(&wire).unwrap();
        assert!(matches!(back, Frame::Response { error: None, .. }));
    }

    #[test]
    fn request_roundtrip() {
        let frame = Frame::request(9, "session/prompt", json!({"prompt": []}));
        let back = Frame::parse(&frame.to_wire()).unwrap();
        assert_eq!(frame, back);
    }

    #[test]
    fn notification_omits_id() {
        let wire = Frame::notification("gemini/authUrl", json!({"url": "u"})).to_wire();
        assert!(!wire.contains("\"id\""));
    }

    #[test]
    fn error_response_omits_result() {
        let wire =
            Frame::response_err(RequestId::Num(1), RpcError::file_io("disk on fire")).to_wire();
        assert!(wire.contains("\"error\""));
        assert!(!wire.contains("\"result\""));
    }
}
