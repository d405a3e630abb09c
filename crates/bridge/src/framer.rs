//! Line framer for the subprocess's stdout stream.
//!
//! Each non-blank line is classified: a JSON-RPC frame, an OAuth URL
//! announcement, or log noise. A malformed `{`-prefixed line is
//! downgraded to a log line — it must never kill the stream.

use std::sync::LazyLock;

use gb_protocol::Frame;
use regex::Regex;

/// One classified stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineFrame {
    JsonRpc(Frame),
    AuthUrl(String),
    Log(String),
}

static CSI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").unwrap());
static OSC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)").unwrap());
// Remnants left when the ESC byte was already eaten upstream.
static BARE_PRIVATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\?[0-9;]*[A-Za-z]").unwrap());
static BARE_CURSOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[0-9;]*[GJK]").unwrap());

static OAUTH_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https://accounts\.google\.com/o/oauth2/v2/auth[^\s"'<>]*"#).unwrap()
});

/// Remove terminal-control escape sequences from a line.
pub fn strip_terminal_escapes(line: &str) -> String {
    let stripped = CSI.replace_all(line, "");
    let stripped = OSC.replace_all(&stripped, "");
    let stripped = BARE_PRIVATE.replace_all(&stripped, "");
    let stripped = BARE_CURSOR.replace_all(&stripped, "");
    stripped.into_owned()
}

/// Classify one stdout line. Returns `None` for blank lines.
pub fn classify(line: &str) -> Option<LineFrame> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('{') {
        match Frame::parse(trimmed) {
            Ok(frame) => return Some(LineFrame::JsonRpc(frame)),
            Err(e) => {
                tracing::warn!(error = %e, "malformed JSON-RPC line from agent, treating as log");
                return Some(LineFrame::Log(trimmed.to_owned()));
            }
        }
    }

    let plain = strip_terminal_escapes(trimmed);
    if let Some(m) = OAUTH_URL.find(&plain) {
        return Some(LineFrame::AuthUrl(m.as_str().to_owned()));
    }

    Some(LineFrame::Log(plain))
}
