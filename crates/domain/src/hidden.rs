//! Per-turn hidden mode.
//!
//! A prompt may ask the bridge to keep parts of its turn out of connected
//! UIs. The mode travels with the prompt that opened the turn and is
//! inherited by every event recorded or broadcast for that turn.

use serde::{Deserialize, Serialize};

/// Which side of a turn is suppressed from UI emission.
///
/// Internal state is always updated regardless of the mode; suppression
/// only gates what gets surfaced to the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HiddenMode {
    /// Emit everything.
    #[default]
    None,
    /// Suppress the user prompt; assistant output is still surfaced.
    User,
    /// Suppress assistant output; tool approvals are auto-rejected.
    Assistant,
    /// Suppress both sides; tool approvals are auto-rejected.
    Turn,
}

impl HiddenMode {
    /// True when user-side events (the prompt echo) must not be surfaced.
    pub fn suppresses_user(self) -> bool {
        matches!(self, HiddenMode::User | HiddenMode::Turn)
    }

    /// True when assistant-side events must not be surfaced. Implies
    /// auto-rejection of permission requests.
    pub fn suppresses_assistant(self) -> bool {
        matches!(self, HiddenMode::Assistant | HiddenMode::Turn)
    }

    /// Parse the wire spelling. Unknown values fall back to `None`.
    pub fn parse(s: &str) -> Self {
        match s {
            "user" => HiddenMode::User,
            "assistant" => HiddenMode::Assistant,
            "turn" => HiddenMode::Turn,
            _ => HiddenMode::None,
        }
    }

    /// The wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            HiddenMode::None => "none",
            HiddenMode::User => "user",
            HiddenMode::Assistant => "assistant",
            HiddenMode::Turn => "turn",
        }
    }
}
