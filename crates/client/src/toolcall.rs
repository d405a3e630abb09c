//! Tool-call model and content normalization.
//!
//! Tool updates arrive with loosely-shaped content: plain strings, text
//! containers, and diff payloads in several spellings. Everything is
//! normalized into [`ToolCall`]; diffs become a unified diff with a
//! configurable context-line count.

use serde::Serialize;
use serde_json::Value;

/// Lifecycle of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ToolStatus {
    /// Map a wire status string. `in_progress` means running; both
    /// spellings of cancelled are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" | "pending" => Some(ToolStatus::Queued),
            "running" | "in_progress" => Some(ToolStatus::Running),
            "completed" | "success" => Some(ToolStatus::Completed),
            "failed" | "error" => Some(ToolStatus::Failed),
            "cancelled" | "canceled" => Some(ToolStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ToolStatus::Completed | ToolStatus::Failed | ToolStatus::Cancelled
        )
    }
}

/// Normalized diff attached to a tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffInfo {
    pub path: Option<String>,
    pub unified: String,
    pub old_len: Option<usize>,
    pub new_len: Option<usize>,
}

/// One tool invocation inside an assistant message.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub title: String,
    pub status: ToolStatus,
    /// Residual invocation text recovered from the title.
    pub input: String,
    /// Structured arguments recovered from an `input(s): {json}` title.
    pub args: Option<Value>,
    pub description: Option<String>,
    pub working_dir: Option<String>,
    /// Accumulated textual output.
    pub result: String,
    pub diff: Option<DiffInfo>,
    pub timestamp_ms: i64,
    pub seq: u64,
}

impl ToolCall {
    /// Merge a content payload into the call: strings and text
    /// containers append to `result`, diff payloads replace `diff`,
    /// arrays apply item by item.
    pub fn apply_content(&mut self, content: &Value, diff_context: usize) {
        match content {
            Value::Array(items) => {
                for item in items {
                    self.apply_content(item, diff_context);
                }
            }
            Value::String(s) => self.result.push_str(s),
            Value::Object(obj) => {
                if let Some(diff) = normalize_diff(content, diff_context) {
                    self.diff = Some(diff);
                    return;
                }
                if let Some(text) = obj.get("text").and_then(Value::as_str) {
                    self.result.push_str(text);
                    return;
                }
                if let Some(inner) = obj.get("content") {
                    self.apply_content(inner, diff_context);
                }
            }
            _ => {}
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Diff normalization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Normalize any of the known diff payload shapes:
/// `{type:"diff", oldText, newText, path}`, or an embedded `diff` /
/// `content.diff` sub-object carrying `{unified|patch|diff|before|after}`.
/// A supplied unified string wins; otherwise one is computed.
pub fn normalize_diff(value: &Value, context: usize) -> Option<DiffInfo> {
    let obj = value.as_object()?;

    // Direct shape: {type:"diff", oldText, newText, path}.
    let is_diff_type = obj.get("type").and_then(Value::as_str) == Some("diff");
    if is_diff_type || (obj.contains_key("oldText") && obj.contains_key("newText")) {
        let old = obj.get("oldText").and_then(Value::as_str).unwrap_or("");
        let new = obj.get("newText").and_then(Value::as_str).unwrap_or("");
        let path = obj.get("path").and_then(Value::as_str).map(str::to_owned);
        return Some(compute_unified(path, old, new, context));
    }

    // Embedded shape: {diff: …} or {content: {diff: …}}.
    let embedded = obj
        .get("diff")
        .or_else(|| obj.get("content").and_then(|c| c.get("diff")))?;
    let path = embedded
        .get("path")
        .or_else(|| obj.get("path"))
        .and_then(Value::as_str)
        .map(str::to_owned);

    // A bare string is already a unified diff.
    if let Some(unified) = embedded.as_str() {
        return Some(DiffInfo {
            path,
            unified: unified.to_owned(),
            old_len: None,
            new_len: None,
        });
    }

    for key in ["unified", "patch", "diff"] {
        if let Some(unified) = embedded.get(key).and_then(Value::as_str) {
            return Some(DiffInfo {
                path,
                unified: unified.to_owned(),
                old_len: None,
                new_len: None,
            });
        }
    }

    let before = embedded
        .get("before")
        .or_else(|| embedded.get("oldText"))
        .and_then(Value::as_str);
    let after = embedded
        .get("after")
        .or_else(|| embedded.get("newText"))
        .and_then(Value::as_str);
    if before.is_some() || after.is_some() {
        return Some(compute_unified(
            path,
            before.unwrap_or(""),
            after.unwrap_or(""),
            context,
        ));
    }

    None
}

fn compute_unified(path: Option<String>, old: &str, new: &str, context: usize) -> DiffInfo {
    let text_diff = similar::TextDiff::from_lines(old, new);
    let mut unified = text_diff.unified_diff();
    unified.context_radius(context);
    let rendered = match &path {
        Some(p) => unified
            .header(&format!("a/{p}"), &format!("b/{p}"))
            .to_string(),
        None => unified.to_string(),
    };
    DiffInfo {
        path,
        unified: rendered,
        old_len: Some(old.chars().count()),
        new_len: Some(new.chars().count()),
    }
}
