//! Tool-title parsing.
//!
//! Agent tool titles encode the invocation in free text:
//!
//! ```text
//! command [current working directory /some/path] (what it does (roughly))
//! ```
//!
//! or, for structured tools:
//!
//! ```text
//! toolName input(s): {"arg": 1}
//! ```
//!
//! The parser recovers the working directory bracket, the trailing
//! balanced parenthesized description (located by right-to-left bracket
//! balancing, so nested parens survive), the JSON argument object, and
//! the residual invocation text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

const CWD_MARKER: &str = "[current working directory ";

static ARGS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\binputs?(?:\(s\))?:\s*(\{.*)\s*$").unwrap());

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTitle {
    /// Residual invocation text after the extractions below.
    pub input: String,
    /// Content of the `[current working directory …]` bracket.
    pub working_dir: Option<String>,
    /// Content of the trailing balanced `(…)` group.
    pub description: Option<String>,
    /// Parsed JSON from an `input(s): {…}` suffix; a parse failure
    /// stores the raw substring as a JSON string instead.
    pub args: Option<Value>,
}

pub fn parse_title(title: &str) -> ParsedTitle {
    let mut parsed = ParsedTitle::default();

    // Structured-arguments form takes over the whole suffix.
    if let Some(captures) = ARGS_PATTERN.captures(title) {
        let start = captures.get(0).map_or(0, |m| m.start());
        let raw = captures[1].trim();
        parsed.args = Some(match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(_) => Value::String(raw.to_owned()),
        });
        parsed.input = title[..start].trim().to_owned();
        return parsed;
    }

    let mut rest = title.to_owned();

    if let Some(start) = rest.find(CWD_MARKER) {
        if let Some(close) = rest[start + CWD_MARKER.len()..].find(']') {
            let value_start = start + CWD_MARKER.len();
            parsed.working_dir = Some(rest[value_start..value_start + close].trim().to_owned());
            rest.replace_range(start..value_start + close + 1, "");
        }
    }

    let trimmed = rest.trim_end();
    if let Some(open) = trailing_group_start(trimmed) {
        parsed.description = Some(trimmed[open + 1..trimmed.len() - 1].to_owned());
        rest.truncate(open);
    }

    parsed.input = rest.trim().to_owned();
    parsed
}

/// Byte offset of the `(` opening the balanced group that ends the
/// string, if the string ends with `)` and the group balances.
fn trailing_group_start(s: &str) -> Option<usize> {
    if !s.ends_with(')') {
        return None;
    }
    let mut depth = 0usize;
    for (at, ch) in s.char_indices().rev() {
        match ch {
            ')' => depth += 1,
            '(' => {
                depth -= 1;
                if depth == 0 {
                    return Some(at);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_command_only() {
        let parsed = parse_title("ls -la");
        assert_eq!(parsed.input, "ls -la");
        assert_eq!(parsed.working_dir, None);
        assert_eq!(parsed.description, None);
        assert_eq!(parsed.args, None);
    }

    #[test]
    fn full_form_with_cwd_and_description() {
        let parsed = parse_title(
            "git status [current working directory /home/dev/project] (check the working tree)",
        );
        assert_eq!(parsed.input, "git status");
        assert_eq!(parsed.working_dir.as_deref(), Some("/home/dev/project"));
        assert_eq!(parsed.description.as_deref(), Some("check the working tree"));
    }

    #[test]
    fn nested_parens_in_description() {
        let parsed = parse_title("rg TODO (search (all) sources (fast))");
        assert_eq!(parsed.input, "rg TODO");
        assert_eq!(
            parsed.description.as_deref(),
            Some("search (all) sources (fast)")
        );
    }

    #[test]
    fn parens_in_command_are_not_a_description() {
        // The trailing group is the description; earlier parens stay in
        // the input.
        let parsed = parse_title("echo $(date) (print the time)");
        assert_eq!(parsed.input, "echo $(date)");
        assert_eq!(parsed.description.as_deref(), Some("print the time"));
    }

    #[test]
    fn unbalanced_trailing_paren_is_kept() {
        let parsed = parse_title("echo hi)");
        assert_eq!(parsed.input, "echo hi)");
        assert_eq!(parsed.description, None);
    }

    #[test]
    fn cwd_only() {
        let parsed = parse_title("pwd [current working directory /tmp]");
        assert_eq!(parsed.input, "pwd");
        assert_eq!(parsed.working_dir.as_deref(), Some("/tmp"));
        assert_eq!(parsed.description, None);
    }

    #[test]
    fn args_form_parses_json() {
        let parsed = parse_title(r#"write_file input(s): {"path": "a.txt", "content": "hi"}"#);
        assert_eq!(parsed.input, "write_file");
        assert_eq!(
            parsed.args,
            Some(json!({ "path": "a.txt", "content": "hi" }))
        );
        assert_eq!(parsed.description, None);
    }

    #[test]
    fn args_form_plain_spelling() {
        let parsed = parse_title(r#"search inputs: {"query": "foo"}"#);
        assert_eq!(parsed.input, "search");
        assert_eq!(parsed.args, Some(json!({ "query": "foo" })));
    }

    #[test]
    fn malformed_args_kept_as_raw_string() {
        let parsed = parse_title("tool input: {not json at all");
        assert_eq!(parsed.input, "tool");
        assert_eq!(parsed.args, Some(Value::String("{not json at all".into())));
    }

    #[test]
    fn multiline_args() {
        let parsed = parse_title("tool input: {\"a\":\n 1}");
        assert_eq!(parsed.args, Some(json!({ "a": 1 })));
    }

    #[test]
    fn empty_title() {
        let parsed = parse_title("");
        assert_eq!(parsed, ParsedTitle::default());
    }

    #[test]
    fn description_after_cwd_removal() {
        let parsed =
            parse_title("make build [current working directory /src] (compile everything)");
        assert_eq!(parsed.input, "make build");
        assert_eq!(parsed.working_dir.as_deref(), Some("/src"));
        assert_eq!(parsed.description.as_deref(), Some("compile everything"));
    }
}
