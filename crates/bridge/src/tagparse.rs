//! Streaming tag parser for the outgoing assistant text stream.
//!
//! Recognizes two tag pairs (`<SYS_JSON>…</SYS_JSON>` and
//! `<SYS_BLOCK>…</SYS_BLOCK>`, names configurable) embedded in assistant
//! text chunks, and splits each chunk into alternating text and
//! structured-event parts. A tag's start or end delimiter may straddle
//! chunk boundaries; the parser holds candidate prefixes until the next
//! chunk decides them.
//!
//! Invariant: in `event` mode, concatenating all emitted text equals the
//! original stream with tag regions removed, independent of how the
//! stream was split into chunks. In `both` mode it equals the original
//! stream exactly.

use gb_domain::config::{TransformConfig, TransformMode};
use gb_protocol::StructuredEvent;

/// One output part, in stream position order.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Event(StructuredEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Json,
    Block,
}

#[derive(Debug)]
enum State {
    /// Between tags. `held` is a suffix of the stream that is a strict
    /// prefix of some start delimiter, parked until the next chunk.
    Outside { held: String },
    /// Inside a tag region. `held` is a strict prefix of the expected
    /// end delimiter; it must not be appended to `captured` until the
    /// next chunk proves it is not the close.
    Inside {
        kind: TagKind,
        captured: String,
        held: String,
    },
}

/// Stateful pushdown parser over arriving text chunks.
pub struct TagParser {
    mode: TransformMode,
    json_tag: String,
    block_tag: String,
    json_start: String,
    json_end: String,
    block_start: String,
    block_end: String,
    state: State,
}

impl TagParser {
    pub fn new(config: &TransformConfig) -> Self {
        Self {
            mode: config.mode,
            json_tag: config.json_tag.clone(),
            block_tag: config.block_tag.clone(),
            json_start: format!("<{}>", config.json_tag),
            json_end: format!("</{}>", config.json_tag),
            block_start: format!("<{}>", config.block_tag),
            block_end: format!("</{}>", config.block_tag),
            state: State::Outside { held: String::new() },
        }
    }

    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    /// Feed one chunk; returns the parts decided by it, in order.
    pub fn push_chunk(&mut self, chunk: &str) -> Vec<Part> {
        if self.mode == TransformMode::Raw {
            // Pass-through: no capture, no holding.
            if chunk.is_empty() {
                return Vec::new();
            }
            return vec![Part::Text(chunk.to_owned())];
        }

        let mut parts: Vec<Part> = Vec::new();
        let mut state = std::mem::replace(&mut self.state, State::Outside { held: String::new() });
        let mut buf = match &mut state {
            State::Outside { held } | State::Inside { held, .. } => std::mem::take(held),
        };
        buf.push_str(chunk);

        loop {
            match state {
                State::Outside { .. } => {
                    let hit = [
                        (TagKind::Json, &self.json_start),
                        (TagKind::Block, &self.block_start),
                    ]
                    .into_iter()
                    .filter_map(|(kind, delim)| {
                        buf.find(delim.as_str()).map(|at| (at, kind, delim.len()))
                    })
                    .min_by_key(|(at, ..)| *at);

                    if let Some((at, kind, delim_len)) = hit {
                        if at > 0 {
                            push_text(&mut parts, &buf[..at]);
                        }
                        buf.drain(..at + delim_len);
                        state = State::Inside {
                            kind,
                            captured: String::new(),
                            held: String::new(),
                        };
                        continue;
                    }

                    // No full start delimiter: park any suffix that could
                    // become one, emit the rest.
                    let hold = longest_held_suffix(&buf, &[&self.json_start, &self.block_start]);
                    let text_end = buf.len() - hold;
                    if text_end > 0 {
                        push_text(&mut parts, &buf[..text_end]);
                    }
                    state = State::Outside {
                        held: buf.split_off(text_end),
                    };
                    break;
                }
                State::Inside {
                    kind, mut captured, ..
                } => {
                    let end = match kind {
                        TagKind::Json => &self.json_end,
                        TagKind::Block => &self.block_end,
                    };

                    if let Some(at) = buf.find(end.as_str()) {
                        captured.push_str(&buf[..at]);
                        buf.drain(..at + end.len());
                        self.close_tag(&mut parts, kind, captured);
                        state = State::Outside { held: String::new() };
                        continue;
                    }

                    // End delimiter not (yet) present. A trailing strict
                    // prefix of it stays out of `captured` — appending it
                    // now would make a later close unfindable.
                    let hold = longest_held_suffix(&buf, &[end]);
                    let text_end = buf.len() - hold;
                    captured.push_str(&buf[..text_end]);
                    state = State::Inside {
                        kind,
                        captured,
                        held: buf.split_off(text_end),
                    };
                    break;
                }
            }
        }

        self.state = state;
        parts
    }

    /// Release in-flight state at end of turn.
    ///
    /// An unterminated tag is returned as plain text re-prefixed with its
    /// start delimiter — no phantom structured event. A parked text
    /// suffix is returned as-is.
    pub fn flush(&mut self) -> Option<String> {
        let state = std::mem::replace(&mut self.state, State::Outside { held: String::new() });
        match state {
            State::Outside { held } => {
                if held.is_empty() {
                    None
                } else {
                    Some(held)
                }
            }
            State::Inside {
                kind,
                captured,
                held,
            } => {
                let start = match kind {
                    TagKind::Json => &self.json_start,
                    TagKind::Block => &self.block_start,
                };
                Some(format!("{start}{captured}{held}"))
            }
        }
    }

    fn close_tag(&self, parts: &mut Vec<Part>, kind: TagKind, captured: String) {
        let (tag_name, start, end) = match kind {
            TagKind::Json => (&self.json_tag, &self.json_start, &self.json_end),
            TagKind::Block => (&self.block_tag, &self.block_start, &self.block_end),
        };

        let (payload, error) = match serde_json::from_str::<serde_json::Value>(captured.trim()) {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let failed = error.is_some();
        let event = StructuredEvent {
            event_type: tag_name.to_lowercase(),
            payload,
            error,
            raw: captured.clone(),
        };
        parts.push(Part::Event(event));

        // `both` keeps every raw tagged span in the text stream; `event`
        // re-inlines it only when the payload failed to parse, so the
        // content is never lost.
        if self.mode == TransformMode::Both || failed {
            push_text(parts, &format!("{start}{captured}{end}"));
        }
    }
}

/// Length of the longest suffix of `buf` that is a strict prefix of any
/// of `delims`. Delimiters are ASCII, so byte arithmetic is safe.
fn longest_held_suffix(buf: &str, delims: &[&String]) -> usize {
    let bytes = buf.as_bytes();
    let mut best = 0;
    for delim in delims {
        let d = delim.as_bytes();
        let max = d.len().saturating_sub(1).min(bytes.len());
        for k in (best + 1..=max).rev() {
            if bytes[bytes.len() - k..] == d[..k] {
                best = k;
                break;
            }
        }
    }
    best
}

fn push_text(parts: &mut Vec<Part>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Part::Text(last)) = parts.last_mut() {
        last.push_str(text);
    } else {
        parts.push(Part::Text(text.to_owned()));
    }
}
