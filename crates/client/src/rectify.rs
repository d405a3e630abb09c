//! Stream rectification.
//!
//! Streaming backends resend overlapping chunks: a chunk may repeat the
//! accumulated text, extend it, or overlap its tail. Given the current
//! part's accumulated string and an incoming chunk, [`new_segment`]
//! computes the unique new suffix to append. It never deletes already
//! appended text — a duplicate or stale resend yields an empty segment.

/// The new segment `N` to append given accumulated `prev` and chunk
/// `incoming`.
pub fn new_segment(prev: &str, incoming: &str) -> String {
    // Trivial cases first.
    if incoming.is_empty() {
        return String::new();
    }
    if prev.is_empty() {
        return incoming.to_owned();
    }
    if incoming == prev {
        return String::new();
    }
    // A chunk no longer than the accumulator that appears anywhere in it
    // is a duplicate resend.
    if incoming.len() <= prev.len() && prev.contains(incoming) {
        return String::new();
    }
    // Cumulative resend: chunk repeats the whole accumulator plus new tail.
    if let Some(suffix) = incoming.strip_prefix(prev) {
        return suffix.to_owned();
    }
    // Partial overlap: the largest k where the accumulator's tail equals
    // the chunk's head; append what follows.
    let p = prev.as_bytes();
    let i = incoming.as_bytes();
    let max = p.len().min(i.len() - 1);
    for k in (1..=max).rev() {
        if !incoming.is_char_boundary(k) || !prev.is_char_boundary(prev.len() - k) {
            continue;
        }
        if p[p.len() - k..] == i[..k] {
            return incoming[k..].to_owned();
        }
    }
    // No overlap at all: genuinely new text.
    incoming.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_incoming() {
        assert_eq!(new_segment("abc", ""), "");
    }

    #[test]
    fn empty_accumulator_takes_whole_chunk() {
        assert_eq!(new_segment("", "hello"), "hello");
    }

    #[test]
    fn exact_duplicate_is_empty() {
        assert_eq!(new_segment("hello", "hello"), "");
    }

    #[test]
    fn contained_resend_is_empty() {
        assert_eq!(new_segment("hello world", "lo wor"), "");
        assert_eq!(new_segment("hello world", "world"), "");
        assert_eq!(new_segment("hello world", "hello"), "");
    }

    #[test]
    fn cumulative_resend_yields_suffix() {
        assert_eq!(new_segment("hello", "hello world"), " world");
    }

    #[test]
    fn tail_overlap() {
        assert_eq!(new_segment("Hello", "lo world"), " world");
    }

    #[test]
    fn no_overlap_appends_everything() {
        assert_eq!(new_segment("abc", "xyz puzzle"), "xyz puzzle");
    }

    #[test]
    fn largest_overlap_wins() {
        // Tail "aba" overlaps head "aba", not just "a".
        assert_eq!(new_segment("xxaba", "abab"), "b");
    }

    #[test]
    fn idempotence_property() {
        let samples = ["", "a", "hello world", "ααβ unicode", "line\nline"];
        for acc in samples {
            assert_eq!(new_segment(acc, acc), "", "acc = {acc:?}");
            let extended = format!("{acc}tail");
            assert_eq!(new_segment(acc, &extended), "tail", "acc = {acc:?}");
        }
    }

    #[test]
    fn multibyte_boundaries_are_respected() {
        // "né" tail overlaps chunk head mid-codepoint if done naively.
        let out = new_segment("café", "é au lait");
        assert_eq!(out, " au lait");
        let out = new_segment("日本", "本語");
        assert_eq!(out, "語");
    }

    #[test]
    fn never_deletes_appended_text() {
        // A stale shorter resend cannot shrink the accumulator.
        let acc = "the full sentence so far";
        assert_eq!(new_segment(acc, "the full"), "");
    }
}
