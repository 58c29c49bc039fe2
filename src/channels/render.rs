//! Length limits shared by the channel formatters.
//!
//! Channel limits count UTF-16 code units of the visible text. Cuts happen on
//! grapheme boundaries and end with an ellipsis.

use unicode_segmentation::UnicodeSegmentation;

use crate::models::Segment;

pub const ELLIPSIS: &str = "…";

/// Length of `text` as counted by the messaging APIs.
pub fn visible_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Cut `text` to at most `max` units, marking the cut with an ellipsis.
pub fn truncate_text(text: &str, max: usize) -> String {
    if visible_len(text) <= max {
        return text.to_string();
    }
    let budget = max.saturating_sub(visible_len(ELLIPSIS));
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let len = visible_len(grapheme);
        if used + len > budget {
            break;
        }
        used += len;
        out.push_str(grapheme);
    }
    let kept = out.trim_end().len();
    out.truncate(kept);
    if max >= visible_len(ELLIPSIS) {
        out.push_str(ELLIPSIS);
    }
    out
}

/// Keep leading segments until `max` units of visible text are used.
///
/// The segment crossing the limit is cut and followed by a plain ellipsis.
pub fn truncate_segments(segments: &[Segment], max: usize) -> Vec<Segment> {
    let total: usize = segments.iter().map(|s| visible_len(&s.text)).sum();
    if total <= max {
        return segments.to_vec();
    }

    let budget = max.saturating_sub(visible_len(ELLIPSIS));
    let mut out = Vec::new();
    let mut used = 0;
    for segment in segments {
        let len = visible_len(&segment.text);
        if used + len <= budget {
            used += len;
            out.push(segment.clone());
            continue;
        }
        let mut text = String::new();
        for grapheme in segment.text.graphemes(true) {
            let len = visible_len(grapheme);
            if used + len > budget {
                break;
            }
            used += len;
            text.push_str(grapheme);
        }
        if !text.trim().is_empty() {
            out.push(Segment::new(text.trim_end(), segment.style.clone()));
        }
        break;
    }
    if max >= visible_len(ELLIPSIS) {
        out.push(Segment::plain(ELLIPSIS));
    }
    out
}

/// Split `text` into leading whitespace, core, and trailing whitespace.
pub fn split_edges(text: &str) -> (&str, &str, &str) {
    let core_start = text.len() - text.trim_start().len();
    let core_end = text.trim_end().len();
    if core_start >= core_end {
        return (text, "", "");
    }
    (
        &text[..core_start],
        &text[core_start..core_end],
        &text[core_end..],
    )
}
