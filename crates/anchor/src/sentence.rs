//! Paragraph, sentence and heading rules over canonical text.
//!
//! Every function here works on byte offsets and returns spans that start
//! and end on non-whitespace characters.

use once_cell::sync::Lazy;
use regex::Regex;

/// Lowercased tokens after which a period does not end a sentence when
/// the next word starts with a letter, digit or underscore.
const ABBREVIATIONS: [&str; 27] = [
    "mr.", "mrs.", "ms.", "dr.", "prof.", "sr.", "jr.", "inc.", "ltd.", "co.", "corp.", "u.s.",
    "u.k.", "no.", "fig.", "art.", "sec.", "ch.", "dept.", "assn.", "bros.", "st.", "viz.", "vs.",
    "etc.", "i.e.", "e.g.",
];

static DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]+"\s+means\s+"#).expect("definition pattern is valid"));

/// Maximal runs of text between blank lines, as `(start, end)` byte spans.
///
/// Leading newlines are skipped and each span is trimmed of surrounding
/// whitespace; whitespace-only runs are dropped.
pub fn paragraph_spans(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut spans = Vec::new();
    let mut cursor = 0;

    while cursor < len {
        while cursor < len && bytes[cursor] == b'\n' {
            cursor += 1;
        }
        if cursor >= len {
            break;
        }
        let start = cursor;
        while cursor < len && !(bytes[cursor] == b'\n' && bytes.get(cursor + 1) == Some(&b'\n')) {
            cursor += 1;
        }
        if let Some(span) = trim_span(text, start, cursor) {
            spans.push(span);
        }
    }
    spans
}

/// Heading rule: all-uppercase and at most `max_chars` chars, or a
/// `Section ` / `ARTICLE ` lead, or a short line ending in a colon.
pub fn is_heading(text: &str, max_chars: usize) -> bool {
    let stripped = text.trim();
    if stripped.is_empty() {
        return false;
    }
    if stripped.chars().count() <= max_chars && is_all_uppercase(stripped) {
        return true;
    }
    if stripped.starts_with("Section ") || stripped.starts_with("ARTICLE ") {
        return true;
    }
    stripped.ends_with(':') && stripped.split_whitespace().count() <= 10
}

/// At least one cased character and no lowercase ones.
fn is_all_uppercase(text: &str) -> bool {
    let mut cased = false;
    for ch in text.chars() {
        if ch.is_lowercase() {
            return false;
        }
        if ch.is_uppercase() {
            cased = true;
        }
    }
    cased
}

/// `"Term" means ...`
pub fn is_definition(text: &str) -> bool {
    DEFINITION.is_match(text)
}

/// A pre-rendered Markdown pipe table.
pub fn is_markdown_table(text: &str) -> bool {
    let stripped = text.trim_start();
    stripped.starts_with('|') && stripped.contains("| ---")
}

/// Dot leaders, bullets and similar filler that should never be anchored.
pub fn is_filler(text: &str) -> bool {
    text.chars()
        .all(|ch| matches!(ch, '.' | '*' | '•' | '·' | ' ' | '\u{a0}'))
}

/// Split one paragraph into sentence spans, offsets relative to `text`.
///
/// A `.`, `!` or `?` ends a sentence unless:
/// - the sentence's last word is a known abbreviation and the next
///   non-space char is a letter, digit or `_`,
/// - the next char is lowercase,
/// - it is a `.` glued to the following letter or digit (`U.S.`, `3.5`,
///   `www.sec.gov`), or a `.` after a digit followed by `(` or `)`.
///
/// A glued `.` between a lowercase and an uppercase letter (`end.The`)
/// still splits.
///
/// Markdown tables come back as a single span.
pub fn split_sentences(text: &str) -> Vec<(usize, usize)> {
    if is_markdown_table(text) {
        return trim_span(text, 0, text.len()).into_iter().collect();
    }

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut spans = Vec::new();
    let mut start = 0usize;

    for (i, &(pos, ch)) in chars.iter().enumerate() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let end = pos + ch.len_utf8();
        let next = chars.get(i + 1).map(|&(_, c)| c);
        let prev = i.checked_sub(1).map(|j| chars[j].1);

        if let Some(token) = text[start..end].split_whitespace().last() {
            if ABBREVIATIONS.contains(&token.to_lowercase().as_str()) {
                let next_word = chars[i + 1..]
                    .iter()
                    .map(|&(_, c)| c)
                    .find(|c| !c.is_whitespace());
                if next_word.is_some_and(|c| c.is_alphanumeric() || c == '_') {
                    continue;
                }
            }
        }
        if next.is_some_and(char::is_lowercase) {
            continue;
        }
        if ch == '.' {
            if next.is_some_and(char::is_alphanumeric) {
                let glued_sentence =
                    prev.is_some_and(char::is_lowercase) && next.is_some_and(char::is_uppercase);
                if !glued_sentence {
                    continue;
                }
            }
            let after_digit = prev.is_some_and(|c| c.is_ascii_digit());
            if after_digit && matches!(next, Some('(') | Some(')')) {
                continue;
            }
        }

        if let Some(span) = trim_span(text, start, end) {
            spans.push(span);
        }
        start = end;
    }

    if start < text.len() {
        if let Some(span) = trim_span(text, start, text.len()) {
            spans.push(span);
        }
    }
    spans
}

/// Cut `[start, end)` into windows of about `max_chars` chars, extending
/// each cut to the next whitespace but no further than `search` chars.
pub fn chunk_spans(
    text: &str,
    start: usize,
    end: usize,
    max_chars: usize,
    search: usize,
) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    if max_chars == 0 || start >= end {
        return spans;
    }
    let region = &text[start..end];
    let offsets: Vec<usize> = region.char_indices().map(|(i, _)| i).collect();
    let total = offsets.len();
    let byte_at = |idx: usize| offsets.get(idx).copied().unwrap_or(region.len());

    let mut cursor = 0usize;
    while cursor < total {
        let mut cut = (cursor + max_chars).min(total);
        if cut < total {
            let candidate = cut;
            while cut < total && cut - candidate < search {
                let ch = region[byte_at(cut)..].chars().next().unwrap_or(' ');
                if ch.is_whitespace() {
                    break;
                }
                cut += 1;
            }
        }
        if let Some((s, e)) = trim_span(region, byte_at(cursor), byte_at(cut)) {
            spans.push((start + s, start + e));
        }
        cursor = cut;
    }
    spans
}

/// Up to `window` chars immediately before byte offset `start`.
pub fn context_before(text: &str, start: usize, window: usize) -> &str {
    let head = &text[..start];
    if window == 0 {
        return "";
    }
    let from = head
        .char_indices()
        .rev()
        .nth(window - 1)
        .map_or(0, |(i, _)| i);
    &head[from..]
}

/// Up to `window` chars immediately after byte offset `end`.
pub fn context_after(text: &str, end: usize, window: usize) -> &str {
    let tail = &text[end..];
    let to = tail.char_indices().nth(window).map_or(tail.len(), |(i, _)| i);
    &tail[..to]
}

/// Shrink `[start, end)` to exclude surrounding whitespace.
fn trim_span(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = &text[start..end];
    let trimmed_start = slice.trim_start();
    let lead = slice.len() - trimmed_start.len();
    let trimmed = trimmed_start.trim_end();
    if trimmed.is_empty() {
        return None;
    }
    Some((start + lead, start + lead + trimmed.len()))
}
