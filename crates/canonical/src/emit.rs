//! Character decoding and the provenance-tracking output buffer.

use unicode_normalization::UnicodeNormalization;

use crate::document::CharSource;
use crate::punctuation::fold_punctuation;

/// Longest entity (including `&` and `;`) the decoder will look at.
const MAX_ENTITY_LEN: usize = 32;

/// Decode `raw[start..end]` into folded characters, each paired with the raw
/// byte range it came from.
///
/// Entities are resolved when the candidate `&name;` decodes to something
/// different from itself; every character it produces points at the whole
/// entity. Anything else passes through one character at a time.
pub(crate) fn decode_text(
    raw: &str,
    start: usize,
    end: usize,
    decode_entities: bool,
    normalize_unicode: bool,
    mut sink: impl FnMut(char, CharSource),
) {
    let bytes = raw.as_bytes();
    let mut pos = start;
    while pos < end {
        if decode_entities && bytes[pos] == b'&' {
            if let Some(entity_end) = entity_end(bytes, pos, end) {
                let entity = &raw[pos..entity_end];
                let decoded = html_escape::decode_html_entities(entity);
                if decoded != entity {
                    let source = CharSource {
                        start: pos,
                        end: entity_end,
                    };
                    for ch in decoded.chars() {
                        emit_folded(ch, source, normalize_unicode, &mut sink);
                    }
                    pos = entity_end;
                    continue;
                }
            }
        }

        let Some(ch) = raw[pos..].chars().next() else {
            break;
        };
        let width = ch.len_utf8();
        emit_folded(
            ch,
            CharSource {
                start: pos,
                end: pos + width,
            },
            normalize_unicode,
            &mut sink,
        );
        pos += width;
    }
}

/// End (exclusive) of a well-formed `&name;` / `&#123;` candidate at `pos`.
fn entity_end(bytes: &[u8], pos: usize, end: usize) -> Option<usize> {
    let limit = end.min(pos + MAX_ENTITY_LEN);
    let body_start = pos + 1;
    let semi = bytes[body_start..limit].iter().position(|b| *b == b';')? + body_start;
    if semi == body_start {
        return None;
    }
    let body = &bytes[body_start..semi];
    if body.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'#') {
        Some(semi + 1)
    } else {
        None
    }
}

fn emit_folded(
    ch: char,
    source: CharSource,
    normalize_unicode: bool,
    sink: &mut impl FnMut(char, CharSource),
) {
    let Some(folded) = fold_punctuation(ch) else {
        return;
    };
    if normalize_unicode {
        for normalized in std::iter::once(folded).nfkc() {
            sink(normalized, source);
        }
    } else {
        sink(folded, source);
    }
}

/// Output buffer that keeps text and provenance in lock-step.
///
/// Whitespace is collapsed on the way in: a block break is realized as one
/// blank line before the next visible character, never as trailing layout.
#[derive(Debug, Default)]
pub(crate) struct Emitter {
    text: String,
    sources: Vec<Option<CharSource>>,
    pending_block_break: bool,
    last_was_space: bool,
    newlines_as_space: bool,
}

impl Emitter {
    pub(crate) fn new(newlines_as_space: bool) -> Self {
        Self {
            newlines_as_space,
            ..Default::default()
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.text.len()
    }

    /// Feed one decoded character through the whitespace rules.
    pub(crate) fn emit_char(&mut self, ch: char, source: Option<CharSource>) {
        if ch == '\r' || ch == '\n' {
            if self.newlines_as_space {
                self.emit_space(source);
            } else {
                self.emit_hard_break(source);
            }
            return;
        }
        if ch.is_whitespace() {
            self.emit_space(source);
            return;
        }
        self.apply_pending_break();
        self.push(ch, source);
        self.last_was_space = false;
    }

    /// Append a character verbatim, bypassing whitespace collapse.
    pub(crate) fn push_raw(&mut self, ch: char, source: Option<CharSource>) {
        self.push(ch, source);
        self.last_was_space = ch == ' ';
    }

    /// `<br>`: one newline, immediately, never doubled.
    pub(crate) fn emit_line_break(&mut self, source: Option<CharSource>) {
        self.apply_pending_break();
        if self.text.is_empty() || self.text.ends_with('\n') {
            return;
        }
        self.strip_trailing_spaces();
        self.push('\n', source);
        self.last_was_space = false;
    }

    /// Plain-text newline: runs collapse to at most one blank line.
    fn emit_hard_break(&mut self, source: Option<CharSource>) {
        self.apply_pending_break();
        self.strip_trailing_spaces();
        if self.text.is_empty() || self.text.ends_with("\n\n") {
            return;
        }
        self.push('\n', source);
        self.last_was_space = false;
    }

    fn emit_space(&mut self, source: Option<CharSource>) {
        if self.pending_block_break
            || self.text.is_empty()
            || self.text.ends_with('\n')
            || self.last_was_space
        {
            return;
        }
        self.push(' ', source);
        self.last_was_space = true;
    }

    pub(crate) fn mark_block_break(&mut self) {
        self.pending_block_break = true;
        self.last_was_space = false;
    }

    /// Realize a pending block break as exactly one blank line.
    pub(crate) fn apply_pending_break(&mut self) {
        if !self.pending_block_break {
            return;
        }
        self.pending_block_break = false;
        self.last_was_space = false;
        self.strip_trailing_spaces();
        if self.text.is_empty() {
            return;
        }
        if !self.text.ends_with('\n') {
            self.push('\n', None);
        }
        if !self.text.ends_with("\n\n") {
            self.push('\n', None);
        }
    }

    fn push(&mut self, ch: char, source: Option<CharSource>) {
        self.text.push(ch);
        self.sources.push(source);
    }

    fn strip_trailing_spaces(&mut self) {
        while self.text.ends_with(' ') {
            self.text.pop();
            self.sources.pop();
        }
    }

    /// Trim trailing layout and hand back text and provenance.
    pub(crate) fn finish(mut self) -> (String, Vec<Option<CharSource>>) {
        while self.text.ends_with(' ') || self.text.ends_with('\n') {
            self.text.pop();
            self.sources.pop();
        }
        (self.text, self.sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> Vec<(char, CharSource)> {
        let mut out = Vec::new();
        decode_text(raw, 0, raw.len(), true, false, |ch, src| out.push((ch, src)));
        out
    }

    #[test]
    fn entity_maps_to_whole_span() {
        let out = decode("a&amp;b");
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], ('&', CharSource { start: 1, end: 6 }));
        assert_eq!(out[2], ('b', CharSource { start: 6, end: 7 }));
    }

    #[test]
    fn numeric_entities_decode() {
        let text: String = decode("&#8220;x&#8221; &#x2014;").into_iter().map(|(c, _)| c).collect();
        assert_eq!(text, "\"x\" -");
    }

    #[test]
    fn undecodable_ampersand_passes_through() {
        let text: String = decode("AT&T &bogus; & co").into_iter().map(|(c, _)| c).collect();
        assert_eq!(text, "AT&T &bogus; & co");
    }

    #[test]
    fn block_break_becomes_single_blank_line() {
        let mut emitter = Emitter::new(true);
        for ch in "one ".chars() {
            emitter.emit_char(ch, None);
        }
        emitter.mark_block_break();
        emitter.mark_block_break();
        emitter.emit_char(' ', None);
        emitter.emit_char('t', None);
        let (text, sources) = emitter.finish();
        assert_eq!(text, "one\n\nt");
        assert_eq!(sources.len(), text.chars().count());
    }

    #[test]
    fn hard_breaks_collapse_to_one_blank_line() {
        let mut emitter = Emitter::new(false);
        for ch in "\na \n\n\n\nb\n".chars() {
            emitter.emit_char(ch, None);
        }
        let (text, _) = emitter.finish();
        assert_eq!(text, "a\n\nb");
    }
}
