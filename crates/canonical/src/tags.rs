//! Minimal tag tokenizer for EDGAR HTML and SGML bodies.
//!
//! This is not an HTML parser. It recognizes `<name ...>`, `</name>`,
//! `<name/>` and `<!-- ... -->` and reports everything else as text. An
//! unterminated tag or comment consumes the rest of the input.

/// Tags that introduce a paragraph break, on both open and close.
pub(crate) const BLOCK_TAGS: &[&str] = &[
    "article", "aside", "blockquote", "div", "dl", "dt", "dd", "footer", "form", "h1", "h2",
    "h3", "h4", "h5", "h6", "header", "hr", "li", "nav", "ol", "p", "pre", "section", "table",
    "tbody", "thead", "tfoot", "tr", "td", "th", "ul",
];

/// Tags that produce a hard newline.
pub(crate) const LINE_BREAK_TAGS: &[&str] = &["br"];

/// Tags whose content is dropped entirely.
pub(crate) const SKIP_CONTENT_TAGS: &[&str] = &["script", "style", "noscript"];

pub(crate) fn is_block(name: &str) -> bool {
    BLOCK_TAGS.contains(&name)
}

pub(crate) fn is_line_break(name: &str) -> bool {
    LINE_BREAK_TAGS.contains(&name)
}

pub(crate) fn is_skip_content(name: &str) -> bool {
    SKIP_CONTENT_TAGS.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TagToken<'a> {
    /// Lower-cased tag name. Empty for declarations such as `<!DOCTYPE>`.
    pub name: String,
    pub is_start: bool,
    pub is_self_closing: bool,
    /// Raw text between the name and the closing `>`.
    pub attrs: &'a str,
}

impl TagToken<'_> {
    pub(crate) fn is_start_of(&self, name: &str) -> bool {
        self.is_start && self.name == name
    }

    pub(crate) fn is_end_of(&self, name: &str) -> bool {
        !self.is_start && self.name == name
    }

    /// Look up an attribute value, case-insensitively.
    pub(crate) fn attribute(&self, wanted: &str) -> Option<&str> {
        attribute(self.attrs, wanted)
    }
}

fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b':')
}

/// Parse the tag starting at `index` (which must point at `<`).
///
/// Returns the token, if any, and the index just past the construct.
/// Comments and unterminated constructs yield `None`.
pub(crate) fn parse_tag(raw: &str, index: usize) -> (Option<TagToken<'_>>, usize) {
    let bytes = raw.as_bytes();
    let len = bytes.len();

    if raw[index..].starts_with("<!--") {
        return match raw[index + 4..].find("-->") {
            Some(offset) => (None, index + 4 + offset + 3),
            None => (None, len),
        };
    }

    let mut cursor = index + 1;
    while cursor < len && bytes[cursor].is_ascii_whitespace() {
        cursor += 1;
    }
    if cursor >= len {
        return (None, len);
    }

    let mut is_start = true;
    if bytes[cursor] == b'/' {
        is_start = false;
        cursor += 1;
    }

    let name_start = cursor;
    while cursor < len && is_name_byte(bytes[cursor]) {
        cursor += 1;
    }
    let name = raw[name_start..cursor].to_ascii_lowercase();

    let close = match raw[cursor..].find('>') {
        Some(offset) => cursor + offset,
        None => return (None, len),
    };

    let attrs = &raw[cursor..close];
    let is_self_closing = attrs.trim_end().ends_with('/');

    (
        Some(TagToken {
            name,
            is_start,
            is_self_closing,
            attrs,
        }),
        close + 1,
    )
}

/// Find `wanted=value` inside raw attribute text.
///
/// Values may be double-quoted, single-quoted or bare.
pub(crate) fn attribute<'a>(attrs: &'a str, wanted: &str) -> Option<&'a str> {
    let bytes = attrs.as_bytes();
    let len = bytes.len();
    let mut cursor = 0;

    while cursor < len {
        while cursor < len && (bytes[cursor].is_ascii_whitespace() || bytes[cursor] == b'/') {
            cursor += 1;
        }
        let name_start = cursor;
        while cursor < len
            && !bytes[cursor].is_ascii_whitespace()
            && !matches!(bytes[cursor], b'=' | b'/')
        {
            cursor += 1;
        }
        let name = &attrs[name_start..cursor];
        if name.is_empty() {
            cursor += 1;
            continue;
        }

        while cursor < len && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= len || bytes[cursor] != b'=' {
            if name.eq_ignore_ascii_case(wanted) {
                return Some("");
            }
            continue;
        }
        cursor += 1;
        while cursor < len && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }

        let value = if cursor < len && matches!(bytes[cursor], b'"' | b'\'') {
            let quote = bytes[cursor];
            let value_start = cursor + 1;
            let value_end = attrs[value_start..]
                .bytes()
                .position(|b| b == quote)
                .map(|offset| value_start + offset)
                .unwrap_or(len);
            cursor = (value_end + 1).min(len);
            &attrs[value_start..value_end]
        } else {
            let value_start = cursor;
            while cursor < len && !bytes[cursor].is_ascii_whitespace() {
                cursor += 1;
            }
            &attrs[value_start..cursor]
        };

        if name.eq_ignore_ascii_case(wanted) {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_end_and_self_closing() {
        let raw = "<P ALIGN=center>x</p><br/>";
        let (tok, next) = parse_tag(raw, 0);
        let tok = tok.expect("start tag");
        assert_eq!(tok.name, "p");
        assert!(tok.is_start);
        assert_eq!(next, 16);

        let (tok, next) = parse_tag(raw, 17);
        assert!(tok.expect("end tag").is_end_of("p"));
        assert_eq!(next, 21);

        let (tok, _) = parse_tag(raw, 21);
        let tok = tok.expect("br");
        assert!(tok.is_start_of("br"));
        assert!(tok.is_self_closing);
    }

    #[test]
    fn comments_are_skipped() {
        let raw = "<!-- <p> -->after";
        let (tok, next) = parse_tag(raw, 0);
        assert!(tok.is_none());
        assert_eq!(&raw[next..], "after");
    }

    #[test]
    fn unterminated_tag_consumes_rest() {
        let raw = "<div class='x' never closed";
        let (tok, next) = parse_tag(raw, 0);
        assert!(tok.is_none());
        assert_eq!(next, raw.len());
    }

    #[test]
    fn attribute_lookup_handles_quoting() {
        let attrs = r#" ROWSPAN="2" colspan=3 align='right' nowrap"#;
        assert_eq!(attribute(attrs, "rowspan"), Some("2"));
        assert_eq!(attribute(attrs, "colspan"), Some("3"));
        assert_eq!(attribute(attrs, "align"), Some("right"));
        assert_eq!(attribute(attrs, "nowrap"), Some(""));
        assert_eq!(attribute(attrs, "width"), None);
    }
}
