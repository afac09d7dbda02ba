//! `<DOCUMENT>` / `<TEXT>` segmentation of an EDGAR `.nc` submission.
//!
//! A submission member is an SGML-ish envelope holding one or more
//! documents. Each document has a header block of `<KEY>value` lines
//! followed by a `<TEXT>...</TEXT>` body. Real archives are not always well
//! formed, so boundary lists of unequal length are repaired before pairing.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::IngestError;

/// Header fields of one segment, keyed by lowercased tag name.
pub type SegmentHeader = BTreeMap<String, String>;

static HEADER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<([-a-zA-Z0-9]+)>(.*)\n").expect("header line pattern is valid")
});

const DOCUMENT_OPEN: &str = "<DOCUMENT>";
const TEXT_OPEN: &str = "<TEXT>";
const TEXT_CLOSE: &str = "</TEXT>";

/// Byte boundaries of one segment inside the member text.
///
/// The header is `header_start..header_end`, the body is
/// `body_start..body_end`. Either range may be inverted on malformed input,
/// in which case it reads as empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentBounds {
    pub header_start: usize,
    pub header_end: usize,
    pub body_start: usize,
    pub body_end: usize,
}

impl SegmentBounds {
    fn header<'t>(&self, text: &'t str) -> &'t str {
        slice(text, self.header_start, self.header_end)
    }

    fn body<'t>(&self, text: &'t str) -> &'t str {
        slice(text, self.body_start, self.body_end)
    }
}

/// Locate segment boundaries in `text`.
///
/// Returns an empty list unless all three of `<DOCUMENT>`, `<TEXT>` and
/// `</TEXT>` occur at least once. When the marker counts disagree the lists
/// are repaired so that every emitted segment still has a usable body:
///
/// - more `</TEXT>` than `<DOCUMENT>`: header ends are taken from the
///   closing markers
/// - fewer `<TEXT>` than `<DOCUMENT>`: bodies start right after each
///   `<DOCUMENT>` and headers run from the previous one
/// - fewer `<DOCUMENT>` than `<TEXT>`: header ends are the `<TEXT>` starts
/// - fewer `</TEXT>` than `<DOCUMENT>`: bodies end at the header ends
///
/// The lists are then paired up to the length of the shortest one.
///
/// ```rust
/// use ingest::create_segments;
///
/// let text = "<DOCUMENT>\n<TYPE>10-K\n<TEXT>body</TEXT>\n</DOCUMENT>";
/// let bounds = create_segments(text);
/// assert_eq!(bounds.len(), 1);
/// assert_eq!(&text[bounds[0].body_start..bounds[0].body_end], "body");
/// ```
pub fn create_segments(text: &str) -> Vec<SegmentBounds> {
    let doc_ends: Vec<usize> = text
        .match_indices(DOCUMENT_OPEN)
        .map(|(pos, m)| pos + m.len())
        .collect();
    let text_starts: Vec<usize> = text.match_indices(TEXT_OPEN).map(|(pos, _)| pos).collect();
    let text_close_starts: Vec<usize> = text.match_indices(TEXT_CLOSE).map(|(pos, _)| pos).collect();

    if doc_ends.is_empty() || text_starts.is_empty() || text_close_starts.is_empty() {
        return Vec::new();
    }

    let n_doc = doc_ends.len();
    let n_start = text_starts.len();
    let n_end = text_close_starts.len();

    let mut header_starts = doc_ends;
    let mut header_ends = text_starts.clone();
    let mut body_starts: Vec<usize> = text_starts.iter().map(|pos| pos + TEXT_OPEN.len()).collect();
    let mut body_ends = text_close_starts;

    if n_doc < n_end {
        header_starts = body_ends.clone();
    }
    if n_start < n_doc {
        header_ends = std::iter::once(0)
            .chain(header_starts[..header_starts.len() - 1].iter().copied())
            .collect();
        body_starts = header_starts.clone();
    }
    if n_doc < n_start {
        header_starts = header_ends.clone();
    }
    if n_end < n_doc {
        body_ends = header_starts.clone();
    }

    header_starts
        .into_iter()
        .zip(header_ends)
        .zip(body_starts)
        .zip(body_ends)
        .map(
            |(((header_start, header_end), body_start), body_end)| SegmentBounds {
                header_start,
                header_end,
                body_start,
                body_end,
            },
        )
        .collect()
}

/// Parse `<KEY>value` lines of a header block.
///
/// Keys are lowercased, a trailing `\r` is removed from values, empty values
/// are dropped and a later key wins over an earlier one.
///
/// ```rust
/// use ingest::parse_header;
///
/// let header = parse_header("<TYPE>EX-99.1\n<SEQUENCE>2\n<DESCRIPTION>\n");
/// assert_eq!(header.get("type").map(String::as_str), Some("EX-99.1"));
/// assert!(!header.contains_key("description"));
/// ```
pub fn parse_header(header_text: &str) -> SegmentHeader {
    let mut header = SegmentHeader::new();
    for caps in HEADER_LINE.captures_iter(header_text) {
        let value = caps[2].strip_suffix('\r').unwrap_or(&caps[2]);
        if value.is_empty() {
            continue;
        }
        header.insert(caps[1].to_ascii_lowercase(), value.to_string());
    }
    header
}

/// Random access to the segments of a single document.
///
/// Implemented by [`SegmentExtractor`]; tests and callers holding already
/// split documents can provide their own.
pub trait SegmentSource {
    /// Number of segments.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Header fields and body markup of the segment at `index`.
    fn segment(&self, index: usize) -> Result<(SegmentHeader, &str), IngestError>;
}

/// Segment parser over the full text of one `.nc` member.
#[derive(Debug, Clone)]
pub struct SegmentExtractor {
    text: String,
    positions: Vec<SegmentBounds>,
}

impl SegmentExtractor {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let positions = create_segments(&text);
        Self { text, positions }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Full member text the bounds refer to.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bounds(&self) -> &[SegmentBounds] {
        &self.positions
    }

    pub fn header(&self, index: usize) -> Result<SegmentHeader, IngestError> {
        Ok(parse_header(self.bounds_at(index)?.header(&self.text)))
    }

    /// Raw body between `<TEXT>` and `</TEXT>`, markup untouched.
    pub fn html(&self, index: usize) -> Result<&str, IngestError> {
        Ok(self.bounds_at(index)?.body(&self.text))
    }

    /// Whether the body contains both an opening and a closing table tag.
    pub fn has_tables(&self, index: usize) -> Result<bool, IngestError> {
        Ok(contains_table_markup(self.html(index)?))
    }

    fn bounds_at(&self, index: usize) -> Result<&SegmentBounds, IngestError> {
        self.positions
            .get(index)
            .ok_or(IngestError::SegmentOutOfRange {
                index,
                len: self.positions.len(),
            })
    }
}

impl SegmentSource for SegmentExtractor {
    fn len(&self) -> usize {
        SegmentExtractor::len(self)
    }

    fn segment(&self, index: usize) -> Result<(SegmentHeader, &str), IngestError> {
        Ok((self.header(index)?, self.html(index)?))
    }
}

pub(crate) fn contains_table_markup(html: &str) -> bool {
    let lowered = html.to_ascii_lowercase();
    lowered.contains("<table") && lowered.contains("</table")
}

/// Python-style slice: out-of-range ends clamp, inverted ranges are empty.
fn slice(text: &str, start: usize, end: usize) -> &str {
    let end = end.min(text.len());
    if start >= end {
        return "";
    }
    // Marker positions are ASCII boundaries, so this never splits a char.
    text.get(start..end).unwrap_or("")
}
