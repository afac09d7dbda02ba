//! Output types of the canonicalizer.
//!
//! A [`CanonicalizationResult`] carries the canonical text together with a
//! provenance pointer for every character and the table regions the scanner
//! rendered, so later stages never re-parse markup.
//!
//! # Structure
//!
//! ```text
//! CanonicalizationResult
//! ├── source_id: String                    # caller-supplied segment identity
//! ├── text: String                         # canonical text
//! ├── char_sources: Vec<Option<CharSource>> # one entry per char of `text`
//! ├── tables: Vec<TableRegion>             # rendered tables, byte ranges
//! ├── sha256_hex: String                   # identity hash (version-aware)
//! └── canonical_version: u32               # config version used
//! ```
//!
//! # Offsets
//!
//! `CharSource` ranges are byte offsets into the raw input. Table regions
//! and every offset handed to the anchor layer are byte offsets into
//! `text`. `char_sources` is indexed by character, so
//! `text.chars().count() == char_sources.len()` always holds.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Back-reference from one canonical character to the raw input.
///
/// Decoded entities point every produced character at the whole entity.
/// Characters inserted by the scanner (paragraph breaks, `<br>` newlines,
/// table pipes) carry no source at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharSource {
    pub start: usize,
    pub end: usize,
}

/// A merged run of contiguous provenance for a span of canonical text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub source_id: String,
    pub start: usize,
    pub end: usize,
}

/// How a table grid was classified before rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Numeric grid with at least three columns, rendered as Markdown.
    Data,
    /// Table used for page layout, rendered as `label: value` lines.
    LayoutProse,
    /// No rows survived parsing.
    #[default]
    Empty,
    /// Neither clearly data nor layout; rendered like layout.
    Unknown,
    /// Fixed-width `<TAG>value` schedule without row markup.
    TagTable,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Data => "data",
            TableKind::LayoutProse => "layout_prose",
            TableKind::Empty => "empty",
            TableKind::Unknown => "unknown",
            TableKind::TagTable => "tag_table",
        }
    }

    /// Whether the rendered table is a Markdown grid that must stay atomic.
    pub fn is_grid(&self) -> bool {
        matches!(self, TableKind::Data | TableKind::TagTable)
    }
}

/// Byte range of one data-table cell inside the canonical text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCellSpan {
    pub row: usize,
    pub col: usize,
    pub start: usize,
    pub end: usize,
    pub row_header: Option<String>,
    pub col_header: Option<String>,
}

/// A rendered table inside the canonical text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRegion {
    /// Ordinal of the table in the segment, counting every `<table>` seen.
    pub table_index: usize,
    pub kind: TableKind,
    pub start: usize,
    pub end: usize,
    /// Citable cells. Only populated for [`TableKind::Data`].
    pub cells: Vec<TableCellSpan>,
}

/// The canonical representation of one segment.
///
/// Immutable once built. Derived lookup structures are computed lazily on
/// first use and memoized inside the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalizationResult {
    pub source_id: String,
    pub text: String,
    pub char_sources: Vec<Option<CharSource>>,
    pub tables: Vec<TableRegion>,
    pub sha256_hex: String,
    pub canonical_version: u32,
    #[serde(skip)]
    char_offsets: OnceLock<Vec<usize>>,
}

impl PartialEq for CanonicalizationResult {
    fn eq(&self, other: &Self) -> bool {
        self.source_id == other.source_id
            && self.text == other.text
            && self.char_sources == other.char_sources
            && self.tables == other.tables
            && self.sha256_hex == other.sha256_hex
            && self.canonical_version == other.canonical_version
    }
}

impl Eq for CanonicalizationResult {}

impl CanonicalizationResult {
    pub(crate) fn new(
        source_id: String,
        text: String,
        char_sources: Vec<Option<CharSource>>,
        tables: Vec<TableRegion>,
        sha256_hex: String,
        canonical_version: u32,
    ) -> Self {
        Self {
            source_id,
            text,
            char_sources,
            tables,
            sha256_hex,
            canonical_version,
            char_offsets: OnceLock::new(),
        }
    }

    /// Number of characters in the canonical text.
    pub fn char_len(&self) -> usize {
        self.char_sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Byte offset of every character of `text`, computed once.
    pub fn char_offsets(&self) -> &[usize] {
        self.char_offsets
            .get_or_init(|| self.text.char_indices().map(|(idx, _)| idx).collect())
    }

    /// Map a byte offset on a character boundary to a character index.
    ///
    /// `text.len()` maps to the character count. Offsets inside a multi-byte
    /// character return `None`.
    pub fn char_index(&self, byte_offset: usize) -> Option<usize> {
        if byte_offset == self.text.len() {
            return Some(self.char_len());
        }
        self.char_offsets().binary_search(&byte_offset).ok()
    }

    /// Provenance pointers for the byte range `[start, end)` of `text`.
    pub fn sources_in(&self, start: usize, end: usize) -> &[Option<CharSource>] {
        match (self.char_index(start), self.char_index(end)) {
            (Some(first), Some(last)) if first <= last => &self.char_sources[first..last],
            _ => &[],
        }
    }

    /// Merge the provenance of `[start, end)` into contiguous raw ranges.
    ///
    /// Inserted characters are skipped; pointers that touch or overlap the
    /// running range extend it.
    pub fn source_spans(&self, start: usize, end: usize) -> Vec<SourceSpan> {
        let mut spans: Vec<SourceSpan> = Vec::new();
        for source in self.sources_in(start, end).iter().flatten() {
            match spans.last_mut() {
                Some(current) if source.start <= current.end && source.start >= current.start => {
                    current.end = current.end.max(source.end);
                }
                _ => spans.push(SourceSpan {
                    source_id: self.source_id.clone(),
                    start: source.start,
                    end: source.end,
                }),
            }
        }
        spans
    }
}
