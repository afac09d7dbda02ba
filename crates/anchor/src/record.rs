use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What an anchor addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    Sentence,
    Definition,
    Paragraph,
    Heading,
    TableCell,
    Chunk,
}

impl AnchorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorKind::Sentence => "sentence",
            AnchorKind::Definition => "definition",
            AnchorKind::Paragraph => "paragraph",
            AnchorKind::Heading => "heading",
            AnchorKind::TableCell => "table_cell",
            AnchorKind::Chunk => "chunk",
        }
    }

    /// Sentence and definition anchors: the ones plans must cover.
    pub fn is_sentence_level(&self) -> bool {
        matches!(self, AnchorKind::Sentence | AnchorKind::Definition)
    }

    /// Kinds that appear in the prompt view and may be cited.
    pub fn is_citable(&self) -> bool {
        self.is_sentence_level() || *self == AnchorKind::TableCell
    }

    /// Tie-break among anchors sharing a start offset: structure first, then
    /// sentences, cells and chunks.
    pub(crate) fn sort_rank(&self) -> u8 {
        match self {
            AnchorKind::Heading | AnchorKind::Paragraph => 0,
            AnchorKind::Sentence | AnchorKind::Definition => 1,
            AnchorKind::TableCell => 2,
            AnchorKind::Chunk => 3,
        }
    }
}

impl fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnchorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sentence" => Ok(AnchorKind::Sentence),
            "definition" => Ok(AnchorKind::Definition),
            "paragraph" => Ok(AnchorKind::Paragraph),
            "heading" => Ok(AnchorKind::Heading),
            "table_cell" => Ok(AnchorKind::TableCell),
            "chunk" => Ok(AnchorKind::Chunk),
            other => Err(format!("unknown anchor kind {other:?}")),
        }
    }
}

/// Position of a table-cell anchor within its table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellAttributes {
    pub table_index: usize,
    pub row_index: usize,
    pub col_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col_header: Option<String>,
}

impl CellAttributes {
    /// `t{table:02}r{row:02}c{col:02}`, e.g. `t10r02c03`.
    pub fn anchor_id(&self) -> String {
        format!(
            "t{:02}r{:02}c{:02}",
            self.table_index, self.row_index, self.col_index
        )
    }
}

/// One addressable span of canonical text.
///
/// Offsets are UTF-8 byte offsets into the canonical text, half-open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub anchor_id: String,
    pub kind: AnchorKind,
    pub start: usize,
    pub end: usize,
    /// SHA-256 hex of `text[start..end]`.
    pub checksum: String,
    /// SHA-256 hex of the context window before the span.
    pub context_pre: String,
    /// SHA-256 hex of the context window after the span.
    pub context_post: String,
    pub prev_id: Option<String>,
    pub next_id: Option<String>,
    pub parent_heading: Option<String>,
    /// Present on table cells only.
    pub cell: Option<CellAttributes>,
}

impl AnchorRecord {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// The `attributes_json` column: `{}` for anchors without cell data.
    pub fn attributes_json(&self) -> String {
        match &self.cell {
            Some(cell) => serde_json::to_string(cell).unwrap_or_else(|_| "{}".to_string()),
            None => "{}".to_string(),
        }
    }
}

/// Format an ordinal anchor id: `prefix` followed by six zero-padded digits.
pub(crate) fn ordinal_id(prefix: char, ordinal: usize) -> String {
    format!("{prefix}{ordinal:06}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            AnchorKind::Sentence,
            AnchorKind::Definition,
            AnchorKind::Paragraph,
            AnchorKind::Heading,
            AnchorKind::TableCell,
            AnchorKind::Chunk,
        ] {
            assert_eq!(kind.as_str().parse::<AnchorKind>(), Ok(kind));
        }
        assert!("cell".parse::<AnchorKind>().is_err());
    }

    #[test]
    fn cell_ids_are_zero_padded() {
        let cell = CellAttributes {
            table_index: 10,
            row_index: 2,
            col_index: 3,
            row_header: None,
            col_header: None,
        };
        assert_eq!(cell.anchor_id(), "t10r02c03");
        assert_eq!(ordinal_id('s', 42), "s000042");
    }

    #[test]
    fn attributes_json_is_compact() {
        let record = AnchorRecord {
            anchor_id: "t01r01c02".into(),
            kind: AnchorKind::TableCell,
            start: 0,
            end: 2,
            checksum: String::new(),
            context_pre: String::new(),
            context_post: String::new(),
            prev_id: None,
            next_id: None,
            parent_heading: None,
            cell: Some(CellAttributes {
                table_index: 1,
                row_index: 1,
                col_index: 2,
                row_header: Some("Sales".into()),
                col_header: None,
            }),
        };
        assert_eq!(
            record.attributes_json(),
            r#"{"table_index":1,"row_index":1,"col_index":2,"row_header":"Sales"}"#
        );
    }
}
