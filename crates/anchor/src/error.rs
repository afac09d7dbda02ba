use thiserror::Error;

/// Errors from anchor building, bundle I/O and prompt-view rendering.
///
/// All payloads are owned strings and integers so the enum stays
/// `Clone + PartialEq` for direct comparison in tests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnchorError {
    /// Canonical text had nothing to anchor.
    #[error("document {source_id} has no textual content to anchor")]
    EmptyDocument { source_id: String },

    /// An anchor span is empty, past the end of the text or not on a char
    /// boundary.
    #[error("anchor {anchor_id} span {start}..{end} is out of bounds for text of {len} bytes")]
    SpanOutOfBounds {
        anchor_id: String,
        start: usize,
        end: usize,
        len: usize,
    },

    /// A citable anchor resolved to whitespace only.
    #[error("anchor {anchor_id} has empty snippet")]
    EmptySnippet { anchor_id: String },

    #[error("bundle directory {path} already exists")]
    BundleExists { path: String },

    #[error("i/o error on {path}: {message}")]
    Io { path: String, message: String },

    /// A line of `anchors.tsv` could not be parsed.
    #[error("malformed anchors row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("no sentence anchors found in {path}")]
    NoSentenceAnchors { path: String },

    #[error("anchor {anchor_id} not found")]
    UnknownAnchor { anchor_id: String },

    #[error("invalid anchor config: {0}")]
    InvalidConfig(String),
}

impl AnchorError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        AnchorError::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn unknown(anchor_id: impl Into<String>) -> Self {
        AnchorError::UnknownAnchor {
            anchor_id: anchor_id.into(),
        }
    }
}
