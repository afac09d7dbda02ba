use std::collections::HashMap;

use canonical::hash_text;

use crate::error::AnchorError;
use crate::record::{AnchorKind, AnchorRecord};
use crate::sentence::{context_after, context_before};

/// Canonical text of one segment plus its ordered anchors.
///
/// Built once by [`build_anchors`](crate::build_anchors) or
/// [`load_canonical_bundle`](crate::load_canonical_bundle) and read-only
/// afterwards.
#[derive(Debug, Clone)]
pub struct CanonicalDocument {
    pub source_id: String,
    text: String,
    anchors: Vec<AnchorRecord>,
    index: HashMap<String, usize>,
}

impl PartialEq for CanonicalDocument {
    fn eq(&self, other: &Self) -> bool {
        self.source_id == other.source_id && self.text == other.text && self.anchors == other.anchors
    }
}

impl Eq for CanonicalDocument {}

impl CanonicalDocument {
    /// Assemble a document, checking that every anchor span is non-empty,
    /// inside the text and on char boundaries.
    pub fn from_parts(
        source_id: impl Into<String>,
        text: impl Into<String>,
        anchors: Vec<AnchorRecord>,
    ) -> Result<Self, AnchorError> {
        let text = text.into();
        for anchor in &anchors {
            check_bounds(&text, &anchor.anchor_id, anchor.start, anchor.end)?;
        }
        let index = anchors
            .iter()
            .enumerate()
            .map(|(idx, anchor)| (anchor.anchor_id.clone(), idx))
            .collect();
        Ok(Self {
            source_id: source_id.into(),
            text,
            anchors,
            index,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the canonical text in bytes.
    pub fn canonical_length(&self) -> usize {
        self.text.len()
    }

    pub fn anchors(&self) -> &[AnchorRecord] {
        &self.anchors
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn get(&self, anchor_id: &str) -> Option<&AnchorRecord> {
        self.index.get(anchor_id).map(|&idx| &self.anchors[idx])
    }

    /// Text covered by `anchor`.
    pub fn snippet(&self, anchor: &AnchorRecord) -> &str {
        self.text.get(anchor.start..anchor.end).unwrap_or("")
    }

    /// Snippet of the anchor with id `anchor_id`.
    pub fn snippet_by_id(&self, anchor_id: &str) -> Result<&str, AnchorError> {
        self.get(anchor_id)
            .map(|anchor| self.snippet(anchor))
            .ok_or_else(|| AnchorError::unknown(anchor_id))
    }

    pub fn iter_kind(&self, kind: AnchorKind) -> impl Iterator<Item = &AnchorRecord> {
        self.anchors.iter().filter(move |anchor| anchor.kind == kind)
    }

    /// Sentence-level anchors in document order.
    pub fn sentence_anchors(&self) -> impl Iterator<Item = &AnchorRecord> {
        self.anchors.iter().filter(|anchor| anchor.kind.is_sentence_level())
    }

    /// Ids of the anchors a plan must cover, in order.
    pub fn sentence_ids(&self) -> Vec<String> {
        self.sentence_anchors()
            .map(|anchor| anchor.anchor_id.clone())
            .collect()
    }

    /// Recompute checksums and context hashes against the stored text and
    /// describe every mismatch. Empty means no drift.
    ///
    /// `context_window` must be the value the anchors were built with.
    pub fn verify(&self, context_window: usize) -> Vec<String> {
        let mut problems = Vec::new();
        for anchor in &self.anchors {
            if hash_text(self.snippet(anchor)) != anchor.checksum {
                problems.push(format!("anchor {} checksum mismatch", anchor.anchor_id));
            }
            let pre = context_before(&self.text, anchor.start, context_window);
            if hash_text(pre) != anchor.context_pre {
                problems.push(format!(
                    "anchor {} preceding context changed",
                    anchor.anchor_id
                ));
            }
            let post = context_after(&self.text, anchor.end, context_window);
            if hash_text(post) != anchor.context_post {
                problems.push(format!(
                    "anchor {} following context changed",
                    anchor.anchor_id
                ));
            }
        }
        problems
    }
}

pub(crate) fn check_bounds(
    text: &str,
    anchor_id: &str,
    start: usize,
    end: usize,
) -> Result<(), AnchorError> {
    let valid = start < end
        && end <= text.len()
        && text.is_char_boundary(start)
        && text.is_char_boundary(end);
    if valid {
        Ok(())
    } else {
        Err(AnchorError::SpanOutOfBounds {
            anchor_id: anchor_id.to_string(),
            start,
            end,
            len: text.len(),
        })
    }
}
