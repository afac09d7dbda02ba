//! Anchor layer for canonical filing text.
//!
//! Takes a [`canonical::CanonicalizationResult`] and assigns stable,
//! verifiable IDs to its headings, paragraphs, sentences, definitions and
//! data-table cells. Anchors are what downstream plans and model answers
//! cite, so their IDs, offsets and hashes are fully deterministic.
//!
//! ## ID scheme
//!
//! | Kind | ID | Notes |
//! |---|---|---|
//! | sentence / definition | `s000001` | one shared counter |
//! | paragraph | `p000001` | |
//! | heading | `h000001` | also split into sentences |
//! | table cell | `t01r02c03` | table, row, column |
//! | chunk | `c000001` | only with `chunk_chars` set |
//!
//! Offsets are UTF-8 byte offsets into the canonical text. Each anchor
//! carries the SHA-256 of its span and of the 80 chars around it, so a
//! stored bundle can be checked for drift with [`CanonicalDocument::verify`].
//!
//! ## On disk
//!
//! - [`write_canonical_bundle`] / [`load_canonical_bundle`]:
//!   `canonical.txt` + `anchors.tsv`
//! - [`render_prompt_view`] / [`write_prompt_view`]: `prompt_view.txt`,
//!   parsed back with [`PromptView`]

mod builder;
mod bundle;
mod config;
mod document;
mod error;
mod prompt_view;
mod record;
mod sentence;

pub use crate::builder::{anchor_source_spans, build_anchors};
pub use crate::bundle::{
    anchors_path, load_canonical_bundle, load_sentence_anchor_ids, load_sentence_anchors,
    parse_anchors_tsv, read_anchors_tsv, render_anchors_tsv, write_canonical_bundle,
    ANCHORS_FILE, ANCHORS_HEADER, CANONICAL_FILE,
};
pub use crate::config::AnchorConfig;
pub use crate::document::CanonicalDocument;
pub use crate::error::AnchorError;
pub use crate::prompt_view::{
    render_prompt_view, write_prompt_view, PromptEntry, PromptView, SnippetSelection,
    PROMPT_VIEW_FILE,
};
pub use crate::record::{AnchorKind, AnchorRecord, CellAttributes};
pub use crate::sentence::{is_definition, is_heading, paragraph_spans, split_sentences};

#[cfg(test)]
mod tests {
    use super::*;

    use canonical::{canonicalize, CanonicalizeConfig};
    use tempfile::TempDir;

    #[test]
    fn bundle_and_prompt_view_agree_on_sentence_ids() {
        let html = "<h2>ITEM 7 OVERVIEW</h2>\
                    <p>Revenue rose 4% to $12.1 billion. Margins held steady.</p>\
                    <p>\u{201c}Free Cash Flow\u{201d} means cash from operations less capex.</p>";
        let result =
            canonicalize("seg-0001", html, &CanonicalizeConfig::default()).expect("canonicalize");
        let doc = build_anchors(&result, &AnchorConfig::default()).expect("anchors");

        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join("seg-0001");
        write_canonical_bundle(&doc, &dir).expect("bundle");
        let view_text = render_prompt_view(&doc).expect("prompt view");
        write_prompt_view(&view_text, &dir).expect("write view");

        let ids = load_sentence_anchor_ids(&anchors_path(&dir)).expect("ids");
        let view = PromptView::load(&dir.join(PROMPT_VIEW_FILE)).expect("load view");
        assert_eq!(ids, view.anchor_order);
        assert_eq!(
            doc.get("s000004").map(|a| a.kind),
            Some(AnchorKind::Definition)
        );
    }
}
