use std::time::Instant;

use canonical::{hash_text, CanonicalizationResult, SourceSpan, TableKind, TableRegion};
use tracing::{info, Level};

use crate::config::AnchorConfig;
use crate::document::{check_bounds, CanonicalDocument};
use crate::error::AnchorError;
use crate::record::{ordinal_id, AnchorKind, AnchorRecord, CellAttributes};
use crate::sentence::{
    chunk_spans, context_after, context_before, is_definition, is_filler, is_heading,
    paragraph_spans, split_sentences,
};

/// Build the full anchor set for one canonicalized segment.
///
/// Paragraphs become `p`/`h` anchors, their sentences `s` anchors (shared
/// ordinal for sentences and definitions), data-table cells `t..r..c..`
/// anchors and, when [`AnchorConfig::chunk_chars`] is set, long paragraphs
/// also get `c` anchors. The result is sorted, linked and bounds-checked.
///
/// ```rust
/// use anchor::{build_anchors, AnchorConfig, AnchorKind};
/// use canonical::{canonicalize, CanonicalizeConfig};
///
/// let result = canonicalize(
///     "doc-1",
///     "<h2>RISK FACTORS</h2><p>Demand may fall. Costs may rise.</p>",
///     &CanonicalizeConfig::default(),
/// ).unwrap();
/// let doc = build_anchors(&result, &AnchorConfig::default()).unwrap();
///
/// assert_eq!(doc.sentence_ids(), vec!["s000001", "s000002", "s000003"]);
/// assert_eq!(doc.get("h000001").unwrap().kind, AnchorKind::Heading);
/// assert_eq!(doc.snippet_by_id("s000003").unwrap(), "Costs may rise.");
/// ```
pub fn build_anchors(
    result: &CanonicalizationResult,
    cfg: &AnchorConfig,
) -> Result<CanonicalDocument, AnchorError> {
    cfg.validate()?;
    let start = Instant::now();
    let span = tracing::span!(Level::DEBUG, "anchor.build", source_id = %result.source_id);
    let _guard = span.enter();

    let text = result.text.as_str();
    if text.trim().is_empty() {
        return Err(AnchorError::EmptyDocument {
            source_id: result.source_id.clone(),
        });
    }

    let mut builder = Builder::new(text, cfg);
    let data_tables: Vec<&TableRegion> = result
        .tables
        .iter()
        .filter(|table| table.kind == TableKind::Data)
        .collect();

    for (p_start, p_end) in paragraph_spans(text) {
        let in_table = data_tables
            .iter()
            .any(|table| table.start < p_end && p_start < table.end);
        builder.paragraph(p_start, p_end, in_table)?;
    }
    for table in &data_tables {
        builder.table_cells(table)?;
    }

    let anchors = builder.finish();
    let sentence_count = anchors
        .iter()
        .filter(|anchor| anchor.kind.is_sentence_level())
        .count();
    let doc = CanonicalDocument::from_parts(result.source_id.clone(), text, anchors)?;

    info!(
        source_id = %result.source_id,
        canonical_len = text.len(),
        anchors = doc.len(),
        sentences = sentence_count,
        elapsed_micros = start.elapsed().as_micros(),
        "anchors_built"
    );
    Ok(doc)
}

/// Merged provenance runs for `anchor`, via the result it was built from.
pub fn anchor_source_spans(
    result: &CanonicalizationResult,
    anchor: &AnchorRecord,
) -> Vec<SourceSpan> {
    result.source_spans(anchor.start, anchor.end)
}

struct Builder<'a> {
    text: &'a str,
    cfg: &'a AnchorConfig,
    anchors: Vec<AnchorRecord>,
    sentences: usize,
    paragraphs: usize,
    headings: usize,
    chunks: usize,
}

impl<'a> Builder<'a> {
    fn new(text: &'a str, cfg: &'a AnchorConfig) -> Self {
        Self {
            text,
            cfg,
            anchors: Vec::new(),
            sentences: 0,
            paragraphs: 0,
            headings: 0,
            chunks: 0,
        }
    }

    fn paragraph(&mut self, start: usize, end: usize, in_table: bool) -> Result<(), AnchorError> {
        let body = &self.text[start..end];
        if !in_table && is_heading(body, self.cfg.heading_max_chars) {
            self.headings += 1;
            self.push(ordinal_id('h', self.headings), AnchorKind::Heading, start, end, None)?;
        } else {
            self.paragraphs += 1;
            self.push(ordinal_id('p', self.paragraphs), AnchorKind::Paragraph, start, end, None)?;
        }

        if !in_table {
            for (s, e) in split_sentences(body) {
                let snippet = &body[s..e];
                if is_filler(snippet) {
                    continue;
                }
                self.sentences += 1;
                let kind = if is_definition(snippet) {
                    AnchorKind::Definition
                } else {
                    AnchorKind::Sentence
                };
                self.push(ordinal_id('s', self.sentences), kind, start + s, start + e, None)?;
            }
        }

        if let Some(limit) = self.cfg.chunk_chars {
            if body.chars().count() > limit {
                let search = self.cfg.chunk_boundary_search;
                for (s, e) in chunk_spans(self.text, start, end, limit, search) {
                    self.chunks += 1;
                    self.push(ordinal_id('c', self.chunks), AnchorKind::Chunk, s, e, None)?;
                }
            }
        }
        Ok(())
    }

    fn table_cells(&mut self, table: &TableRegion) -> Result<(), AnchorError> {
        for cell in &table.cells {
            let attrs = CellAttributes {
                table_index: table.table_index,
                row_index: cell.row,
                col_index: cell.col,
                row_header: cell.row_header.clone().filter(|h| !h.is_empty()),
                col_header: cell.col_header.clone().filter(|h| !h.is_empty()),
            };
            let id = attrs.anchor_id();
            self.push(id, AnchorKind::TableCell, cell.start, cell.end, Some(attrs))?;
        }
        Ok(())
    }

    fn push(
        &mut self,
        anchor_id: String,
        kind: AnchorKind,
        start: usize,
        end: usize,
        cell: Option<CellAttributes>,
    ) -> Result<(), AnchorError> {
        check_bounds(self.text, &anchor_id, start, end)?;
        let window = self.cfg.context_window;
        self.anchors.push(AnchorRecord {
            anchor_id,
            kind,
            start,
            end,
            checksum: hash_text(&self.text[start..end]),
            context_pre: hash_text(context_before(self.text, start, window)),
            context_post: hash_text(context_after(self.text, end, window)),
            prev_id: None,
            next_id: None,
            parent_heading: None,
            cell,
        });
        Ok(())
    }

    /// Sort, then link neighbours and parent headings in that order.
    fn finish(mut self) -> Vec<AnchorRecord> {
        self.anchors
            .sort_by_key(|anchor| (anchor.start, anchor.kind.sort_rank()));

        let ids: Vec<String> = self.anchors.iter().map(|a| a.anchor_id.clone()).collect();
        let mut heading: Option<String> = None;
        for (idx, anchor) in self.anchors.iter_mut().enumerate() {
            anchor.prev_id = idx.checked_sub(1).map(|prev| ids[prev].clone());
            anchor.next_id = ids.get(idx + 1).cloned();
            if anchor.kind == AnchorKind::Heading {
                heading = Some(anchor.anchor_id.clone());
            } else {
                anchor.parent_heading = heading.clone();
            }
        }
        self.anchors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use canonical::{canonicalize, CanonicalizeConfig};

    fn doc_for(html: &str) -> (CanonicalizationResult, CanonicalDocument) {
        let result = canonicalize("seg-test", html, &CanonicalizeConfig::default())
            .expect("canonicalize");
        let doc = build_anchors(&result, &AnchorConfig::default()).expect("anchors");
        (result, doc)
    }

    #[test]
    fn headings_paragraphs_and_sentences() {
        let (_, doc) = doc_for(
            "<p>RISK FACTORS</p>\
             <p>Our business is subject to risks. Demand may decline.</p>",
        );
        let kinds: Vec<(&str, AnchorKind)> = doc
            .anchors()
            .iter()
            .map(|a| (a.anchor_id.as_str(), a.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("h000001", AnchorKind::Heading),
                ("s000001", AnchorKind::Sentence),
                ("p000001", AnchorKind::Paragraph),
                ("s000002", AnchorKind::Sentence),
                ("s000003", AnchorKind::Sentence),
            ]
        );
        assert_eq!(doc.snippet_by_id("s000001").expect("s1"), "RISK FACTORS");
        assert_eq!(doc.get("h000001").expect("h1").parent_heading, None);
        assert_eq!(
            doc.get("s000003").expect("s3").parent_heading.as_deref(),
            Some("h000001")
        );
    }

    #[test]
    fn neighbours_link_across_kinds() {
        let (_, doc) = doc_for("<p>One. Two.</p>");
        let anchors = doc.anchors();
        assert_eq!(anchors[0].anchor_id, "p000001");
        assert_eq!(anchors[0].prev_id, None);
        assert_eq!(anchors[0].next_id.as_deref(), Some("s000001"));
        assert_eq!(anchors[1].prev_id.as_deref(), Some("p000001"));
        assert_eq!(anchors.last().and_then(|a| a.next_id.clone()), None);
    }

    #[test]
    fn definitions_share_sentence_ordinals() {
        let (_, doc) = doc_for(
            "<p>\u{201c}Applicable Rate\u{201d} means 2.50% per annum. Interest accrues daily.</p>",
        );
        let sentence_level: Vec<(&str, AnchorKind)> = doc
            .sentence_anchors()
            .map(|a| (a.anchor_id.as_str(), a.kind))
            .collect();
        assert_eq!(
            sentence_level,
            vec![
                ("s000001", AnchorKind::Definition),
                ("s000002", AnchorKind::Sentence)
            ]
        );
    }

    #[test]
    fn data_table_cells_are_anchored_without_sentences() {
        let (result, doc) = doc_for(
            "<p>Segment results.</p>\
             <table><tr><th>Segment</th><th>2023</th><th>2022</th></tr>\
             <tr><td>Americas</td><td>162.6</td><td>169.7</td></tr></table>",
        );
        let cell = doc.get("t01r01c01").expect("cell");
        assert_eq!(doc.snippet(cell), "162.6");
        let attrs = cell.cell.as_ref().expect("attributes");
        assert_eq!(attrs.row_header.as_deref(), Some("Americas"));
        assert_eq!(attrs.col_header.as_deref(), Some("2023"));

        assert_eq!(doc.sentence_ids(), vec!["s000001"]);
        assert_eq!(doc.iter_kind(AnchorKind::Paragraph).count(), 2);

        let spans = anchor_source_spans(&result, cell);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].source_id, "seg-test");
    }

    #[test]
    fn anchors_sorted_and_in_bounds() {
        let (_, doc) = doc_for(
            "<h1>OVERVIEW</h1><p>Alpha. Beta.</p>\
             <table><tr><td>Item</td><td>Q1</td><td>Q2</td></tr>\
             <tr><td>Units</td><td>5</td><td>7</td></tr></table><p>Gamma.</p>",
        );
        let anchors = doc.anchors();
        for pair in anchors.windows(2) {
            assert!(
                (pair[0].start, pair[0].kind.sort_rank()) <= (pair[1].start, pair[1].kind.sort_rank())
            );
        }
        for anchor in anchors {
            assert!(anchor.start < anchor.end && anchor.end <= doc.canonical_length());
        }
        let sentences: Vec<&AnchorRecord> = doc.sentence_anchors().collect();
        for pair in sentences.windows(2) {
            assert!(pair[0].end <= pair[1].start, "sentence anchors overlap");
        }
    }

    #[test]
    fn every_non_whitespace_char_is_covered() {
        let (_, doc) = doc_for(
            "<p>Net sales rose 3.5%. Mr. Smith resigned!</p><p>NOTE 1:</p><p>. . . .</p>",
        );
        let text = doc.text();
        for (pos, ch) in text.char_indices() {
            if ch.is_whitespace() {
                continue;
            }
            assert!(
                doc.anchors().iter().any(|a| a.start <= pos && pos < a.end),
                "char {ch:?} at {pos} not covered"
            );
        }
        // Dot leaders are covered by their paragraph but never by a sentence.
        assert!(doc.sentence_anchors().all(|a| !is_filler(doc.snippet(a))));
    }

    #[test]
    fn chunk_anchors_are_opt_in() {
        let words = "lorem ipsum dolor sit amet ".repeat(20);
        let html = format!("<p>{words}</p>");
        let result =
            canonicalize("seg", &html, &CanonicalizeConfig::default()).expect("canonicalize");

        let plain = build_anchors(&result, &AnchorConfig::default()).expect("anchors");
        assert_eq!(plain.iter_kind(AnchorKind::Chunk).count(), 0);

        let cfg = AnchorConfig {
            chunk_chars: Some(100),
            ..Default::default()
        };
        let chunked = build_anchors(&result, &cfg).expect("anchors");
        let chunks: Vec<&AnchorRecord> = chunked.iter_kind(AnchorKind::Chunk).collect();
        assert!(chunks.len() >= 5);
        assert_eq!(chunks[0].anchor_id, "c000001");
        assert!(chunked.snippet(chunks[0]).ends_with(|c: char| !c.is_whitespace()));
    }

    #[test]
    fn empty_document_rejected() {
        let result = canonicalize(
            "seg-empty",
            "<script>x()</script>",
            &CanonicalizeConfig::default(),
        )
        .expect("canonicalize");
        let err = build_anchors(&result, &AnchorConfig::default()).expect_err("empty");
        assert_eq!(
            err,
            AnchorError::EmptyDocument {
                source_id: "seg-empty".into()
            }
        );
    }

    #[test]
    fn verify_reports_no_drift_for_fresh_document() {
        let (_, doc) = doc_for("<p>Stable text. More text.</p>");
        assert!(doc.verify(AnchorConfig::default().context_window).is_empty());
    }
}
