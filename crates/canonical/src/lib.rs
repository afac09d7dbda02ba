//! Canonical text layer for EDGAR filing segments.
//!
//! Turns the HTML (or plain-text) body of one filing segment into a
//! deterministic canonical text stream, and remembers for every character
//! where in the raw body it came from.
//!
//! ## What we do
//!
//! - Strip markup in a single left-to-right scan (no DOM)
//! - Drop `script`, `style` and `noscript` content
//! - Turn block tags into one blank line and `<br>` into one newline
//! - Decode entities, fold smart punctuation, collapse whitespace
//! - Render tables: data grids as Markdown with per-cell spans, layout
//!   tables as `label: value` lines, `<TAG>value` schedules as two-column
//!   Markdown
//! - Versioned identity hash so you can tell which canonicalization was used
//!
//! ## Pure function guarantee
//!
//! No I/O, no clock-dependent output, no locale dependence. Same body and
//! same config give the same text, provenance and hash on any machine.
//!
//! ## Invariants worth knowing
//!
//! - `text.chars().count() == char_sources.len()`
//! - No `<` or `>` from tags survives in HTML mode
//! - Every `Some(CharSource)` points at raw bytes that produced the char
//! - Hash = SHA-256(version || 0x00 || canonical_text)

mod config;
mod document;
mod emit;
mod error;
mod guard;
mod hash;
mod pipeline;
mod punctuation;
mod table;
mod tags;
mod whitespace;

pub use crate::config::CanonicalizeConfig;
pub use crate::document::{
    CanonicalizationResult, CharSource, SourceSpan, TableCellSpan, TableKind, TableRegion,
};
pub use crate::error::CanonicalError;
pub use crate::guard::guard_machine_payload;
pub use crate::hash::{hash_canonical_bytes, hash_text};
pub use crate::pipeline::canonicalize;
pub use crate::punctuation::fold_punctuation;
pub use crate::table::is_placeholder_cell;
pub use crate::whitespace::collapse_whitespace;

#[cfg(test)]
mod tests {
    use super::*;

    fn html(raw: &str) -> CanonicalizationResult {
        canonicalize("doc-test", raw, &CanonicalizeConfig::default())
            .expect("canonicalization succeeds")
    }

    fn plain(raw: &str) -> CanonicalizationResult {
        let cfg = CanonicalizeConfig {
            treat_as_html: false,
            ..Default::default()
        };
        canonicalize("doc-plain", raw, &cfg).expect("canonicalization succeeds")
    }

    #[test]
    fn basic_canonicalize_default() {
        let raw = "<p>Hello <b>world</b></p><p>Next&nbsp;para</p>";
        let out = html(raw);

        assert_eq!(out.text, "Hello world\n\nNext para");
        assert_eq!(out.source_id, "doc-test");
        assert_eq!(out.canonical_version, 1);
        assert_eq!(out.char_len(), out.text.chars().count());

        let expected_hash = hash_canonical_bytes(out.canonical_version, out.text.as_bytes());
        assert_eq!(out.sha256_hex, expected_hash);
    }

    #[test]
    fn line_breaks_and_case_insensitive_tags() {
        let out = html("line one<br>line two<BR/>three");
        assert_eq!(out.text, "line one\nline two\nthree");
    }

    #[test]
    fn script_and_style_content_dropped() {
        let raw = "<p>Keep</p><script>var x = '<p>no</p>';</script><style>p{color:red}</style>after";
        let out = html(raw);
        assert_eq!(out.text, "Keep\n\nafter");
        assert!(!out.text.contains("var"));
    }

    #[test]
    fn no_markup_survives() {
        let raw = "<div class=\"a\"><font size=2>Item&nbsp;1.</font> <i>Business</i></div><!-- c -->";
        let out = html(raw);
        assert_eq!(out.text, "Item 1. Business");
        assert!(!out.text.contains('<') && !out.text.contains('>'));
    }

    #[test]
    fn smart_punctuation_folded() {
        let out = html("<p>The \u{201c}Company\u{201d} \u{2014} it\u{2019}s&#8217;</p>");
        assert_eq!(out.text, "The \"Company\" - it's'");
    }

    #[test]
    fn provenance_points_at_producing_bytes() {
        let raw = "<p>Tom &amp; Jerry&#8217;s</p>";
        let out = html(raw);
        assert_eq!(out.text, "Tom & Jerry's");

        for (ch, source) in out.text.chars().zip(out.char_sources.iter()) {
            let source = source.expect("every char in this text has a source");
            let slice = &raw[source.start..source.end];
            if slice.starts_with('&') {
                assert!(slice.ends_with(';'), "entity span {slice:?} covers the whole entity");
            } else {
                let raw_char = slice.chars().next().expect("non-empty slice");
                assert_eq!(fold_punctuation(raw_char), Some(ch));
            }
        }

        let amp = out.text.find('&').expect("ampersand");
        let amp_idx = out.char_index(amp).expect("char boundary");
        let source = out.char_sources[amp_idx].expect("entity source");
        assert_eq!(&raw[source.start..source.end], "&amp;");
    }

    #[test]
    fn source_spans_merge_contiguous_runs() {
        let raw = "<p>alpha beta</p><p>gamma</p>";
        let out = html(raw);
        let spans = out.source_spans(0, out.text.len());
        assert_eq!(spans.len(), 2);
        assert_eq!(&raw[spans[0].start..spans[0].end], "alpha beta");
        assert_eq!(&raw[spans[1].start..spans[1].end], "gamma");
    }

    #[test]
    fn trailing_and_leading_layout_trimmed() {
        let out = html("  <div>  Text  </div>  <p> </p> ");
        assert_eq!(out.text, "Text");
        assert_eq!(out.char_sources.len(), 4);
    }

    #[test]
    fn plain_text_keeps_hard_breaks() {
        let out = plain("Line one\r\nLine two\n\n\n\nNext   block  \n");
        assert_eq!(out.text, "Line one\nLine two\n\nNext block");
        assert_eq!(out.char_len(), out.text.chars().count());
    }

    #[test]
    fn plain_text_mode_does_not_decode_entities() {
        let out = plain("AT&amp;T <b>bold</b>");
        assert_eq!(out.text, "AT&amp;T <b>bold</b>");
    }

    #[test]
    fn canonical_text_is_plain_text_fixed_point() {
        let first = html("<h1>Title</h1><p>Body one.<br>Body two.</p><ul><li>x</li></ul>");
        let second = plain(&first.text);
        assert_eq!(first.text, second.text);
        let third = plain(&second.text);
        assert_eq!(second.text, third.text);
    }

    #[test]
    fn data_table_records_cell_spans() {
        let raw = "<p>Intro</p><table><tr><td>Item</td><td>2023</td><td>2022</td></tr>\
                   <tr><td>Sales</td><td>10</td><td>9</td></tr></table><p>After</p>";
        let out = html(raw);
        assert_eq!(
            out.text,
            "Intro\n\n| Item | 2023 | 2022 |\n| --- | --- | --- |\n| Sales | 10 | 9 |\n\nAfter"
        );
        assert_eq!(out.tables.len(), 1);
        let region = &out.tables[0];
        assert_eq!(region.kind, TableKind::Data);
        assert_eq!(region.table_index, 1);
        assert!(out.text[region.start..region.end].starts_with("| Item"));

        let cell = region
            .cells
            .iter()
            .find(|c| c.row == 1 && c.col == 1)
            .expect("cell r1c1");
        assert_eq!(&out.text[cell.start..cell.end], "10");
        assert_eq!(cell.row_header.as_deref(), Some("Sales"));
        assert_eq!(cell.col_header.as_deref(), Some("2023"));

        let spans = out.source_spans(cell.start, cell.end);
        assert_eq!(spans.len(), 1);
        assert_eq!(&raw[spans[0].start..spans[0].end], "10");
    }

    #[test]
    fn empty_data_cells_keep_single_spacing() {
        let out = html(
            "<table><tr><th>Item</th><th>2023</th><th>2022</th></tr>\
             <tr><td>Sales</td><td></td><td>9</td></tr>\
             <tr><td>Costs</td><td>&nbsp;</td><td>&#8212;</td></tr></table>",
        );
        assert_eq!(
            out.text,
            "| Item | 2023 | 2022 |\n| --- | --- | --- |\n| Sales | | 9 |\n| Costs | | |"
        );
        assert!(!out.text.contains("  "));
        assert_eq!(plain(&out.text).text, out.text);

        let nine = out.tables[0]
            .cells
            .iter()
            .find(|c| c.row == 1 && c.col == 2)
            .expect("cell r1c2");
        assert_eq!(&out.text[nine.start..nine.end], "9");
    }

    #[test]
    fn table_without_structure_falls_back_to_text() {
        let out = html("<table>Just a sentence in a table.</table><p>Next</p>");
        assert_eq!(out.text, "Just a sentence in a table.\n\nNext");
        assert!(out.tables.is_empty());
    }

    #[test]
    fn missing_source_id_rejected() {
        let res = canonicalize("  ", "content", &CanonicalizeConfig::default());
        assert!(matches!(res, Err(CanonicalError::MissingSourceId)));
    }

    #[test]
    fn invalid_config_version_rejected() {
        let cfg = CanonicalizeConfig {
            version: 0,
            ..Default::default()
        };
        let res = canonicalize("doc-invalid", "content", &cfg);
        assert!(matches!(res, Err(CanonicalError::InvalidConfig(_))));
    }

    #[test]
    fn empty_input_yields_empty_text() {
        let out = html("<script>only()</script>   ");
        assert!(out.is_empty());
        assert!(out.char_sources.is_empty());
    }

    #[test]
    fn canonical_hash_includes_version() {
        let cfg_v2 = CanonicalizeConfig {
            version: 2,
            ..CanonicalizeConfig::default()
        };
        let doc_v1 = html("Same text");
        let doc_v2 = canonicalize("doc-test", "Same text", &cfg_v2).expect("v2");
        assert_eq!(doc_v1.text, doc_v2.text);
        assert_ne!(doc_v1.sha256_hex, doc_v2.sha256_hex);
    }

    #[test]
    fn unicode_normalization_is_opt_in() {
        let decomposed = "Cafe\u{0301} \u{FB01}nance";
        let raw_out = html(decomposed);
        assert_eq!(raw_out.text, decomposed);

        let cfg = CanonicalizeConfig {
            normalize_unicode: true,
            ..Default::default()
        };
        let out = canonicalize("doc-nfkc", decomposed, &cfg).expect("nfkc");
        assert_eq!(out.text, "Cafe\u{0301} finance");
        assert_eq!(out.char_len(), out.text.chars().count());
    }
}
