mod common;

use std::fs;

use canonical::{canonicalize, CanonicalizeConfig};
use filing_anchors::{process_archive, process_segment, PipelineConfig, TarSegmentReader};
use ingest::IngestConfig;
use tempfile::TempDir;

use common::{config_for, write_archive, MEMBER, SUBMISSION};

const BUNDLE: &str = "0000320193-23-000106.nc__seg0001";

#[test]
fn repeated_runs_write_identical_bundles() {
    let tmp = TempDir::new().expect("tempdir");
    let archive = write_archive(tmp.path(), &[(MEMBER, SUBMISSION)]);

    let first = tmp.path().join("a");
    let second = tmp.path().join("b");
    let manifest_a = process_archive(&config_for(&archive, &first)).expect("first run");
    let manifest_b = process_archive(&config_for(&archive, &second)).expect("second run");
    assert_eq!(manifest_a, manifest_b);

    for file in ["canonical.txt", "anchors.tsv", "prompt_view.txt"] {
        let a = fs::read(first.join(BUNDLE).join(file)).expect("read a");
        let b = fs::read(second.join(BUNDLE).join(file)).expect("read b");
        assert_eq!(a, b, "{file} differs between runs");
    }
}

#[test]
fn segment_processing_is_order_independent() {
    let tmp = TempDir::new().expect("tempdir");
    let archive = write_archive(tmp.path(), &[(MEMBER, SUBMISSION)]);
    let reader = TarSegmentReader::open(&archive, &IngestConfig::default()).expect("open");
    let segments: Vec<_> = reader.iter_segments(MEMBER).expect("segments").collect();
    let first = &segments[0];

    let config = PipelineConfig::default();
    let out_a = tmp.path().join("forward");
    let out_b = tmp.path().join("reverse");
    for seg in &segments {
        process_segment(seg, &config, &out_a).expect("forward");
    }
    for seg in segments.iter().rev() {
        process_segment(seg, &config, &out_b).expect("reverse");
    }

    let dir = first.key().dir_name();
    assert_eq!(
        fs::read_to_string(out_a.join(&dir).join("anchors.tsv")).expect("a"),
        fs::read_to_string(out_b.join(&dir).join("anchors.tsv")).expect("b"),
    );
}

#[test]
fn canonical_text_is_a_plain_text_fixed_point() {
    let html = "<h1>PART I</h1><p>Item 1.  Business &amp; Overview</p><p>We sell\nthings.<br>Many things.</p>";
    let first = canonicalize("doc", html, &CanonicalizeConfig::default()).expect("html");

    let plain = CanonicalizeConfig {
        treat_as_html: false,
        ..Default::default()
    };
    let second = canonicalize("doc", &first.text, &plain).expect("plain");
    let third = canonicalize("doc", &second.text, &plain).expect("plain again");

    assert_eq!(second.text, first.text);
    assert_eq!(third.text, second.text);
    assert_eq!(third.sha256_hex, first.sha256_hex);
}

#[test]
fn financial_tables_with_spacer_cells_are_fixed_points() {
    let html = "<p>CONSOLIDATED STATEMENTS OF OPERATIONS</p>\
        <table>\
        <tr><td>&nbsp;</td><td>&nbsp;</td><td>2023</td><td></td><td>2022</td></tr>\
        <tr><td>Net sales</td><td>$</td><td>383,285</td><td>$</td><td>394,328</td></tr>\
        <tr><td>Cost of sales</td><td>&nbsp;</td><td>214,137</td><td>&nbsp;</td><td>223,546</td></tr>\
        <tr><td>Restructuring</td><td></td><td>&#8212;</td><td></td><td>&mdash;</td></tr>\
        </table>\
        <table>\
        <tr><td>&#9632;</td><td>Our results may be affected by changes in global economic conditions and consumer demand.</td></tr>\
        <tr><td>&#9632;</td><td>&nbsp;</td></tr>\
        </table>\
        <p>Amounts in millions.</p>";
    let first = canonicalize("doc", html, &CanonicalizeConfig::default()).expect("html");
    assert!(!first.text.contains("  "), "double space in {:?}", first.text);
    assert!(!first.text.contains(" \n"), "trailing space in {:?}", first.text);
    assert!(first.text.contains("| Net sales | $ | 383,285 | $ | 394,328 |"));
    assert!(first.text.contains("| Restructuring | | | | |"));

    let plain = CanonicalizeConfig {
        treat_as_html: false,
        ..Default::default()
    };
    let second = canonicalize("doc", &first.text, &plain).expect("plain");
    assert_eq!(second.text, first.text);
    assert_eq!(second.sha256_hex, first.sha256_hex);
}
