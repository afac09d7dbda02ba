//! `canonical.txt` + `anchors.tsv` on disk.
//!
//! The TSV has a header row and one row per anchor in document order.
//! Missing links are empty cells; `attributes_json` is compact JSON and
//! `{}` for anchors without cell data. Fields never contain tabs or
//! newlines: ids and hashes are ASCII and JSON escapes control characters.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::document::CanonicalDocument;
use crate::error::AnchorError;
use crate::record::{AnchorKind, AnchorRecord, CellAttributes};

pub const CANONICAL_FILE: &str = "canonical.txt";
pub const ANCHORS_FILE: &str = "anchors.tsv";

pub const ANCHORS_HEADER: [&str; 11] = [
    "anchor_id",
    "kind",
    "start",
    "end",
    "checksum",
    "context_pre",
    "context_post",
    "prev_id",
    "next_id",
    "parent_heading",
    "attributes_json",
];

/// Write `doc` into a fresh directory `dir`.
///
/// Fails with [`AnchorError::BundleExists`] rather than overwriting an
/// earlier bundle.
pub fn write_canonical_bundle(doc: &CanonicalDocument, dir: &Path) -> Result<(), AnchorError> {
    if dir.exists() {
        return Err(AnchorError::BundleExists {
            path: dir.display().to_string(),
        });
    }
    if let Some(parent) = dir.parent() {
        fs::create_dir_all(parent).map_err(|err| AnchorError::io(parent, err))?;
    }
    fs::create_dir(dir).map_err(|err| match err.kind() {
        std::io::ErrorKind::AlreadyExists => AnchorError::BundleExists {
            path: dir.display().to_string(),
        },
        _ => AnchorError::io(dir, err),
    })?;

    let canonical_path = dir.join(CANONICAL_FILE);
    fs::write(&canonical_path, doc.text()).map_err(|err| AnchorError::io(&canonical_path, err))?;

    let anchors_path = dir.join(ANCHORS_FILE);
    fs::write(&anchors_path, render_anchors_tsv(doc.anchors()))
        .map_err(|err| AnchorError::io(&anchors_path, err))?;

    info!(
        source_id = %doc.source_id,
        dir = %dir.display(),
        anchors = doc.len(),
        "bundle_written"
    );
    Ok(())
}

/// Serialize anchors as `anchors.tsv` content.
pub fn render_anchors_tsv(anchors: &[AnchorRecord]) -> String {
    let mut out = ANCHORS_HEADER.join("\t");
    out.push('\n');
    for anchor in anchors {
        let start = anchor.start.to_string();
        let end = anchor.end.to_string();
        let attributes = anchor.attributes_json();
        let row = [
            anchor.anchor_id.as_str(),
            anchor.kind.as_str(),
            start.as_str(),
            end.as_str(),
            anchor.checksum.as_str(),
            anchor.context_pre.as_str(),
            anchor.context_post.as_str(),
            anchor.prev_id.as_deref().unwrap_or(""),
            anchor.next_id.as_deref().unwrap_or(""),
            anchor.parent_heading.as_deref().unwrap_or(""),
            attributes.as_str(),
        ];
        out.push_str(&row.join("\t"));
        out.push('\n');
    }
    out
}

/// Read a bundle written by [`write_canonical_bundle`].
///
/// The directory name becomes the document's `source_id`.
pub fn load_canonical_bundle(dir: &Path) -> Result<CanonicalDocument, AnchorError> {
    let canonical_path = dir.join(CANONICAL_FILE);
    let text =
        fs::read_to_string(&canonical_path).map_err(|err| AnchorError::io(&canonical_path, err))?;
    let anchors = read_anchors_tsv(&dir.join(ANCHORS_FILE))?;
    let source_id = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    debug!(dir = %dir.display(), anchors = anchors.len(), "bundle_loaded");
    CanonicalDocument::from_parts(source_id, text, anchors)
}

/// Parse every row of an `anchors.tsv` file.
pub fn read_anchors_tsv(path: &Path) -> Result<Vec<AnchorRecord>, AnchorError> {
    let content = fs::read_to_string(path).map_err(|err| AnchorError::io(path, err))?;
    parse_anchors_tsv(&content)
}

pub fn parse_anchors_tsv(content: &str) -> Result<Vec<AnchorRecord>, AnchorError> {
    let mut lines = content.lines().enumerate();
    match lines.next() {
        Some((_, header)) if header.split('\t').eq(ANCHORS_HEADER.iter().copied()) => {}
        Some(_) => {
            return Err(AnchorError::MalformedRow {
                line: 1,
                reason: "unexpected header".into(),
            })
        }
        None => return Ok(Vec::new()),
    }

    lines
        .filter(|(_, line)| !line.is_empty())
        .map(|(idx, line)| parse_row(idx + 1, line))
        .collect()
}

fn parse_row(line_no: usize, line: &str) -> Result<AnchorRecord, AnchorError> {
    let malformed = |reason: String| AnchorError::MalformedRow {
        line: line_no,
        reason,
    };
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != ANCHORS_HEADER.len() {
        return Err(malformed(format!(
            "expected {} fields, found {}",
            ANCHORS_HEADER.len(),
            fields.len()
        )));
    }

    let kind: AnchorKind = fields[1].parse().map_err(malformed)?;
    let offset = |raw: &str, name: &str| {
        raw.parse::<usize>()
            .map_err(|err| malformed(format!("{name} {raw:?}: {err}")))
    };
    let start = offset(fields[2], "start")?;
    let end = offset(fields[3], "end")?;
    let optional = |raw: &str| (!raw.is_empty()).then(|| raw.to_string());

    let attributes = fields[10].trim();
    let cell = if attributes.is_empty() || attributes == "{}" {
        None
    } else {
        let parsed: CellAttributes = serde_json::from_str(attributes)
            .map_err(|err| malformed(format!("attributes_json: {err}")))?;
        Some(parsed)
    };

    Ok(AnchorRecord {
        anchor_id: fields[0].to_string(),
        kind,
        start,
        end,
        checksum: fields[4].to_string(),
        context_pre: fields[5].to_string(),
        context_post: fields[6].to_string(),
        prev_id: optional(fields[7]),
        next_id: optional(fields[8]),
        parent_heading: optional(fields[9]),
        cell,
    })
}

/// Sentence-level anchor ids from an `anchors.tsv`, ordered by start.
pub fn load_sentence_anchor_ids(path: &Path) -> Result<Vec<String>, AnchorError> {
    Ok(load_sentence_anchors(path)?
        .into_iter()
        .map(|anchor| anchor.anchor_id)
        .collect())
}

/// Rows whose id starts with `s`, ordered by start offset.
pub fn load_sentence_anchors(path: &Path) -> Result<Vec<AnchorRecord>, AnchorError> {
    let mut sentences: Vec<AnchorRecord> = read_anchors_tsv(path)?
        .into_iter()
        .filter(|anchor| anchor.anchor_id.starts_with('s'))
        .collect();
    if sentences.is_empty() {
        return Err(AnchorError::NoSentenceAnchors {
            path: path.display().to_string(),
        });
    }
    sentences.sort_by_key(|anchor| anchor.start);
    Ok(sentences)
}

/// Path of the anchors table inside a bundle directory.
pub fn anchors_path(dir: &Path) -> PathBuf {
    dir.join(ANCHORS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    use canonical::{canonicalize, CanonicalizeConfig};
    use tempfile::TempDir;

    use crate::{build_anchors, AnchorConfig};

    fn sample_doc(source_id: &str) -> CanonicalDocument {
        let result = canonicalize(
            source_id,
            "<h2>LIQUIDITY:</h2><p>Cash was $5.2 billion. \u{201c}Cash\u{201d} means cash.</p>\
             <table><tr><td>Item</td><td>2023</td><td>2022</td></tr>\
             <tr><td>Cash | equivalents</td><td>5.2</td><td>4.1</td></tr></table>",
            &CanonicalizeConfig::default(),
        )
        .expect("canonicalize");
        build_anchors(&result, &AnchorConfig::default()).expect("anchors")
    }

    #[test]
    fn bundle_round_trip() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join("seg-0001");
        let doc = sample_doc("seg-0001");

        write_canonical_bundle(&doc, &dir).expect("write");
        let loaded = load_canonical_bundle(&dir).expect("load");
        assert_eq!(loaded, doc);
        assert!(loaded.verify(AnchorConfig::default().context_window).is_empty());
        assert!(loaded.get("t01r01c00").is_some());
    }

    #[test]
    fn existing_bundle_is_not_overwritten() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join("seg");
        let doc = sample_doc("seg");
        write_canonical_bundle(&doc, &dir).expect("first write");
        assert!(matches!(
            write_canonical_bundle(&doc, &dir),
            Err(AnchorError::BundleExists { .. })
        ));
    }

    #[test]
    fn sentence_ids_sorted_by_start() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join("seg");
        let doc = sample_doc("seg");
        write_canonical_bundle(&doc, &dir).expect("write");

        let ids = load_sentence_anchor_ids(&anchors_path(&dir)).expect("ids");
        assert_eq!(ids, doc.sentence_ids());
        assert_eq!(ids.first().map(String::as_str), Some("s000001"));
    }

    #[test]
    fn no_sentence_anchors_is_an_error() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join(ANCHORS_FILE);
        fs::write(&path, format!("{}\n", ANCHORS_HEADER.join("\t"))).expect("write");
        assert!(matches!(
            load_sentence_anchor_ids(&path),
            Err(AnchorError::NoSentenceAnchors { .. })
        ));
    }

    #[test]
    fn malformed_rows_are_reported_with_line_numbers() {
        let header = ANCHORS_HEADER.join("\t");
        let short = format!("{header}\ns000001\tsentence\t0\n");
        assert!(matches!(
            parse_anchors_tsv(&short),
            Err(AnchorError::MalformedRow { line: 2, .. })
        ));

        let bad_kind = format!("{header}\ns000001\tclause\t0\t4\tc\tp\tq\t\t\t\t{{}}\n");
        assert!(matches!(
            parse_anchors_tsv(&bad_kind),
            Err(AnchorError::MalformedRow { line: 2, .. })
        ));

        assert!(matches!(
            parse_anchors_tsv("id\tkind\n"),
            Err(AnchorError::MalformedRow { line: 1, .. })
        ));
    }

    #[test]
    fn loaded_offsets_are_bounds_checked() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join("seg");
        fs::create_dir(&dir).expect("mkdir");
        fs::write(dir.join(CANONICAL_FILE), "short").expect("write text");
        let header = ANCHORS_HEADER.join("\t");
        fs::write(
            dir.join(ANCHORS_FILE),
            format!("{header}\ns000001\tsentence\t0\t99\tc\tp\tq\t\t\t\t{{}}\n"),
        )
        .expect("write tsv");
        assert!(matches!(
            load_canonical_bundle(&dir),
            Err(AnchorError::SpanOutOfBounds { end: 99, .. })
        ));
    }
}
