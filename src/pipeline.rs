//! Archive member → per-segment anchor bundles.
//!
//! For every kept segment the pipeline writes one directory under the
//! output root, named by [`SegmentKey::dir_name`]:
//!
//! ```text
//! out/
//!   manifest.json
//!   0000320193-23-000106.nc__seg0001/
//!     canonical.txt
//!     anchors.tsv
//!     prompt_view.txt
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anchor::{
    build_anchors, render_prompt_view, write_canonical_bundle, write_prompt_view, AnchorError,
};
use canonical::{canonicalize, guard_machine_payload, CanonicalError};
use ingest::{
    ingest_member, BinarySegmentFilter, FilterContext, FilteredSegment, SegmentFilter,
    SegmentHeader, SegmentKey, SkipReason, TarSegment, TarSegmentReader,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Level};

use crate::config::PipelineConfig;
use crate::{MetricsSpan, PipelineError};

/// File name of the run manifest written next to the bundles.
pub const MANIFEST_FILE: &str = "manifest.json";

/// What happened to one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    Written {
        key: SegmentKey,
        dir: PathBuf,
        anchors: usize,
        sentence_anchors: usize,
        canonical_sha256: String,
    },
    Skipped { key: SegmentKey, reason: String },
}

impl SegmentOutcome {
    pub fn key(&self) -> &SegmentKey {
        match self {
            SegmentOutcome::Written { key, .. } | SegmentOutcome::Skipped { key, .. } => key,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, SegmentOutcome::Written { .. })
    }
}

/// Outcomes for every segment of one member, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberReport {
    pub member: String,
    pub outcomes: Vec<SegmentOutcome>,
}

impl MemberReport {
    pub fn written(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_written()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.written()
    }
}

/// One row of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub segment_id: String,
    pub digest: String,
    pub member: String,
    pub segment_no: usize,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchors: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_sha256: Option<String>,
}

impl From<&SegmentOutcome> for ManifestEntry {
    fn from(outcome: &SegmentOutcome) -> Self {
        let key = outcome.key();
        let mut entry = ManifestEntry {
            segment_id: key.id(),
            digest: key.digest(),
            member: key.member.clone(),
            segment_no: key.segment_no,
            status: String::new(),
            reason: None,
            bundle_dir: None,
            anchors: None,
            canonical_sha256: None,
        };
        match outcome {
            SegmentOutcome::Written {
                dir,
                anchors,
                canonical_sha256,
                ..
            } => {
                entry.status = "written".into();
                entry.bundle_dir = dir.file_name().map(|n| n.to_string_lossy().into_owned());
                entry.anchors = Some(*anchors);
                entry.canonical_sha256 = Some(canonical_sha256.clone());
            }
            SegmentOutcome::Skipped { reason, .. } => {
                entry.status = "skipped".into();
                entry.reason = Some(reason.clone());
            }
        }
        entry
    }
}

/// Everything a run produced, as persisted in `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub archive: String,
    #[serde(default)]
    pub name: Option<String>,
    pub segments: Vec<ManifestEntry>,
}

impl RunManifest {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let raw = fs::read_to_string(path).map_err(|err| PipelineError::io(path, err))?;
        serde_json::from_str(&raw).map_err(|err| PipelineError::Manifest(err.to_string()))
    }

    pub fn written(&self) -> usize {
        self.segments.iter().filter(|e| e.status == "written").count()
    }
}

/// Guard, canonicalize, anchor and persist one segment.
///
/// Machine payloads (XBRL, uuencoded blobs, PDFs) and segments with no text
/// come back as [`SegmentOutcome::Skipped`]; every other failure is an
/// error.
pub fn process_segment(
    segment: &TarSegment,
    config: &PipelineConfig,
    out_dir: &Path,
) -> Result<SegmentOutcome, PipelineError> {
    let key = segment.key();
    let dir_name = key.dir_name();
    let dir = out_dir.join(&dir_name);
    let start = Instant::now();
    let span = tracing::span!(Level::INFO, "pipeline.segment", segment = %key);
    let _guard = span.enter();

    if dir.exists() {
        if config.run.skip_existing {
            debug!(dir = %dir.display(), "bundle_exists_skipped");
            return Ok(SegmentOutcome::Skipped {
                key,
                reason: "bundle_exists".into(),
            });
        }
        return Err(AnchorError::BundleExists {
            path: dir.display().to_string(),
        }
        .into());
    }

    let mut canonical_metrics = MetricsSpan::start();
    let canonical_result = guard_machine_payload(&segment.html)
        .and_then(|()| canonicalize(dir_name.as_str(), &segment.html, &config.canonical));
    let result = match canonical_result {
        Ok(result) => {
            if let Some(span) = canonical_metrics.take() {
                span.record_canonical(Ok(()));
            }
            result
        }
        Err(CanonicalError::MachineContent(detail)) => {
            if let Some(span) = canonical_metrics.take() {
                span.record_canonical(Err(CanonicalError::MachineContent(detail.clone())));
            }
            info!(detail = %detail, "machine_content_skipped");
            return Ok(SegmentOutcome::Skipped {
                key,
                reason: format!("machine_content:{detail}"),
            });
        }
        Err(err) => {
            if let Some(span) = canonical_metrics.take() {
                span.record_canonical(Err(err.clone()));
            }
            return Err(err.into());
        }
    };

    let mut anchor_metrics = MetricsSpan::start();
    let doc = match build_anchors(&result, &config.anchor) {
        Ok(doc) => {
            if let Some(span) = anchor_metrics.take() {
                span.record_anchors(Ok(()));
            }
            doc
        }
        Err(AnchorError::EmptyDocument { .. }) => {
            if let Some(span) = anchor_metrics.take() {
                span.record_anchors(Err(AnchorError::EmptyDocument {
                    source_id: dir_name.clone(),
                }));
            }
            info!("empty_document_skipped");
            return Ok(SegmentOutcome::Skipped {
                key,
                reason: "empty_document".into(),
            });
        }
        Err(err) => {
            if let Some(span) = anchor_metrics.take() {
                span.record_anchors(Err(err.clone()));
            }
            warn!(error = %err, "anchor_failure");
            return Err(err.into());
        }
    };

    let prompt_view = render_prompt_view(&doc)?;
    write_canonical_bundle(&doc, &dir)?;
    write_prompt_view(&prompt_view, &dir)?;

    let sentence_anchors = doc.sentence_anchors().count();
    info!(
        canonical_len = doc.canonical_length(),
        anchors = doc.len(),
        sentence_anchors,
        tables = result.tables.len(),
        elapsed_micros = start.elapsed().as_micros(),
        "segment_written"
    );
    Ok(SegmentOutcome::Written {
        key,
        dir,
        anchors: doc.len(),
        sentence_anchors,
        canonical_sha256: result.sha256_hex,
    })
}

/// Read one member, filter its segments and process the kept ones in
/// parallel. Outcomes keep document order.
pub fn process_member(
    reader: &TarSegmentReader,
    member_name: &str,
    filter: &dyn SegmentFilter,
    config: &PipelineConfig,
    out_dir: &Path,
) -> Result<MemberReport, PipelineError> {
    let mut filter_metrics = MetricsSpan::start();
    let filtered = match ingest_member(reader, member_name, filter) {
        Ok(filtered) => {
            if let Some(span) = filter_metrics.take() {
                span.record_filter(Ok(()));
            }
            filtered
        }
        Err(err) => {
            if let Some(span) = filter_metrics.take() {
                span.record_filter(Err(err.clone()));
            }
            return Err(err.into());
        }
    };

    let outcomes = filtered
        .into_par_iter()
        .map(|item| match item {
            FilteredSegment::Keep(segment) => process_segment(&segment, config, out_dir),
            FilteredSegment::Skip { segment, reason } => Ok(SegmentOutcome::Skipped {
                key: segment.key(),
                reason: reason.to_string(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let report = MemberReport {
        member: member_name.to_string(),
        outcomes,
    };
    info!(
        member = %member_name,
        written = report.written(),
        skipped = report.skipped(),
        "member_processed"
    );
    Ok(report)
}

/// Run the whole configured archive: every listed member (or all of them)
/// through [`process_member`], then write `manifest.json`.
pub fn process_archive(config: &PipelineConfig) -> Result<RunManifest, PipelineError> {
    config.validate()?;
    let archive = config.archive()?;
    let out_dir = config.run.output_dir.as_path();
    let start = Instant::now();

    let reader = TarSegmentReader::open(archive, &config.ingest)?;
    fs::create_dir_all(out_dir).map_err(|err| PipelineError::io(out_dir, err))?;

    let members: Vec<String> = if config.run.members.is_empty() {
        reader.members().map(str::to_string).collect()
    } else {
        config.run.members.clone()
    };

    let filter: Box<dyn SegmentFilter> = if config.run.skip_binary {
        Box::new(BinarySegmentFilter)
    } else {
        Box::new(keep_all)
    };

    let mut segments = Vec::new();
    for member in &members {
        let report = process_member(&reader, member, filter.as_ref(), config, out_dir)?;
        segments.extend(report.outcomes.iter().map(ManifestEntry::from));
    }

    let manifest = RunManifest {
        archive: reader.tar_name().to_string(),
        name: config.name.clone(),
        segments,
    };
    let manifest_path = out_dir.join(MANIFEST_FILE);
    let body = serde_json::to_string_pretty(&manifest)
        .map_err(|err| PipelineError::Manifest(err.to_string()))?;
    fs::write(&manifest_path, body).map_err(|err| PipelineError::io(&manifest_path, err))?;

    info!(
        archive = %manifest.archive,
        members = members.len(),
        segments = manifest.segments.len(),
        written = manifest.written(),
        elapsed_micros = start.elapsed().as_micros(),
        "archive_processed"
    );
    Ok(manifest)
}

fn keep_all(_header: &SegmentHeader, _html: &str, _context: &FilterContext) -> Option<SkipReason> {
    None
}
