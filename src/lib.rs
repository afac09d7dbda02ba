//! Workspace umbrella crate for filing anchors.
//!
//! This crate stitches archive ingest, canonicalization and anchoring into
//! one run: EDGAR `.nc.tar.gz` archive in, one anchor bundle per document
//! segment out. Plans produced downstream are checked with
//! [`validate_plan`] against the bundles' sentence anchors.
//!
//! ```no_run
//! use filing_anchors::{process_archive, PipelineConfig};
//!
//! let config = PipelineConfig::from_file("pipeline.yaml")?;
//! let manifest = process_archive(&config)?;
//! println!("{} bundles written", manifest.written());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod pipeline;

pub use crate::config::{ConfigLoadError, PipelineConfig, RunConfig};
pub use crate::pipeline::{
    process_archive, process_member, process_segment, ManifestEntry, MemberReport, RunManifest,
    SegmentOutcome, MANIFEST_FILE,
};

pub use anchor::{
    build_anchors, load_canonical_bundle, load_sentence_anchor_ids, render_prompt_view,
    write_canonical_bundle, write_prompt_view, AnchorConfig, AnchorError, AnchorKind,
    AnchorRecord, CanonicalDocument, PromptView,
};
pub use canonical::{
    canonicalize, guard_machine_payload, CanonicalError, CanonicalizationResult,
    CanonicalizeConfig,
};
pub use ingest::{
    detect_binary_segment, BinarySegmentFilter, FilterContext, IngestConfig, IngestError,
    SegmentFilter, SegmentKey, SkipReason, TarSegment, TarSegmentReader,
};
pub use plan::{
    build_chunks, build_hot_zone, validate_plan, ChunkConfig, HotZoneConfig, PlanError,
    RetryConfig,
};

use std::error::Error;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

/// Errors that can occur while running segments through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    Ingest(IngestError),
    Canonical(CanonicalError),
    Anchor(AnchorError),
    Plan(PlanError),
    Config(String),
    Manifest(String),
    Io { path: String, message: String },
}

impl PipelineError {
    pub(crate) fn io(path: impl AsRef<Path>, err: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Ingest(err) => write!(f, "ingest failure: {err}"),
            PipelineError::Canonical(err) => write!(f, "canonicalization failure: {err}"),
            PipelineError::Anchor(err) => write!(f, "anchoring failure: {err}"),
            PipelineError::Plan(err) => write!(f, "plan failure: {err}"),
            PipelineError::Config(message) => write!(f, "configuration error: {message}"),
            PipelineError::Manifest(message) => write!(f, "manifest error: {message}"),
            PipelineError::Io { path, message } => write!(f, "i/o error on {path}: {message}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Ingest(err) => Some(err),
            PipelineError::Canonical(err) => Some(err),
            PipelineError::Anchor(err) => Some(err),
            PipelineError::Plan(err) => Some(err),
            PipelineError::Config(_) | PipelineError::Manifest(_) | PipelineError::Io { .. } => {
                None
            }
        }
    }
}

impl From<IngestError> for PipelineError {
    fn from(value: IngestError) -> Self {
        PipelineError::Ingest(value)
    }
}

impl From<CanonicalError> for PipelineError {
    fn from(value: CanonicalError) -> Self {
        PipelineError::Canonical(value)
    }
}

impl From<AnchorError> for PipelineError {
    fn from(value: AnchorError) -> Self {
        PipelineError::Anchor(value)
    }
}

impl From<PlanError> for PipelineError {
    fn from(value: PlanError) -> Self {
        PipelineError::Plan(value)
    }
}

impl From<ConfigLoadError> for PipelineError {
    fn from(value: ConfigLoadError) -> Self {
        PipelineError::Config(value.to_string())
    }
}

/// Metrics observer for pipeline stages.
pub trait PipelineMetrics: Send + Sync {
    /// Reading a member and running its segments through the filter.
    fn record_filter(&self, latency: Duration, result: Result<(), IngestError>);
    /// Machine-payload guard plus canonicalization of one segment.
    fn record_canonical(&self, latency: Duration, result: Result<(), CanonicalError>);
    fn record_anchors(&self, latency: Duration, result: Result<(), AnchorError>);
}

/// Install or clear the global pipeline metrics recorder.
pub fn set_pipeline_metrics(recorder: Option<Arc<dyn PipelineMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn PipelineMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn PipelineMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn PipelineMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

pub(crate) struct MetricsSpan {
    recorder: Arc<dyn PipelineMetrics>,
    start: Instant,
}

impl MetricsSpan {
    pub(crate) fn start() -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            start: Instant::now(),
        })
    }

    pub(crate) fn record_filter(self, result: Result<(), IngestError>) {
        self.recorder.record_filter(self.start.elapsed(), result);
    }

    pub(crate) fn record_canonical(self, result: Result<(), CanonicalError>) {
        self.recorder.record_canonical(self.start.elapsed(), result);
    }

    pub(crate) fn record_anchors(self, result: Result<(), AnchorError>) {
        self.recorder.record_anchors(self.start.elapsed(), result);
    }
}
