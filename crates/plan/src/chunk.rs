//! Fixed-size windows over sentence anchors, shaped like a plan.
//!
//! Useful as a classifier-free baseline plan or as retrieval units. With
//! `stride == chunk_size` the windows tile the document and the result
//! passes [`validate_plan`](crate::validate_plan).

use std::path::Path;

use anchor::{
    load_canonical_bundle, AnchorError, AnchorRecord, CanonicalDocument, PromptView,
    PROMPT_VIEW_FILE,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PlanError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Sentence anchors per window.
    pub chunk_size: usize,
    /// Anchors between window starts.
    pub stride: usize,
    /// Summary is the window's canonical text cut to this many chars.
    pub max_snippet_chars: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 40,
            stride: 20,
            max_snippet_chars: 1200,
        }
    }
}

impl ChunkConfig {
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.chunk_size == 0 || self.stride == 0 {
            return Err(PlanError::InvalidConfig(
                "chunk_size and stride must be positive integers".into(),
            ));
        }
        Ok(())
    }
}

/// One window, in plan segment form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSegment {
    pub seg_id: String,
    pub name: String,
    pub range: [String; 2],
    pub summary: String,
    pub tags: Vec<String>,
    /// Prompt-view lines from the first to the last anchor of the window.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub source: String,
    pub chunk_size: usize,
    pub stride: usize,
    pub segments: Vec<ChunkSegment>,
    pub keywords: Vec<String>,
}

/// Windows of `chunk_size` sentence anchors starting every `stride`
/// anchors. The last windows may be shorter.
pub fn build_chunks(
    doc: &CanonicalDocument,
    view: &PromptView,
    source: &str,
    cfg: &ChunkConfig,
) -> Result<ChunkPlan, PlanError> {
    cfg.validate()?;

    let mut records: Vec<&AnchorRecord> = doc
        .anchors()
        .iter()
        .filter(|anchor| anchor.anchor_id.starts_with('s'))
        .collect();
    if records.is_empty() {
        return Err(AnchorError::NoSentenceAnchors {
            path: source.to_string(),
        }
        .into());
    }
    records.sort_by_key(|anchor| anchor.start);

    let mut segments = Vec::new();
    for idx in (0..records.len()).step_by(cfg.stride) {
        let window = &records[idx..(idx + cfg.chunk_size).min(records.len())];
        let (Some(first), Some(last)) = (window.first(), window.last()) else {
            continue;
        };
        let body = doc.text().get(first.start..last.end).unwrap_or("");
        segments.push(ChunkSegment {
            seg_id: format!("chunk{:04}", segments.len() + 1),
            name: format!("Chunk {}-{}", first.anchor_id, last.anchor_id),
            range: [first.anchor_id.clone(), last.anchor_id.clone()],
            summary: body.trim().chars().take(cfg.max_snippet_chars).collect(),
            tags: Vec::new(),
            text: view.slice(&first.anchor_id, &last.anchor_id)?,
        });
    }

    info!(
        source = %source,
        sentence_anchors = records.len(),
        chunks = segments.len(),
        "chunks_built"
    );
    Ok(ChunkPlan {
        source: source.to_string(),
        chunk_size: cfg.chunk_size,
        stride: cfg.stride,
        segments,
        keywords: Vec::new(),
    })
}

/// [`build_chunks`] over a bundle directory holding `canonical.txt`,
/// `anchors.tsv` and `prompt_view.txt`.
pub fn build_chunks_from_bundle(dir: &Path, cfg: &ChunkConfig) -> Result<ChunkPlan, PlanError> {
    let doc = load_canonical_bundle(dir)?;
    let view = PromptView::load(&dir.join(PROMPT_VIEW_FILE))?;
    build_chunks(&doc, &view, &dir.display().to_string(), cfg)
}
