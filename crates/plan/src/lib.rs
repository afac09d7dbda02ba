//! Plans over anchored filings.
//!
//! A *plan* is JSON produced by an external classifier that partitions a
//! document's sentence anchors into named segments, optionally with
//! overlays and frames that point back into the same anchors:
//!
//! ```json
//! {
//!   "segments": [{"seg_id": "defs", "name": "Definitions", "range": ["s000001", "s000042"]}],
//!   "overlays": [{"name": "pricing", "spans": [["s000010", "s000012"]]}],
//!   "frames": [{"name": "margin", "spans": [], "dependencies": ["s000011"]}]
//! }
//! ```
//!
//! This crate checks plans ([`validate_plan`]), derives classifier-free
//! plans from fixed windows ([`build_chunks`]), scores plan segments
//! through an injected [`Classifier`] with retry ([`score_segments`]) and
//! cuts the high-scoring text out of a prompt view ([`build_hot_zone`]).

mod chunk;
mod classifier;
mod error;
mod hot_zone;
mod retry;
mod serde_millis;
mod validate;

pub use crate::chunk::{build_chunks, build_chunks_from_bundle, ChunkConfig, ChunkPlan, ChunkSegment};
pub use crate::classifier::{
    parse_response, render_scoring_prompt, score_segments, Classifier, RetryingClassifier,
    ScoreReport, SegmentPrompt, SegmentScore,
};
pub use crate::error::PlanError;
pub use crate::hot_zone::{build_hot_zone, write_hot_zone, HotZone, HotZoneConfig};
pub use crate::retry::{execute_with_retry, RetryConfig, RetryResult};
pub use crate::validate::validate_plan;
