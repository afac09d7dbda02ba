use anchor::AnchorError;
use thiserror::Error;

/// Errors from chunking, hot-zone selection and classifier scoring.
///
/// Plan *validation* never fails; it returns its findings as strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlanError {
    #[error("invalid plan config: {0}")]
    InvalidConfig(String),

    /// A segment range names an anchor the prompt view does not contain.
    #[error("segment {seg_id} references unknown anchors {start}-{end}")]
    UnknownAnchor {
        seg_id: String,
        start: String,
        end: String,
    },

    #[error("segment {seg_id} has inverted range {start}-{end}")]
    InvertedRange {
        seg_id: String,
        start: String,
        end: String,
    },

    #[error("segment {seg_id} missing valid range")]
    MissingRange { seg_id: String },

    /// Nothing met the score threshold (and verdict filter, if any).
    #[error("no segments met threshold {threshold}{}", verdict_suffix(.verdict))]
    NoSegmentsSelected {
        threshold: String,
        verdict: Option<String>,
    },

    #[error("duplicate anchor id {anchor_id} in prompt view")]
    DuplicateAnchor { anchor_id: String },

    #[error("no anchors parsed from prompt view")]
    EmptyPromptView,

    /// The classifier answered, but not with a usable JSON verdict.
    #[error("failed to parse classifier output for {seg_id}: {reason}")]
    InvalidResponse { seg_id: String, reason: String },

    #[error("classification failed after {attempts} attempts: {last_error}")]
    ClassifierExhausted { attempts: u32, last_error: String },

    #[error("json error: {0}")]
    Json(String),

    #[error("i/o error on {path}: {message}")]
    Io { path: String, message: String },

    #[error(transparent)]
    Anchor(#[from] AnchorError),
}

impl PlanError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        PlanError::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}

fn verdict_suffix(verdict: &Option<String>) -> String {
    verdict
        .as_ref()
        .map(|v| format!(" with verdict={v}"))
        .unwrap_or_default()
}

impl From<serde_json::Error> for PlanError {
    fn from(err: serde_json::Error) -> Self {
        PlanError::Json(err.to_string())
    }
}
