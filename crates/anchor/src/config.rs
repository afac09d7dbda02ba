use serde::{Deserialize, Serialize};

use crate::error::AnchorError;

/// Tuning knobs for [`build_anchors`](crate::build_anchors).
///
/// ```rust
/// use anchor::AnchorConfig;
///
/// let cfg = AnchorConfig { chunk_chars: Some(1000), ..Default::default() };
/// assert!(cfg.validate().is_ok());
/// assert!(AnchorConfig { chunk_chars: Some(0), ..Default::default() }.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Characters hashed on each side of a span for `context_pre` /
    /// `context_post`.
    pub context_window: usize,

    /// Emit `c` chunk anchors for paragraphs longer than this many chars.
    /// `None` disables chunk anchors.
    pub chunk_chars: Option<usize>,

    /// Longest all-uppercase paragraph still treated as a heading.
    pub heading_max_chars: usize,

    /// How far past the cut point a chunk may extend looking for whitespace.
    pub chunk_boundary_search: usize,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            context_window: 80,
            chunk_chars: None,
            heading_max_chars: 140,
            chunk_boundary_search: 200,
        }
    }
}

impl AnchorConfig {
    pub fn validate(&self) -> Result<(), AnchorError> {
        if self.chunk_chars == Some(0) {
            return Err(AnchorError::InvalidConfig(
                "chunk_chars must be greater than zero when set".into(),
            ));
        }
        if self.heading_max_chars == 0 {
            return Err(AnchorError::InvalidConfig(
                "heading_max_chars must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
