//! Error types for archive reading and segment extraction.
//!
//! Every fallible operation in this crate returns [`IngestError`]. Variants
//! carry owned strings rather than `std::io::Error` so the type stays
//! `Clone + PartialEq` and can be compared directly in tests.
//!
//! # Examples
//!
//! ```rust
//! use ingest::IngestError;
//!
//! let err = IngestError::MemberNotFound {
//!     member: "0000320193-23-000106.txt".into(),
//!     archive: "20231103.nc.tar.gz".into(),
//! };
//! assert!(err.to_string().contains("0000320193-23-000106.txt"));
//! ```

use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced while opening archives, reading members and slicing
/// segments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IngestError {
    /// The archive could not be opened or its stream could not be read.
    #[error("i/o error on {path}: {message}")]
    Io { path: String, message: String },

    /// No regular file in the archive has this basename.
    #[error("member {member} not found in {archive}")]
    MemberNotFound { member: String, archive: String },

    /// Segment index past the end of the member's segment list.
    #[error("segment index {index} out of range (member has {len} segments)")]
    SegmentOutOfRange { index: usize, len: usize },

    /// Member is larger than the configured `max_member_bytes`.
    #[error("member {member} is {size} bytes, limit is {limit}")]
    MemberTooLarge {
        member: String,
        size: u64,
        limit: u64,
    },

    /// The supplied [`IngestConfig`](crate::IngestConfig) failed validation.
    #[error("invalid ingest config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl IngestError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        IngestError::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}
