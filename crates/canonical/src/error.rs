use thiserror::Error;

/// Errors that can occur during canonicalization.
///
/// Malformed markup is never an error: the scanner degrades gracefully. Only
/// caller mistakes and payloads that are not prose at all are rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CanonicalError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("canonicalization requires a non-empty source_id")]
    MissingSourceId,
    #[error("segment carries machine-readable content: {0}")]
    MachineContent(String),
}
