//! Configuration for archive reading.
//!
//! # Quick Start
//!
//! ```rust
//! use ingest::IngestConfig;
//!
//! let config = IngestConfig::default();
//! config.validate().expect("default config is valid");
//! ```
//!
//! Limit member size when processing untrusted archives:
//!
//! ```rust
//! use ingest::IngestConfig;
//!
//! let config = IngestConfig {
//!     max_member_bytes: Some(256 * 1024 * 1024),
//!     ..IngestConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Runtime knobs for [`TarSegmentReader`](crate::TarSegmentReader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Semantic version of the ingest behavior. Must be at least 1.
    pub version: u32,

    /// Refuse to load members larger than this many bytes. `None` means no
    /// limit.
    pub max_member_bytes: Option<u64>,

    /// Drop invalid UTF-8 sequences when decoding a member. When `false` they
    /// are replaced with U+FFFD instead.
    pub drop_invalid_utf8: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            version: 1,
            max_member_bytes: None,
            drop_invalid_utf8: true,
        }
    }
}

impl IngestConfig {
    /// Check the config for values that can never work.
    ///
    /// ```rust
    /// use ingest::{ConfigError, IngestConfig};
    ///
    /// let bad = IngestConfig { max_member_bytes: Some(0), ..Default::default() };
    /// assert_eq!(bad.validate(), Err(ConfigError::ZeroMemberLimit));
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 {
            return Err(ConfigError::InvalidVersion);
        }
        if self.max_member_bytes == Some(0) {
            return Err(ConfigError::ZeroMemberLimit);
        }
        Ok(())
    }
}

/// Configuration validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("version must be at least 1")]
    InvalidVersion,

    /// A zero byte limit would reject every member.
    #[error("max_member_bytes must be greater than zero")]
    ZeroMemberLimit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(IngestConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_version_rejected() {
        let cfg = IngestConfig {
            version: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidVersion));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: IngestConfig = serde_json::from_str("{}").expect("empty object");
        assert_eq!(cfg, IngestConfig::default());

        let cfg: IngestConfig =
            serde_json::from_str(r#"{"max_member_bytes": 1024}"#).expect("partial object");
        assert_eq!(cfg.max_member_bytes, Some(1024));
        assert!(cfg.drop_invalid_utf8);
    }
}
