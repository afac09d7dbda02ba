//! Configuration types for the canonicalizer.
//!
//! [`CanonicalizeConfig`] controls how raw segment bodies are turned into
//! canonical text. Every field participates in determinism: the same input
//! and the same config always yield byte-identical text and provenance.
//!
//! # Versioning
//!
//! The `version` field is mixed into the document identity hash. Any change
//! to canonical output (including bug fixes in the scanner or the table
//! renderer) must be accompanied by a version bump so bundles written by an
//! older build can be told apart from new ones.
//!
//! # Examples
//!
//! ```rust
//! use canonical::CanonicalizeConfig;
//!
//! let config = CanonicalizeConfig::default();
//! assert_eq!(config.version, 1);
//! assert!(config.treat_as_html);
//! assert!(!config.normalize_unicode);
//! ```
//!
//! Plain-text exhibits keep their line structure:
//!
//! ```rust
//! use canonical::CanonicalizeConfig;
//!
//! let config = CanonicalizeConfig {
//!     treat_as_html: false,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::CanonicalError;

/// Configuration for the canonicalizer.
///
/// # Fields
///
/// - `version`: canonicalization behavior version, must be >= 1
/// - `treat_as_html`: parse tags and entities, or treat input as plain text
/// - `normalize_unicode`: apply NFKC to each emitted character
///
/// # Serialization
///
/// ```json
/// {
///   "version": 1,
///   "treat_as_html": true,
///   "normalize_unicode": false
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CanonicalizeConfig {
    /// Version of the canonicalization behavior.
    ///
    /// Included in the identity hash:
    /// ```text
    /// SHA-256(version.to_be_bytes() || 0x00 || text_bytes)
    /// ```
    pub version: u32,

    /// If true, the input is scanned as HTML/SGML: tags are stripped, block
    /// tags become paragraph breaks, `<br>` becomes a hard newline, entities
    /// are decoded and tables are rendered.
    ///
    /// If false, no tag parsing or entity decoding happens and embedded
    /// newlines are kept as hard breaks.
    ///
    /// # Default
    ///
    /// `true`
    pub treat_as_html: bool,

    /// If true, every emitted character is passed through NFKC. Each
    /// resulting character keeps the provenance of the input character it
    /// came from.
    ///
    /// Off by default: filings are compared against their original bytes and
    /// compatibility folding would hide typographic differences that matter
    /// for citation.
    ///
    /// # Default
    ///
    /// `false`
    pub normalize_unicode: bool,
}

impl CanonicalizeConfig {
    /// Reject configurations the scanner cannot honor.
    pub fn validate(&self) -> Result<(), CanonicalError> {
        if self.version == 0 {
            return Err(CanonicalError::InvalidConfig(
                "config version must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for CanonicalizeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            treat_as_html: true,
            normalize_unicode: false,
        }
    }
}
