//! Digests stored alongside a filing's canonical text.
//!
//! The bundle's identity is `canonical_sha256`:
//!
//! ```text
//! SHA-256(version.to_be_bytes() || 0x00 || canonical_text_bytes)
//! ```
//!
//! so bumping [`CanonicalizeConfig::version`](crate::CanonicalizeConfig)
//! changes every identity even when the text is byte-identical. Anchor
//! checksums and context hashes use plain [`hash_text`] over the covered
//! text, so they move only when a sentence or cell actually changes.
//!
//! ```rust
//! use canonical::{hash_canonical_bytes, hash_text};
//!
//! let sentence = hash_text("Net sales increased 3%.");
//! assert_eq!(sentence.len(), 64);
//! assert_ne!(sentence, hash_canonical_bytes(1, b"Net sales increased 3%."));
//! ```

use sha2::{Digest, Sha256};

/// Hex SHA-256 of `text`, with no version prefix.
///
/// Backs anchor checksums, the before/after context hashes and segment-key
/// digests.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Identity hash of a segment's canonical text under a given config
/// version.
///
/// ```rust
/// use canonical::hash_canonical_bytes;
///
/// let text = b"RISK FACTORS\n\nPrices may rise.";
/// assert_ne!(hash_canonical_bytes(1, text), hash_canonical_bytes(2, text));
/// ```
pub fn hash_canonical_bytes(canonical_version: u32, canonical_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_version.to_be_bytes());
    hasher.update([0]);
    hasher.update(canonical_bytes);
    hex::encode(hasher.finalize())
}
