//! Rejection of segments that carry machine payloads instead of prose.

use crate::error::CanonicalError;

/// Bytes of the (left-trimmed) body inspected for XBRL instance markers.
const XBRL_PREFIX_BYTES: usize = 512;
/// Bytes of the body inspected for uuencoded attachments.
const UUENCODE_PREFIX_BYTES: usize = 200;

/// Fail with [`CanonicalError::MachineContent`] when `raw` is XML/XBRL, a
/// uuencoded attachment or a PDF stream.
///
/// Must run before canonicalization: these bodies would otherwise produce
/// megabytes of meaningless "prose".
///
/// # Examples
///
/// ```rust
/// use canonical::{guard_machine_payload, CanonicalError};
///
/// assert!(guard_machine_payload("<html><p>Annual report</p></html>").is_ok());
/// assert!(matches!(
///     guard_machine_payload("  <?xml version=\"1.0\"?><xbrl/>"),
///     Err(CanonicalError::MachineContent(_))
/// ));
/// ```
pub fn guard_machine_payload(raw: &str) -> Result<(), CanonicalError> {
    let stripped = raw.trim_start();
    let lowered_prefix = prefix(stripped, XBRL_PREFIX_BYTES).to_ascii_lowercase();

    if stripped.starts_with("<?xml") {
        return Err(CanonicalError::MachineContent("xml declaration".into()));
    }
    if lowered_prefix.starts_with("<xbrl") {
        return Err(CanonicalError::MachineContent("xbrl document".into()));
    }
    if lowered_prefix.contains("<xbrli:") {
        return Err(CanonicalError::MachineContent("xbrl instance".into()));
    }
    if prefix(stripped, UUENCODE_PREFIX_BYTES).contains("begin 644") {
        return Err(CanonicalError::MachineContent("uuencoded payload".into()));
    }
    if stripped.starts_with("%PDF") {
        return Err(CanonicalError::MachineContent("pdf payload".into()));
    }
    Ok(())
}

/// Longest prefix of `text` not exceeding `max_bytes`, on a char boundary.
fn prefix(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}
