use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable identity of one segment across runs:
/// `tarfile::member::segment_no`, with `segment_no` 1-based.
///
/// ```rust
/// use ingest::SegmentKey;
///
/// let key = SegmentKey::new("2023q4.nc.tar.gz", " 0000320193-23-000106.nc ", 1);
/// assert_eq!(key.id(), "2023q4.nc.tar.gz::0000320193-23-000106.nc::1");
/// assert_eq!(key.digest().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentKey {
    pub tarfile: String,
    pub member: String,
    pub segment_no: usize,
}

impl SegmentKey {
    /// Member names are trimmed; the tar file name is kept as given.
    pub fn new(tarfile: impl Into<String>, member: &str, segment_no: usize) -> Self {
        Self {
            tarfile: tarfile.into(),
            member: member.trim().to_string(),
            segment_no,
        }
    }

    /// Key for the segment at 0-based `segment_index` of a member.
    pub fn from_index(tarfile: impl Into<String>, member: &str, segment_index: usize) -> Self {
        Self::new(tarfile, member, segment_index + 1)
    }

    pub fn id(&self) -> String {
        format!("{}::{}::{}", self.tarfile, self.member, self.segment_no)
    }

    /// Lowercase SHA-256 hex of [`id`](Self::id).
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.id().as_bytes()))
    }

    /// Filesystem-safe directory name for this segment's outputs.
    pub fn dir_name(&self) -> String {
        let member: String = self
            .member
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
            .collect();
        format!("{member}__seg{:04}", self.segment_no)
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.tarfile, self.member, self.segment_no)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_sha256_of_id() {
        let key = SegmentKey::new("a.tar.gz", "m.nc", 3);
        assert_eq!(
            key.digest(),
            hex::encode(Sha256::digest(b"a.tar.gz::m.nc::3"))
        );
        assert_eq!(key.to_string(), key.id());
    }

    #[test]
    fn from_index_is_one_based() {
        let key = SegmentKey::from_index("a.tar.gz", "m.nc", 0);
        assert_eq!(key.segment_no, 1);
    }

    #[test]
    fn dir_name_is_filesystem_safe() {
        let key = SegmentKey::new("a.tar.gz", "sub dir/m:1.nc", 12);
        assert_eq!(key.dir_name(), "sub_dir_m_1.nc__seg0012");
    }
}
