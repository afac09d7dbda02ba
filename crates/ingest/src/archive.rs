//! Reading `.nc` members out of gzip-compressed tar archives.
//!
//! A gzip stream cannot seek, so [`TarSegmentReader::open`] walks the archive
//! once to index member names and every read walks it again up to the
//! requested member. Each walk owns its own file handle, so a reader can
//! be shared between threads and nothing is left open between calls.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use tar::Archive;
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::identifiers::SegmentKey;
use crate::segment::{SegmentExtractor, SegmentHeader};

/// Largest up-front buffer reservation; bigger members grow while reading.
const MAX_CAPACITY_HINT: usize = 64 << 20;

/// One segment of one archive member, ready for canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TarSegment {
    /// File name of the archive (no directory).
    pub tarfile: String,
    pub member_name: String,
    /// 0-based position within the member.
    pub segment_index: usize,
    pub html: String,
    pub header: SegmentHeader,
    pub has_table: bool,
}

impl TarSegment {
    pub fn key(&self) -> SegmentKey {
        SegmentKey::from_index(self.tarfile.clone(), &self.member_name, self.segment_index)
    }
}

/// Indexed view over a `.tar.gz` archive of EDGAR submissions.
#[derive(Debug, Clone)]
pub struct TarSegmentReader {
    path: PathBuf,
    tar_name: String,
    /// Member basename -> full entry path inside the archive.
    members: BTreeMap<String, PathBuf>,
    config: IngestConfig,
}

impl TarSegmentReader {
    /// Open `path` and index its regular-file members by basename.
    ///
    /// When two entries share a basename the later one wins.
    pub fn open(path: impl AsRef<Path>, config: &IngestConfig) -> Result<Self, IngestError> {
        config.validate()?;
        let start = Instant::now();
        let path = path.as_ref().to_path_buf();

        let mut archive = open_archive(&path)?;
        let mut members = BTreeMap::new();
        let entries = archive.entries().map_err(|err| IngestError::io(&path, err))?;
        for entry in entries {
            let entry = entry.map_err(|err| IngestError::io(&path, err))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let entry_path = entry
                .path()
                .map_err(|err| IngestError::io(&path, err))?
                .into_owned();
            if let Some(base) = entry_path.file_name() {
                members.insert(base.to_string_lossy().into_owned(), entry_path);
            }
        }

        let tar_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        info!(
            archive = %path.display(),
            members = members.len(),
            elapsed_micros = start.elapsed().as_micros(),
            "archive_indexed"
        );

        Ok(Self {
            path,
            tar_name,
            members,
            config: config.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Archive file name, as recorded in [`TarSegment::tarfile`].
    pub fn tar_name(&self) -> &str {
        &self.tar_name
    }

    /// Member basenames in sorted order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn contains(&self, member_name: &str) -> bool {
        self.members.contains_key(member_name)
    }

    /// Full text of a member, decoded as UTF-8.
    ///
    /// Invalid byte sequences are dropped or replaced according to
    /// [`IngestConfig::drop_invalid_utf8`].
    pub fn read_member(&self, member_name: &str) -> Result<String, IngestError> {
        let Some(wanted) = self.members.get(member_name) else {
            warn!(archive = %self.tar_name, member = member_name, "member_not_found");
            return Err(IngestError::MemberNotFound {
                member: member_name.to_string(),
                archive: self.path.display().to_string(),
            });
        };

        let start = Instant::now();
        let mut archive = open_archive(&self.path)?;
        let entries = archive
            .entries()
            .map_err(|err| IngestError::io(&self.path, err))?;
        for entry in entries {
            let mut entry = entry.map_err(|err| IngestError::io(&self.path, err))?;
            let is_match = entry
                .path()
                .map(|p| p == *wanted)
                .unwrap_or(false);
            if !is_match || !entry.header().entry_type().is_file() {
                continue;
            }

            let size = entry.size();
            if let Some(limit) = self.config.max_member_bytes {
                if size > limit {
                    return Err(IngestError::MemberTooLarge {
                        member: member_name.to_string(),
                        size,
                        limit,
                    });
                }
            }

            if usize::try_from(size).is_err() {
                return Err(IngestError::MemberTooLarge {
                    member: member_name.to_string(),
                    size,
                    limit: usize::MAX as u64,
                });
            }

            let buf =
                read_entry(&mut entry, size).map_err(|err| IngestError::io(&self.path, err))?;
            let text = decode_member(&buf, self.config.drop_invalid_utf8);
            debug!(
                member = member_name,
                bytes = buf.len(),
                elapsed_micros = start.elapsed().as_micros(),
                "member_read"
            );
            return Ok(text);
        }

        // Indexed at open but gone now: the file changed underneath us.
        Err(IngestError::MemberNotFound {
            member: member_name.to_string(),
            archive: self.path.display().to_string(),
        })
    }

    /// Segment extractor over one member's text.
    pub fn extractor(&self, member_name: &str) -> Result<SegmentExtractor, IngestError> {
        Ok(SegmentExtractor::new(self.read_member(member_name)?))
    }

    /// All segments of `member_name`, in document order.
    pub fn iter_segments(&self, member_name: &str) -> Result<SegmentIter, IngestError> {
        let extractor = self.extractor(member_name)?;
        debug!(
            member = member_name,
            segments = extractor.len(),
            "member_segmented"
        );
        Ok(SegmentIter {
            tarfile: self.tar_name.clone(),
            member_name: member_name.to_string(),
            extractor,
            next: 0,
        })
    }
}

/// Iterator returned by [`TarSegmentReader::iter_segments`].
#[derive(Debug)]
pub struct SegmentIter {
    tarfile: String,
    member_name: String,
    extractor: SegmentExtractor,
    next: usize,
}

impl SegmentIter {
    pub fn extractor(&self) -> &SegmentExtractor {
        &self.extractor
    }
}

impl Iterator for SegmentIter {
    type Item = TarSegment;

    fn next(&mut self) -> Option<TarSegment> {
        let index = self.next;
        let header = self.extractor.header(index).ok()?;
        let html = self.extractor.html(index).ok()?;
        self.next += 1;
        Some(TarSegment {
            tarfile: self.tarfile.clone(),
            member_name: self.member_name.clone(),
            segment_index: index,
            has_table: crate::segment::contains_table_markup(html),
            html: html.to_string(),
            header,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.extractor.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SegmentIter {}

fn open_archive(path: &Path) -> Result<Archive<GzDecoder<File>>, IngestError> {
    let file = File::open(path).map_err(|err| IngestError::io(path, err))?;
    Ok(Archive::new(GzDecoder::new(file)))
}

/// Read an entry body. The header's size only sizes the initial buffer,
/// so a corrupt header cannot force a huge allocation.
fn read_entry(mut reader: impl Read, size: u64) -> std::io::Result<Vec<u8>> {
    let hint = usize::try_from(size).map_or(0, |s| s.min(MAX_CAPACITY_HINT));
    let mut buf = Vec::with_capacity(hint);
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

fn decode_member(bytes: &[u8], drop_invalid: bool) -> String {
    if !drop_invalid {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}
