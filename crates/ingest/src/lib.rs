//! Filing Ingest Layer
//!
//! This is where EDGAR submissions enter the pipeline. We open a daily
//! `.nc.tar.gz` archive, read one submission member, split it into its
//! `<DOCUMENT>` segments and decide which segments are worth canonicalizing.
//!
//! ## What we do here
//!
//! - **Index archives** - Regular-file members keyed by basename
//! - **Segment submissions** - `<DOCUMENT>`/`<TEXT>` boundaries, repaired
//!   when marker counts disagree
//! - **Parse headers** - `<TYPE>`, `<FILENAME>` and friends into a map
//! - **Filter binaries** - Graphics, PDFs, embedded objects and image-only
//!   bodies get a [`SkipReason`] instead of a trip through the canonicalizer
//! - **Stable keys** - `tarfile::member::segment_no` plus its SHA-256
//!
//! ## Example
//!
//! ```
//! use ingest::{detect_binary_segment, SegmentExtractor};
//!
//! let member = "<DOCUMENT>\n<TYPE>10-K\n<TEXT>\n<p>Annual report</p>\n</TEXT>\n</DOCUMENT>\n\
//!               <DOCUMENT>\n<TYPE>GRAPHIC\n<TEXT>\nbinary\n</TEXT>\n</DOCUMENT>\n";
//! let extractor = SegmentExtractor::new(member);
//! assert_eq!(extractor.len(), 2);
//!
//! let header = extractor.header(1).unwrap();
//! let reason = detect_binary_segment(&header, extractor.html(1).unwrap());
//! assert_eq!(reason.unwrap().to_string(), "doc_type:GRAPHIC");
//! ```

use std::time::Instant;

use tracing::{info, warn, Level};

mod archive;
mod config;
mod error;
mod filter;
mod identifiers;
mod segment;

pub use crate::archive::{SegmentIter, TarSegment, TarSegmentReader};
pub use crate::config::{ConfigError, IngestConfig};
pub use crate::error::IngestError;
pub use crate::filter::{
    detect_binary_by_doc_type, detect_binary_by_filename, detect_binary_content,
    detect_binary_segment, extract_doc_type, BinarySegmentFilter, ContentSignal, FilterContext,
    SegmentFilter, SkipReason, DOC_TYPE_KEYS,
};
pub use crate::identifiers::SegmentKey;
pub use crate::segment::{
    create_segments, parse_header, SegmentBounds, SegmentExtractor, SegmentHeader, SegmentSource,
};

/// A segment that passed or failed the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilteredSegment {
    Keep(TarSegment),
    Skip { segment: TarSegment, reason: SkipReason },
}

/// Read one member and run every segment through `filter`.
///
/// Segments come back in document order, kept and skipped alike, so callers
/// can record skip reasons next to their outputs.
pub fn ingest_member(
    reader: &TarSegmentReader,
    member_name: &str,
    filter: &dyn SegmentFilter,
) -> Result<Vec<FilteredSegment>, IngestError> {
    let start = Instant::now();
    let span = tracing::span!(
        Level::INFO,
        "ingest.member",
        archive = %reader.tar_name(),
        member = %member_name
    );
    let _guard = span.enter();

    let segments = match reader.iter_segments(member_name) {
        Ok(segments) => segments,
        Err(err) => {
            warn!(
                error = %err,
                elapsed_micros = start.elapsed().as_micros(),
                "ingest_failure"
            );
            return Err(err);
        }
    };

    let mut out = Vec::with_capacity(segments.len());
    let mut skipped = 0usize;
    for segment in segments {
        let context = FilterContext {
            key: Some(segment.key()),
            ..FilterContext::default()
        };
        match filter.skip_reason(&segment.header, &segment.html, &context) {
            Some(reason) => {
                skipped += 1;
                info!(
                    segment_index = segment.segment_index,
                    reason = %reason,
                    "segment_skipped"
                );
                out.push(FilteredSegment::Skip { segment, reason });
            }
            None => out.push(FilteredSegment::Keep(segment)),
        }
    }

    info!(
        segments = out.len(),
        skipped,
        elapsed_micros = start.elapsed().as_micros(),
        "ingest_success"
    );
    Ok(out)
}
