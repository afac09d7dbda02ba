//! Detection of segments that carry images, PDFs or other binary payloads.
//!
//! Checks run cheapest first: declared document type, then the header file
//! name, then a scan of the body. The first hit wins and is reported as a
//! [`SkipReason`].
//!
//! ```rust
//! use ingest::{detect_binary_segment, SegmentHeader};
//!
//! let mut header = SegmentHeader::new();
//! header.insert("type".into(), "GRAPHIC".into());
//! let reason = detect_binary_segment(&header, "").expect("graphic is binary");
//! assert_eq!(reason.to_string(), "doc_type:GRAPHIC");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::identifiers::SegmentKey;
use crate::segment::SegmentHeader;

/// Header keys that may declare the document type, in lookup order.
pub const DOC_TYPE_KEYS: [&str; 4] = ["doc_type", "type", "document_type", "document-type"];

const BINARY_DOC_TYPE_EXACT: [&str; 9] = [
    "EX-99.G", "EX-99.H", "EX-99.J", "EX-99.K", "EX-99.P", "EX-99.Q", "EX-99.G1", "EX-99.G2",
    "EX-99.H1",
];

const BINARY_DOC_TYPE_KEYWORDS: [&str; 9] = [
    "GRAPHIC", "IMAGE", "PDF", "PNG", "JPG", "JPEG", "GIF", "TIFF", "TIF",
];

const BINARY_FILENAME_EXTENSIONS: [&str; 9] =
    ["PDF", "PNG", "JPG", "JPEG", "GIF", "TIFF", "TIF", "BMP", "SVG"];

const FILENAME_KEYS: [&str; 3] = ["filename", "file", "name"];

/// Bodies with `<img>` and fewer visible ASCII alphanumerics than this are
/// treated as image-only.
const IMAGE_ONLY_MIN_ALNUM: usize = 32;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

/// Body-level signals of binary content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentSignal {
    PdfHeader,
    PdfReference,
    EmbeddedObject,
    DataUri,
    Base64Attachment,
    ImageOnly,
}

impl ContentSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSignal::PdfHeader => "pdf_header",
            ContentSignal::PdfReference => "pdf_reference",
            ContentSignal::EmbeddedObject => "embedded_object",
            ContentSignal::DataUri => "data_uri",
            ContentSignal::Base64Attachment => "base64_attachment",
            ContentSignal::ImageOnly => "image_only",
        }
    }
}

/// Why a segment was skipped. `Display` gives the `kind:detail` form
/// written to manifests, e.g. `doc_type:GRAPHIC` or `content:image_only`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Uppercased, trimmed document type.
    DocType(String),
    /// File name exactly as it appeared in the header.
    Filename(String),
    Content(ContentSignal),
    /// Free-form reason from a caller-supplied filter.
    Custom(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DocType(value) => write!(f, "doc_type:{value}"),
            SkipReason::Filename(name) => write!(f, "filename:{name}"),
            SkipReason::Content(signal) => write!(f, "content:{}", signal.as_str()),
            SkipReason::Custom(reason) => f.write_str(reason),
        }
    }
}

/// Extra facts a filter may look at besides header and body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterContext {
    pub key: Option<SegmentKey>,
    pub attributes: BTreeMap<String, String>,
}

/// Decides whether a segment should be skipped.
///
/// Closures with the matching signature implement this trait, so ad hoc
/// filters need no wrapper type:
///
/// ```rust
/// use ingest::{FilterContext, SegmentFilter, SegmentHeader, SkipReason};
///
/// let only_10k = |header: &SegmentHeader, _html: &str, _ctx: &FilterContext| {
///     match header.get("type").map(String::as_str) {
///         Some("10-K") => None,
///         _ => Some(SkipReason::Custom("not_10k".into())),
///     }
/// };
/// let header = SegmentHeader::new();
/// assert!(only_10k.skip_reason(&header, "", &FilterContext::default()).is_some());
/// ```
pub trait SegmentFilter: Send + Sync {
    fn skip_reason(
        &self,
        header: &SegmentHeader,
        html: &str,
        context: &FilterContext,
    ) -> Option<SkipReason>;
}

impl<F> SegmentFilter for F
where
    F: Fn(&SegmentHeader, &str, &FilterContext) -> Option<SkipReason> + Send + Sync,
{
    fn skip_reason(
        &self,
        header: &SegmentHeader,
        html: &str,
        context: &FilterContext,
    ) -> Option<SkipReason> {
        self(header, html, context)
    }
}

/// The stock filter: [`detect_binary_segment`], context ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinarySegmentFilter;

impl SegmentFilter for BinarySegmentFilter {
    fn skip_reason(
        &self,
        header: &SegmentHeader,
        html: &str,
        _context: &FilterContext,
    ) -> Option<SkipReason> {
        detect_binary_segment(header, html)
    }
}

/// First non-empty value among [`DOC_TYPE_KEYS`].
pub fn extract_doc_type(header: &SegmentHeader) -> Option<&str> {
    DOC_TYPE_KEYS
        .iter()
        .filter_map(|key| header.get(*key))
        .map(String::as_str)
        .find(|value| !value.is_empty())
}

/// Run every binary check in order and return the first reason found.
pub fn detect_binary_segment(header: &SegmentHeader, html: &str) -> Option<SkipReason> {
    extract_doc_type(header)
        .and_then(detect_binary_by_doc_type)
        .or_else(|| detect_binary_by_filename(header))
        .or_else(|| detect_binary_content(html).map(SkipReason::Content))
}

pub fn detect_binary_by_doc_type(doc_type: &str) -> Option<SkipReason> {
    let value = doc_type.trim().to_uppercase();
    if value.is_empty() {
        return None;
    }
    let binary = BINARY_DOC_TYPE_EXACT.contains(&value.as_str())
        || BINARY_DOC_TYPE_KEYWORDS
            .iter()
            .any(|keyword| value.contains(keyword));
    binary.then_some(SkipReason::DocType(value))
}

pub fn detect_binary_by_filename(header: &SegmentHeader) -> Option<SkipReason> {
    FILENAME_KEYS
        .iter()
        .filter_map(|key| header.get(*key))
        .filter(|candidate| !candidate.is_empty())
        .find(|candidate| {
            Path::new(candidate.as_str())
                .extension()
                .map(|ext| ext.to_string_lossy().to_uppercase())
                .is_some_and(|ext| BINARY_FILENAME_EXTENSIONS.contains(&ext.as_str()))
        })
        .map(|candidate| SkipReason::Filename(candidate.clone()))
}

pub fn detect_binary_content(html: &str) -> Option<ContentSignal> {
    let stripped = html.trim_start();
    let lowered = stripped.to_lowercase();

    if lowered.starts_with("%pdf") {
        return Some(ContentSignal::PdfHeader);
    }
    if lowered.contains("application/pdf") {
        return Some(ContentSignal::PdfReference);
    }
    if ["<object", "<embed", "<iframe"]
        .iter()
        .any(|needle| lowered.contains(needle))
    {
        return Some(ContentSignal::EmbeddedObject);
    }
    if lowered.contains("data:application/pdf") || lowered.contains("data:image") {
        return Some(ContentSignal::DataUri);
    }
    if lowered.contains("content-transfer-encoding: base64") || lowered.contains("begin base64") {
        return Some(ContentSignal::Base64Attachment);
    }
    if lowered.contains("<img") && is_image_only(stripped) {
        return Some(ContentSignal::ImageOnly);
    }
    None
}

fn is_image_only(html: &str) -> bool {
    let without_tags = TAG.replace_all(html, " ");
    without_tags
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(IMAGE_ONLY_MIN_ALNUM)
        .count()
        < IMAGE_ONLY_MIN_ALNUM
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(pairs: &[(&str, &str)]) -> SegmentHeader {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn doc_type_exact_and_keyword_matches() {
        let reason = detect_binary_segment(&header(&[("type", " ex-99.g1 ")]), "text");
        assert_eq!(reason, Some(SkipReason::DocType("EX-99.G1".into())));

        let reason = detect_binary_segment(&header(&[("document_type", "zip-image")]), "");
        assert_eq!(reason.map(|r| r.to_string()).as_deref(), Some("doc_type:ZIP-IMAGE"));

        assert_eq!(detect_binary_by_doc_type("10-K"), None);
    }

    #[test]
    fn doc_type_key_order() {
        let h = header(&[("doc_type", "10-K"), ("type", "GRAPHIC")]);
        assert_eq!(extract_doc_type(&h), Some("10-K"));
        assert_eq!(detect_binary_by_doc_type("10-K"), None);
    }

    #[test]
    fn filename_extension_matches() {
        let h = header(&[("type", "EX-99.1"), ("filename", "logo.Jpeg")]);
        assert_eq!(
            detect_binary_segment(&h, "<p>plenty of words in this exhibit body text</p>")
                .map(|r| r.to_string()),
            Some("filename:logo.Jpeg".to_string())
        );
        let h = header(&[("filename", "report.htm")]);
        assert_eq!(detect_binary_by_filename(&h), None);
    }

    #[test]
    fn content_signals() {
        let cases = [
            ("  %PDF-1.7 ...", ContentSignal::PdfHeader),
            ("<a href='x'>application/pdf</a>", ContentSignal::PdfReference),
            ("<p>See</p><IFRAME src='x'>", ContentSignal::EmbeddedObject),
            ("<img src=\"data:image/png;base64,AAAA\">", ContentSignal::DataUri),
            ("Content-Transfer-Encoding: base64\n", ContentSignal::Base64Attachment),
            ("<p><img src='chart.gif'></p><p>Chart</p>", ContentSignal::ImageOnly),
        ];
        for (body, expected) in cases {
            assert_eq!(detect_binary_content(body), Some(expected), "{body:?}");
        }
    }

    #[test]
    fn image_with_enough_text_is_kept() {
        let body = "<p>The following chart shows cumulative total shareholder return.</p>\
                    <img src='chart.gif'>";
        assert_eq!(detect_binary_content(body), None);
    }

    #[test]
    fn closure_filters_see_context() {
        let by_member = |_h: &SegmentHeader, _html: &str, ctx: &FilterContext| {
            ctx.attributes
                .get("skip")
                .map(|v| SkipReason::Custom(format!("manual:{v}")))
        };
        let mut ctx = FilterContext::default();
        assert_eq!(by_member.skip_reason(&SegmentHeader::new(), "", &ctx), None);
        ctx.attributes.insert("skip".into(), "yes".into());
        assert_eq!(
            by_member
                .skip_reason(&SegmentHeader::new(), "", &ctx)
                .map(|r| r.to_string()),
            Some("manual:yes".to_string())
        );
        assert_eq!(
            BinarySegmentFilter.skip_reason(&header(&[("type", "PDF")]), "", &ctx),
            Some(SkipReason::DocType("PDF".into()))
        );
    }
}
