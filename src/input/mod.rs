//! Documents to send to the API.
//!
//! A [`LocalInputSource`] is always fully read into memory on construction,
//! so no file handle outlives the call that created it. Content is sniffed
//! from magic bytes, the filename is only used to name outputs.

pub mod pdf;

use std::fmt;
use std::path::Path;

use base64::Engine as _;
use tracing::debug;
use url::Url;

use crate::error::{MindeeError, Result};

/// Formats the API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Jpeg,
    Png,
    Tiff,
    Webp,
    Heic,
}

impl DocumentKind {
    /// Sniff the kind of `bytes` from their signature.
    pub fn detect(bytes: &[u8]) -> Result<Self> {
        let Some(kind) = infer::get(bytes) else {
            return Err(MindeeError::MimeType("unknown content type".into()));
        };
        match kind.mime_type() {
            "application/pdf" => Ok(Self::Pdf),
            "image/jpeg" => Ok(Self::Jpeg),
            "image/png" => Ok(Self::Png),
            "image/tiff" => Ok(Self::Tiff),
            "image/webp" => Ok(Self::Webp),
            "image/heif" | "image/heic" => Ok(Self::Heic),
            other => Err(MindeeError::MimeType(format!("unsupported content type {other}"))),
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Tiff => "image/tiff",
            Self::Webp => "image/webp",
            Self::Heic => "image/heic",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Tiff => "tiff",
            Self::Webp => "webp",
            Self::Heic => "heic",
        }
    }

    /// Raster format for decoding and re-encoding, if `image` handles it.
    pub fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            Self::Jpeg => Some(image::ImageFormat::Jpeg),
            Self::Png => Some(image::ImageFormat::Png),
            Self::Tiff => Some(image::ImageFormat::Tiff),
            Self::Webp => Some(image::ImageFormat::WebP),
            Self::Pdf | Self::Heic => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// What to do with [`PageOptions::page_indexes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageOperation {
    #[default]
    KeepOnly,
    Remove,
}

/// Page cut applied to a PDF before upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOptions {
    /// 0-based; negative values count from the end (`-1` is the last page).
    pub page_indexes: Vec<isize>,
    pub operation: PageOperation,
    /// Only cut documents with at least this many pages.
    pub on_min_pages: usize,
}

impl PageOptions {
    pub fn keep_only(page_indexes: Vec<isize>) -> Self {
        Self {
            page_indexes,
            operation: PageOperation::KeepOnly,
            on_min_pages: 0,
        }
    }

    pub fn remove(page_indexes: Vec<isize>) -> Self {
        Self {
            page_indexes,
            operation: PageOperation::Remove,
            on_min_pages: 0,
        }
    }

    #[must_use]
    pub fn on_min_pages(mut self, pages: usize) -> Self {
        self.on_min_pages = pages;
        self
    }

    /// Resolve to sorted, deduplicated 0-based indexes to keep.
    fn pages_to_keep(&self, page_count: usize) -> Result<Vec<usize>> {
        let mut selected = Vec::with_capacity(self.page_indexes.len());
        for &index in &self.page_indexes {
            let resolved = if index < 0 {
                page_count as isize + index
            } else {
                index
            };
            if resolved < 0 || resolved as usize >= page_count {
                return Err(MindeeError::PageOutOfRange {
                    index: index as i64,
                    page_count,
                });
            }
            selected.push(resolved as usize);
        }
        selected.sort_unstable();
        selected.dedup();

        let keep = match self.operation {
            PageOperation::KeepOnly => selected,
            PageOperation::Remove => (0..page_count).filter(|i| selected.binary_search(i).is_err()).collect(),
        };
        if keep.is_empty() {
            return Err(MindeeError::Extraction("page options would remove every page".into()));
        }
        Ok(keep)
    }
}

/// A document held in memory.
#[derive(Clone)]
pub struct LocalInputSource {
    bytes: Vec<u8>,
    filename: String,
    kind: DocumentKind,
}

impl fmt::Debug for LocalInputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalInputSource")
            .field("filename", &self.filename)
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl LocalInputSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| MindeeError::Source(format!("{} has no file name", path.display())))?;
        Self::from_bytes(bytes, filename)
    }

    pub fn from_bytes(bytes: Vec<u8>, filename: impl Into<String>) -> Result<Self> {
        let filename = filename.into();
        if bytes.is_empty() {
            return Err(MindeeError::Source(format!("{filename} is empty")));
        }
        let kind = DocumentKind::detect(&bytes)?;
        debug!(%filename, %kind, len = bytes.len(), "Loaded input source");
        Ok(Self {
            bytes,
            filename,
            kind,
        })
    }

    pub fn from_base64(data: &str, filename: impl Into<String>) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| MindeeError::Source(format!("invalid base64: {e}")))?;
        Self::from_bytes(bytes, filename)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn is_pdf(&self) -> bool {
        self.kind == DocumentKind::Pdf
    }

    /// Filename without its last extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.filename)
    }

    /// Extension of the filename including the dot, or the detected one.
    pub fn extension(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .and_then(|s| s.to_str())
            .map_or_else(|| format!(".{}", self.kind.extension()), |e| format!(".{e}"))
    }

    /// Pages in the document; images have one.
    pub fn page_count(&self) -> Result<usize> {
        if self.is_pdf() {
            pdf::page_count(&self.bytes)
        } else {
            Ok(1)
        }
    }

    /// Cut pages out of a PDF in place.
    ///
    /// Documents shorter than `options.on_min_pages` are left untouched.
    pub fn apply_page_options(&mut self, options: &PageOptions) -> Result<()> {
        if !self.is_pdf() {
            return Err(MindeeError::Source(format!(
                "page options only apply to PDFs, {} is {}",
                self.filename, self.kind
            )));
        }
        let page_count = self.page_count()?;
        if page_count < options.on_min_pages {
            debug!(page_count, min = options.on_min_pages, "Document too short, pages not cut");
            return Ok(());
        }
        let keep = options.pages_to_keep(page_count)?;
        self.bytes = pdf::new_document_from_pages(&self.bytes, &keep)?;
        debug!(before = page_count, after = keep.len(), "Applied page options");
        Ok(())
    }
}

/// A document the API fetches itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlInputSource {
    url: Url,
}

impl UrlInputSource {
    /// Only `https` URLs are accepted.
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| MindeeError::Source(format!("invalid URL {url:?}: {e}")))?;
        if url.scheme() != "https" {
            return Err(MindeeError::Source(format!("URL must use https: {url}")));
        }
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Anything that can be enqueued.
#[derive(Debug, Clone)]
pub enum InputSource {
    Local(LocalInputSource),
    Url(UrlInputSource),
}

impl From<LocalInputSource> for InputSource {
    fn from(source: LocalInputSource) -> Self {
        Self::Local(source)
    }
}

impl From<UrlInputSource> for InputSource {
    fn from(source: UrlInputSource) -> Self {
        Self::Url(source)
    }
}

#[cfg(test)]
mod tests {
    use super::pdf::fixtures::{page_markers, sample_pdf};
    use super::*;

    const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01,
    ];

    #[test]
    fn detects_pdf_and_png() {
        assert_eq!(DocumentKind::detect(&sample_pdf(1)).unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::detect(PNG_1X1).unwrap(), DocumentKind::Png);
    }

    #[test]
    fn rejects_unknown_content() {
        let err = LocalInputSource::from_bytes(b"hello world".to_vec(), "notes.txt").unwrap_err();
        assert!(matches!(err, MindeeError::MimeType(_)));
    }

    #[test]
    fn rejects_empty_file() {
        let err = LocalInputSource::from_bytes(Vec::new(), "empty.pdf").unwrap_err();
        assert!(matches!(err, MindeeError::Source(_)));
    }

    #[test]
    fn base64_round_trip_keeps_kind() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(sample_pdf(2));
        let source = LocalInputSource::from_base64(&encoded, "doc.pdf").unwrap();
        assert!(source.is_pdf());
        assert_eq!(source.page_count().unwrap(), 2);
        assert!(LocalInputSource::from_base64("%%%", "doc.pdf").is_err());
    }

    #[test]
    fn stem_and_extension() {
        let source = LocalInputSource::from_bytes(sample_pdf(1), "scans/batch.01.pdf").unwrap();
        assert_eq!(source.stem(), "batch.01");
        assert_eq!(source.extension(), ".pdf");

        let bare = LocalInputSource::from_bytes(sample_pdf(1), "upload").unwrap();
        assert_eq!(bare.stem(), "upload");
        assert_eq!(bare.extension(), ".pdf");
    }

    #[test]
    fn keep_only_with_negative_index() {
        let mut source = LocalInputSource::from_bytes(sample_pdf(5), "doc.pdf").unwrap();
        source
            .apply_page_options(&PageOptions::keep_only(vec![0, -1]))
            .unwrap();
        assert_eq!(page_markers(source.bytes()), vec![0, 4]);
    }

    #[test]
    fn remove_pages() {
        let mut source = LocalInputSource::from_bytes(sample_pdf(4), "doc.pdf").unwrap();
        source
            .apply_page_options(&PageOptions::remove(vec![1, 2]))
            .unwrap();
        assert_eq!(page_markers(source.bytes()), vec![0, 3]);
    }

    #[test]
    fn short_documents_are_not_cut() {
        let mut source = LocalInputSource::from_bytes(sample_pdf(2), "doc.pdf").unwrap();
        source
            .apply_page_options(&PageOptions::keep_only(vec![0]).on_min_pages(3))
            .unwrap();
        assert_eq!(source.page_count().unwrap(), 2);
    }

    #[test]
    fn page_options_errors() {
        let mut source = LocalInputSource::from_bytes(sample_pdf(2), "doc.pdf").unwrap();
        let err = source
            .apply_page_options(&PageOptions::keep_only(vec![7]))
            .unwrap_err();
        assert!(matches!(err, MindeeError::PageOutOfRange { index: 7, .. }));

        let err = source
            .apply_page_options(&PageOptions::remove(vec![0, 1]))
            .unwrap_err();
        assert!(matches!(err, MindeeError::Extraction(_)));
    }

    #[test]
    fn url_source_requires_https() {
        assert!(UrlInputSource::new("https://example.com/invoice.pdf").is_ok());
        assert!(matches!(
            UrlInputSource::new("http://example.com/invoice.pdf"),
            Err(MindeeError::Source(_))
        ));
        assert!(UrlInputSource::new("not a url").is_err());
    }
}
