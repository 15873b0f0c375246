//! Cropping detected regions out of a page.
//!
//! Images are decoded as-is and crops keep the source format. PDF pages are
//! rendered at their point size through pdfium (`pdf` feature) and crops
//! are encoded as JPEG.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::error::{MindeeError, Result};
use crate::geometry::{BoundingBox, Polygon};
use crate::input::{DocumentKind, LocalInputSource};

/// One region cropped out of a page.
#[derive(Clone)]
pub struct ExtractedImage {
    bytes: Vec<u8>,
    filename: String,
    page_index: usize,
    element_index: usize,
    width: u32,
    height: u32,
}

impl std::fmt::Debug for ExtractedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractedImage")
            .field("filename", &self.filename)
            .field("size", &(self.width, self.height))
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ExtractedImage {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn element_index(&self) -> usize {
        self.element_index
    }

    /// Pixel size of the crop.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn save_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        debug!(path = %path.display(), "Wrote cropped region");
        Ok(path)
    }

    /// Re-wrap the crop for another API call.
    pub fn as_input_source(&self) -> Result<LocalInputSource> {
        LocalInputSource::from_bytes(self.bytes.clone(), self.filename.clone())
    }
}

/// Crops regions of one source document.
pub struct ImageExtractor<'a> {
    source: &'a LocalInputSource,
    page_count: usize,
    /// Output format and extension.
    format: ImageFormat,
    extension: &'static str,
}

impl<'a> ImageExtractor<'a> {
    pub fn new(source: &'a LocalInputSource) -> Result<Self> {
        let kind = source.kind();
        let (format, extension) = match kind.image_format() {
            Some(format) => (format, kind.extension()),
            None if kind == DocumentKind::Pdf => (ImageFormat::Jpeg, DocumentKind::Jpeg.extension()),
            None => {
                return Err(MindeeError::MimeType(format!(
                    "cannot rasterize {}: {kind}",
                    source.filename()
                )))
            }
        };
        Ok(Self {
            source,
            page_count: source.page_count()?,
            format,
            extension,
        })
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Crop every polygon out of page `page_index` (0-based).
    ///
    /// Output order follows `polygons`. A region that rounds to zero pixels
    /// on either axis is a geometry error.
    pub fn extract_regions(&self, page_index: usize, polygons: &[Polygon]) -> Result<Vec<ExtractedImage>> {
        if page_index >= self.page_count {
            return Err(MindeeError::PageOutOfRange {
                index: page_index as i64,
                page_count: self.page_count,
            });
        }
        let page = self.rasterize(page_index)?;
        let stem = self.source.stem();

        let mut out = Vec::with_capacity(polygons.len());
        for (element_index, polygon) in polygons.iter().enumerate() {
            let (x, y, width, height) = pixel_rect(&polygon.bbox()?, page.width(), page.height())?;
            let crop = page.crop_imm(x, y, width, height);
            let bytes = self.encode(&crop)?;
            let filename = format!(
                "{stem}_page{page_index:03}-{element_index:03}.{}",
                self.extension
            );
            debug!(%filename, x, y, width, height, "Cropped region");
            out.push(ExtractedImage {
                bytes,
                filename,
                page_index,
                element_index,
                width,
                height,
            });
        }
        Ok(out)
    }

    /// Crop `regions[i]` out of page `i` for every page, in page order.
    ///
    /// Pages without regions are not rasterized.
    pub fn extract_all(&self, regions: &[Vec<Polygon>]) -> Result<Vec<ExtractedImage>> {
        let mut out = Vec::new();
        for (page_index, polygons) in regions.iter().enumerate() {
            if polygons.is_empty() {
                continue;
            }
            out.extend(self.extract_regions(page_index, polygons)?);
        }
        Ok(out)
    }

    fn rasterize(&self, page_index: usize) -> Result<DynamicImage> {
        if self.source.is_pdf() {
            return render_pdf_page(self.source.bytes(), page_index);
        }
        image::load_from_memory_with_format(self.source.bytes(), self.format)
            .map_err(|e| MindeeError::MimeType(format!("cannot decode {}: {e}", self.source.filename())))
    }

    fn encode(&self, crop: &DynamicImage) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        if self.format == ImageFormat::Jpeg {
            // JPEG has no alpha channel.
            DynamicImage::ImageRgb8(crop.to_rgb8()).write_to(&mut buf, self.format)?;
        } else {
            crop.write_to(&mut buf, self.format)?;
        }
        Ok(buf.into_inner())
    }
}

/// Crop `polygons` out of page `page_index` of `source`.
pub fn extract_regions(
    source: &LocalInputSource,
    page_index: usize,
    polygons: &[Polygon],
) -> Result<Vec<ExtractedImage>> {
    ImageExtractor::new(source)?.extract_regions(page_index, polygons)
}

/// Relative box → `(x, y, width, height)` in pixels, clamped to the page.
fn pixel_rect(bbox: &BoundingBox, width: u32, height: u32) -> Result<(u32, u32, u32, u32)> {
    let to_px = |v: f64, size: u32| (v * f64::from(size)).round().clamp(0.0, f64::from(size)) as u32;
    let (x0, x1) = (to_px(bbox.x_min, width), to_px(bbox.x_max, width));
    let (y0, y1) = (to_px(bbox.y_min, height), to_px(bbox.y_max, height));
    if x1 <= x0 || y1 <= y0 {
        return Err(MindeeError::Geometry(format!(
            "region {bbox:?} is empty at {width}x{height} pixels"
        )));
    }
    Ok((x0, y0, x1 - x0, y1 - y0))
}

#[cfg(feature = "pdf")]
fn render_pdf_page(bytes: &[u8], page_index: usize) -> Result<DynamicImage> {
    use pdfium_render::prelude::*;

    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| MindeeError::Pdf(format!("failed to bind pdfium: {e}")))?;
    let pdfium = Pdfium::new(bindings);
    let doc = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| MindeeError::MimeType(format!("not a readable PDF: {e}")))?;

    let index = u16::try_from(page_index).map_err(|_| MindeeError::PageOutOfRange {
        index: page_index as i64,
        page_count: usize::from(doc.pages().len()),
    })?;
    let page = doc
        .pages()
        .get(index)
        .map_err(|e| MindeeError::Pdf(format!("page {page_index}: {e}")))?;

    // 1pt = 1px, i.e. the page's native 72 dpi size.
    let config = PdfRenderConfig::new()
        .set_target_width(page.width().value.round() as i32)
        .set_target_height(page.height().value.round() as i32)
        .render_form_data(true)
        .render_annotations(true);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| MindeeError::Pdf(format!("failed to render page {page_index}: {e}")))?;
    Ok(bitmap.as_image())
}

#[cfg(not(feature = "pdf"))]
fn render_pdf_page(_bytes: &[u8], _page_index: usize) -> Result<DynamicImage> {
    Err(MindeeError::MimeType(
        "rasterizing PDF pages requires the `pdf` feature".into(),
    ))
}
