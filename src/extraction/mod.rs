//! Turning one uploaded document into several.
//!
//! - [`pdf`]: split a PDF along classifier page groups (lossless page copy)
//! - [`image`]: crop detected regions out of a page

pub mod image;
pub mod pdf;

pub use self::image::{extract_regions, ExtractedImage, ImageExtractor};
pub use self::pdf::{
    extract_invoices, extract_sub_documents, split_page_groups, ExtractedPdf,
    STRICT_CONFIDENCE_THRESHOLD,
};
