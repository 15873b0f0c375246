//! Splitting a multi-document PDF along classifier page groups.
//!
//! ```text
//! PageGroup[] → split_page_groups(strict) → page units → lopdf page copy → ExtractedPdf[]
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{MindeeError, Result};
use crate::input::{pdf, LocalInputSource};
use crate::parsing::PageGroup;

/// Groups below this confidence are folded into their neighbour in strict mode.
pub const STRICT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// One sub-document cut out of a source PDF.
#[derive(Clone)]
pub struct ExtractedPdf {
    bytes: Vec<u8>,
    filename: String,
    /// 0-based indexes of the source pages, in output order.
    page_indexes: Vec<usize>,
}

impl std::fmt::Debug for ExtractedPdf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractedPdf")
            .field("filename", &self.filename)
            .field("page_indexes", &self.page_indexes)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ExtractedPdf {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn page_indexes(&self) -> &[usize] {
        &self.page_indexes
    }

    /// First and last source page, 0-based like [`page_indexes`](Self::page_indexes).
    ///
    /// The filename shows the same range 1-based.
    pub fn source_range(&self) -> (usize, usize) {
        let first = self.page_indexes.first().copied().unwrap_or_default();
        let last = self.page_indexes.last().copied().unwrap_or_default();
        (first, last)
    }

    pub fn page_count(&self) -> usize {
        self.page_indexes.len()
    }

    /// Write the sub-document into `dir` under its own filename.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        debug!(path = %path.display(), "Wrote sub-document");
        Ok(path)
    }

    /// Re-wrap the sub-document for another API call.
    pub fn as_input_source(&self) -> Result<LocalInputSource> {
        LocalInputSource::from_bytes(self.bytes.clone(), self.filename.clone())
    }
}

/// Turn classifier page groups into extraction units.
///
/// Non-strict: every group is a unit. Strict: a confident group starts a
/// unit, a trailing unconfident group joins the unit before it, any other
/// unconfident group closes the pending unit and stands alone.
///
/// Empty units are never produced. An empty group list is an error.
pub fn split_page_groups(groups: &[PageGroup], strict: bool) -> Result<Vec<Vec<usize>>> {
    if groups.is_empty() {
        return Err(MindeeError::Extraction("no page groups to split on".into()));
    }
    if !strict {
        return Ok(groups.iter().map(|g| g.page_indexes.clone()).collect());
    }

    let mut units: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let last = groups.len() - 1;

    for (i, group) in groups.iter().enumerate() {
        let confident = group.confidence >= STRICT_CONFIDENCE_THRESHOLD;
        if confident && i == 0 {
            current.clone_from(&group.page_indexes);
        } else if confident && i != last {
            flush(&mut units, std::mem::take(&mut current));
            current.clone_from(&group.page_indexes);
        } else if !confident && i == last {
            current.extend_from_slice(&group.page_indexes);
            flush(&mut units, std::mem::take(&mut current));
        } else {
            flush(&mut units, std::mem::take(&mut current));
            flush(&mut units, group.page_indexes.clone());
        }
    }
    flush(&mut units, current);

    debug!(groups = groups.len(), units = units.len(), "Strict split");
    Ok(units)
}

/// Close a unit; empty accumulators are dropped.
fn flush(units: &mut Vec<Vec<usize>>, pages: Vec<usize>) {
    if !pages.is_empty() {
        units.push(pages);
    }
}

/// Cut `source` into one PDF per unit.
///
/// Every unit is validated before any document is built.
pub fn extract_sub_documents(source: &LocalInputSource, units: &[Vec<usize>]) -> Result<Vec<ExtractedPdf>> {
    if !source.is_pdf() {
        return Err(MindeeError::MimeType(format!(
            "{} is {}, only PDFs can be split",
            source.filename(),
            source.kind()
        )));
    }
    let document = pdf::load(source.bytes())?;
    let page_count = document.get_pages().len();
    for unit in units {
        pdf::validate_pages(unit, page_count)?;
    }

    let stem = source.stem();
    let ext = source.extension();
    let mut out = Vec::with_capacity(units.len());
    for unit in units {
        let bytes = pdf::copy_pages(&document, unit)?;
        // Validated non-empty above.
        let (first, last) = (unit[0], unit[unit.len() - 1]);
        let filename = format!("{stem}_{:03}-{:03}{ext}", first + 1, last + 1);
        debug!(%filename, pages = ?unit, "Extracted sub-document");
        out.push(ExtractedPdf {
            bytes,
            filename,
            page_indexes: unit.clone(),
        });
    }
    Ok(out)
}

/// Split `source` along classifier page groups.
pub fn extract_invoices(source: &LocalInputSource, groups: &[PageGroup], strict: bool) -> Result<Vec<ExtractedPdf>> {
    let units = split_page_groups(groups, strict)?;
    let docs = extract_sub_documents(source, &units)?;
    info!(
        source = source.filename(),
        strict,
        documents = docs.len(),
        "Split invoices"
    );
    Ok(docs)
}
