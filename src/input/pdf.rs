//! PDF page primitives on top of `lopdf`.
//!
//! Pages are copied, never re-rendered: a sub-document is the source
//! document with every other page deleted and orphaned objects pruned.

use std::collections::BTreeSet;

use lopdf::Document;
use tracing::debug;

use crate::error::{MindeeError, Result};

/// Parse PDF bytes.
///
/// Anything `lopdf` cannot read is reported as unsupported content.
pub fn load(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| match e {
        lopdf::Error::IO(e) => MindeeError::Io(e),
        other => MindeeError::MimeType(format!("not a readable PDF: {other}")),
    })
}

pub fn page_count(bytes: &[u8]) -> Result<usize> {
    Ok(load(bytes)?.get_pages().len())
}

/// Check a page selection against a document of `page_count` pages.
pub(crate) fn validate_pages(page_indexes: &[usize], page_count: usize) -> Result<()> {
    if page_indexes.is_empty() {
        return Err(MindeeError::Extraction(
            "empty page index list, nothing to extract".into(),
        ));
    }
    if let Some(&index) = page_indexes.iter().find(|&&i| i >= page_count) {
        return Err(MindeeError::PageOutOfRange {
            index: index as i64,
            page_count,
        });
    }
    Ok(())
}

/// New PDF holding only `page_indexes` (0-based) of `bytes`.
///
/// Pages keep their original content and relative order.
pub fn new_document_from_pages(bytes: &[u8], page_indexes: &[usize]) -> Result<Vec<u8>> {
    copy_pages(&load(bytes)?, page_indexes)
}

/// Serialise a copy of `source` holding only `page_indexes` (0-based).
///
/// `source` itself is left untouched, so one parsed document can feed
/// any number of cuts.
pub fn copy_pages(source: &Document, page_indexes: &[usize]) -> Result<Vec<u8>> {
    let mut doc = source.clone();
    let pages = doc.get_pages();
    validate_pages(page_indexes, pages.len())?;

    let keep: BTreeSet<u32> = page_indexes.iter().map(|&i| i as u32 + 1).collect();
    let drop: Vec<u32> = pages.keys().copied().filter(|n| !keep.contains(n)).collect();

    doc.delete_pages(&drop);
    let pruned = doc.prune_objects();
    doc.compress();
    debug!(
        kept = keep.len(),
        dropped = drop.len(),
        pruned = pruned.len(),
        "Built sub-document"
    );

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}


#[cfg(test)]
mod tests {
    use super::fixtures::{page_markers, sample_pdf};
    use super::*;

    #[test]
    fn counts_pages() {
        assert_eq!(page_count(&sample_pdf(3)).unwrap(), 3);
    }

    #[test]
    fn garbage_is_a_mime_error() {
        let err = page_count(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, MindeeError::MimeType(_)));
    }

    #[test]
    fn copies_selected_pages_in_order() {
        let src = sample_pdf(5);
        let out = new_document_from_pages(&src, &[1, 2, 3]).unwrap();
        assert_eq!(page_markers(&out), vec![1, 2, 3]);
    }

    #[test]
    fn one_parsed_document_feeds_several_cuts() {
        let doc = load(&sample_pdf(4)).unwrap();
        let head = copy_pages(&doc, &[0, 1]).unwrap();
        let tail = copy_pages(&doc, &[3]).unwrap();
        assert_eq!(page_markers(&head), vec![0, 1]);
        assert_eq!(page_markers(&tail), vec![3]);
        assert_eq!(doc.get_pages().len(), 4);
    }

    #[test]
    fn rejects_empty_selection() {
        let err = new_document_from_pages(&sample_pdf(2), &[]).unwrap_err();
        assert!(matches!(err, MindeeError::Extraction(_)));
    }

    #[test]
    fn rejects_out_of_range_index() {
        let err = new_document_from_pages(&sample_pdf(2), &[0, 5]).unwrap_err();
        assert!(matches!(
            err,
            MindeeError::PageOutOfRange {
                index: 5,
                page_count: 2
            }
        ));
    }
}
