//! Just enough schema knowledge to feed the extractors.
//!
//! A [`Product`] names its endpoint and knows where its results live in a
//! processed document. Everything else in the payload is ignored.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{MindeeError, Result};
use crate::geometry::Polygon;
use crate::http_client::Endpoint;
use crate::parsing::PageGroup;

/// A parsed result of one API product.
pub trait Product: Sized + Send + 'static {
    const ENDPOINT: Endpoint;

    /// Parse the `document` object of a processed job.
    fn from_document(document: &Value) -> Result<Self>;
}

/// Value at `path` below `root`, or an `InvalidResponse` naming the gap.
fn pointer<'v>(root: &'v Value, path: &str) -> Result<&'v Value> {
    root.pointer(path)
        .ok_or_else(|| MindeeError::InvalidResponse(format!("document has no {path}")))
}

/// Page groups found by the invoice splitter.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceSplitterV1 {
    pub document_id: Option<String>,
    pub invoice_page_groups: Vec<PageGroup>,
}

impl Product for InvoiceSplitterV1 {
    const ENDPOINT: Endpoint = Endpoint::new("mindee", "invoice_splitter", "1");

    fn from_document(document: &Value) -> Result<Self> {
        let groups = pointer(document, "/inference/prediction/invoice_page_groups")?;
        let invoice_page_groups = Vec::<PageGroup>::deserialize(groups)
            .map_err(|e| MindeeError::InvalidResponse(format!("invoice_page_groups: {e}")))?;
        Ok(Self {
            document_id: document_id(document),
            invoice_page_groups,
        })
    }
}

/// One receipt found by the detector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectedReceipt {
    #[serde(default)]
    pub confidence: f64,
    #[serde(alias = "bounding_box")]
    pub polygon: Polygon,
}

#[derive(Debug, Deserialize)]
struct ReceiptsPrediction {
    #[serde(default)]
    receipts: Vec<DetectedReceipt>,
}

#[derive(Debug, Deserialize)]
struct DetectorPage {
    #[serde(default)]
    id: usize,
    prediction: ReceiptsPrediction,
}

/// Receipts found by the detector, grouped by page.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiReceiptsDetectorV1 {
    pub document_id: Option<String>,
    /// Indexed by page.
    pub pages: Vec<Vec<DetectedReceipt>>,
}

impl MultiReceiptsDetectorV1 {
    /// Receipt polygons, one list per page, as the image extractor wants them.
    pub fn polygons(&self) -> Vec<Vec<Polygon>> {
        self.pages
            .iter()
            .map(|receipts| receipts.iter().map(|r| r.polygon.clone()).collect())
            .collect()
    }

    pub fn receipt_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }
}

impl Product for MultiReceiptsDetectorV1 {
    const ENDPOINT: Endpoint = Endpoint::new("mindee", "multi_receipts_detector", "1");

    fn from_document(document: &Value) -> Result<Self> {
        let raw = pointer(document, "/inference/pages")?;
        let mut pages = Vec::<DetectorPage>::deserialize(raw)
            .map_err(|e| MindeeError::InvalidResponse(format!("pages: {e}")))?;
        pages.sort_by_key(|p| p.id);

        let mut by_page: Vec<Vec<DetectedReceipt>> = Vec::with_capacity(pages.len());
        for page in pages {
            if page.id >= by_page.len() {
                by_page.resize_with(page.id + 1, Vec::new);
            }
            by_page[page.id].extend(page.prediction.receipts);
        }
        Ok(Self {
            document_id: document_id(document),
            pages: by_page,
        })
    }
}

fn document_id(document: &Value) -> Option<String> {
    document.get("id").and_then(Value::as_str).map(str::to_string)
}
