//! One-call workflows: enqueue, wait, then split or crop the source.

use tracing::{info, instrument};

use crate::config::ClientConfig;
use crate::error::{MindeeError, Result};
use crate::extraction::{extract_invoices, ExtractedImage, ExtractedPdf, ImageExtractor};
use crate::http_client::{MindeeClient, ProductQueue};
use crate::input::{InputSource, LocalInputSource};
use crate::polling::AsyncPoller;
use crate::product::{InvoiceSplitterV1, MultiReceiptsDetectorV1, Product};

/// High-level client.
#[derive(Debug, Clone)]
pub struct Client {
    http: MindeeClient,
    poller: AsyncPoller,
}

impl Client {
    /// Fails with a `Config` error when `config` cannot reach the API.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            http: MindeeClient::new(config)?,
            poller: AsyncPoller::new(config.polling),
        })
    }

    /// Replace the poller, e.g. to attach a cancel flag.
    #[must_use]
    pub fn with_poller(mut self, poller: AsyncPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn http(&self) -> &MindeeClient {
        &self.http
    }

    /// Enqueue `source` on `P`'s endpoint and wait for the parsed result.
    pub async fn enqueue_and_parse<P: Product>(&self, source: &InputSource) -> Result<P> {
        let queue = ProductQueue::<P>::new(&self.http);
        self.poller.enqueue_and_poll(&queue, source).await
    }

    /// Classify the pages of `source`, then split it into one PDF per invoice.
    #[instrument(skip(self, source), fields(source = source.filename()))]
    pub async fn split_invoices(&self, source: &LocalInputSource, strict: bool) -> Result<Vec<ExtractedPdf>> {
        if !source.is_pdf() {
            return Err(MindeeError::MimeType(format!(
                "{} is {}, only PDFs can be split",
                source.filename(),
                source.kind()
            )));
        }
        let input = InputSource::Local(source.clone());
        let result: InvoiceSplitterV1 = self.enqueue_and_parse(&input).await?;
        info!(groups = result.invoice_page_groups.len(), "Page groups received");
        extract_invoices(source, &result.invoice_page_groups, strict)
    }

    /// Detect the receipts on every page of `source` and crop them out.
    #[instrument(skip(self, source), fields(source = source.filename()))]
    pub async fn extract_receipts(&self, source: &LocalInputSource) -> Result<Vec<ExtractedImage>> {
        // Fails on unsupported content before anything is uploaded.
        let extractor = ImageExtractor::new(source)?;
        let input = InputSource::Local(source.clone());
        let result: MultiReceiptsDetectorV1 = self.enqueue_and_parse(&input).await?;
        info!(receipts = result.receipt_count(), "Receipts detected");
        extractor.extract_all(&result.polygons())
    }
}
