//! `mindee` - Client for a hosted document-understanding API
//!
//! # Features
//!
//! - **Async jobs**: enqueue a document, poll until it is processed
//! - **Invoice splitting**: cut a multi-invoice PDF along classifier page groups
//! - **Region cropping**: crop detected receipts/regions out of images and PDF pages
//! - **Reconstruction**: rebuild reading-order OCR lines and table rows from boxes
//!
//! # Example
//!
//! ```rust,no_run
//! use mindee::{Client, ClientConfig, LocalInputSource};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Client::new(&ClientConfig::load()?)?;
//!     let source = LocalInputSource::from_path("invoices.pdf")?;
//!     for invoice in client.split_invoices(&source, true).await? {
//!         invoice.write_to_dir(".")?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod extraction;
pub mod geometry;
pub mod http_client;
pub mod input;
pub mod parsing;
pub mod polling;
pub mod product;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{MindeeError, Result};
pub use extraction::{
    extract_invoices, extract_regions, split_page_groups, ExtractedImage, ExtractedPdf, ImageExtractor,
};
pub use geometry::{BoundingBox, Point, Polygon, Quadrilateral};
pub use http_client::{Endpoint, MindeeClient, ProductQueue};
pub use input::{DocumentKind, InputSource, LocalInputSource, PageOperation, PageOptions, UrlInputSource};
pub use parsing::{
    reconstruct_lines, reconstruct_table, Field, Job, JobStatus, Line, OcrLine, OcrWord, PageGroup,
    PositionedField,
};
pub use polling::{AsyncPoller, JobQueue, JobState, PollingOptions};
pub use product::{InvoiceSplitterV1, MultiReceiptsDetectorV1, Product};

/// Version of the client, as sent in the User-Agent.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
