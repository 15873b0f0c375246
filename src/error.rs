//! Error types shared by every component of the client.

use thiserror::Error;

/// Placeholder used when a failed job carries no server-side detail.
pub const NO_DETAIL: &str = "no detail available";

/// Client errors
#[derive(Error, Debug)]
pub enum MindeeError {
    /// Invalid polling delays/retries, missing API key, bad base URL.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Empty polygon, wrong vertex count, degenerate region.
    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Page index {index} is out of range (document has {page_count} pages)")]
    PageOutOfRange { index: i64, page_count: usize },

    #[error("Job {job_id} failed: {detail}")]
    JobFailed {
        job_id: String,
        code: Option<String>,
        detail: String,
    },

    #[error("Job {job_id} did not reach a terminal state after {attempts} attempts")]
    Timeout { job_id: String, attempts: u32 },

    #[error("Unsupported or unreadable content: {0}")]
    MimeType(String),

    #[error("Invalid input source: {0}")]
    Source(String),

    /// 4xx responses.
    #[error("HTTP {status} client error: {message}")]
    HttpClient {
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<String>,
    },

    /// 5xx responses.
    #[error("HTTP {status} server error: {message}")]
    HttpServer {
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<String>,
    },

    /// Any other non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Polling cancelled for job {0}")]
    Cancelled(String),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MindeeError>;

impl MindeeError {
    /// Whether retrying the same call later can reasonably succeed.
    ///
    /// Timeouts, 5xx and transport failures are retryable; malformed input
    /// (geometry, configuration, page ranges) and 4xx are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::HttpServer { .. } => true,
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Build the typed HTTP error for a non-2xx status.
    pub(crate) fn from_status(
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<String>,
    ) -> Self {
        match status {
            400..=499 => Self::HttpClient {
                status,
                code,
                message,
                details,
            },
            500..=599 => Self::HttpServer {
                status,
                code,
                message,
                details,
            },
            _ => Self::Http { status, message },
        }
    }
}

impl From<lopdf::Error> for MindeeError {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Self::Io(e),
            _ => Self::Pdf(err.to_string()),
        }
    }
}
