//! HTTP transport for the document API.
//!
//! Features:
//! - Token authentication and a versioned User-Agent on every request
//! - Multipart upload for local documents, JSON body for remote URLs
//! - Brotli/Gzip/Deflate negotiated, HTTP/2 when the server offers it
//! - Typed errors for 4xx/5xx carrying the server's error block

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{multipart, Client, Response};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::config::ClientConfig;
use crate::error::{MindeeError, Result};
use crate::input::InputSource;
use crate::parsing::{ApiRequest, ApiResponse, Job, JobStatus};
use crate::polling::{JobQueue, JobState};
use crate::product::Product;

pub const USER_AGENT: &str = concat!("mindee-rust/", env!("CARGO_PKG_VERSION"));

/// A product's address on the API: `products/{owner}/{url_name}/v{version}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub owner: Cow<'static, str>,
    pub url_name: Cow<'static, str>,
    pub version: Cow<'static, str>,
}

impl Endpoint {
    pub const fn new(owner: &'static str, url_name: &'static str, version: &'static str) -> Self {
        Self {
            owner: Cow::Borrowed(owner),
            url_name: Cow::Borrowed(url_name),
            version: Cow::Borrowed(version),
        }
    }

    /// Endpoint of a custom-built product.
    pub fn custom(owner: impl Into<String>, url_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            owner: Cow::Owned(owner.into()),
            url_name: Cow::Owned(url_name.into()),
            version: Cow::Owned(version.into()),
        }
    }

    fn product_url(&self, base_url: &str) -> String {
        format!(
            "{}/products/{}/{}/v{}",
            base_url.trim_end_matches('/'),
            self.owner,
            self.url_name,
            self.version
        )
    }

    pub fn enqueue_url(&self, base_url: &str) -> String {
        format!("{}/predict_async", self.product_url(base_url))
    }

    pub fn queue_url(&self, base_url: &str, job_id: &str) -> String {
        format!("{}/documents/queue/{job_id}", self.product_url(base_url))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} v{}", self.owner, self.url_name, self.version)
    }
}

/// Authenticated client for the document API.
#[derive(Debug, Clone)]
pub struct MindeeClient {
    client: Client,
    base_url: String,
}

impl MindeeClient {
    /// Build a client; fails with a `Config` error on an unusable config.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let key = config.api_key.as_deref().unwrap_or_default();
        let mut auth = HeaderValue::from_str(&format!("Token {key}"))
            .map_err(|_| MindeeError::Config("API key contains invalid header characters".into()))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .brotli(true)
            .gzip(true)
            .deflate(true)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(config.request_timeout)
            // The queue endpoint redirects to the document once it is ready.
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a document for asynchronous processing.
    #[instrument(skip(self, source), fields(endpoint = %endpoint))]
    pub async fn enqueue(&self, endpoint: &Endpoint, source: &InputSource) -> Result<ApiResponse> {
        let url = endpoint.enqueue_url(&self.base_url);
        let request = match source {
            InputSource::Local(local) => {
                let part = multipart::Part::bytes(local.bytes().to_vec())
                    .file_name(local.filename().to_string())
                    .mime_str(local.kind().mime_type())?;
                debug!(filename = local.filename(), len = local.bytes().len(), "Uploading document");
                self.client
                    .post(&url)
                    .multipart(multipart::Form::new().part("document", part))
            }
            InputSource::Url(remote) => {
                debug!(url = %remote.url(), "Enqueuing remote document");
                self.client
                    .post(&url)
                    .json(&serde_json::json!({ "document": remote.url().as_str() }))
            }
        };

        let response = parse_response(request.send().await?).await?;
        info!(job_id = %response.job.id, status = %response.job.status, "Document enqueued");
        Ok(response)
    }

    /// Fetch the current state of a job.
    #[instrument(skip(self), fields(endpoint = %endpoint))]
    pub async fn get_queued(&self, endpoint: &Endpoint, job_id: &str) -> Result<ApiResponse> {
        let url = endpoint.queue_url(&self.base_url, job_id);
        let response = parse_response(self.client.get(&url).send().await?).await?;
        debug!(status = %response.job.status, "Job state received");
        Ok(response)
    }
}

/// Error envelope of a non-2xx response.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    api_request: ApiRequest,
}

/// Typed error for a non-2xx `status` with response `body`.
pub(crate) fn error_from_body(status: reqwest::StatusCode, body: &str) -> MindeeError {
    let error = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.api_request.error);
    let (code, message, details) = match error {
        Some(e) => {
            let details = e.details.as_ref().map(|d| match d {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            });
            (e.code, e.message, details)
        }
        None => (None, None, None),
    };
    let message = message.unwrap_or_else(|| {
        let reason = status.canonical_reason().unwrap_or("unexpected status");
        if body.trim().is_empty() {
            reason.to_string()
        } else {
            format!("{reason}: {}", truncate(body.trim(), 200))
        }
    });
    MindeeError::from_status(status.as_u16(), code, message, details)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

async fn parse_response(response: Response) -> Result<ApiResponse> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(error_from_body(status, &body));
    }
    serde_json::from_str(&body).map_err(|e| MindeeError::InvalidResponse(format!("{e}")))
}

/// Map a queue response onto the poller's view of the job.
pub(crate) fn job_state(response: ApiResponse) -> Result<JobState<serde_json::Value>> {
    Ok(match response.job.status {
        JobStatus::Waiting => JobState::Waiting,
        JobStatus::Processing => JobState::Processing,
        JobStatus::Failed => JobState::Failed(response.job.error),
        JobStatus::Processed => match response.document {
            Some(document) => JobState::Processed(document),
            None => {
                return Err(MindeeError::InvalidResponse(format!(
                    "job {} is processed but carries no document",
                    response.job.id
                )))
            }
        },
    })
}

/// The job queue of one product, yielding parsed product results.
pub struct ProductQueue<'a, P> {
    client: &'a MindeeClient,
    endpoint: Endpoint,
    _product: PhantomData<fn() -> P>,
}

impl<'a, P: Product> ProductQueue<'a, P> {
    pub fn new(client: &'a MindeeClient) -> Self {
        Self {
            client,
            endpoint: P::ENDPOINT,
            _product: PhantomData,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl<P: Product> JobQueue for ProductQueue<'_, P> {
    type Output = P;

    async fn enqueue(&self, source: &InputSource) -> Result<Job> {
        Ok(self.client.enqueue(&self.endpoint, source).await?.job)
    }

    async fn poll(&self, job_id: &str) -> Result<JobState<P>> {
        let response = self.client.get_queued(&self.endpoint, job_id).await?;
        Ok(match job_state(response)? {
            JobState::Processed(document) => JobState::Processed(P::from_document(&document)?),
            JobState::Waiting => JobState::Waiting,
            JobState::Processing => JobState::Processing,
            JobState::Failed(error) => JobState::Failed(error),
        })
    }
}
