//! Server payload types and the reconstructors built on them.
//!
//! - [`Job`], [`JobStatus`], [`ApiResponse`]: the async queue envelope
//! - [`PositionedField`], [`Field`]: field values carrying a polygon
//! - [`PageGroup`]: classifier output consumed by the invoice splitter
//! - [`ocr`]: words → reading-order lines
//! - [`line_items`]: per-column values → table rows

pub mod line_items;
pub mod ocr;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{MindeeError, Result};
use crate::geometry::Polygon;

pub use line_items::{reconstruct_table, reconstruct_table_from_fields, Line, DEFAULT_HEIGHT_TOLERANCE};
pub use ocr::{reconstruct_lines, Ocr, OcrLine, OcrPage, OcrWord};

/// Lifecycle of an asynchronous job.
///
/// `Processed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Processing,
    #[serde(rename = "completed", alias = "processed")]
    Processed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Processing => "processing",
            Self::Processed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Error reported by the server, either for a job or for a request.
///
/// The API sends `{}` when there is no error, so every member is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.message.is_none() && self.details.is_none()
    }

    /// Human-readable detail: `details` when it is a string, else `message`.
    pub fn detail(&self) -> Option<String> {
        match &self.details {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(serde_json::Value::Null) | None => self.message.clone(),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// An enqueued job, as last reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub issued_at: NaiveDateTime,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub available_at: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "deserialize_api_error")]
    pub error: Option<ApiError>,
}

/// Status block of every API response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiRequest {
    #[serde(default, deserialize_with = "deserialize_api_error")]
    pub error: Option<ApiError>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Envelope of the enqueue and queue-poll endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub api_request: ApiRequest,
    pub job: Job,
    /// Present once the job is processed.
    #[serde(default)]
    pub document: Option<serde_json::Value>,
}

/// A field value with its location on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedField {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub polygon: Polygon,
    #[serde(default)]
    pub page_id: Option<usize>,
}

impl PositionedField {
    pub fn new(content: impl Into<String>, confidence: f64, polygon: Polygon) -> Self {
        Self {
            content: content.into(),
            confidence,
            polygon,
            page_id: None,
        }
    }
}

/// A field of a generated document.
///
/// The variant is chosen by the `"kind"` marker of the payload:
///
/// ```json
/// {"kind": "simple", "content": "ACME", "confidence": 0.9, "polygon": []}
/// {"kind": "list", "values": [ ... ]}
/// {"kind": "object", "fields": {"name": { ... }}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Field {
    Simple(PositionedField),
    List {
        #[serde(default)]
        values: Vec<PositionedField>,
    },
    Object {
        #[serde(default)]
        fields: BTreeMap<String, Field>,
    },
}

impl Field {
    /// Positioned values of a simple or list field.
    ///
    /// Objects have no values of their own.
    pub fn values(&self) -> &[PositionedField] {
        match self {
            Self::Simple(v) => std::slice::from_ref(v),
            Self::List { values } => values,
            Self::Object { .. } => &[],
        }
    }

    /// Look up a sub-field of an object field.
    pub fn get(&self, name: &str) -> Option<&Field> {
        match self {
            Self::Object { fields } => fields.get(name),
            _ => None,
        }
    }
}

/// Pages the classifier believes form one logical document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageGroup {
    pub page_indexes: Vec<usize>,
    #[serde(default)]
    pub confidence: f64,
}

impl PageGroup {
    pub fn new(page_indexes: Vec<usize>, confidence: f64) -> Self {
        Self {
            page_indexes,
            confidence,
        }
    }
}

/// Parse a server timestamp, with or without a UTC offset.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| MindeeError::InvalidResponse(format!("bad timestamp {s:?}: {e}")))
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<NaiveDateTime, D::Error> {
    let s = String::deserialize(d)?;
    parse_timestamp(&s).map_err(serde::de::Error::custom)
}

fn deserialize_optional_timestamp<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<NaiveDateTime>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(s) if !s.is_empty() => parse_timestamp(&s).map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

/// `{}` and `null` both mean "no error".
fn deserialize_api_error<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<ApiError>, D::Error> {
    let err = Option::<ApiError>::deserialize(d)?;
    Ok(err.filter(|e| !e.is_empty()))
}
