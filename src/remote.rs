//! Client for the remote review service.
//!
//! Uploads a document as multipart form data and normalises the JSON reply.
//! No local extraction or summarisation happens on this path.

use crate::document::{DocumentKind, SourceDocument};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Default timeout for an upload round-trip
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Upload failed with status {status}")]
    Transport { status: u16 },
    #[error("Failed to parse server response")]
    ResponseParse(#[source] serde_json::Error),
    #[error("Network error during upload: {0}")]
    Network(#[source] reqwest::Error),
}

impl RemoteError {
    /// Status code of a transport failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Transport { status } => Some(*status),
            _ => None,
        }
    }
}

/// Identifiers arrive as numbers from some deployments and strings from others.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Text(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    results: Vec<UploadResult>,
}

#[derive(Debug, Deserialize)]
struct UploadResult {
    file_name: String,
    paper_id: Scalar,
    analysis_id: Scalar,
    #[serde(default)]
    metadata: Option<RawMetadata>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    year: Option<Scalar>,
}

/// Bibliographic details the service may extract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub author: Option<String>,
    pub title: Option<String>,
    pub year: Option<String>,
}

/// Normalised per-file result of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteReview {
    pub file_name: String,
    pub paper_id: String,
    pub analysis_id: String,
    pub metadata: Option<PaperMetadata>,
    pub message: String,
}

impl RemoteReview {
    /// Human-readable rendering used as the stored analysis text.
    pub fn render(&self) -> String {
        let mut lines = vec![format!("### {}", self.file_name)];
        if let Some(meta) = &self.metadata {
            if let Some(title) = &meta.title {
                lines.push(format!("Title: {title}"));
            }
            if let Some(author) = &meta.author {
                lines.push(format!("Author: {author}"));
            }
            if let Some(year) = &meta.year {
                lines.push(format!("Year: {year}"));
            }
        }
        lines.push(format!("Paper: {} / Analysis: {}", self.paper_id, self.analysis_id));
        lines.push(self.message.clone());
        lines.join("\n")
    }
}

impl From<UploadResult> for RemoteReview {
    fn from(raw: UploadResult) -> Self {
        Self {
            file_name: raw.file_name,
            paper_id: raw.paper_id.to_string(),
            analysis_id: raw.analysis_id.to_string(),
            metadata: raw.metadata.map(|m| PaperMetadata {
                author: m.author,
                title: m.title,
                year: m.year.map(|y| y.to_string()),
            }),
            message: raw.message,
        }
    }
}

/// Uploads documents to a collection on the remote review service.
#[derive(Debug, Clone)]
pub struct RemoteReviewClient {
    base_url: String,
    timeout: Duration,
}

impl RemoteReviewClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: UPLOAD_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Collection-scoped upload endpoint.
    pub fn upload_url(&self, collection: &str) -> String {
        format!("{}/collections/{}/upload", self.base_url, collection)
    }

    /// Upload one document and return the service's per-file results.
    pub async fn upload(
        &self,
        doc: &SourceDocument,
        collection: &str,
    ) -> Result<Vec<RemoteReview>, RemoteError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(RemoteError::Network)?;

        let part = Part::bytes(doc.bytes().to_vec())
            .file_name(doc.name().to_string())
            .mime_str(mime_for(doc.kind()))
            .map_err(RemoteError::Network)?;
        let form = Form::new().part("files", part);

        let url = self.upload_url(collection);
        debug!(url = %url, document = %doc.name(), "uploading document");

        let response = client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(RemoteError::Network)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RemoteError::Transport {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(RemoteError::Network)?;
        let parsed: UploadResponse =
            serde_json::from_str(&body).map_err(RemoteError::ResponseParse)?;

        let reviews: Vec<RemoteReview> = parsed.results.into_iter().map(Into::into).collect();
        info!(document = %doc.name(), results = reviews.len(), "remote review received");
        Ok(reviews)
    }
}

fn mime_for(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Pdf => "application/pdf",
        DocumentKind::PlainText => "text/plain",
        DocumentKind::Unsupported => "application/octet-stream",
    }
}
