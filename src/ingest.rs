//! Document ingestion from local files or URLs.
//!
//! Uses reqwest for downloads; kind inference lives in [`DocumentKind`].

use crate::document::{DocumentKind, SourceDocument};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// User-Agent string identifying this client
const USER_AGENT: &str = concat!(
    "digestor/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/cladam/digestor)"
);

/// Default timeout for downloads
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch URL: {0}")]
    FetchError(#[from] reqwest::Error),
    #[error("download of {url} failed with status {status}")]
    BadStatus { url: String, status: u16 },
    #[error("no content found at {0}")]
    NoContent(String),
}

/// Load a document from a path or an `http(s)://` URL.
pub async fn load(input: &str) -> Result<SourceDocument, IngestError> {
    if input.starts_with("http://") || input.starts_with("https://") {
        from_url(input).await
    } else {
        from_path(input).await
    }
}

/// Read a document from the local filesystem.
pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<SourceDocument, IngestError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| IngestError::ReadError {
            path: path.display().to_string(),
            source,
        })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!(name = %name, bytes = bytes.len(), "read document from disk");
    Ok(SourceDocument::new(name, bytes))
}

/// Create a configured HTTP client for downloads
fn create_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
}

/// Download a document over HTTP.
pub async fn from_url(url: &str) -> Result<SourceDocument, IngestError> {
    let client = create_client()?;
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::BadStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let mime_kind = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(DocumentKind::from_mime);

    let bytes = response.bytes().await?.to_vec();
    if bytes.is_empty() {
        return Err(IngestError::NoContent(url.to_string()));
    }

    let name = name_from_url(url);
    debug!(name = %name, bytes = bytes.len(), "downloaded document");

    Ok(match mime_kind {
        Some(kind) => SourceDocument::with_kind(name, kind, bytes),
        None => SourceDocument::new(name, bytes),
    })
}

/// Last non-empty path segment of a URL, without query or fragment.
fn name_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && !s.contains(':'))
        .unwrap_or(url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn url_names_drop_query_and_fragment() {
        assert_eq!(
            name_from_url("https://example.org/papers/attention.pdf?dl=1"),
            "attention.pdf"
        );
        assert_eq!(name_from_url("https://example.org/a/b/#top"), "b");
        assert_eq!(name_from_url("https://example.org"), "example.org");
    }

    #[tokio::test]
    async fn reads_file_and_infers_kind() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "Abstract\nhello").unwrap();

        let doc = from_path(file.path()).await.unwrap();
        assert_eq!(doc.kind(), DocumentKind::PlainText);
        assert_eq!(doc.bytes(), b"Abstract\nhello");
    }

    #[tokio::test]
    async fn missing_file_reports_path() {
        let err = from_path("/definitely/not/here.pdf").await.unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.pdf"));
    }
}
