//! Text extraction for plain-text and PDF documents.
//!
//! PDF pages come from pdf-extract and are joined in page order.

use crate::document::{DocumentKind, ExtractedText, SourceDocument};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("unsupported format for {name}: {kind}")]
    UnsupportedFormat { name: String, kind: DocumentKind },
    #[error("extraction failed for {name}: {reason}")]
    ExtractionFailure { name: String, reason: String },
}

/// Serializable failure category recorded on a failed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    UnsupportedFormat,
    ExtractionFailure,
}

impl ExtractionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractionError::UnsupportedFormat { .. } => FailureKind::UnsupportedFormat,
            ExtractionError::ExtractionFailure { .. } => FailureKind::ExtractionFailure,
        }
    }

    fn failure(name: &str, reason: impl Into<String>) -> Self {
        ExtractionError::ExtractionFailure {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Turns raw document bytes into plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }

    pub async fn extract(&self, doc: &SourceDocument) -> Result<ExtractedText, ExtractionError> {
        match doc.kind() {
            DocumentKind::PlainText => extract_plain(doc),
            DocumentKind::Pdf => {
                let name = doc.name().to_string();
                let bytes = doc.bytes().to_vec();
                // pdf-extract is CPU bound and synchronous.
                tokio::task::spawn_blocking(move || extract_pdf(&name, &bytes))
                    .await
                    .map_err(|e| ExtractionError::failure(doc.name(), e.to_string()))?
            }
            kind @ DocumentKind::Unsupported => Err(ExtractionError::UnsupportedFormat {
                name: doc.name().to_string(),
                kind,
            }),
        }
    }
}

fn extract_plain(doc: &SourceDocument) -> Result<ExtractedText, ExtractionError> {
    let text = std::str::from_utf8(doc.bytes())
        .map_err(|e| ExtractionError::failure(doc.name(), format!("invalid UTF-8: {e}")))?;

    Ok(ExtractedText {
        text: text.to_string(),
        page_count: 1,
    })
}

fn extract_pdf(name: &str, bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
    // pdf-extract can panic on malformed fonts, so treat a panic as a corrupt stream
    let pages = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    })) {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            warn!(name, error = %e, "PDF extraction failed");
            return Err(ExtractionError::failure(name, e.to_string()));
        }
        Err(_) => {
            warn!(name, "PDF extraction panicked");
            return Err(ExtractionError::failure(name, "PDF parser panicked on malformed content"));
        }
    };

    debug!(name, pages = pages.len(), "extracted PDF text");
    Ok(ExtractedText {
        text: pages.join("\n"),
        page_count: pages.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plain_text_is_one_page() {
        let doc = SourceDocument::new("a.txt", b"Abstract\nWe show X.".to_vec());
        let out = TextExtractor::new().extract(&doc).await.unwrap();
        assert_eq!(out.text, "Abstract\nWe show X.");
        assert_eq!(out.page_count, 1);
    }

    #[tokio::test]
    async fn unsupported_kind_is_rejected() {
        let doc = SourceDocument::new("slides.pptx", b"PK\x03\x04".to_vec());
        let err = TextExtractor::new().extract(&doc).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnsupportedFormat);
    }

    #[tokio::test]
    async fn invalid_utf8_is_an_extraction_failure() {
        let doc = SourceDocument::new("a.txt", vec![0xff, 0xfe, 0x00]);
        let err = TextExtractor::new().extract(&doc).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::ExtractionFailure);
    }

    #[tokio::test]
    async fn corrupt_pdf_is_an_extraction_failure() {
        let doc = SourceDocument::new("broken.pdf", b"%PDF-1.4\nthis is not a pdf body".to_vec());
        let err = TextExtractor::new().extract(&doc).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::ExtractionFailure);
    }
}
