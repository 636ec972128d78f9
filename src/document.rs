//! Document data model shared by every pipeline stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// What the extractor believes a document to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    PlainText,
    Pdf,
    Unsupported,
}

impl DocumentKind {
    /// Infer the kind from the leading bytes, falling back to the file extension.
    pub fn infer(name: &str, bytes: &[u8]) -> Self {
        if bytes.starts_with(PDF_MAGIC) {
            return DocumentKind::Pdf;
        }
        Self::from_extension(name)
    }

    /// Map a file name's extension onto a kind.
    pub fn from_extension(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("pdf") => DocumentKind::Pdf,
            Some("txt" | "text" | "md" | "markdown") => DocumentKind::PlainText,
            _ => DocumentKind::Unsupported,
        }
    }

    /// Map an HTTP `Content-Type` value onto a kind, if it names one we know.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/pdf" => Some(DocumentKind::Pdf),
            "text/plain" | "text/markdown" => Some(DocumentKind::PlainText),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DocumentKind::PlainText => "plain-text",
            DocumentKind::Pdf => "pdf",
            DocumentKind::Unsupported => "unsupported",
        };
        f.write_str(label)
    }
}

/// Raw uploaded document. Immutable once created.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    name: String,
    kind: DocumentKind,
    bytes: Vec<u8>,
}

impl SourceDocument {
    /// Create a document, inferring its kind from name and content.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let kind = DocumentKind::infer(&name, &bytes);
        Self { name, kind, bytes }
    }

    /// Create a document whose kind is already known (e.g. from a `Content-Type`).
    pub fn with_kind(name: impl Into<String>, kind: DocumentKind, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind,
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Plain text pulled out of a [`SourceDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    /// Always 1 for sources without pages.
    pub page_count: usize,
}

/// A titled, contiguous span of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub content: String,
}

impl Section {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Result of summarising one section.
///
/// `ok == false` keeps the section in place with a placeholder text when the
/// engine call for it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub title: String,
    pub summary: String,
    pub ok: bool,
}

impl SectionSummary {
    pub fn succeeded(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            ok: true,
        }
    }

    pub fn failed(title: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: placeholder.into(),
            ok: false,
        }
    }
}
