//! # Digestor
//!
//! Sectioned review of uploaded documents.
//!
//! ## Features
//!
//! - **Sectioned summaries**: text is split on canonical section titles and each
//!   section is summarised on its own, so one failing section never sinks a document
//! - **Capability negotiation**: a dedicated summariser, a prompting model, or
//!   nothing at all; a deterministic review is produced even with no engine
//! - **Remote strategy**: hand the whole document to a remote review service instead
//! - **Batch storage**: sled for finished batches, tantivy for full-text search

pub mod batch;
pub mod capability;
pub mod config;
pub mod document;
pub mod engine;
pub mod extract;
pub mod ingest;
pub mod pipeline;
pub mod remote;
pub mod search;
pub mod segment;
pub mod storage;
pub mod summarize;
pub mod synthesize;

pub use batch::{BatchEntry, BatchRecord, BatchRunner, Strategy};
pub use config::Config;
pub use document::{Section, SectionSummary, SourceDocument};
pub use pipeline::{AnalysisResult, DocumentStatus, Pipeline};
pub use remote::{RemoteError, RemoteReview, RemoteReviewClient};
pub use search::SearchIndex;
pub use storage::Storage;
