//! Batch runs over one review strategy.
//!
//! Documents are handled one at a time, in input order. A failed document is
//! recorded and the batch moves on. The finished [`BatchRecord`] is persisted
//! in a single write.

use crate::document::SourceDocument;
use crate::ingest;
use crate::pipeline::{DocumentStatus, Pipeline};
use crate::remote::{RemoteReview, RemoteReviewClient};
use crate::search::SearchIndex;
use crate::storage::{Storage, StorageError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Error recorded when the review service accepts a document but reports nothing.
pub const NO_REMOTE_RESULTS: &str = "Server returned no results";

/// Lightweight per-document status stored with the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchEntry {
    fn failed(id: u64, name: &str, error: impl ToString) -> Self {
        Self {
            id,
            name: name.to_string(),
            text: None,
            analysis: None,
            status: DocumentStatus::Failed,
            error: Some(error.to_string()),
        }
    }
}

/// Ordered entries of one batch, serialised as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchRecord {
    pub entries: Vec<BatchEntry>,
}

impl BatchRecord {
    pub fn count(&self, status: DocumentStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }
}

/// The one strategy a batch is run with.
pub enum Strategy {
    Local(Pipeline),
    Remote {
        client: RemoteReviewClient,
        collection: String,
    },
}

pub struct BatchRunner {
    strategy: Strategy,
    keep_text: bool,
}

impl BatchRunner {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            keep_text: true,
        }
    }

    /// Whether extracted text is kept in the batch record.
    pub fn keep_text(mut self, keep: bool) -> Self {
        self.keep_text = keep;
        self
    }

    /// Review already-loaded documents.
    pub async fn run(&self, docs: &[SourceDocument]) -> BatchRecord {
        let mut record = BatchRecord::default();
        for (i, doc) in docs.iter().enumerate() {
            let entry = self.review(i as u64 + 1, doc).await;
            record.entries.push(entry);
        }
        self.log_summary(&record);
        record
    }

    /// Load and review each input (path or URL). A load failure fails only that entry.
    pub async fn run_inputs(&self, inputs: &[String]) -> BatchRecord {
        let mut record = BatchRecord::default();
        for (i, input) in inputs.iter().enumerate() {
            let id = i as u64 + 1;
            let entry = match ingest::load(input).await {
                Ok(doc) => self.review(id, &doc).await,
                Err(e) => {
                    warn!(input = %input, error = %e, "could not load document");
                    BatchEntry::failed(id, input, &e)
                }
            };
            record.entries.push(entry);
        }
        self.log_summary(&record);
        record
    }

    /// Run the batch, then persist it under `key` in one write.
    ///
    /// Completed entries are indexed for search afterwards; indexing problems
    /// are logged and do not fail the batch.
    pub async fn run_and_persist(
        &self,
        inputs: &[String],
        storage: &Storage,
        index: Option<&SearchIndex>,
        key: &str,
    ) -> Result<BatchRecord, StorageError> {
        let record = self.run_inputs(inputs).await;
        storage.save_batch(key, &record)?;

        if let Some(index) = index {
            if let Err(e) = index.index_batch(key, &record) {
                warn!(key, error = %e, "failed to index batch");
            }
        }
        Ok(record)
    }

    async fn review(&self, id: u64, doc: &SourceDocument) -> BatchEntry {
        match &self.strategy {
            Strategy::Local(pipeline) => {
                let run = pipeline.process(doc).await;
                BatchEntry {
                    id,
                    name: run.name,
                    text: if self.keep_text { run.text } else { None },
                    analysis: run.result.review,
                    status: run.result.status,
                    error: run.result.failure.map(|f| f.message),
                }
            }
            Strategy::Remote { client, collection } => {
                match client.upload(doc, collection).await {
                    Ok(reviews) if reviews.is_empty() => {
                        warn!(document = %doc.name(), "remote review returned no results");
                        BatchEntry::failed(id, doc.name(), NO_REMOTE_RESULTS)
                    }
                    Ok(reviews) => BatchEntry {
                        id,
                        name: doc.name().to_string(),
                        text: None,
                        analysis: Some(render_reviews(&reviews)),
                        status: DocumentStatus::Completed,
                        error: None,
                    },
                    Err(e) => {
                        warn!(document = %doc.name(), error = %e, "remote review failed");
                        BatchEntry::failed(id, doc.name(), &e)
                    }
                }
            }
        }
    }

    fn log_summary(&self, record: &BatchRecord) {
        info!(
            documents = record.entries.len(),
            completed = record.count(DocumentStatus::Completed),
            partial = record.count(DocumentStatus::CompletedPartial),
            failed = record.count(DocumentStatus::Failed),
            "batch finished"
        );
    }
}

fn render_reviews(reviews: &[RemoteReview]) -> String {
    reviews
        .iter()
        .map(RemoteReview::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serialises_as_plain_array() {
        let record = BatchRecord {
            entries: vec![BatchEntry {
                id: 1,
                name: "a.txt".into(),
                text: None,
                analysis: Some("### Abstract\nx".into()),
                status: DocumentStatus::CompletedPartial,
                error: None,
            }],
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "id": 1,
                "name": "a.txt",
                "analysis": "### Abstract\nx",
                "status": "CompletedPartial"
            }])
        );
    }
}
