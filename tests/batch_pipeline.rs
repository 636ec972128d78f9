//! End-to-end batch tests over the local pipeline.
//!
//! Engines are in-process doubles; storage is sled in a temp dir.

use async_trait::async_trait;
use digestor::batch::{BatchRunner, Strategy, NO_REMOTE_RESULTS};
use digestor::engine::{EngineError, EngineSet, PromptEngine, SummarizerEngine};
use digestor::remote::RemoteReviewClient;
use digestor::segment::SectionSegmenter;
use digestor::synthesize::fallback_review;
use digestor::{DocumentStatus, Pipeline, SectionSummary, SourceDocument, Storage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

/// Summarises by upper-casing; refuses sections whose text contains "FAIL".
struct Shouty {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Shouty {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SummarizerEngine for Shouty {
    async fn is_available(&self) -> bool {
        true
    }

    async fn summarize(
        &self,
        text: &str,
        _title: &str,
        _language: Option<&str>,
    ) -> Result<String, EngineError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if text.contains("FAIL") {
            return Err(EngineError::RequestFailed("refused".into()));
        }
        Ok(text.to_uppercase())
    }
}

struct Unplugged;

#[async_trait]
impl PromptEngine for Unplugged {
    async fn is_available(&self) -> bool {
        false
    }

    async fn complete(&self, _prompt: &str) -> Result<String, EngineError> {
        Err(EngineError::CapabilityUnavailable)
    }
}

fn local_runner(engine: Arc<Shouty>) -> BatchRunner {
    let engines = EngineSet {
        summarizer: Some(engine),
        prompt: Some(Arc::new(Unplugged)),
    };
    BatchRunner::new(Strategy::Local(Pipeline::new(
        SectionSegmenter::default(),
        engines,
    )))
}

fn docs() -> Vec<SourceDocument> {
    vec![
        SourceDocument::new("one.txt", b"Abstract\nfirst paper\nResults\ngood".to_vec()),
        SourceDocument::new("two.pdf", b"%PDF-1.4 truncated garbage".to_vec()),
        SourceDocument::new("three.md", b"Abstract\nthird\nMethods\nFAIL here".to_vec()),
    ]
}

#[tokio::test]
async fn failed_document_does_not_abort_batch() {
    let engine = Shouty::new();
    let record = local_runner(engine.clone()).run(&docs()).await;

    assert_eq!(record.entries.len(), 3);
    let ids: Vec<_> = record.entries.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let first = &record.entries[0];
    assert_eq!(first.status, DocumentStatus::Completed);
    assert_eq!(
        first.analysis.as_deref(),
        Some("### Abstract\nFIRST PAPER\n\n### Results\nGOOD")
    );

    let second = &record.entries[1];
    assert_eq!(second.status, DocumentStatus::Failed);
    assert!(second.analysis.is_none());
    assert!(second.error.as_deref().unwrap().contains("two.pdf"));

    let third = &record.entries[2];
    assert_eq!(third.status, DocumentStatus::CompletedPartial);
    let expected = fallback_review(&[
        SectionSummary::succeeded("Abstract", "THIRD"),
        SectionSummary::failed("Methods", digestor::summarize::PLACEHOLDER_SUMMARY),
    ]);
    assert_eq!(third.analysis.as_deref(), Some(expected.as_str()));

    assert_eq!(engine.calls.load(Ordering::SeqCst), 4);
    assert_eq!(engine.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn finished_batch_is_persisted_whole() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::open(dir.path().join("db")).unwrap();

    let runner = local_runner(Shouty::new()).keep_text(false);
    let record = runner.run(&docs()).await;
    storage.save_batch("papers", &record).unwrap();

    let stored = storage.load_batch("papers").unwrap().unwrap();
    assert_eq!(stored, record);
    assert!(stored.entries.iter().all(|e| e.text.is_none()));

    let statuses: Vec<_> = stored.entries.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            DocumentStatus::Completed,
            DocumentStatus::Failed,
            DocumentStatus::CompletedPartial
        ]
    );
}

#[tokio::test]
async fn inputs_that_cannot_be_loaded_fail_alone() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.txt");
    std::fs::write(&good, "Introduction\nhello").unwrap();

    let storage = Storage::open(dir.path().join("db")).unwrap();
    let inputs = vec![
        good.display().to_string(),
        dir.path().join("missing.txt").display().to_string(),
    ];

    let record = local_runner(Shouty::new())
        .run_and_persist(&inputs, &storage, None, "k")
        .await
        .unwrap();

    assert_eq!(record.entries[0].status, DocumentStatus::Completed);
    assert_eq!(record.entries[0].text.as_deref(), Some("Introduction\nhello"));
    assert_eq!(record.entries[1].status, DocumentStatus::Failed);
    assert_eq!(storage.require_batch("k").unwrap(), record);
}

#[tokio::test]
async fn remote_strategy_records_each_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{
                "file_name": "one.txt",
                "paper_id": "p1",
                "analysis_id": "a1",
                "metadata": null,
                "message": "Analysis complete"
            }]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let runner = BatchRunner::new(Strategy::Remote {
        client: RemoteReviewClient::new(&server.uri()),
        collection: "c1".into(),
    });
    let record = runner.run(&docs()[..2]).await;

    assert_eq!(record.entries[0].status, DocumentStatus::Completed);
    assert!(record.entries[0]
        .analysis
        .as_deref()
        .unwrap()
        .contains("Analysis complete"));
    assert_eq!(record.entries[1].status, DocumentStatus::Failed);
    assert_eq!(
        record.entries[1].error.as_deref(),
        Some("Upload failed with status 503")
    );
}

#[tokio::test]
async fn remote_reply_without_results_fails_the_entry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": [] })))
        .mount(&server)
        .await;

    let runner = BatchRunner::new(Strategy::Remote {
        client: RemoteReviewClient::new(&server.uri()),
        collection: "c1".into(),
    });
    let record = runner.run(&docs()[..1]).await;

    let entry = &record.entries[0];
    assert_eq!(entry.status, DocumentStatus::Failed);
    assert!(entry.analysis.is_none());
    assert_eq!(entry.error.as_deref(), Some(NO_REMOTE_RESULTS));
}
