//! Local review pipeline.
//!
//! Each document walks a fixed state machine:
//!
//! ```text
//! Pending -> Extracting -> Segmenting -> Summarizing[0..n-1] -> Synthesizing
//!         -> Completed | CompletedPartial
//! Extracting -> Failed
//! Segmenting -> Synthesizing                 (no section titles found)
//! ```
//!
//! A document without any section title is carried whole into synthesis as a
//! single section named after the document.
//!
//! Stages run strictly in sequence and engines are resolved afresh for every
//! document.

use crate::capability::CapabilityResolver;
use crate::config::Config;
use crate::document::{SectionSummary, SourceDocument};
use crate::engine::EngineSet;
use crate::extract::{ExtractionError, FailureKind, TextExtractor};
use crate::segment::SectionSegmenter;
use crate::summarize::{SectionSummarizer, DEFAULT_CALL_TIMEOUT, SECTION_BUDGET};
use crate::synthesize::ReviewSynthesizer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Terminal outcome of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    Completed,
    CompletedPartial,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Completed => "Completed",
            DocumentStatus::CompletedPartial => "CompletedPartial",
            DocumentStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a document currently is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Pending,
    Extracting,
    Segmenting,
    Summarizing { index: usize, total: usize },
    Synthesizing,
    Completed,
    CompletedPartial,
    Failed(FailureKind),
}

impl DocumentState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DocumentState::Completed | DocumentState::CompletedPartial | DocumentState::Failed(_)
        )
    }

    /// Whether the pipeline may move from `self` to `next`.
    pub fn can_advance_to(&self, next: &DocumentState) -> bool {
        use DocumentState::*;
        match (self, next) {
            (Pending, Extracting) => true,
            (Extracting, Segmenting) | (Extracting, Failed(_)) => true,
            (Segmenting, Summarizing { index: 0, .. }) | (Segmenting, Synthesizing) => true,
            (Summarizing { index, total }, Summarizing { index: next, total: t }) => {
                *next == index + 1 && t == total && *next < *total
            }
            (Summarizing { index, total }, Synthesizing) => index + 1 == *total,
            (Synthesizing, Completed) | (Synthesizing, CompletedPartial) => true,
            _ => false,
        }
    }
}

/// Why a document ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&ExtractionError> for Failure {
    fn from(err: &ExtractionError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Everything the pipeline produced for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub sections: Vec<SectionSummary>,
    pub review: Option<String>,
    pub status: DocumentStatus,
    pub failure: Option<Failure>,
}

/// One document's pass through the pipeline, with its state history.
#[derive(Debug, Clone)]
pub struct DocumentRun {
    pub name: String,
    pub text: Option<String>,
    pub page_count: usize,
    pub result: AnalysisResult,
    history: Vec<DocumentState>,
}

impl DocumentRun {
    fn start(name: &str) -> Self {
        Self {
            name: name.to_string(),
            text: None,
            page_count: 0,
            result: AnalysisResult {
                sections: Vec::new(),
                review: None,
                status: DocumentStatus::Failed,
                failure: None,
            },
            history: vec![DocumentState::Pending],
        }
    }

    pub fn state(&self) -> DocumentState {
        self.history
            .last()
            .copied()
            .unwrap_or(DocumentState::Pending)
    }

    /// Every state visited, starting at `Pending`.
    pub fn history(&self) -> &[DocumentState] {
        &self.history
    }

    fn advance(&mut self, next: DocumentState) {
        let current = self.state();
        debug_assert!(
            current.can_advance_to(&next),
            "illegal transition {current:?} -> {next:?}"
        );
        debug!(document = %self.name, from = ?current, to = ?next, "state transition");
        self.history.push(next);
    }

    fn fail(&mut self, err: &ExtractionError) {
        warn!(document = %self.name, error = %err, "document failed");
        self.advance(DocumentState::Failed(err.kind()));
        self.result.status = DocumentStatus::Failed;
        self.result.failure = Some(Failure::from(err));
    }
}

/// Tunables for the local pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub section_budget: usize,
    pub language: Option<String>,
    pub call_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            section_budget: SECTION_BUDGET,
            language: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Drives extraction, segmentation, summarisation and synthesis.
pub struct Pipeline {
    extractor: TextExtractor,
    segmenter: SectionSegmenter,
    engines: EngineSet,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(segmenter: SectionSegmenter, engines: EngineSet) -> Self {
        Self {
            extractor: TextExtractor::new(),
            segmenter,
            engines,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the pipeline described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self, regex::Error> {
        let segmenter = SectionSegmenter::new(config.segmenter.keywords.iter().cloned())?;
        let options = PipelineOptions {
            section_budget: config.segmenter.section_budget,
            language: config.engine.language.clone(),
            call_timeout: Duration::from_secs(config.engine.call_timeout_secs),
        };
        Ok(Self::new(segmenter, EngineSet::from_config(config)).with_options(options))
    }

    /// Run one document to a terminal state.
    pub async fn process(&self, doc: &SourceDocument) -> DocumentRun {
        let mut run = DocumentRun::start(doc.name());

        run.advance(DocumentState::Extracting);
        let extracted = match self.extractor.extract(doc).await {
            Ok(extracted) => extracted,
            Err(e) => {
                run.fail(&e);
                return run;
            }
        };
        run.page_count = extracted.page_count;

        run.advance(DocumentState::Segmenting);
        let sections = self.segmenter.segment(&extracted.text);

        // Resolved per document: engine availability may change between runs.
        let resolver = CapabilityResolver::new(&self.engines);

        let summaries = if sections.is_empty() {
            debug!(document = %doc.name(), "no section titles found; using whole text");
            vec![SectionSummary::succeeded(doc.name(), extracted.text.trim())]
        } else {
            let summarizer = SectionSummarizer::new(resolver.resolve_summarizer().await)
                .with_budget(self.options.section_budget)
                .with_language(self.options.language.clone())
                .with_call_timeout(self.options.call_timeout);
            summarizer
                .summarize_all(&sections, |index, total| {
                    run.advance(DocumentState::Summarizing { index, total })
                })
                .await
        };
        run.text = Some(extracted.text);

        run.advance(DocumentState::Synthesizing);
        let synthesizer = ReviewSynthesizer::new(resolver.resolve_synthesizer().await)
            .with_call_timeout(self.options.call_timeout);
        let review = synthesizer.synthesize(&summaries).await;

        let (state, status) = if summaries.iter().all(|s| s.ok) {
            (DocumentState::Completed, DocumentStatus::Completed)
        } else {
            (DocumentState::CompletedPartial, DocumentStatus::CompletedPartial)
        };
        run.advance(state);

        info!(
            document = %run.name,
            sections = summaries.len(),
            status = %status,
            "document reviewed"
        );

        run.result = AnalysisResult {
            sections: summaries,
            review: Some(review),
            status,
            failure: None,
        };
        run
    }
}
