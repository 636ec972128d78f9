//! Per-section summarisation.
//!
//! Sections go to the engine one at a time and in order. A failed call only
//! marks its own section; the rest of the document carries on.

use crate::capability::CapabilityDescriptor;
use crate::document::{Section, SectionSummary};
use crate::engine::EngineError;
use std::time::Duration;
use tracing::warn;

/// Most characters of a section ever sent to an engine.
pub const SECTION_BUDGET: usize = 20_000;

/// Default upper bound for a single engine call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Text recorded for a section whose summary could not be produced.
pub const PLACEHOLDER_SUMMARY: &str = "Summary unavailable for this section.";

pub struct SectionSummarizer {
    capability: CapabilityDescriptor,
    budget: usize,
    language: Option<String>,
    call_timeout: Duration,
}

impl SectionSummarizer {
    pub fn new(capability: CapabilityDescriptor) -> Self {
        Self {
            capability,
            budget: SECTION_BUDGET,
            language: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Summarise one section. Never fails; failures come back with `ok == false`.
    pub async fn summarize_section(&self, section: &Section) -> SectionSummary {
        let input = truncate_chars(&section.content, self.budget);

        match self.call(input, &section.title).await {
            Ok(summary) => SectionSummary::succeeded(&section.title, summary),
            Err(e) => {
                warn!(section = %section.title, error = %e, "section summary failed");
                SectionSummary::failed(&section.title, PLACEHOLDER_SUMMARY)
            }
        }
    }

    /// Summarise every section in order, one call at a time.
    ///
    /// `on_section` is told the index about to be summarised and the total.
    pub async fn summarize_all<F>(&self, sections: &[Section], mut on_section: F) -> Vec<SectionSummary>
    where
        F: FnMut(usize, usize),
    {
        let mut summaries = Vec::with_capacity(sections.len());
        for (index, section) in sections.iter().enumerate() {
            on_section(index, sections.len());
            summaries.push(self.summarize_section(section).await);
        }
        summaries
    }

    async fn call(&self, text: &str, title: &str) -> Result<String, EngineError> {
        let call = self
            .capability
            .summarize(text, title, self.language.as_deref());

        let summary = tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| EngineError::Timeout(self.call_timeout))??;

        if summary.trim().is_empty() {
            return Err(EngineError::EmptyResponse);
        }
        Ok(summary)
    }
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, SummarizerEngine};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records every text it receives; fails for titles listed in `fail_on`.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
        fail_on: Vec<&'static str>,
    }

    #[async_trait]
    impl SummarizerEngine for Recorder {
        async fn is_available(&self) -> bool {
            true
        }

        async fn summarize(
            &self,
            text: &str,
            title: &str,
            _language: Option<&str>,
        ) -> Result<String, EngineError> {
            self.seen.lock().unwrap().push(text.to_string());
            if self.fail_on.iter().any(|f| *f == title) {
                return Err(EngineError::RequestFailed("boom".into()));
            }
            Ok(format!("summary of {title}"))
        }
    }

    struct Blank;

    #[async_trait]
    impl SummarizerEngine for Blank {
        async fn is_available(&self) -> bool {
            true
        }

        async fn summarize(&self, _: &str, _: &str, _: Option<&str>) -> Result<String, EngineError> {
            Ok("   ".into())
        }
    }

    struct Slow;

    #[async_trait]
    impl SummarizerEngine for Slow {
        async fn is_available(&self) -> bool {
            true
        }

        async fn summarize(&self, _: &str, _: &str, _: Option<&str>) -> Result<String, EngineError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    fn summarizer(engine: Arc<dyn SummarizerEngine>) -> SectionSummarizer {
        SectionSummarizer::new(CapabilityDescriptor::DedicatedSummarizer(engine))
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[tokio::test]
    async fn long_sections_are_cut_to_budget() {
        let engine = Arc::new(Recorder::default());
        let long = "ä".repeat(SECTION_BUDGET + 500);
        let short = "x".repeat(100);

        let s = summarizer(engine.clone());
        s.summarize_section(&Section::new("Long", long)).await;
        s.summarize_section(&Section::new("Short", short.clone())).await;

        let seen = engine.seen.lock().unwrap();
        assert_eq!(seen[0].chars().count(), SECTION_BUDGET);
        assert_eq!(seen[1], short);
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_rest() {
        let engine = Arc::new(Recorder {
            fail_on: vec!["Methods"],
            ..Default::default()
        });
        let sections = vec![
            Section::new("Abstract", "a"),
            Section::new("Methods", "m"),
            Section::new("Results", "r"),
        ];

        let mut order = Vec::new();
        let out = summarizer(engine.clone())
            .summarize_all(&sections, |i, total| order.push((i, total)))
            .await;

        assert_eq!(order, vec![(0, 3), (1, 3), (2, 3)]);
        assert!(out[0].ok && out[2].ok);
        assert!(!out[1].ok);
        assert_eq!(out[1].title, "Methods");
        assert_eq!(out[1].summary, PLACEHOLDER_SUMMARY);
        assert_eq!(out[2].summary, "summary of Results");
        assert_eq!(engine.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn blank_output_counts_as_failure() {
        let out = summarizer(Arc::new(Blank))
            .summarize_section(&Section::new("Abstract", "a"))
            .await;
        assert!(!out.ok);
    }

    #[tokio::test]
    async fn slow_engine_times_out() {
        let out = summarizer(Arc::new(Slow))
            .with_call_timeout(Duration::from_millis(20))
            .summarize_section(&Section::new("Abstract", "a"))
            .await;
        assert!(!out.ok);
    }

    #[tokio::test]
    async fn unavailable_capability_yields_placeholders() {
        let out = SectionSummarizer::new(CapabilityDescriptor::Unavailable)
            .summarize_section(&Section::new("Abstract", "a"))
            .await;
        assert_eq!(out, SectionSummary::failed("Abstract", PLACEHOLDER_SUMMARY));
    }
}
