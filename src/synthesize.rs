//! Review synthesis from section summaries.

use crate::capability::CapabilityDescriptor;
use crate::document::SectionSummary;
use crate::summarize::DEFAULT_CALL_TIMEOUT;
use std::time::Duration;
use tracing::warn;

/// Merges ordered section summaries into one review document.
pub struct ReviewSynthesizer {
    capability: CapabilityDescriptor,
    call_timeout: Duration,
}

impl ReviewSynthesizer {
    pub fn new(capability: CapabilityDescriptor) -> Self {
        Self {
            capability,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Always produces a document: engine output verbatim when a synthesis
    /// engine answers, otherwise [`fallback_review`].
    pub async fn synthesize(&self, summaries: &[SectionSummary]) -> String {
        if !self.capability.is_available() {
            return fallback_review(summaries);
        }

        let call = self.capability.synthesize(summaries);
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(review)) if !review.trim().is_empty() => review,
            Ok(Ok(_)) => {
                warn!("synthesis engine returned nothing; using fallback");
                fallback_review(summaries)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "synthesis failed; using fallback");
                fallback_review(summaries)
            }
            Err(_) => {
                warn!(timeout = ?self.call_timeout, "synthesis timed out; using fallback");
                fallback_review(summaries)
            }
        }
    }
}

/// Deterministic review: one `### title` block per summary, blank line between.
pub fn fallback_review(summaries: &[SectionSummary]) -> String {
    summaries
        .iter()
        .map(|s| format!("### {}\n{}", s.title, s.summary))
        .collect::<Vec<_>>()
        .join("\n\n")
}
