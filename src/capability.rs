//! Capability resolution.
//!
//! A [`CapabilityResolver`] is built once per pipeline run over the configured
//! [`EngineSet`] and probes it in priority order. Whatever it finds is wrapped
//! in a [`CapabilityDescriptor`], which exposes the same `summarize` and
//! `synthesize` calls whichever engine (if any) sits behind it.

use crate::document::SectionSummary;
use crate::engine::{strip_markdown_fence, EngineError, EngineSet, PromptEngine, SummarizerEngine};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// The engine variant that answered the probe.
#[derive(Clone)]
pub enum CapabilityDescriptor {
    DedicatedSummarizer(Arc<dyn SummarizerEngine>),
    PromptModel(Arc<dyn PromptEngine>),
    Unavailable,
}

impl CapabilityDescriptor {
    pub fn is_available(&self) -> bool {
        !matches!(self, CapabilityDescriptor::Unavailable)
    }

    /// Summarise one section's text.
    pub async fn summarize(
        &self,
        text: &str,
        title: &str,
        language: Option<&str>,
    ) -> Result<String, EngineError> {
        match self {
            CapabilityDescriptor::DedicatedSummarizer(engine) => {
                engine.summarize(text, title, language).await
            }
            CapabilityDescriptor::PromptModel(engine) => engine
                .complete(&summary_prompt(text, title, language))
                .await
                .map(|out| strip_markdown_fence(&out)),
            CapabilityDescriptor::Unavailable => Err(EngineError::CapabilityUnavailable),
        }
    }

    /// Merge section summaries into one document. Only a prompting model can.
    ///
    /// The model's answer is passed on untouched.
    pub async fn synthesize(&self, sections: &[SectionSummary]) -> Result<String, EngineError> {
        match self {
            CapabilityDescriptor::PromptModel(engine) => {
                engine.complete(&synthesis_prompt(sections)).await
            }
            CapabilityDescriptor::DedicatedSummarizer(_) | CapabilityDescriptor::Unavailable => {
                Err(EngineError::CapabilityUnavailable)
            }
        }
    }
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapabilityDescriptor::DedicatedSummarizer(_) => "DedicatedSummarizer",
            CapabilityDescriptor::PromptModel(_) => "PromptModel",
            CapabilityDescriptor::Unavailable => "Unavailable",
        };
        f.write_str(name)
    }
}

/// Probes the configured engines. Nothing is cached between runs.
pub struct CapabilityResolver<'a> {
    engines: &'a EngineSet,
}

impl<'a> CapabilityResolver<'a> {
    pub fn new(engines: &'a EngineSet) -> Self {
        Self { engines }
    }

    /// Dedicated summariser first, then a prompting model, then nothing.
    pub async fn resolve_summarizer(&self) -> CapabilityDescriptor {
        if let Some(engine) = &self.engines.summarizer {
            if engine.is_available().await {
                debug!("summarisation: dedicated summariser");
                return CapabilityDescriptor::DedicatedSummarizer(Arc::clone(engine));
            }
        }

        if let Some(engine) = self.available_prompt_model().await {
            debug!("summarisation: prompt model");
            return CapabilityDescriptor::PromptModel(engine);
        }

        debug!("summarisation: no engine");
        CapabilityDescriptor::Unavailable
    }

    /// A prompting model able to synthesise, or nothing.
    pub async fn resolve_synthesizer(&self) -> CapabilityDescriptor {
        match self.available_prompt_model().await {
            Some(engine) => {
                debug!("synthesis: prompt model");
                CapabilityDescriptor::PromptModel(engine)
            }
            None => {
                debug!("synthesis: no engine");
                CapabilityDescriptor::Unavailable
            }
        }
    }

    async fn available_prompt_model(&self) -> Option<Arc<dyn PromptEngine>> {
        let engine = self.engines.prompt.as_ref()?;
        engine.is_available().await.then(|| Arc::clone(engine))
    }
}

/// Instruction template that turns a prompting model into a summariser.
pub fn summary_prompt(text: &str, title: &str, language: Option<&str>) -> String {
    let language_line = match language {
        Some(lang) => format!("Write the summary in the language with code \"{lang}\".\n"),
        None => String::new(),
    };

    format!(
        r#"Summarise the "{title}" section of a document below.
Keep the key claims, methods, figures and conclusions. Use 3 to 6 sentences of plain prose.
{language_line}Do not add a heading, preamble or commentary. Only output the summary.

---

{text}"#
    )
}

/// Instruction template for merging section summaries into one review.
pub fn synthesis_prompt(sections: &[SectionSummary]) -> String {
    let body = sections
        .iter()
        .map(|s| format!("[{}]\n{}", s.title, s.summary))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r####"Combine the section summaries below into one structured review of the document.
Preserve the order of the sections exactly as given and use one "### " heading per section, named after it.
Under each heading, write a polished summary of that section. Do not merge, drop or reorder sections.
Only output the review in Markdown.

---

{body}"####
    )
}
