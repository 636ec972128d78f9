//! Engines that back the summarise/synthesise capabilities.
//!
//! Two kinds exist: a dedicated summariser reached over HTTP, and a general
//! prompting model (Gemini via rstructor). Every call builds a fresh client;
//! nothing is pooled or reused between calls.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use rstructor::{GeminiClient, GeminiModel, LLMClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// How long an availability probe may take before the engine counts as absent.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no engine available for this capability")]
    CapabilityUnavailable,
    #[error("engine request failed: {0}")]
    RequestFailed(String),
    #[error("engine returned an empty response")]
    EmptyResponse,
    #[error("engine call timed out after {0:?}")]
    Timeout(Duration),
}

/// A model whose only job is summarising text.
#[async_trait]
pub trait SummarizerEngine: Send + Sync {
    /// Probe whether the engine can be used right now.
    async fn is_available(&self) -> bool;

    async fn summarize(
        &self,
        text: &str,
        title: &str,
        language: Option<&str>,
    ) -> Result<String, EngineError>;
}

/// A general-purpose model driven by free-form instructions.
#[async_trait]
pub trait PromptEngine: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn complete(&self, prompt: &str) -> Result<String, EngineError>;
}

/// The engines configured for this host. Availability is probed per run.
#[derive(Clone, Default)]
pub struct EngineSet {
    pub summarizer: Option<Arc<dyn SummarizerEngine>>,
    pub prompt: Option<Arc<dyn PromptEngine>>,
}

impl EngineSet {
    /// No engines at all; every stage falls back to its deterministic path.
    pub fn none() -> Self {
        Self::default()
    }

    /// Build the engine set described by the configuration.
    pub fn from_config(config: &Config) -> Self {
        let summarizer = config
            .engine
            .summarizer_url
            .as_deref()
            .map(|url| Arc::new(HttpSummarizer::new(url)) as Arc<dyn SummarizerEngine>);

        let prompt = match config.engine.provider.as_str() {
            "gemini" => Some(Arc::new(GeminiEngine::new(
                config.api_key().ok().map(str::to_string),
                &config.engine.model,
                &config.engine.persona,
            )) as Arc<dyn PromptEngine>),
            _ => None,
        };

        Self { summarizer, prompt }
    }
}

/// Gemini prompting model.
pub struct GeminiEngine {
    api_key: Option<String>,
    model: String,
    persona: String,
}

impl GeminiEngine {
    pub fn new(api_key: Option<String>, model: &str, persona: &str) -> Self {
        Self {
            api_key,
            model: model.to_string(),
            persona: persona.to_string(),
        }
    }
}

#[async_trait]
impl PromptEngine for GeminiEngine {
    async fn is_available(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    async fn complete(&self, prompt: &str) -> Result<String, EngineError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(EngineError::CapabilityUnavailable)?;

        let client = GeminiClient::new(api_key)
            .map_err(|e| EngineError::RequestFailed(e.to_string()))?
            .model(parse_gemini_model(&self.model));

        let full_prompt = if self.persona.is_empty() {
            prompt.to_string()
        } else {
            format!("{}\n\n{}", self.persona, prompt)
        };

        let result = client
            .generate_with_metadata(&full_prompt)
            .await
            .map_err(|e| EngineError::RequestFailed(e.to_string()))?;

        non_empty(result.text)
    }
}

/// Parse a model string into a GeminiModel
fn parse_gemini_model(model: &str) -> GeminiModel {
    match model {
        "gemini-2.0-flash" => GeminiModel::Gemini20Flash,
        "gemini-2.5-flash" => GeminiModel::Gemini25Flash,
        "gemini-2.5-pro" => GeminiModel::Gemini25Pro,
        _ => GeminiModel::Gemini25Flash,
    }
}

/// Strip a surrounding ```markdown fence some models add to plain answers.
pub(crate) fn strip_markdown_fence(text: &str) -> String {
    let trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix("```") {
        // Drop the info string ("markdown", "md", ...) on the opening line.
        let body = rest.split_once('\n').map_or("", |(_, body)| body);
        if let Some(end_idx) = body.rfind("```") {
            return body[..end_idx].trim().to_string();
        }
    }

    trimmed.to_string()
}

fn non_empty(text: String) -> Result<String, EngineError> {
    if text.trim().is_empty() {
        Err(EngineError::EmptyResponse)
    } else {
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct SummarizeRequest<'a> {
    text: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    summary: String,
}

/// Dedicated summarisation service reachable over HTTP.
///
/// `GET {base}/health` answers the availability probe and
/// `POST {base}/summarize` takes `{text, title, language}` and returns `{summary}`.
pub struct HttpSummarizer {
    base_url: String,
}

impl HttpSummarizer {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SummarizerEngine for HttpSummarizer {
    async fn is_available(&self) -> bool {
        let Ok(client) = Client::builder().timeout(PROBE_TIMEOUT).build() else {
            return false;
        };

        match client.get(format!("{}/health", self.base_url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(url = %self.base_url, error = %e, "summariser probe failed");
                false
            }
        }
    }

    async fn summarize(
        &self,
        text: &str,
        title: &str,
        language: Option<&str>,
    ) -> Result<String, EngineError> {
        let client = Client::new();
        let response = client
            .post(format!("{}/summarize", self.base_url))
            .json(&SummarizeRequest {
                text,
                title,
                language,
            })
            .send()
            .await
            .map_err(|e| EngineError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::RequestFailed(format!(
                "summariser returned status {}",
                status.as_u16()
            )));
        }

        let body: SummarizeResponse = response
            .json()
            .await
            .map_err(|e| EngineError::RequestFailed(e.to_string()))?;

        non_empty(body.summary.trim().to_string())
    }
}
