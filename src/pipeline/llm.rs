//! Generic extraction through `edgequake-llm` providers.
//!
//! Used when the caller names a provider other than Gemini (OpenAI,
//! Anthropic, Ollama, …) or injects one. These providers have no shared
//! response-schema mechanism, so the record shape is enforced by the prompt
//! and by [`parse_records`] alone.
//!
//! ## Message Layout
//!
//! 1. **System message**: the extraction instruction (or user override)
//! 2. **User message**: a short request plus every page image, in page order
//!
//! The provider is resolved on first use rather than at construction, so a
//! missing API key surfaces as a failed run, not a failed setup.

use crate::config::ExamConfig;
use crate::error::ExamError;
use crate::pipeline::encode::PageImage;
use crate::pipeline::extractor::{parse_records, RecordExtractor};
use crate::prompts::{DEFAULT_EXTRACTION_PROMPT, USER_TURN_TEXT};
use crate::record::ExamRecord;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// [`RecordExtractor`] over any `edgequake-llm` provider.
pub struct LlmExtractor {
    provider_name: String,
    model: String,
    provider: OnceCell<Arc<dyn LLMProvider>>,
    prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl std::fmt::Debug for LlmExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmExtractor")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("resolved", &self.provider.initialized())
            .finish()
    }
}

impl LlmExtractor {
    pub fn from_config(config: &ExamConfig) -> Self {
        let provider = match &config.provider {
            Some(p) => OnceCell::new_with(Some(Arc::clone(p))),
            None => OnceCell::new(),
        };
        Self {
            provider_name: config
                .provider_name
                .clone()
                .unwrap_or_else(|| "auto".to_string()),
            model: config.effective_model().to_string(),
            provider,
            prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_EXTRACTION_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Use an already-constructed provider.
    pub fn with_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = OnceCell::new_with(Some(provider));
        self
    }

    async fn resolve(&self) -> Result<&Arc<dyn LLMProvider>, ExamError> {
        self.provider
            .get_or_try_init(|| async { create_provider(&self.provider_name, &self.model) })
            .await
    }

    fn build_messages(&self, images: &[PageImage]) -> Vec<ChatMessage> {
        let attachments = images
            .iter()
            .map(|img| ImageData::new(img.to_base64(), img.mime_type).with_detail("high"))
            .collect();
        vec![
            ChatMessage::system(self.prompt.as_str()),
            ChatMessage::user_with_images(USER_TURN_TEXT, attachments),
        ]
    }
}

/// Name + model through the factory; `"auto"` scans the environment.
fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ExamError> {
    if name != "auto" {
        return ProviderFactory::create_llm_provider(name, model)
            .map_err(|e| provider_error(name, &e.to_string()));
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExamError::MissingApiKey {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(llm_provider)
}

/// Classify a factory failure for a named provider.
///
/// Only credential problems are `MissingApiKey`; an unknown name or any
/// other setup failure is a configuration error.
fn provider_error(name: &str, detail: &str) -> ExamError {
    let lower = detail.to_lowercase();
    let credential = ["api key", "api_key", "apikey", "credential", "token"]
        .iter()
        .any(|needle| lower.contains(needle));
    if credential {
        ExamError::MissingApiKey {
            provider: name.to_string(),
            hint: detail.to_string(),
        }
    } else {
        ExamError::InvalidConfig(format!("Cannot create provider '{name}': {detail}"))
    }
}

fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

#[async_trait]
impl RecordExtractor for LlmExtractor {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn extract(&self, images: &[PageImage]) -> Result<Vec<ExamRecord>, ExamError> {
        let provider = self.resolve().await?;
        if images.is_empty() {
            info!("No pages to extract from; skipping request");
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let messages = self.build_messages(images);
        let options = build_options(self.temperature, self.max_tokens);
        info!(
            "Sending {} page image(s) to {} ({})",
            images.len(),
            self.provider_name,
            self.model
        );

        let response = provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ExamError::Transport {
                provider: self.provider_name.clone(),
                message: e.to_string(),
            })?;

        debug!(
            "{} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        let records = parse_records(Some(response.content.as_str()))?;
        info!("Extracted {} record(s) in {:?}", records.len(), start.elapsed());
        Ok(records)
    }
}
