//! Native Gemini extractor with a declared response schema.
//!
//! Gemini's `generateContent` endpoint accepts `responseMimeType:
//! "application/json"` plus a `responseSchema`, so the service itself
//! enforces the record shape. This is the default backend.
//!
//! ## Request layout
//!
//! One `contents` entry whose parts are, in order:
//! 1. the extraction instruction (text)
//! 2. every page image as `inlineData` (base64 JPEG), in page order
//!
//! All pages travel in a single request so the model can follow tables that
//! continue across page breaks.

use crate::config::ExamConfig;
use crate::error::ExamError;
use crate::pipeline::encode::PageImage;
use crate::pipeline::extractor::{parse_records, RecordExtractor};
use crate::prompts::{response_schema, DEFAULT_EXTRACTION_PROMPT};
use crate::record::ExamRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PROVIDER: &str = "gemini";

const MISSING_KEY_HINT: &str = "Set GEMINI_API_KEY (or API_KEY), or pass --api-key.\n\
Keys are issued at https://aistudio.google.com/apikey";

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: Blob,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    status: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if it has any.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

// ── Extractor ────────────────────────────────────────────────────────────

/// [`RecordExtractor`] calling Gemini `generateContent` directly.
pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl std::fmt::Debug for GeminiExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiExtractor")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiExtractor {
    /// Build from config. Does not require the key to be present yet; a
    /// missing key fails the first extraction instead.
    pub fn from_config(config: &ExamConfig) -> Result<Self, ExamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| ExamError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.effective_model().to_string(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_EXTRACTION_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn credential(&self) -> Result<&str, ExamError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ExamError::MissingApiKey {
                provider: PROVIDER.to_string(),
                hint: MISSING_KEY_HINT.to_string(),
            })
    }

    pub(crate) fn build_request(&self, images: &[PageImage]) -> GenerateContentRequest {
        let mut parts = Vec::with_capacity(images.len() + 1);
        parts.push(Part::Text {
            text: self.prompt.clone(),
        });
        parts.extend(images.iter().map(|img| Part::InlineData {
            inline_data: Blob {
                mime_type: img.mime_type.to_string(),
                data: img.to_base64(),
            },
        }));

        GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        }
    }
}

#[async_trait]
impl RecordExtractor for GeminiExtractor {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn extract(&self, images: &[PageImage]) -> Result<Vec<ExamRecord>, ExamError> {
        let api_key = self.credential()?;
        if images.is_empty() {
            info!("No pages to extract from; skipping request");
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let body = self.build_request(images);
        info!(
            "Sending {} page image(s) to {} ({})",
            images.len(),
            PROVIDER,
            self.model
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let raw = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(ExamError::Transport {
                provider: PROVIDER.to_string(),
                message: api_error_message(status, &raw),
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&raw).map_err(|e| {
            warn!("Gemini returned an unreadable envelope: {}", e);
            ExamError::ResponseFormat {
                detail: format!("unexpected response envelope: {e}"),
            }
        })?;

        if let Some(reason) = parsed
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            warn!("Gemini blocked the request: {}", reason);
        }
        if let Some(reason) = parsed
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
        {
            debug!("Gemini finish reason: {}", reason);
        }
        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                "{} input tokens, {} output tokens, {:?}",
                usage.prompt_token_count.unwrap_or(0),
                usage.candidates_token_count.unwrap_or(0),
                start.elapsed()
            );
        }

        let records = parse_records(parsed.text().as_deref())?;
        info!("Extracted {} record(s) in {:?}", records.len(), start.elapsed());
        Ok(records)
    }
}

fn transport_error(e: reqwest::Error) -> ExamError {
    let message = if e.is_timeout() {
        format!("request timed out: {e}")
    } else {
        e.to_string()
    };
    ExamError::Transport {
        provider: PROVIDER.to_string(),
        message,
    }
}

/// Prefer the provider's own error message over the bare status line.
fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(env) => {
            let message = env.error.message.unwrap_or_else(|| "unknown error".into());
            match env.error.status {
                Some(s) => format!("HTTP {status} {s}: {message}"),
                None => format!("HTTP {status}: {message}"),
            }
        }
        Err(_) if body.trim().is_empty() => format!("HTTP {status}"),
        Err(_) => format!("HTTP {status}: {}", body.chars().take(200).collect::<String>()),
    }
}
