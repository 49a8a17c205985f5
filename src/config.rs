//! Configuration for exam-schedule extraction.
//!
//! All pipeline behaviour is controlled through [`ExamConfig`], built via its
//! [`ExamConfigBuilder`]. The page cap and upscale factor live here rather
//! than as literals in the rasteriser so tests can drive the pipeline with
//! small synthetic documents and tight limits.
//!
//! The credential is an ordinary field. Nothing in the library reads
//! process-wide state for it, so several independently configured pipelines
//! can coexist in one process (or one test binary).

use crate::error::ExamError;
use crate::progress::ObserverRef;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Pages beyond this are dropped to bound the size of the extraction request.
pub const DEFAULT_MAX_PAGES: usize = 10;

/// Pages are rendered at twice their native size to help the model read
/// small print.
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// JPEG quality for page images sent to the model.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Default Gemini model for the native extractor.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";

/// Default model for `edgequake-llm` providers.
pub const DEFAULT_LLM_MODEL: &str = "gpt-4.1-nano";

/// Base URL of the Gemini REST API.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Configuration for an extraction pipeline.
///
/// Built via [`ExamConfig::builder()`] or using [`ExamConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_exam2csv::ExamConfig;
///
/// let config = ExamConfig::builder()
///     .max_pages(5)
///     .api_key("my-key")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_pages, 5);
/// ```
#[derive(Clone)]
pub struct ExamConfig {
    /// Maximum number of pages rasterised, counted from page 1. Default: 10.
    pub max_pages: usize,

    /// Upscale factor relative to the page's native size. Range: 0.5–8.0. Default: 2.0.
    pub render_scale: f32,

    /// JPEG quality (1–100) for encoded page images. Default: 85.
    pub jpeg_quality: u8,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 4096.
    ///
    /// A safety cap independent of the scale factor: an A0 poster at 2× would
    /// otherwise allocate hundreds of megabytes of pixels.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Path to libpdfium (file, or directory containing it).
    /// If None, standard locations and the system library are tried.
    pub pdfium_library_path: Option<PathBuf>,

    /// Extraction provider name. `None` or `"gemini"` selects the native
    /// schema-constrained Gemini client; anything else goes through
    /// `edgequake-llm` (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed `edgequake-llm` provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// Credential for the native Gemini client.
    pub api_key: Option<String>,

    /// Gemini REST base URL. Default: the public v1beta endpoint.
    pub api_base_url: String,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Transcription wants the model faithful to the page, not creative.
    pub temperature: f32,

    /// Maximum tokens the model may generate for the whole document. Default: 16384.
    ///
    /// Ten dense pages of schedule rows can run to several thousand records'
    /// worth of JSON; too low a cap truncates the array and fails parsing.
    pub max_tokens: usize,

    /// Custom extraction instruction. If None, uses the built-in prompt.
    pub system_prompt: Option<String>,

    /// Extraction HTTP timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Status observer. Default: None.
    pub observer: Option<ObserverRef>,
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            render_scale: DEFAULT_RENDER_SCALE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_rendered_pixels: 4096,
            password: None,
            pdfium_library_path: None,
            provider_name: None,
            provider: None,
            model: None,
            api_key: None,
            api_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            temperature: 0.1,
            max_tokens: 16384,
            system_prompt: None,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            observer: None,
        }
    }
}

impl fmt::Debug for ExamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamConfig")
            .field("max_pages", &self.max_pages)
            .field("render_scale", &self.render_scale)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn PipelineObserver>"))
            .finish()
    }
}

impl ExamConfig {
    /// Create a new builder for `ExamConfig`.
    pub fn builder() -> ExamConfigBuilder {
        ExamConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when extraction should use the native Gemini client.
    pub fn uses_native_gemini(&self) -> bool {
        self.provider.is_none()
            && self
                .provider_name
                .as_deref()
                .map_or(true, |name| name.eq_ignore_ascii_case("gemini"))
    }

    /// The model that will actually be requested.
    pub fn effective_model(&self) -> &str {
        match self.model.as_deref() {
            Some(m) if !m.is_empty() => m,
            _ if self.uses_native_gemini() => DEFAULT_GEMINI_MODEL,
            _ => DEFAULT_LLM_MODEL,
        }
    }
}

/// Builder for [`ExamConfig`].
pub struct ExamConfigBuilder {
    config: ExamConfig,
}

impl fmt::Debug for ExamConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExamConfigBuilder {
    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn observer(mut self, observer: ObserverRef) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExamConfig, ExamError> {
        let c = &self.config;
        if c.max_pages == 0 {
            return Err(ExamError::InvalidConfig(
                "max_pages must be ≥ 1".into(),
            ));
        }
        if !c.render_scale.is_finite() || !(0.5..=8.0).contains(&c.render_scale) {
            return Err(ExamError::InvalidConfig(format!(
                "render scale must be 0.5–8.0, got {}",
                c.render_scale
            )));
        }
        if c.api_base_url.trim().is_empty() {
            return Err(ExamError::InvalidConfig(
                "API base URL must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(ExamError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
