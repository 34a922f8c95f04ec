//! Configuration types for document extraction and report analysis.
//!
//! Two configs exist because the two halves of the system run at different
//! times: [`ExtractionConfig`] once per uploaded document, [`CompletionConfig`]
//! once per question. Both are built through builders that validate ranges in
//! `build()`, so invalid values fail at start-up rather than mid-request.

use crate::error::MedExplainError;
use crate::progress::ObserverHandle;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Largest document accepted for upload: 200 MiB.
pub const MAX_DOCUMENT_BYTES: u64 = 200 * 1024 * 1024;

/// Model requested on the Together route, a DeepSeek-R1 distillation.
pub const TOGETHER_MODEL: &str = "deepseek-ai/DeepSeek-R1-Distill-Llama-70B-free";

/// OpenAI-compatible endpoint used for the Together route.
pub const TOGETHER_BASE_URL: &str = "https://api.together.xyz/v1";

/// Model requested from OpenAI when none is configured.
pub const OPENAI_MODEL: &str = "gpt-4.1-nano";

/// Number of characters of extracted text embedded in each prompt.
pub const DEFAULT_EXCERPT_CHARS: usize = 6000;

/// Largest accepted `max_rendered_pixels`; keeps page rasters addressable.
pub const MAX_RENDERED_PIXELS_LIMIT: u32 = 20_000;

/// Whether `provider` names the Together route.
pub fn is_together(provider: &str) -> bool {
    matches!(
        provider.to_ascii_lowercase().as_str(),
        "together" | "togetherai" | "together-ai" | "together_ai"
    )
}

/// A model the named provider serves, for when the caller gives none.
///
/// `None` for providers without a sensible default; those need an explicit
/// model.
pub fn default_model_for(provider: &str) -> Option<&'static str> {
    if is_together(provider) {
        return Some(TOGETHER_MODEL);
    }
    match provider.to_ascii_lowercase().as_str() {
        "openai" => Some(OPENAI_MODEL),
        "anthropic" | "claude" => Some("claude-3-5-haiku-latest"),
        "gemini" | "google" => Some("gemini-2.0-flash"),
        "openrouter" | "open-router" => Some("deepseek/deepseek-r1-distill-llama-70b"),
        "ollama" => Some("deepseek-r1"),
        "mock" => Some("mock-model"),
        _ => None,
    }
}

// ── Extraction ───────────────────────────────────────────────────────────

/// Configuration for the extraction pipeline.
///
/// # Example
/// ```rust
/// use medexplain::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(300)
///     .ocr_language("eng+deu")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 300);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI used when rasterising PDF pages for OCR. Range: 72–400. Default: 200.
    ///
    /// Tesseract accuracy drops sharply below ~150 DPI on small print such as
    /// lab-result tables.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels.
    /// Range: 100–20000. Default: 3000.
    pub max_rendered_pixels: u32,

    /// Tesseract executable name or absolute path. Default: `tesseract`.
    pub tesseract_cmd: String,

    /// Tesseract language pack(s), e.g. `eng` or `eng+fra`. Default: `eng`.
    pub ocr_language: String,

    /// Detect and flatten tables from the PDF text layer. Default: true.
    pub detect_tables: bool,

    /// Minimum horizontal gap (PDF points) that separates two table cells. Default: 12.0.
    pub column_gap: f32,

    /// Receives stage changes and warnings while a document is processed.
    pub observer: Option<ObserverHandle>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 3000,
            tesseract_cmd: "tesseract".to_string(),
            ocr_language: "eng".to_string(),
            detect_tables: true,
            column_gap: 12.0,
            observer: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("ocr_language", &self.ocr_language)
            .field("detect_tables", &self.detect_tables)
            .field("column_gap", &self.column_gap)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn ExtractionObserver>"))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.clamp(100, MAX_RENDERED_PIXELS_LIMIT);
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn detect_tables(mut self, v: bool) -> Self {
        self.config.detect_tables = v;
        self
    }

    pub fn column_gap(mut self, points: f32) -> Self {
        self.config.column_gap = points;
        self
    }

    pub fn observer(mut self, observer: ObserverHandle) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, MedExplainError> {
        let c = &self.config;
        if c.tesseract_cmd.trim().is_empty() {
            return Err(MedExplainError::InvalidConfig(
                "Tesseract command must not be empty".into(),
            ));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(MedExplainError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if !(c.column_gap.is_finite() && c.column_gap > 0.0) {
            return Err(MedExplainError::InvalidConfig(format!(
                "Column gap must be a positive number of points, got {}",
                c.column_gap
            )));
        }
        Ok(self.config)
    }
}

// ── Completion ───────────────────────────────────────────────────────────

/// Configuration for the completion request made for each question.
#[derive(Clone)]
pub struct CompletionConfig {
    /// LLM model identifier. If None, the chosen provider's default
    /// ([`default_model_for`]) is used.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "openrouter", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 2050.
    pub max_tokens: usize,

    /// Bounded wait for one completion request, in seconds. Default: 45.
    ///
    /// A timeout is reported to the user like any other failure; the request
    /// is never retried.
    pub request_timeout_secs: u64,

    /// Characters of extracted text embedded in the prompt. Default: 6000.
    pub excerpt_chars: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.3,
            max_tokens: 2050,
            request_timeout_secs: 45,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }
}

impl fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("excerpt_chars", &self.excerpt_chars)
            .finish()
    }
}

impl CompletionConfig {
    /// Create a new builder for `CompletionConfig`.
    pub fn builder() -> CompletionConfigBuilder {
        CompletionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model to request from `provider`: the configured one, else the
    /// provider's default.
    pub fn model_for(&self, provider: &str) -> Option<&str> {
        self.model.as_deref().or_else(|| default_model_for(provider))
    }
}

/// Builder for [`CompletionConfig`].
#[derive(Debug)]
pub struct CompletionConfigBuilder {
    config: CompletionConfig,
}

impl CompletionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
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

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn excerpt_chars(mut self, n: usize) -> Self {
        self.config.excerpt_chars = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CompletionConfig, MedExplainError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(MedExplainError::InvalidConfig(
                "Max tokens must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(MedExplainError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.excerpt_chars == 0 || c.excerpt_chars > DEFAULT_EXCERPT_CHARS {
            return Err(MedExplainError::InvalidConfig(format!(
                "Excerpt length must be 1–{DEFAULT_EXCERPT_CHARS} characters, got {}",
                c.excerpt_chars
            )));
        }
        Ok(self.config)
    }
}
