//! The completion request: one prompt in, one reply out.
//!
//! Each question makes exactly one request. There is no retry and no
//! back-off; a failure or timeout is returned to the caller, which reports it
//! and lets the user ask again.

use crate::config::{default_model_for, is_together, CompletionConfig, TOGETHER_BASE_URL};
use crate::error::MedExplainError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, OpenAIProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// A remote text-completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `prompt` and return the raw reply text.
    async fn complete(&self, prompt: &str) -> Result<String, MedExplainError>;
}

/// [`CompletionClient`] backed by an `edgequake_llm` provider.
pub struct LlmCompletionClient {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    timeout_secs: u64,
}

impl std::fmt::Debug for LlmCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmCompletionClient")
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl LlmCompletionClient {
    /// Resolve the provider named by `config` and bind the request options.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, MedExplainError> {
        let provider = resolve_provider(config)?;
        Ok(Self::with_provider(provider, config))
    }

    /// Use an already-constructed provider.
    pub fn with_provider(provider: Arc<dyn LLMProvider>, config: &CompletionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            timeout_secs: config.request_timeout_secs,
        }
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

#[async_trait]
impl CompletionClient for LlmCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, MedExplainError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::user(prompt)];

        let result = timeout(
            Duration::from_secs(self.timeout_secs),
            self.provider.chat(&messages, Some(&self.options)),
        )
        .await;

        match result {
            Ok(Ok(response)) => {
                debug!(
                    "{} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                Ok(response.content)
            }
            Ok(Err(e)) => {
                warn!("Completion request failed: {e}");
                Err(MedExplainError::CompletionRequestFailure {
                    message: e.to_string(),
                })
            }
            Err(_) => {
                warn!("Completion request timed out after {}s", self.timeout_secs);
                Err(MedExplainError::CompletionTimeout {
                    secs: self.timeout_secs,
                })
            }
        }
    }
}

/// Build `CompletionOptions` from the completion config.
fn build_options(config: &CompletionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, MedExplainError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        MedExplainError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Together serves the DeepSeek distillation through an OpenAI-compatible API.
fn create_together_provider(api_key: String, model: &str) -> Arc<dyn LLMProvider> {
    Arc::new(OpenAIProvider::compatible(api_key, TOGETHER_BASE_URL).with_model(model))
}

/// Where the completion provider comes from, with the model it will serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderRoute {
    /// `config.provider`, used as-is.
    Prebuilt,
    /// Together's OpenAI-compatible endpoint, keyed by `TOGETHER_API_KEY`.
    Together { model: String },
    /// A provider built by `ProviderFactory::create_llm_provider`.
    Named { provider: String, model: String },
    /// Whatever `ProviderFactory::from_env` finds.
    AutoDetect,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn named_route(provider: &str, model: Option<&str>) -> Result<ProviderRoute, MedExplainError> {
    let model = model
        .or_else(|| default_model_for(provider))
        .ok_or_else(|| MedExplainError::ProviderNotConfigured {
            provider: provider.to_string(),
            hint: format!("No default model for '{provider}'; pass --model"),
        })?
        .to_string();

    if is_together(provider) {
        Ok(ProviderRoute::Together { model })
    } else {
        Ok(ProviderRoute::Named {
            provider: provider.to_string(),
            model,
        })
    }
}

/// Choose the provider route, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`)
/// 2. **Named provider** (`config.provider_name`) with `config.model` or
///    that provider's default model
/// 3. **Environment pair** `MEDEXPLAIN_PROVIDER` + `MEDEXPLAIN_MODEL`
/// 4. **`TOGETHER_API_KEY`** present → Together, default [`TOGETHER_MODEL`](crate::config::TOGETHER_MODEL)
/// 5. **`OPENAI_API_KEY`** present → OpenAI, default [`OPENAI_MODEL`](crate::config::OPENAI_MODEL)
/// 6. **Auto-detection** via [`ProviderFactory::from_env`]
///
/// `env` looks up environment variables; empty values count as unset.
pub fn plan_route(
    config: &CompletionConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ProviderRoute, MedExplainError> {
    if config.provider.is_some() {
        return Ok(ProviderRoute::Prebuilt);
    }

    if let Some(ref name) = config.provider_name {
        return named_route(name, config.model.as_deref());
    }

    if let (Some(prov), Some(model)) = (env("MEDEXPLAIN_PROVIDER"), env("MEDEXPLAIN_MODEL")) {
        return named_route(&prov, Some(&model));
    }

    if env("TOGETHER_API_KEY").is_some() {
        return named_route("together", config.model.as_deref());
    }

    if env("OPENAI_API_KEY").is_some() {
        return named_route("openai", config.model.as_deref());
    }

    Ok(ProviderRoute::AutoDetect)
}

/// Resolve the LLM provider along the route chosen by [`plan_route`].
pub fn resolve_provider(config: &CompletionConfig) -> Result<Arc<dyn LLMProvider>, MedExplainError> {
    let route = plan_route(config, env_var)?;
    debug!(?route, "Completion provider route");

    match route {
        ProviderRoute::Prebuilt => config
            .provider
            .clone()
            .ok_or_else(|| MedExplainError::Internal("pre-built provider missing".into())),
        ProviderRoute::Together { model } => {
            let key = env_var("TOGETHER_API_KEY").ok_or_else(|| MedExplainError::ProviderNotConfigured {
                provider: "together".to_string(),
                hint: "Set TOGETHER_API_KEY".to_string(),
            })?;
            info!("Using Together with model {model}");
            Ok(create_together_provider(key, &model))
        }
        ProviderRoute::Named { provider, model } => {
            info!("Using {provider} with model {model}");
            create_provider(&provider, &model)
        }
        ProviderRoute::AutoDetect => {
            let (llm_provider, _embedding) =
                ProviderFactory::from_env().map_err(|e| MedExplainError::ProviderNotConfigured {
                    provider: "auto".to_string(),
                    hint: format!(
                        "No LLM provider could be auto-detected from environment.\n\
                        Set TOGETHER_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                        Error: {}",
                        e
                    ),
                })?;

            info!("LLM provider auto-detected from environment");
            Ok(llm_provider)
        }
    }
}
