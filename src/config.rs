//! Configuration types for the assistant pipeline.
//!
//! All behaviour is controlled through [`AssistantConfig`], built via its
//! [`AssistantConfigBuilder`] or loaded once from the process environment with
//! [`AssistantConfig::from_env`]. The config is handed to
//! [`crate::Assistant::new`] and never re-read afterwards: the pipeline does
//! not consult environment variables mid-request.

use crate::backend::GenerationBackend;
use crate::error::ChemistError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default Gemini model, matching the hosted model the assistant was tuned on.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Base URL of the Google Generative Language REST API.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Allowed sampling temperature range (inclusive).
pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 1.0);

/// Allowed maximum-output-token range (inclusive).
pub const MAX_OUTPUT_TOKENS_RANGE: (usize, usize) = (100, 2000);

/// Sampling parameters forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Model creativity. Range: 0.0–1.0. Default: 0.7.
    pub temperature: f32,
    /// Upper bound on the response length in tokens. Range: 100–2000. Default: 500.
    pub max_output_tokens: usize,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 500,
        }
    }
}

impl SamplingParams {
    /// Build validated parameters.
    pub fn new(temperature: f32, max_output_tokens: usize) -> Result<Self, ChemistError> {
        let params = Self {
            temperature,
            max_output_tokens,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check both values lie inside their allowed ranges.
    pub fn validate(&self) -> Result<(), ChemistError> {
        let (t_min, t_max) = TEMPERATURE_RANGE;
        if !(t_min..=t_max).contains(&self.temperature) {
            return Err(ChemistError::InvalidConfig(format!(
                "Temperature must be {t_min:.1}–{t_max:.1}, got {}",
                self.temperature
            )));
        }
        let (n_min, n_max) = MAX_OUTPUT_TOKENS_RANGE;
        if !(n_min..=n_max).contains(&self.max_output_tokens) {
            return Err(ChemistError::InvalidConfig(format!(
                "Max output tokens must be {n_min}–{n_max}, got {}",
                self.max_output_tokens
            )));
        }
        Ok(())
    }
}

/// Configuration for an [`crate::Assistant`].
///
/// # Example
/// ```rust
/// use ai_chemist::AssistantConfig;
///
/// let config = AssistantConfig::builder()
///     .api_key("test-key")
///     .model("gemini-2.5-flash")
///     .temperature(0.3)
///     .max_output_tokens(800)
///     .build()
///     .unwrap();
/// assert_eq!(config.sampling.max_output_tokens, 800);
/// ```
#[derive(Clone)]
pub struct AssistantConfig {
    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// edgequake-llm provider name (e.g. "openai", "anthropic", "ollama").
    /// If None, the direct Gemini backend is used.
    pub provider_name: Option<String>,

    /// Pre-constructed backend. Takes precedence over everything else.
    pub backend: Option<Arc<dyn GenerationBackend>>,

    /// Pre-constructed edgequake-llm provider. Takes precedence over `provider_name`.
    pub llm_provider: Option<Arc<dyn LLMProvider>>,

    /// API key for the direct Gemini backend.
    pub api_key: Option<String>,

    /// Base URL for the direct Gemini backend. Default: [`GEMINI_BASE_URL`].
    pub api_base: String,

    /// Default sampling parameters for [`crate::Assistant::solve`].
    pub sampling: SamplingParams,

    /// Whether sampling parameters are sent to the backend at all. Default: true.
    ///
    /// With `false` the parameters are still validated but the backend
    /// runs with its own defaults.
    pub forward_sampling: bool,

    /// Custom instruction template. If None, uses [`crate::prompts::CHEM_PROMPT`].
    pub instruction_template: Option<String>,

    /// Download timeout for URL attachments in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional observer for pipeline stages.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            provider_name: None,
            backend: None,
            llm_provider: None,
            api_key: None,
            api_base: GEMINI_BASE_URL.to_string(),
            sampling: SamplingParams::default(),
            forward_sampling: true,
            instruction_template: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("llm_provider", &self.llm_provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("sampling", &self.sampling)
            .field("forward_sampling", &self.forward_sampling)
            .field("instruction_template", &self.instruction_template.is_some())
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl AssistantConfig {
    /// Create a new builder for `AssistantConfig`.
    pub fn builder() -> AssistantConfigBuilder {
        AssistantConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load configuration from the process environment, once.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `GOOGLE_API_KEY`, then `GEMINI_API_KEY` | `api_key` |
    /// | `CHEMIST_MODEL` | `model` |
    /// | `CHEMIST_PROVIDER` | `provider_name` |
    /// | `CHEMIST_API_BASE` | `api_base` |
    pub fn from_env() -> Result<Self, ChemistError> {
        Self::builder().env_overrides(|key| std::env::var(key).ok()).build()
    }

    /// The instruction template in effect.
    pub fn template(&self) -> &str {
        self.instruction_template
            .as_deref()
            .unwrap_or(crate::prompts::CHEM_PROMPT)
    }

    /// Sampling to attach to a request, honouring `forward_sampling`.
    pub fn effective_sampling(&self, requested: SamplingParams) -> Option<SamplingParams> {
        self.forward_sampling.then_some(requested)
    }
}

/// Builder for [`AssistantConfig`].
pub struct AssistantConfigBuilder {
    config: AssistantConfig,
}

impl fmt::Debug for AssistantConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl AssistantConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn llm_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.llm_provider = Some(provider);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.sampling.temperature = t.clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.sampling.max_output_tokens =
            n.clamp(MAX_OUTPUT_TOKENS_RANGE.0, MAX_OUTPUT_TOKENS_RANGE.1);
        self
    }

    pub fn sampling(mut self, sampling: SamplingParams) -> Self {
        self.config.sampling = sampling;
        self
    }

    pub fn forward_sampling(mut self, v: bool) -> Self {
        self.config.forward_sampling = v;
        self
    }

    pub fn instruction_template(mut self, template: impl Into<String>) -> Self {
        self.config.instruction_template = Some(template.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Apply environment overrides through `lookup` (injected for tests).
    ///
    /// Empty values are treated as unset.
    pub fn env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("GOOGLE_API_KEY").or_else(|| get("GEMINI_API_KEY")) {
            self.config.api_key = Some(key);
        }
        if let Some(model) = get("CHEMIST_MODEL") {
            self.config.model = model;
        }
        if let Some(provider) = get("CHEMIST_PROVIDER") {
            self.config.provider_name = Some(provider);
        }
        if let Some(base) = get("CHEMIST_API_BASE") {
            self = self.api_base(base);
        }
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AssistantConfig, ChemistError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(ChemistError::InvalidConfig("Model must not be empty".into()));
        }
        if let Some(ref t) = c.instruction_template {
            if t.trim().is_empty() {
                return Err(ChemistError::InvalidConfig(
                    "Instruction template must not be empty".into(),
                ));
            }
        }
        if c.api_base.is_empty() {
            return Err(ChemistError::InvalidConfig("API base URL must not be empty".into()));
        }
        c.sampling.validate()?;
        Ok(self.config)
    }
}
