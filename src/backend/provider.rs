//! Adapter from [`GenerationBackend`] to any `edgequake_llm` provider.
//!
//! The request is a single user [`ChatMessage`]: plain for the text shape,
//! with one image attachment for the multimodal shape. No system message is
//! sent; the instruction template is already part of the prompt.

use super::{BackendCall, BackendError, BackendReply, GenerationBackend};
use crate::config::SamplingParams;
use crate::error::{ChemistError, GenerationFailureKind};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::{debug, warn};

/// A [`GenerationBackend`] backed by an edgequake-llm provider.
#[derive(Clone)]
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    name: String,
    model: String,
}

impl std::fmt::Debug for ProviderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBackend")
            .field("name", &self.name)
            .field("model", &self.model)
            .finish()
    }
}

impl ProviderBackend {
    /// Wrap a pre-built provider.
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            name: name.into(),
            model: model.into(),
        }
    }

    /// Instantiate a named provider through [`ProviderFactory`].
    ///
    /// The factory reads the provider's own API key variable
    /// (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, …).
    pub fn from_factory(provider_name: &str, model: &str) -> Result<Self, ChemistError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            ChemistError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, provider_name, model))
    }
}

#[async_trait]
impl GenerationBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        call: BackendCall,
        sampling: Option<SamplingParams>,
    ) -> Result<BackendReply, BackendError> {
        let shape = call.shape();
        let message = match call {
            BackendCall::Text { prompt } => ChatMessage::user(&prompt),
            BackendCall::Multimodal { prompt, image } => {
                ChatMessage::user_with_images(&prompt, vec![image])
            }
        };
        let options = build_options(sampling);

        debug!("{} {} call to {}", self.name, shape, self.model);

        match self.provider.chat(&[message], Some(&options)).await {
            Ok(response) => {
                debug!(
                    "{}: {} input tokens, {} output tokens",
                    self.name, response.prompt_tokens, response.completion_tokens
                );
                if response.content.is_empty() {
                    return Err(BackendError::new(
                        GenerationFailureKind::EmptyResponse,
                        "The provider returned no text",
                    ));
                }
                Ok(BackendReply {
                    text: response.content,
                    input_tokens: response.prompt_tokens,
                    output_tokens: response.completion_tokens,
                })
            }
            Err(e) => {
                let message = format!("{e}");
                warn!("{} call failed: {}", self.name, message);
                Err(BackendError::new(classify_message(&message), message))
            }
        }
    }
}

/// Build `CompletionOptions`; `None` leaves provider defaults untouched.
fn build_options(sampling: Option<SamplingParams>) -> CompletionOptions {
    match sampling {
        Some(s) => CompletionOptions {
            temperature: Some(s.temperature),
            max_tokens: Some(s.max_output_tokens),
            ..Default::default()
        },
        None => CompletionOptions::default(),
    }
}

/// Best-effort classification from the provider's error text.
fn classify_message(message: &str) -> GenerationFailureKind {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("quota") {
        GenerationFailureKind::RateLimit
    } else if lower.contains("401")
        || lower.contains("403")
        || lower.contains("unauthorized")
        || lower.contains("api key")
        || lower.contains("authentication")
    {
        GenerationFailureKind::Auth
    } else if lower.contains("connect")
        || lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("network")
    {
        GenerationFailureKind::Transport
    } else {
        GenerationFailureKind::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_forward_sampling() {
        let opts = build_options(Some(SamplingParams {
            temperature: 0.2,
            max_output_tokens: 1200,
        }));
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(1200));
    }

    #[test]
    fn options_without_sampling_use_defaults() {
        let opts = build_options(None);
        let defaults = CompletionOptions::default();
        assert_eq!(opts.temperature, defaults.temperature);
        assert_eq!(opts.max_tokens, defaults.max_tokens);
    }

    #[test]
    fn classify_common_messages() {
        assert_eq!(
            classify_message("HTTP 429 Too Many Requests"),
            GenerationFailureKind::RateLimit
        );
        assert_eq!(
            classify_message("Incorrect API key provided"),
            GenerationFailureKind::Auth
        );
        assert_eq!(
            classify_message("error sending request: connection refused"),
            GenerationFailureKind::Transport
        );
        assert_eq!(
            classify_message("model does not support images"),
            GenerationFailureKind::Rejected
        );
    }
}
