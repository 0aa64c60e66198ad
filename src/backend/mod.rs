//! Generation backends: the one place with network I/O.
//!
//! [`GenerationBackend`] is the seam between the pipeline and a concrete
//! completion service. Two implementations ship with the crate:
//!
//! * [`gemini::GeminiBackend`] — direct REST client for Google's
//!   `generateContent` endpoint (the default).
//! * [`provider::ProviderBackend`] — adapter over any `edgequake_llm`
//!   provider (OpenAI, Anthropic, Ollama, …).
//!
//! Backends make exactly one request per [`GenerationBackend::generate`]
//! call. Retrying, if ever wanted, belongs to the caller.

pub mod gemini;
pub mod provider;

use crate::config::SamplingParams;
use crate::error::{ChemistError, GenerationFailureKind};
use async_trait::async_trait;
use edgequake_llm::ImageData;
use thiserror::Error;

pub use gemini::GeminiBackend;
pub use provider::ProviderBackend;

/// The two request shapes a backend must understand.
#[derive(Debug, Clone)]
pub enum BackendCall {
    /// Prompt only. Used for text requests and for PDF requests, whose
    /// document text is already merged into the prompt.
    Text { prompt: String },
    /// Prompt plus one base64-encoded image.
    Multimodal { prompt: String, image: ImageData },
}

impl BackendCall {
    pub fn prompt(&self) -> &str {
        match self {
            BackendCall::Text { prompt } | BackendCall::Multimodal { prompt, .. } => prompt,
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            BackendCall::Text { .. } => "text",
            BackendCall::Multimodal { .. } => "multimodal",
        }
    }
}

/// Successful backend response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReply {
    /// Generated text, exactly as returned.
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A failed backend call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    pub kind: GenerationFailureKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: GenerationFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<BackendError> for ChemistError {
    fn from(e: BackendError) -> Self {
        ChemistError::Generation {
            kind: e.kind,
            message: e.message,
        }
    }
}

/// A text / multimodal completion service.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short backend name for logs and stats (e.g. "gemini", "openai").
    fn name(&self) -> &str;

    /// Model identifier the backend sends requests to.
    fn model(&self) -> &str;

    /// Issue exactly one request.
    ///
    /// `sampling: None` leaves the service's own defaults in place.
    async fn generate(
        &self,
        call: BackendCall,
        sampling: Option<SamplingParams>,
    ) -> Result<BackendReply, BackendError>;
}
