//! Generation client: one [`GenerationRequest`] → one backend call.
//!
//! The request shape is chosen purely from the attachment:
//!
//! | attachment      | call shape   |
//! |-----------------|--------------|
//! | `None`          | text         |
//! | `DocumentText`  | text (document already merged into the prompt) |
//! | `Image`         | multimodal   |
//!
//! There is no retry loop. A failure is reported as-is, with the backend's
//! message preserved, and the user decides whether to resubmit.

use crate::backend::{BackendCall, GenerationBackend};
use crate::error::ChemistError;
use crate::pipeline::encode::encode_image;
use crate::progress::ProgressCallback;
use crate::request::{GenerationRequest, RequestAttachment};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Lifecycle of one generation request.
///
/// `Idle → Dispatching → Succeeded | Failed`. Both terminal states are final
/// for the request; a new submission starts again from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Idle,
    Dispatching,
    Succeeded,
    Failed,
}

impl GenerationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, GenerationState::Succeeded | GenerationState::Failed)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: GenerationState) -> bool {
        matches!(
            (self, next),
            (GenerationState::Idle, GenerationState::Dispatching)
                | (GenerationState::Dispatching, GenerationState::Succeeded)
                | (GenerationState::Dispatching, GenerationState::Failed)
        )
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GenerationState::Idle => "idle",
            GenerationState::Dispatching => "dispatching",
            GenerationState::Succeeded => "succeeded",
            GenerationState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of a successful generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    /// Markdown returned by the backend, unmodified.
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

/// Drives a single request through a [`GenerationBackend`].
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    progress: Option<ProgressCallback>,
    state: GenerationState,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn GenerationBackend>, progress: Option<ProgressCallback>) -> Self {
        Self {
            backend,
            progress,
            state: GenerationState::Idle,
        }
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    fn transition(&mut self, next: GenerationState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} → {}",
            self.state,
            next
        );
        debug!("Generation state: {} → {}", self.state, next);
        self.state = next;
        if let Some(cb) = &self.progress {
            cb.on_state(next);
        }
    }

    /// Issue exactly one backend call for `request`.
    ///
    /// Consumes the client; each request gets a fresh one.
    pub async fn generate(
        mut self,
        request: GenerationRequest,
    ) -> Result<GenerationOutcome, ChemistError> {
        let call = match build_call(&request) {
            Ok(call) => call,
            Err(e) => {
                // Local failure before dispatch: never reaches the backend.
                warn!("Could not build backend call: {}", e);
                return Err(e);
            }
        };

        self.transition(GenerationState::Dispatching);
        let start = Instant::now();

        let result = self.backend.generate(call, request.sampling).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(reply) => {
                self.transition(GenerationState::Succeeded);
                debug!(
                    "{} replied in {}ms: {} input tokens, {} output tokens",
                    self.backend.name(),
                    duration_ms,
                    reply.input_tokens,
                    reply.output_tokens
                );
                Ok(GenerationOutcome {
                    text: reply.text,
                    input_tokens: reply.input_tokens,
                    output_tokens: reply.output_tokens,
                    duration_ms,
                })
            }
            Err(e) => {
                self.transition(GenerationState::Failed);
                warn!(
                    "{} call failed after {}ms ({}): {}",
                    self.backend.name(),
                    duration_ms,
                    e.kind,
                    e.message
                );
                Err(e.into())
            }
        }
    }
}

/// Map a prepared request onto the backend call shape.
pub fn build_call(request: &GenerationRequest) -> Result<BackendCall, ChemistError> {
    let prompt = request.prompt.as_str().to_string();
    match &request.attachment {
        RequestAttachment::None | RequestAttachment::DocumentText(_) => {
            Ok(BackendCall::Text { prompt })
        }
        RequestAttachment::Image(loaded) => Ok(BackendCall::Multimodal {
            prompt,
            image: encode_image(loaded)?,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::image::{load_image, png_fixture};
    use crate::prompts::{assemble_prompt, CHEM_PROMPT};
    use crate::request::InputModality;

    fn request(modality: InputModality, attachment: RequestAttachment) -> GenerationRequest {
        GenerationRequest {
            modality,
            prompt: assemble_prompt(CHEM_PROMPT, "balance H2 + O2", modality, None),
            attachment,
            sampling: None,
        }
    }

    #[test]
    fn state_transitions() {
        use GenerationState::*;
        assert!(Idle.can_transition_to(Dispatching));
        assert!(Dispatching.can_transition_to(Succeeded));
        assert!(Dispatching.can_transition_to(Failed));
        assert!(!Idle.can_transition_to(Succeeded));
        assert!(!Succeeded.can_transition_to(Dispatching));
        assert!(!Failed.can_transition_to(Idle));
        assert!(Succeeded.is_terminal() && Failed.is_terminal());
        assert!(!Dispatching.is_terminal());
    }

    #[test]
    fn text_request_builds_text_call() {
        let call = build_call(&request(InputModality::Text, RequestAttachment::None)).unwrap();
        assert_eq!(call.shape(), "text");
        assert!(call.prompt().ends_with("User Input: balance H2 + O2"));
    }

    #[test]
    fn document_request_builds_text_call() {
        let call = build_call(&request(
            InputModality::Document,
            RequestAttachment::DocumentText("Section 1".into()),
        ))
        .unwrap();
        assert_eq!(call.shape(), "text");
    }

    #[test]
    fn image_request_builds_multimodal_call() {
        let loaded = load_image(&png_fixture(2, 2)).unwrap();
        let call = build_call(&request(
            InputModality::Image,
            RequestAttachment::Image(loaded),
        ))
        .unwrap();
        match call {
            BackendCall::Multimodal { image, .. } => assert_eq!(image.mime_type, "image/png"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
