//! Direct client for the Google Generative Language `generateContent` API.
//!
//! One POST per call:
//!
//! ```text
//! POST {api_base}/models/{model}:generateContent
//! x-goog-api-key: {api_key}
//!
//! { "contents": [ { "role": "user",
//!                   "parts": [ {"text": …}, {"inlineData": {"mimeType": …, "data": …}} ] } ],
//!   "generationConfig": { "temperature": …, "maxOutputTokens": …,
//!                         "thinkingConfig": { "thinkingBudget": 0 } } }
//! ```
//!
//! Gemini 2.5 Flash models spend output tokens on hidden reasoning, so a
//! small `maxOutputTokens` can end in `MAX_TOKENS` with no answer text. When a
//! token bound is forwarded to such a model, thinking is switched off. Pro
//! models cannot disable thinking and get no `thinkingConfig`.
//!
//! The HTTP client keeps reqwest's defaults; no timeout is imposed on top of
//! the service's own.

use super::{BackendCall, BackendError, BackendReply, GenerationBackend};
use crate::config::{SamplingParams, DEFAULT_MODEL, GEMINI_BASE_URL};
use crate::error::GenerationFailureKind;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Gemini REST backend.
#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: GEMINI_BASE_URL.to_string(),
            model: if model.is_empty() {
                DEFAULT_MODEL.to_string()
            } else {
                model
            },
        }
    }

    /// Point the backend at a different API root (proxy, emulator).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Reuse an existing HTTP client (connection pool, custom TLS).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Full `generateContent` URL for the configured model.
    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        call: BackendCall,
        sampling: Option<SamplingParams>,
    ) -> Result<BackendReply, BackendError> {
        let body = build_request_body(&call, sampling, &self.model);
        debug!(
            "Gemini {} call to {} ({} prompt bytes)",
            call.shape(),
            self.model,
            call.prompt().len()
        );

        let res = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::new(GenerationFailureKind::Transport, e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let text = res
                .text()
                .await
                .map_err(|e| BackendError::new(GenerationFailureKind::Transport, e.to_string()))?;
            let kind = classify_status(status);
            let message = extract_error_message(status, &text);
            warn!("Gemini returned {}: {}", status, message);
            return Err(BackendError::new(kind, message));
        }

        let parsed: GenerateContentResponse = res.json().await.map_err(|e| {
            BackendError::new(
                GenerationFailureKind::Transport,
                format!("Invalid response body: {e}"),
            )
        })?;

        parse_reply(parsed)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
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
    /// Thinking models tag their reasoning parts; those are not the answer.
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Models whose reasoning can be turned off with a zero thinking budget.
fn thinking_can_be_disabled(model: &str) -> bool {
    model.starts_with("gemini-2.5-flash")
}

fn build_request_body<'a>(
    call: &'a BackendCall,
    sampling: Option<SamplingParams>,
    model: &str,
) -> GenerateContentRequest<'a> {
    let parts = match call {
        BackendCall::Text { prompt } => vec![Part::Text { text: prompt }],
        BackendCall::Multimodal { prompt, image } => vec![
            Part::Text { text: prompt },
            Part::InlineData {
                inline_data: InlineData {
                    mime_type: &image.mime_type,
                    data: &image.data,
                },
            },
        ],
    };

    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts,
        }],
        generation_config: sampling.map(|s| GenerationConfig {
            temperature: s.temperature,
            max_output_tokens: s.max_output_tokens,
            thinking_config: thinking_can_be_disabled(model)
                .then_some(ThinkingConfig { thinking_budget: 0 }),
        }),
    }
}

fn parse_reply(body: GenerateContentResponse) -> Result<BackendReply, BackendError> {
    let usage = body.usage_metadata.unwrap_or_default();

    let Some(candidate) = body.candidates.into_iter().next() else {
        return Err(match body.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => BackendError::new(
                GenerationFailureKind::Rejected,
                format!("Prompt was blocked by the service (reason: {reason})"),
            ),
            None => BackendError::new(
                GenerationFailureKind::EmptyResponse,
                "The service returned no candidates",
            ),
        });
    };

    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| !p.thought)
        .filter_map(|p| p.text)
        .collect();

    if text.is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("UNKNOWN");
        return Err(BackendError::new(
            GenerationFailureKind::EmptyResponse,
            format!("The service returned no text (finish reason: {reason})"),
        ));
    }

    Ok(BackendReply {
        text,
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
    })
}

fn classify_status(status: StatusCode) -> GenerationFailureKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationFailureKind::Auth,
        StatusCode::TOO_MANY_REQUESTS => GenerationFailureKind::RateLimit,
        _ => GenerationFailureKind::Rejected,
    }
}

/// The API's own `error.message` when the body carries one, else the raw body.
fn extract_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ApiErrorEnvelope>(body) {
        return envelope.error.message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed.to_string()
    }
}
