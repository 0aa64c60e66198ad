//! The request orchestrator: raw input → [`Solution`].
//!
//! One call to [`Assistant::solve`] runs the whole pipeline sequentially:
//!
//! ```text
//! RawInput ─▶ extract (image decode | PDF text) ─▶ assemble prompt ─▶ one backend call
//! ```
//!
//! Missing or unreadable attachments are rejected before the backend is
//! contacted. Nothing is retried, cached, or persisted.

use crate::backend::{GeminiBackend, GenerationBackend, ProviderBackend};
use crate::config::{AssistantConfig, SamplingParams};
use crate::error::ChemistError;
use crate::output::{SolveStats, Solution};
use crate::pipeline::generate::GenerationClient;
use crate::pipeline::{document, image};
use crate::progress::{PipelineStage, ProgressCallback};
use crate::prompts::assemble_prompt;
use crate::request::{
    ExtractedContent, GenerationRequest, InputModality, RawInput, RequestAttachment,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// A chemistry assistant session.
///
/// The backend is resolved once at construction. At most one request is in
/// flight per session; a concurrent [`solve`](Self::solve) fails immediately
/// with [`ChemistError::Busy`].
pub struct Assistant {
    config: AssistantConfig,
    backend: Arc<dyn GenerationBackend>,
    in_flight: Semaphore,
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("backend", &self.backend.name())
            .field("model", &self.backend.model())
            .field("config", &self.config)
            .finish()
    }
}

impl Assistant {
    /// Create a session, resolving the backend from `config`.
    ///
    /// # Errors
    /// [`ChemistError::ProviderNotConfigured`] when no backend can be built.
    pub fn new(config: AssistantConfig) -> Result<Self, ChemistError> {
        let backend = resolve_backend(&config)?;
        info!(
            "Assistant ready: backend={}, model={}",
            backend.name(),
            backend.model()
        );
        Ok(Self::with_backend(config, backend))
    }

    /// Create a session around an explicit backend, ignoring the backend
    /// fields of `config`.
    pub fn with_backend(config: AssistantConfig, backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            config,
            backend,
            in_flight: Semaphore::new(1),
        }
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn GenerationBackend> {
        &self.backend
    }

    /// Whether a request is currently being processed.
    pub fn is_busy(&self) -> bool {
        self.in_flight.available_permits() == 0
    }

    /// Answer `input` with the configured sampling parameters.
    pub async fn solve(&self, input: RawInput) -> Result<Solution, ChemistError> {
        self.solve_with(input, self.config.sampling).await
    }

    /// Answer `input` with per-request sampling parameters.
    ///
    /// # Errors
    /// * [`ChemistError::InvalidConfig`] — `sampling` out of range
    /// * [`ChemistError::Busy`] — another request from this session is running
    /// * [`ChemistError::MissingInput`], [`ChemistError::DocumentParse`],
    ///   [`ChemistError::ImageDecode`] — local failures, no backend call made
    /// * [`ChemistError::Generation`] — the single backend call failed
    pub async fn solve_with(
        &self,
        input: RawInput,
        sampling: SamplingParams,
    ) -> Result<Solution, ChemistError> {
        let result = self.guarded_run(input, sampling).await;
        self.report(&result);
        result
    }

    /// Send an already assembled request to the backend.
    ///
    /// Extraction and prompt assembly are skipped; the request's sampling, if
    /// any, is forwarded as-is after validation. The same Busy guard and
    /// progress reporting as [`solve`](Self::solve) apply.
    pub async fn solve_prepared(
        &self,
        request: GenerationRequest,
    ) -> Result<Solution, ChemistError> {
        let result = self.guarded_dispatch(request).await;
        self.report(&result);
        result
    }

    async fn guarded_run(
        &self,
        input: RawInput,
        sampling: SamplingParams,
    ) -> Result<Solution, ChemistError> {
        sampling.validate()?;
        let _permit = self
            .in_flight
            .try_acquire()
            .map_err(|_| ChemistError::Busy)?;

        let total_start = Instant::now();
        info!("Solving {} request", input.modality());

        let request = prepare_request_with_progress(
            input,
            self.config.template(),
            self.config.effective_sampling(sampling),
            self.config.progress_callback.as_ref(),
        )
        .await?;
        let extract_duration_ms = total_start.elapsed().as_millis() as u64;

        self.dispatch(request, total_start, extract_duration_ms).await
    }

    async fn guarded_dispatch(&self, request: GenerationRequest) -> Result<Solution, ChemistError> {
        if let Some(sampling) = request.sampling {
            sampling.validate()?;
        }
        let _permit = self
            .in_flight
            .try_acquire()
            .map_err(|_| ChemistError::Busy)?;

        info!("Solving prepared {} request", request.modality);
        self.dispatch(request, Instant::now(), 0).await
    }

    async fn dispatch(
        &self,
        request: GenerationRequest,
        total_start: Instant,
        extract_duration_ms: u64,
    ) -> Result<Solution, ChemistError> {
        let modality = request.modality;
        let prompt_chars = request.prompt.len();
        let document_chars = request.document_chars();
        let forwarded = request.sampling;

        stage(self.config.progress_callback.as_ref(), PipelineStage::Generating);
        let client = GenerationClient::new(
            Arc::clone(&self.backend),
            self.config.progress_callback.clone(),
        );
        let outcome = client.generate(request).await?;

        let stats = SolveStats {
            backend: self.backend.name().to_string(),
            model: self.backend.model().to_string(),
            input_tokens: outcome.input_tokens,
            output_tokens: outcome.output_tokens,
            prompt_chars,
            document_chars,
            sampling: forwarded,
            extract_duration_ms,
            generation_duration_ms: outcome.duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Solved {} request: {} bytes of Markdown, {}ms total",
            modality,
            outcome.text.len(),
            stats.total_duration_ms
        );

        Ok(Solution {
            markdown: outcome.text,
            modality,
            stats,
        })
    }

    /// Every outcome, including rejections before any work, ends in exactly
    /// one `on_complete` or `on_error`.
    fn report(&self, result: &Result<Solution, ChemistError>) {
        if let Some(cb) = &self.config.progress_callback {
            match result {
                Ok(solution) => cb.on_complete(solution.markdown.len()),
                Err(e) => cb.on_error(&e.to_string()),
            }
        }
    }

    /// Solve and write the Markdown to `output_path`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn solve_to_file(
        &self,
        input: RawInput,
        output_path: impl AsRef<Path>,
    ) -> Result<SolveStats, ChemistError> {
        let solution = self.solve(input).await?;
        write_markdown(output_path.as_ref(), &solution.markdown).await?;
        Ok(solution.stats)
    }
}

/// Synchronous wrapper around [`Assistant::solve`].
///
/// Creates a temporary tokio runtime internally.
pub fn solve_sync(config: AssistantConfig, input: RawInput) -> Result<Solution, ChemistError> {
    let assistant = Assistant::new(config)?;
    tokio::runtime::Runtime::new()
        .map_err(|e| ChemistError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(assistant.solve(input))
}

/// Normalise raw input and assemble the prompt.
///
/// No backend is involved; this is what `chemist --show-prompt` prints.
pub async fn prepare_request(
    input: RawInput,
    template: &str,
    sampling: Option<SamplingParams>,
) -> Result<GenerationRequest, ChemistError> {
    prepare_request_with_progress(input, template, sampling, None).await
}

async fn prepare_request_with_progress(
    input: RawInput,
    template: &str,
    sampling: Option<SamplingParams>,
    progress: Option<&ProgressCallback>,
) -> Result<GenerationRequest, ChemistError> {
    let modality = input.modality();
    let (user_text, content) = extract(input, progress).await?;

    stage(progress, PipelineStage::Assembling);
    Ok(assemble_request(
        modality, &user_text, content, template, sampling,
    ))
}

/// Build the final request from extracted content. Pure.
fn assemble_request(
    modality: InputModality,
    user_text: &str,
    content: ExtractedContent,
    template: &str,
    sampling: Option<SamplingParams>,
) -> GenerationRequest {
    let (document_text, attachment) = match content {
        ExtractedContent::Nothing => (None, RequestAttachment::None),
        ExtractedContent::Image(loaded) => (None, RequestAttachment::Image(loaded)),
        ExtractedContent::DocumentText(text) => {
            if text.is_empty() {
                warn!("PDF yielded no text; sending the prompt without a reference section");
            }
            (Some(text.clone()), RequestAttachment::DocumentText(text))
        }
    };

    let prompt = assemble_prompt(template, user_text, modality, document_text.as_deref());
    debug!("Assembled {} prompt: {} bytes", modality, prompt.len());

    GenerationRequest {
        modality,
        prompt,
        attachment,
        sampling,
    }
}

/// Turn the raw attachment into usable content, rejecting missing files.
async fn extract(
    input: RawInput,
    progress: Option<&ProgressCallback>,
) -> Result<(String, ExtractedContent), ChemistError> {
    match input {
        RawInput::Text { text } => Ok((text, ExtractedContent::Nothing)),
        RawInput::Image { text, bytes } => {
            let bytes = bytes.ok_or(ChemistError::MissingInput {
                modality: InputModality::Image,
            })?;
            stage(progress, PipelineStage::Extracting);
            let loaded = image::load_image(&bytes)?;
            Ok((text, ExtractedContent::Image(loaded)))
        }
        RawInput::Document { text, bytes } => {
            let bytes = bytes.ok_or(ChemistError::MissingInput {
                modality: InputModality::Document,
            })?;
            stage(progress, PipelineStage::Extracting);
            let doc = document::extract_text(bytes).await?;
            Ok((text, ExtractedContent::DocumentText(doc)))
        }
    }
}

fn stage(progress: Option<&ProgressCallback>, stage: PipelineStage) {
    debug!("Stage: {}", stage);
    if let Some(cb) = progress {
        cb.on_stage(stage);
    }
}

/// Resolve the generation backend, from most-specific to least-specific.
///
/// 1. **Pre-built backend** (`config.backend`), used as-is.
/// 2. **Pre-built provider** (`config.llm_provider`), wrapped in a
///    [`ProviderBackend`].
/// 3. **Named provider** (`config.provider_name`), created through
///    `ProviderFactory`, which reads that provider's own API key variable.
///    `"gemini"` is served by the direct REST backend when an API key is set.
/// 4. **Direct Gemini** with `config.api_key`.
fn resolve_backend(config: &AssistantConfig) -> Result<Arc<dyn GenerationBackend>, ChemistError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    if let Some(ref provider) = config.llm_provider {
        let name = config.provider_name.as_deref().unwrap_or("custom");
        return Ok(Arc::new(ProviderBackend::new(
            Arc::clone(provider),
            name,
            config.model.clone(),
        )));
    }

    if let Some(ref name) = config.provider_name {
        let direct_gemini = name.eq_ignore_ascii_case("gemini") && config.api_key.is_some();
        if !direct_gemini {
            return Ok(Arc::new(ProviderBackend::from_factory(name, &config.model)?));
        }
    }

    match config.api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => Ok(Arc::new(
            GeminiBackend::new(key, config.model.clone()).with_api_base(config.api_base.clone()),
        )),
        _ => Err(ChemistError::ProviderNotConfigured {
            provider: "gemini".to_string(),
            hint: "Set GOOGLE_API_KEY (or GEMINI_API_KEY), pass --api-key, \
                   or choose another provider with --provider."
                .to_string(),
        }),
    }
}

async fn write_markdown(path: &Path, markdown: &str) -> Result<(), ChemistError> {
    let write_failed = |e| ChemistError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
        }
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, markdown)
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::{CHEM_PROMPT, REFERENCE_DOCUMENT_LABEL};

    #[test]
    fn no_key_no_provider_is_not_configured() {
        let config = AssistantConfig::builder().build().unwrap();
        let err = Assistant::new(config).unwrap_err();
        assert!(matches!(err, ChemistError::ProviderNotConfigured { .. }));
    }

    #[test]
    fn api_key_selects_gemini() {
        let config = AssistantConfig::builder()
            .api_key("test-key")
            .model("gemini-2.5-pro")
            .build()
            .unwrap();
        let assistant = Assistant::new(config).unwrap();
        assert_eq!(assistant.backend().name(), "gemini");
        assert_eq!(assistant.backend().model(), "gemini-2.5-pro");
        assert!(!assistant.is_busy());
    }

    #[test]
    fn gemini_provider_name_with_key_stays_direct() {
        let config = AssistantConfig::builder()
            .provider_name("gemini")
            .api_key("k")
            .build()
            .unwrap();
        let assistant = Assistant::new(config).unwrap();
        assert_eq!(assistant.backend().name(), "gemini");
    }

    #[tokio::test]
    async fn text_request_has_no_attachment() {
        let req = prepare_request(RawInput::text("pKa of acetic acid?"), CHEM_PROMPT, None)
            .await
            .unwrap();
        assert_eq!(req.modality, InputModality::Text);
        assert!(matches!(req.attachment, RequestAttachment::None));
        assert!(req.prompt.as_str().ends_with("User Input: pKa of acetic acid?"));
        assert!(req.sampling.is_none());
    }

    #[tokio::test]
    async fn missing_image_is_rejected() {
        let err = prepare_request(RawInput::image("what is this?", None), CHEM_PROMPT, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChemistError::MissingInput {
                modality: InputModality::Image
            }
        ));
    }

    #[tokio::test]
    async fn missing_document_is_rejected() {
        let err = prepare_request(RawInput::document("summarise", None), CHEM_PROMPT, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChemistError::MissingInput {
                modality: InputModality::Document
            }
        ));
    }

    #[tokio::test]
    async fn image_request_keeps_image_out_of_prompt() {
        let bytes = crate::pipeline::image::png_fixture(3, 3);
        let req = prepare_request(RawInput::image("identify", Some(bytes)), CHEM_PROMPT, None)
            .await
            .unwrap();
        assert!(matches!(req.attachment, RequestAttachment::Image(_)));
        assert!(!req.prompt.as_str().contains(REFERENCE_DOCUMENT_LABEL));
    }

    #[test]
    fn document_text_becomes_reference_section() {
        let req = assemble_request(
            InputModality::Document,
            "Summarize",
            ExtractedContent::DocumentText("Section 1".to_string()),
            CHEM_PROMPT,
            None,
        );
        let prompt = req.prompt.as_str();
        let user_at = prompt.find("User Input: Summarize").unwrap();
        let doc_at = prompt.find(REFERENCE_DOCUMENT_LABEL).unwrap();
        assert!(user_at < doc_at);
        assert!(prompt[doc_at..].contains("Section 1"));
        assert!(matches!(req.attachment, RequestAttachment::DocumentText(ref t) if t == "Section 1"));
        assert_eq!(req.document_chars(), Some(9));
    }

    #[test]
    fn empty_document_text_sends_no_reference_section() {
        let req = assemble_request(
            InputModality::Document,
            "Summarize",
            ExtractedContent::DocumentText(String::new()),
            CHEM_PROMPT,
            None,
        );
        assert!(!req.prompt.as_str().contains(REFERENCE_DOCUMENT_LABEL));
        assert_eq!(req.modality, InputModality::Document);
    }

    #[tokio::test]
    async fn write_markdown_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("answer.md");
        write_markdown(&path, "# Result").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Result");
        assert!(!path.with_extension("md.tmp").exists());
    }
}
