//! # ai-chemist
//!
//! Answer chemistry questions with a generative model, from plain text, a
//! picture of a structure or spectrum, or a PDF used as reference material.
//!
//! ## Pipeline Overview
//!
//! ```text
//! RawInput (text | image | PDF)
//!  │
//!  ├─ 1. Extract   decode PNG/JPEG, or pull PDF text via pdfium (spawn_blocking)
//!  ├─ 2. Assemble  chemistry instructions + "User Input:" [+ reference document]
//!  ├─ 3. Encode    image → base64 PNG (image requests only)
//!  ├─ 4. Generate  exactly one call to Gemini or any edgequake-llm provider
//!  └─ 5. Output    Markdown returned verbatim + stats
//! ```
//!
//! Missing attachments, unreadable PDFs and corrupt images are rejected
//! before the backend is contacted. A failed backend call is reported with
//! the service's own message and is never retried.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_chemist::{Assistant, AssistantConfig, RawInput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from GOOGLE_API_KEY / GEMINI_API_KEY
//!     let assistant = Assistant::new(AssistantConfig::from_env()?)?;
//!     let solution = assistant
//!         .solve(RawInput::text("Balance: Fe + O2 -> Fe2O3"))
//!         .await?;
//!     println!("{}", solution.markdown);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `chemist` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ai-chemist = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assistant;
pub mod backend;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod request;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assistant::{prepare_request, solve_sync, Assistant};
pub use backend::{
    BackendCall, BackendError, BackendReply, GeminiBackend, GenerationBackend, ProviderBackend,
};
pub use config::{AssistantConfig, AssistantConfigBuilder, SamplingParams, DEFAULT_MODEL};
pub use error::{ChemistError, GenerationFailureKind};
pub use output::{SolveStats, Solution};
pub use pipeline::generate::GenerationState;
pub use progress::{NoopProgressCallback, PipelineStage, ProgressCallback, SolveProgressCallback};
pub use prompts::{assemble_prompt, Prompt, CHEM_PROMPT};
pub use request::{GenerationRequest, InputModality, RawInput, RequestAttachment};
