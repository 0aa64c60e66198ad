//! CLI binary for ai-chemist.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AssistantConfig` and prints the answer.

use ai_chemist::pipeline::input::read_attachment;
use ai_chemist::{
    prepare_request, Assistant, AssistantConfig, ChemistError, GenerationState, InputModality,
    PipelineStage, ProgressCallback, RawInput, SamplingParams, SolveProgressCallback,
};
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Busy indicator: one spinner whose message follows the pipeline stage.
struct CliSpinner {
    bar: ProgressBar,
}

impl CliSpinner {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_message("Preparing…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl Drop for CliSpinner {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl SolveProgressCallback for CliSpinner {
    fn on_stage(&self, stage: PipelineStage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_state(&self, state: GenerationState) {
        if state.is_terminal() {
            self.bar.finish_and_clear();
        }
    }

    fn on_complete(&self, markdown_len: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {}  {}",
            green("✔"),
            bold("AI Chemist's Solution"),
            dim(&format!("{markdown_len} chars"))
        );
    }

    fn on_error(&self, _error: &str) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ask a question
  chemist "Balance: Fe + O2 -> Fe2O3"

  # Read the question from stdin
  echo "Suggest a catalyst for ethylene hydrogenation" | chemist -

  # Analyse a structure or spectrum image
  chemist --input-type image --file benzene.png "Identify this compound"

  # Use a research paper as reference material
  chemist --input-type pdf --file paper.pdf "Summarise the synthesis route" -o answer.md

  # Inspect the prompt that would be sent (no API key needed)
  chemist --show-prompt --input-type pdf --file paper.pdf "Summarise"

  # Another provider through edgequake-llm
  chemist --provider openai --model gpt-4.1-mini "pKa of acetic acid?"

SUPPORTED INPUT:
  - Chemical equations
  - Spectral data
  - Material properties
  - Reaction parameters
  - Research abstracts

SAFETY PROTOCOLS:
  1. Always verify AI suggestions
  2. Use proper PPE
  3. Double-check chemical compatibility
  4. Follow institutional safety guidelines

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY      Google Gemini API key (GEMINI_API_KEY also accepted)
  CHEMIST_MODEL       Override model ID
  CHEMIST_PROVIDER    Use an edgequake-llm provider (openai, anthropic, ollama, ...)
  CHEMIST_API_BASE    Override the Gemini API base URL
  PDFIUM_LIB_PATH     Path to libpdfium (PDF input only)

A .env file in the working directory is loaded automatically.
"#;

/// Answer chemistry questions from text, images, or PDFs with a generative model.
#[derive(Parser, Debug)]
#[command(
    name = "chemist",
    version,
    about = "AI Chemist: chemistry research assistant powered by generative models",
    long_about = "Answer chemistry research questions with a generative model. Input is free \
text, optionally with a structure/spectrum image or a PDF used as reference material. \
The answer is Markdown with structured explanations, safety notes and bold critical values.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Your question or problem description ("-" reads stdin).
    text: Option<String>,

    /// Input type: text, image, or pdf.
    #[arg(long, value_enum, default_value = "text")]
    input_type: InputTypeArg,

    /// Image or PDF to attach: local path or HTTP/HTTPS URL.
    #[arg(short, long)]
    file: Option<String>,

    /// Model creativity (0.0–1.0).
    #[arg(long, env = "CHEMIST_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Max response length in tokens (100–2000).
    #[arg(long, env = "CHEMIST_MAX_TOKENS", default_value_t = 500)]
    max_tokens: usize,

    /// Do not forward temperature / max tokens; use the backend's defaults.
    #[arg(long)]
    ignore_sampling: bool,

    /// Model ID (default: gemini-2.5-flash for the direct Gemini backend).
    #[arg(long, env = "CHEMIST_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "CHEMIST_PROVIDER")]
    provider: Option<String>,

    /// Google API key for the direct Gemini backend.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Path to a text file replacing the built-in chemistry instructions.
    #[arg(long)]
    instructions: Option<PathBuf>,

    /// Print the assembled prompt and exit without calling the model.
    #[arg(long)]
    show_prompt: bool,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output structured JSON (Solution) instead of Markdown.
    #[arg(long)]
    json: bool,

    /// Disable the busy spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,

    /// HTTP download timeout in seconds (URL attachments).
    #[arg(long, default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum InputTypeArg {
    Text,
    Image,
    Pdf,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the spinner is visible.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.show_prompt;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&cli, &e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    let sampling = SamplingParams::new(cli.temperature, cli.max_tokens)
        .context("Invalid sampling parameters")?;

    let mut config = build_config(cli, sampling).await?;
    let input = build_input(cli, config.download_timeout_secs).await?;

    // The spinner starts only once local inputs are in hand.
    if show_progress {
        config.progress_callback = Some(CliSpinner::new() as ProgressCallback);
    }

    // ── Prompt inspection ────────────────────────────────────────────────
    if cli.show_prompt {
        let request = prepare_request(
            input,
            config.template(),
            config.effective_sampling(config.sampling),
        )
        .await?;
        println!("{}", request.prompt);
        if request.modality == InputModality::Image {
            eprintln!("{}", dim("(+ 1 image attachment, sent as a separate part)"));
        }
        return Ok(());
    }

    // ── Solve ────────────────────────────────────────────────────────────
    let assistant = Assistant::new(config)?;
    let solution = assistant.solve(input).await?;

    if let Some(ref output_path) = cli.output {
        let out = if cli.json {
            serde_json::to_string_pretty(&solution).context("Failed to serialise output")?
        } else {
            solution.markdown.clone()
        };
        tokio::fs::write(output_path, out)
            .await
            .map_err(|e| ChemistError::OutputWriteFailed {
                path: output_path.clone(),
                source: e,
            })?;
        if !cli.quiet {
            eprintln!("{}  →  {}", green("✔"), bold(&output_path.display().to_string()));
        }
    } else if cli.json {
        let json = serde_json::to_string_pretty(&solution).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(solution.markdown.as_bytes())
            .context("Failed to write to stdout")?;
        if !solution.markdown.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        let stats = &solution.stats;
        eprintln!(
            "   {} / {}  ·  {} tokens in  /  {} tokens out  ·  {}ms",
            dim(&stats.backend),
            dim(&stats.model),
            dim(&stats.input_tokens.to_string()),
            dim(&stats.output_tokens.to_string()),
            stats.total_duration_ms,
        );
    }

    Ok(())
}

/// Map CLI args to `AssistantConfig`.
async fn build_config(cli: &Cli, sampling: SamplingParams) -> Result<AssistantConfig> {
    let mut builder = AssistantConfig::builder()
        .env_overrides(|key| std::env::var(key).ok())
        .sampling(sampling)
        .forward_sampling(!cli.ignore_sampling)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref path) = cli.instructions {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instructions from {:?}", path))?;
        builder = builder.instruction_template(template);
    }
    let config = builder.build().context("Invalid configuration")?;
    tracing::debug!("Configuration: {:?}", config);
    Ok(config)
}

/// Gather the user text and attachment into a `RawInput`.
async fn build_input(cli: &Cli, download_timeout_secs: u64) -> Result<RawInput> {
    let text = match cli.text.as_deref() {
        Some("-") => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read question from stdin")?;
            buf.trim_end().to_string()
        }
        Some(t) => t.to_string(),
        None => String::new(),
    };

    Ok(match cli.input_type {
        InputTypeArg::Text => {
            if cli.file.is_some() {
                tracing::warn!("--file is ignored for --input-type text");
            }
            RawInput::text(text)
        }
        InputTypeArg::Image => RawInput::image(text, attachment(cli, download_timeout_secs).await?),
        InputTypeArg::Pdf => {
            RawInput::document(text, attachment(cli, download_timeout_secs).await?)
        }
    })
}

async fn attachment(cli: &Cli, download_timeout_secs: u64) -> Result<Option<Vec<u8>>> {
    Ok(match cli.file.as_deref() {
        Some(source) => Some(read_attachment(source, download_timeout_secs).await?),
        None => None,
    })
}

/// Print a failure as one line (or a JSON object with `--json`).
fn report_error(cli: &Cli, e: &anyhow::Error) {
    let chemist = e.downcast_ref::<ChemistError>();

    if cli.json {
        let kind = match chemist {
            Some(ChemistError::Generation { kind, .. }) => Some(kind.to_string()),
            _ => None,
        };
        let body = serde_json::json!({
            "error": chemist.map(|c| c.to_string()).unwrap_or_else(|| format!("{e:#}")),
            "kind": kind,
        });
        println!("{body}");
        return;
    }

    match chemist {
        Some(c) => eprintln!("{} {}", red("⚠ Error:"), c),
        None => eprintln!("{} {:#}", red("⚠ Error:"), e),
    }
}
