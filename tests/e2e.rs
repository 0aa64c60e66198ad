//! End-to-end integration tests for ai-chemist.
//!
//! These tests bind a real pdfium library and make live Gemini API calls.
//! They are gated behind the `E2E_ENABLED` environment variable so they do
//! not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 GOOGLE_API_KEY=... PDFIUM_LIB_PATH=/path/to/libpdfium.so \
//!     cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_pdf_extraction -- --nocapture

use ai_chemist::pipeline::document::{extract_text, shared_pdfium};
use ai_chemist::prompts::REFERENCE_DOCUMENT_LABEL;
use ai_chemist::{
    prepare_request, Assistant, AssistantConfig, ChemistError, GenerationFailureKind,
    InputModality, RawInput, CHEM_PROMPT,
};
use pdfium_render::prelude::*;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

/// Skip unless E2E_ENABLED is set *and* a Google API key is available.
macro_rules! e2e_skip_unless_live {
    () => {{
        e2e_skip_unless_enabled!();
        match std::env::var("GOOGLE_API_KEY").or_else(|_| std::env::var("GEMINI_API_KEY")) {
            Ok(key) if !key.is_empty() => key,
            _ => {
                println!("SKIP — set GOOGLE_API_KEY to run live tests");
                return;
            }
        }
    }};
}

/// Build a PDF whose pages carry the given text; `""` leaves a page blank.
fn build_pdf(pages: &[&str]) -> Vec<u8> {
    let pdfium = shared_pdfium().expect("pdfium should bind (set PDFIUM_LIB_PATH)");
    let mut document = pdfium.create_new_pdf().expect("create pdf");
    let font = document.fonts_mut().helvetica();

    for text in pages {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .expect("create page");
        if !text.is_empty() {
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(72.0),
                    PdfPoints::new(720.0),
                    text,
                    font,
                    PdfPoints::new(14.0),
                )
                .expect("create text object");
        }
    }

    document.save_to_bytes().expect("save pdf")
}

fn live_assistant(api_key: String) -> Assistant {
    let config = AssistantConfig::builder()
        .env_overrides(|key| std::env::var(key).ok())
        .api_key(api_key)
        .build()
        .expect("valid config");
    Assistant::new(config).expect("gemini backend")
}

/// Assert the answer looks like a usable Markdown solution.
fn assert_solution_quality(md: &str, context: &str) {
    assert!(!md.trim().is_empty(), "[{context}] Solution is empty");
    assert!(
        md.len() >= 50,
        "[{context}] Solution suspiciously short: {} bytes",
        md.len()
    );
    println!("[{context}] ✓  {} bytes", md.len());
}

// ── PDF extraction (pdfium, no LLM) ─────────────────────────────────────────

#[tokio::test]
async fn test_pdf_extraction_skips_blank_pages() {
    e2e_skip_unless_enabled!();

    let bytes = build_pdf(&["Section 1", ""]);
    let text = extract_text(bytes).await.expect("extraction should succeed");

    assert!(text.contains("Section 1"), "got: {text:?}");
    println!("Extracted: {text:?}");
}

#[tokio::test]
async fn test_pdf_extraction_preserves_page_order() {
    e2e_skip_unless_enabled!();

    let bytes = build_pdf(&["Alpha", "", "Gamma"]);
    let text = extract_text(bytes).await.expect("extraction should succeed");

    let alpha = text.find("Alpha").expect("page 1 text");
    let gamma = text.find("Gamma").expect("page 3 text");
    assert!(alpha < gamma, "pages out of order: {text:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_extractions_share_one_binding() {
    e2e_skip_unless_enabled!();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let bytes = build_pdf(&[&format!("Compound {i}"), "", "Yield 92%"]);
            tokio::spawn(extract_text(bytes))
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let text = task.await.unwrap().expect("extraction should succeed");
        assert!(text.contains(&format!("Compound {i}")), "got: {text:?}");
        assert!(text.contains("Yield 92%"), "got: {text:?}");
    }
}

#[tokio::test]
async fn test_pdf_prompt_has_reference_section() {
    e2e_skip_unless_enabled!();

    let bytes = build_pdf(&["Section 1", ""]);
    let request = prepare_request(
        RawInput::document("Summarize", Some(bytes)),
        CHEM_PROMPT,
        None,
    )
    .await
    .expect("prepare should succeed");

    let prompt = request.prompt.as_str();
    let template_at = prompt.find(CHEM_PROMPT).expect("template");
    let user_at = prompt.find("User Input: Summarize").expect("user section");
    let doc_at = prompt.find(REFERENCE_DOCUMENT_LABEL).expect("document section");
    assert!(template_at < user_at && user_at < doc_at);
    assert!(prompt[doc_at..].contains("Section 1"));
    assert_eq!(request.modality, InputModality::Document);
}

// ── Live generation tests (need GOOGLE_API_KEY) ──────────────────────────────

#[tokio::test]
async fn test_live_text_question() {
    let key = e2e_skip_unless_live!();
    let assistant = live_assistant(key);

    let solution = assistant
        .solve(RawInput::text("Suggest a catalyst for ethylene hydrogenation"))
        .await
        .expect("solve should succeed");

    assert_solution_quality(&solution.markdown, "text");
    assert!(solution.stats.output_tokens > 0);
    println!(
        "--- BEGIN OUTPUT ---\n{}\n--- END OUTPUT ---",
        solution.markdown
    );
}

#[tokio::test]
async fn test_live_pdf_question() {
    let key = e2e_skip_unless_live!();
    let assistant = live_assistant(key);

    let bytes = build_pdf(&[
        "Hydrogenation of ethylene over Pd/C at 25 C and 1 atm H2 gives ethane.",
        "",
    ]);
    let solution = assistant
        .solve(RawInput::document("Summarize the reaction conditions", Some(bytes)))
        .await
        .expect("solve should succeed");

    assert_solution_quality(&solution.markdown, "pdf");
    assert!(solution.stats.document_chars.unwrap_or(0) > 0);
}

#[tokio::test]
async fn test_live_invalid_key_is_reported() {
    e2e_skip_unless_enabled!();
    let assistant = live_assistant("definitely-not-a-valid-key".to_string());

    let err = assistant
        .solve(RawInput::text("pKa of acetic acid?"))
        .await
        .expect_err("invalid key must fail");

    match err {
        ChemistError::Generation { kind, message } => {
            assert!(
                matches!(
                    kind,
                    GenerationFailureKind::Auth | GenerationFailureKind::Rejected
                ),
                "unexpected kind {kind}: {message}"
            );
            assert!(!message.is_empty());
        }
        other => panic!("unexpected: {other:?}"),
    }
}
