//! PDF text extraction via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto the blocking pool so the
//! runtime threads stay free while a long document is read.
//!
//! ## One binding per process
//!
//! `Pdfium::new` initialises the C library and dropping it tears the library
//! down again, for every binding in the process. Extractions therefore share
//! one `&'static Pdfium` created on first use and never dropped.
//!
//! ## Partial success
//!
//! Scanned pages have no text layer and some pages fail to extract at all.
//! Neither aborts the document: such a page contributes an empty string and
//! the remaining pages are kept in order.

use crate::error::ChemistError;
use crate::request::InputModality;
use pdfium_render::prelude::*;
use std::fmt::Debug;
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info, warn};

static PDFIUM: OnceLock<Pdfium> = OnceLock::new();
static BIND_LOCK: Mutex<()> = Mutex::new(());

/// Magic bytes every PDF starts with.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Extract the plain text of every page, concatenated in page order.
///
/// # Errors
/// * [`ChemistError::MissingInput`] — `bytes` is empty
/// * [`ChemistError::DocumentParse`] — not a PDF, or pdfium cannot open it
/// * [`ChemistError::PdfiumBindingFailed`] — no pdfium library available
///
/// An empty result (no pages, or no page with text) is not an error.
pub async fn extract_text(bytes: Vec<u8>) -> Result<String, ChemistError> {
    check_pdf_bytes(&bytes)?;

    tokio::task::spawn_blocking(move || extract_text_blocking(&bytes))
        .await
        .map_err(|e| ChemistError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Cheap validation done before pdfium is involved.
pub fn check_pdf_bytes(bytes: &[u8]) -> Result<(), ChemistError> {
    if bytes.is_empty() {
        return Err(ChemistError::MissingInput {
            modality: InputModality::Document,
        });
    }
    if !bytes.starts_with(PDF_MAGIC) {
        let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
        return Err(ChemistError::DocumentParse {
            detail: format!("not a PDF file (first bytes: {:?})", magic),
        });
    }
    Ok(())
}

/// Blocking implementation of text extraction.
fn extract_text_blocking(bytes: &[u8]) -> Result<String, ChemistError> {
    let pdfium = shared_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ChemistError::DocumentParse {
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let text = collect_page_texts(pages.iter().map(|page| page.text().map(|t| t.all())));
    debug!("Extracted {} bytes of text", text.len());
    Ok(text)
}

/// The process-wide pdfium binding, created on first use.
///
/// A failed binding is not cached; the next call tries again.
pub fn shared_pdfium() -> Result<&'static Pdfium, ChemistError> {
    if let Some(pdfium) = PDFIUM.get() {
        return Ok(pdfium);
    }

    // Only one thread may bind: a losing binding would be dropped and
    // destroy the library under the winner.
    let _guard = BIND_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(pdfium) = PDFIUM.get() {
        return Ok(pdfium);
    }
    let pdfium = bind_pdfium()?;
    Ok(PDFIUM.get_or_init(|| pdfium))
}

/// Bind pdfium from `PDFIUM_LIB_PATH` when set, else from the system library.
fn bind_pdfium() -> Result<Pdfium, ChemistError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => {
            debug!("Binding pdfium from PDFIUM_LIB_PATH={}", path);
            Pdfium::bind_to_library(path)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ChemistError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Concatenate per-page extraction results in order.
///
/// A failed page is logged and contributes nothing.
pub fn collect_page_texts<I, E>(pages: I) -> String
where
    I: IntoIterator<Item = Result<String, E>>,
    E: Debug,
{
    let mut text = String::new();
    for (idx, page) in pages.into_iter().enumerate() {
        match page {
            Ok(page_text) => {
                if page_text.is_empty() {
                    debug!("Page {} has no extractable text", idx + 1);
                }
                text.push_str(&page_text);
            }
            Err(e) => warn!("Page {}: text extraction failed: {:?}", idx + 1, e),
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pages_contribute_nothing() {
        let pages: Vec<Result<String, &str>> = vec![
            Ok("Abstract: catalysis".to_string()),
            Ok(String::new()),
            Ok(" Results".to_string()),
        ];
        assert_eq!(collect_page_texts(pages), "Abstract: catalysis Results");
    }

    #[test]
    fn failed_pages_do_not_abort() {
        let pages: Vec<Result<String, &str>> = vec![
            Err("no text layer"),
            Ok("page two".to_string()),
            Err("broken stream"),
            Ok("page four".to_string()),
        ];
        assert_eq!(collect_page_texts(pages), "page twopage four");
    }

    #[test]
    fn zero_pages_is_empty_not_error() {
        let pages: Vec<Result<String, &str>> = vec![];
        assert_eq!(collect_page_texts(pages), "");
    }

    #[test]
    fn empty_bytes_are_missing_input() {
        let err = check_pdf_bytes(&[]).unwrap_err();
        assert!(matches!(
            err,
            ChemistError::MissingInput {
                modality: InputModality::Document
            }
        ));
    }

    #[test]
    fn non_pdf_bytes_fail_to_parse() {
        let err = check_pdf_bytes(b"PK\x03\x04 zip archive").unwrap_err();
        match err {
            ChemistError::DocumentParse { detail } => assert!(detail.contains("not a PDF")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn extract_rejects_garbage_before_binding_pdfium() {
        let err = extract_text(b"hello world".to_vec()).await.unwrap_err();
        assert!(matches!(err, ChemistError::DocumentParse { .. }));
    }

    #[test]
    fn pdfium_is_bound_once_per_process() {
        let Ok(first) = shared_pdfium() else {
            println!("SKIP — no pdfium library available");
            return;
        };
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| shared_pdfium().map(|p| p as *const Pdfium as usize)))
            .collect();
        for handle in handles {
            let addr = handle.join().unwrap().unwrap();
            assert_eq!(addr, first as *const Pdfium as usize);
        }
    }

    #[test]
    fn pdf_header_passes_cheap_check() {
        assert!(check_pdf_bytes(b"%PDF-1.7\n...").is_ok());
    }
}
