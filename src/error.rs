//! Error types for the ai-chemist library.
//!
//! Every pipeline stage returns `Result<_, ChemistError>`. Nothing is caught
//! or retried inside the library: the first failure travels up unchanged and
//! the presentation layer decides how to render it.
//!
//! The four request-level failures are:
//!
//! * [`ChemistError::MissingInput`] — the selected modality needs an attachment
//!   that was not supplied.
//! * [`ChemistError::DocumentParse`] — the PDF could not be opened.
//! * [`ChemistError::ImageDecode`] — the image buffer could not be decoded.
//! * [`ChemistError::Generation`] — anything that went wrong talking to the
//!   backend. The underlying message is kept verbatim; the attached
//!   [`GenerationFailureKind`] is informational only.

use crate::request::InputModality;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the ai-chemist library.
#[derive(Debug, Error)]
pub enum ChemistError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The modality needs an attachment, but none (or an empty one) was supplied.
    #[error("No {modality} was supplied.\nAttach a file or switch the input type.")]
    MissingInput { modality: InputModality },

    /// Attachment path does not exist.
    #[error("Attachment not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the attachment.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Decode errors ─────────────────────────────────────────────────────
    /// The PDF is corrupt, encrypted, or not a PDF at all.
    #[error("Could not read the PDF document: {detail}")]
    DocumentParse { detail: String },

    /// The image is corrupt or in an unsupported format.
    #[error("Could not decode the image: {detail}")]
    ImageDecode { detail: String },

    // ── Generation errors ─────────────────────────────────────────────────
    /// The backend call failed. `message` is the backend's own wording.
    #[error("Generation failed: {message}")]
    Generation {
        kind: GenerationFailureKind,
        message: String,
    },

    /// No backend could be built (missing API key, unknown provider name).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Another request from the same session is still being processed.
    #[error("A request is already in progress; wait for it to finish before submitting again.")]
    Busy,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or per-request parameter validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF text extraction needs the pdfium shared library.\n\
  • Install it system-wide (libpdfium.so / libpdfium.dylib / pdfium.dll), or\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChemistError {
    /// True for the four request-level failures a user can fix by changing
    /// their input or retrying.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            ChemistError::MissingInput { .. }
                | ChemistError::DocumentParse { .. }
                | ChemistError::ImageDecode { .. }
                | ChemistError::Generation { .. }
        )
    }
}

/// Finer classification of a [`ChemistError::Generation`].
///
/// Callers are not expected to branch on it; it exists for logs and for the
/// `--json` error output of the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationFailureKind {
    /// Connection, TLS, DNS or body-read failure.
    Transport,
    /// HTTP 401/403 or an invalid API key.
    Auth,
    /// HTTP 429 / quota exhausted.
    RateLimit,
    /// The backend answered but refused the request (4xx/5xx, safety block).
    Rejected,
    /// The backend answered successfully but returned no text.
    EmptyResponse,
}

impl fmt::Display for GenerationFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GenerationFailureKind::Transport => "transport",
            GenerationFailureKind::Auth => "auth",
            GenerationFailureKind::RateLimit => "rate_limit",
            GenerationFailureKind::Rejected => "rejected",
            GenerationFailureKind::EmptyResponse => "empty_response",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_names_modality() {
        let e = ChemistError::MissingInput {
            modality: InputModality::Image,
        };
        assert!(e.to_string().contains("No image was supplied"), "got: {e}");
    }

    #[test]
    fn generation_error_keeps_message_verbatim() {
        let e = ChemistError::Generation {
            kind: GenerationFailureKind::Transport,
            message: "connection reset by peer".into(),
        };
        assert!(e.to_string().ends_with("connection reset by peer"));
    }

    #[test]
    fn request_errors_are_classified() {
        assert!(ChemistError::DocumentParse {
            detail: "bad xref".into()
        }
        .is_request_error());
        assert!(ChemistError::ImageDecode {
            detail: "truncated".into()
        }
        .is_request_error());
        assert!(!ChemistError::Busy.is_request_error());
        assert!(!ChemistError::InvalidConfig("x".into()).is_request_error());
    }

    #[test]
    fn failure_kind_display() {
        assert_eq!(GenerationFailureKind::RateLimit.to_string(), "rate_limit");
        assert_eq!(GenerationFailureKind::Auth.to_string(), "auth");
    }
}
