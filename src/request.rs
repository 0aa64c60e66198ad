//! Request-scoped data model: what the user supplied, and what is sent on.
//!
//! Modality and payload travel together in one tagged union ([`RawInput`]),
//! so a "document" request can never carry image bytes and vice versa. The
//! same holds one step later for [`GenerationRequest`], whose
//! [`RequestAttachment`] carries at most one of image / document text.

use crate::config::SamplingParams;
use crate::pipeline::image::LoadedImage;
use crate::prompts::Prompt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of input supplied for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputModality {
    /// Free text only.
    Text,
    /// Free text plus one PNG/JPEG image.
    Image,
    /// Free text plus one PDF whose text is used as reference material.
    Document,
}

impl fmt::Display for InputModality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputModality::Text => f.write_str("text"),
            InputModality::Image => f.write_str("image"),
            InputModality::Document => f.write_str("document"),
        }
    }
}

/// Raw user input as handed over by the presentation layer.
///
/// `bytes: None` means the modality was selected but nothing was attached.
/// That is a valid value here and is rejected later with
/// [`crate::ChemistError::MissingInput`], before any backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    Text {
        text: String,
    },
    Image {
        text: String,
        bytes: Option<Vec<u8>>,
    },
    Document {
        text: String,
        bytes: Option<Vec<u8>>,
    },
}

impl RawInput {
    pub fn text(text: impl Into<String>) -> Self {
        RawInput::Text { text: text.into() }
    }

    pub fn image(text: impl Into<String>, bytes: Option<Vec<u8>>) -> Self {
        RawInput::Image {
            text: text.into(),
            bytes,
        }
    }

    pub fn document(text: impl Into<String>, bytes: Option<Vec<u8>>) -> Self {
        RawInput::Document {
            text: text.into(),
            bytes,
        }
    }

    pub fn modality(&self) -> InputModality {
        match self {
            RawInput::Text { .. } => InputModality::Text,
            RawInput::Image { .. } => InputModality::Image,
            RawInput::Document { .. } => InputModality::Document,
        }
    }

    /// The free-text part of the input (possibly empty).
    pub fn user_text(&self) -> &str {
        match self {
            RawInput::Text { text }
            | RawInput::Image { text, .. }
            | RawInput::Document { text, .. } => text,
        }
    }
}

/// Content derived from the raw attachment.
#[derive(Debug, Clone)]
pub enum ExtractedContent {
    Nothing,
    Image(LoadedImage),
    /// Plain text of the PDF; may be empty when no page yields text.
    DocumentText(String),
}

/// What travels next to the prompt in a [`GenerationRequest`].
#[derive(Debug, Clone)]
pub enum RequestAttachment {
    None,
    /// Sent as a separate multimodal part, never embedded in the prompt.
    Image(LoadedImage),
    /// Already merged into the prompt; kept for logging and stats.
    DocumentText(String),
}

/// One fully prepared request for the generation backend.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub modality: InputModality,
    pub prompt: Prompt,
    pub attachment: RequestAttachment,
    /// Sampling parameters to forward; `None` leaves the backend defaults.
    pub sampling: Option<SamplingParams>,
}

impl GenerationRequest {
    /// Length in bytes of the extracted document text, if any.
    pub fn document_chars(&self) -> Option<usize> {
        match &self.attachment {
            RequestAttachment::DocumentText(text) => Some(text.len()),
            _ => None,
        }
    }
}
