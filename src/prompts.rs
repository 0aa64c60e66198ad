//! Instruction template and prompt assembly.
//!
//! Every request starts with the same domain directive ([`CHEM_PROMPT`]),
//! followed by the user's text. PDF requests additionally carry the
//! extracted document text in a labelled section at the end. Images are never
//! embedded in the prompt; they travel as a separate multimodal part.
//!
//! Callers can override the template via
//! [`crate::config::AssistantConfig::instruction_template`]; the constant here
//! is used only when no override is provided.

use crate::request::InputModality;
use std::fmt;

/// Default instruction template prepended to every prompt.
pub const CHEM_PROMPT: &str = r#"You are an expert AI Chemist assistant. Analyze the input and provide detailed chemical solutions considering:

For Experimental Design:
1. Suggest optimal reaction conditions (temperature, pressure, catalysts)
2. Recommend safety precautions
3. Provide alternative synthesis routes

For Material Analysis:
1. Identify key chemical properties
2. Suggest characterization techniques
3. Predict material behavior under different conditions

For Drug Discovery:
1. Analyze target interactions
2. Suggest potential analogs
3. Predict ADMET properties

Format output with clear sections using Markdown. Highlight critical values in **bold**."#;

/// Label introducing the user's own text.
pub const USER_INPUT_LABEL: &str = "User Input:";

/// Label introducing the extracted PDF text.
pub const REFERENCE_DOCUMENT_LABEL: &str = "Reference Document Content:";

/// The final textual instruction sent to the backend. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Prompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Build the prompt for one request.
///
/// Layout:
///
/// ```text
/// {template}
///
/// User Input: {user_text}
///
/// Reference Document Content:      <- Document modality, non-empty text only
/// {document_text}
/// ```
///
/// Pure and infallible: an empty `user_text` still yields a valid prompt, and
/// `document_text` is ignored for every modality except
/// [`InputModality::Document`].
pub fn assemble_prompt(
    template: &str,
    user_text: &str,
    modality: InputModality,
    document_text: Option<&str>,
) -> Prompt {
    let mut prompt = format!("{template}\n\n{USER_INPUT_LABEL} {user_text}");

    match (modality, document_text) {
        (InputModality::Document, Some(doc)) if !doc.is_empty() => {
            prompt.push_str("\n\n");
            prompt.push_str(REFERENCE_DOCUMENT_LABEL);
            prompt.push('\n');
            prompt.push_str(doc);
        }
        _ => {}
    }

    Prompt(prompt)
}
