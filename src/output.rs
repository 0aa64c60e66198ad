//! Result types returned by [`crate::Assistant`].

use crate::config::SamplingParams;
use crate::request::InputModality;
use serde::{Deserialize, Serialize};

/// A successful answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Markdown exactly as returned by the backend.
    pub markdown: String,
    pub modality: InputModality,
    pub stats: SolveStats,
}

/// Statistics about one request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SolveStats {
    /// Backend name (e.g. "gemini", "openai").
    pub backend: String,
    pub model: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Byte length of the assembled prompt.
    pub prompt_chars: usize,
    /// Byte length of the extracted PDF text (document requests only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_chars: Option<usize>,
    /// Sampling forwarded to the backend; `None` when backend defaults applied.
    pub sampling: Option<SamplingParams>,
    /// Time spent decoding the image or extracting PDF text.
    pub extract_duration_ms: u64,
    /// Time spent waiting for the backend.
    pub generation_duration_ms: u64,
    /// Wall-clock time for the whole request.
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solution_serialises_for_cli_json() {
        let solution = Solution {
            markdown: "## Answer\n**pH = 7**".into(),
            modality: InputModality::Document,
            stats: SolveStats {
                backend: "gemini".into(),
                model: "gemini-2.5-flash".into(),
                input_tokens: 120,
                output_tokens: 40,
                prompt_chars: 900,
                document_chars: Some(300),
                sampling: Some(SamplingParams::default()),
                ..Default::default()
            },
        };

        let json = serde_json::to_value(&solution).unwrap();
        assert_eq!(json["modality"], "document");
        assert_eq!(json["stats"]["document_chars"], 300);
        assert_eq!(json["stats"]["sampling"]["max_output_tokens"], 500);

        let back: Solution = serde_json::from_value(json).unwrap();
        assert_eq!(back, solution);
    }

    #[test]
    fn document_chars_omitted_for_text_requests() {
        let stats = SolveStats::default();
        let json = serde_json::to_value(&stats).unwrap();
        assert!(json.get("document_chars").is_none());
        assert!(json["sampling"].is_null());
    }
}
