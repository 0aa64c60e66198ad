//! Image encoding: [`LoadedImage`] → base64 PNG wrapped in `ImageData`.
//!
//! Multimodal APIs (Gemini, OpenAI, Anthropic) accept images as base64 data
//! embedded in the JSON request body. Every upload is re-encoded as PNG so
//! the backend always sees one lossless format, whatever was uploaded.

use crate::error::ChemistError;
use crate::pipeline::image::LoadedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::io::Cursor;
use tracing::debug;

/// Encode a decoded upload as a base64 PNG ready for the backend.
///
/// `detail: "high"` asks OpenAI-style backends to use the full tile budget;
/// structural formulae and spectra lose fine detail at low resolution.
pub fn encode_image(loaded: &LoadedImage) -> Result<ImageData, ChemistError> {
    let mut buf = Vec::new();
    loaded
        .image()
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ChemistError::ImageDecode {
            detail: format!("PNG re-encoding failed: {e}"),
        })?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::image::{load_image, png_fixture};

    #[test]
    fn encode_small_image() {
        let loaded = load_image(&png_fixture(10, 10)).unwrap();
        let data = encode_image(&loaded).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        assert!(!data.data.is_empty());
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert!(decoded.starts_with(b"\x89PNG"));
    }
}
