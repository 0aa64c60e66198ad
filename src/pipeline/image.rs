//! Image loading: raw upload bytes → decoded [`LoadedImage`].
//!
//! Decoding up front catches corrupt or unsupported uploads locally, before
//! any network call, and gives the encoder a normalised pixel buffer to
//! work from.

use crate::error::ChemistError;
use crate::request::InputModality;
use image::{DynamicImage, ImageFormat};
use tracing::debug;

/// Formats accepted for the image modality.
pub const SUPPORTED_FORMATS: [ImageFormat; 2] = [ImageFormat::Png, ImageFormat::Jpeg];

/// A decoded image ready to be handed to the generation client.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    image: DynamicImage,
    format: ImageFormat,
}

impl LoadedImage {
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Format the upload was encoded in.
    pub fn source_format(&self) -> ImageFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Decode an uploaded image.
///
/// # Errors
/// * [`ChemistError::MissingInput`] — `bytes` is empty
/// * [`ChemistError::ImageDecode`] — unknown, unsupported, or corrupt data
pub fn load_image(bytes: &[u8]) -> Result<LoadedImage, ChemistError> {
    if bytes.is_empty() {
        return Err(ChemistError::MissingInput {
            modality: InputModality::Image,
        });
    }

    let format = image::guess_format(bytes).map_err(|e| ChemistError::ImageDecode {
        detail: format!("unrecognised image data: {e}"),
    })?;

    if !SUPPORTED_FORMATS.contains(&format) {
        return Err(ChemistError::ImageDecode {
            detail: format!("{format:?} images are not supported; use PNG or JPEG"),
        });
    }

    let image = image::load_from_memory_with_format(bytes, format).map_err(|e| {
        ChemistError::ImageDecode {
            detail: e.to_string(),
        }
    })?;

    debug!(
        "Decoded {:?} image: {}x{} px",
        format,
        image.width(),
        image.height()
    );

    Ok(LoadedImage { image, format })
}

#[cfg(test)]
pub(crate) fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 128, 255, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png fixture");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_png() {
        let loaded = load_image(&png_fixture(4, 3)).expect("png should decode");
        assert_eq!(loaded.source_format(), ImageFormat::Png);
        assert_eq!((loaded.width(), loaded.height()), (4, 3));
    }

    #[test]
    fn empty_bytes_are_missing_input() {
        let err = load_image(&[]).unwrap_err();
        assert!(matches!(
            err,
            ChemistError::MissingInput {
                modality: InputModality::Image
            }
        ));
    }

    #[test]
    fn garbage_fails_to_decode() {
        let err = load_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ChemistError::ImageDecode { .. }));
    }

    #[test]
    fn truncated_png_fails_to_decode() {
        let mut bytes = png_fixture(16, 16);
        bytes.truncate(bytes.len() / 2);
        let err = load_image(&bytes).unwrap_err();
        assert!(matches!(err, ChemistError::ImageDecode { .. }));
    }

    #[test]
    fn unsupported_format_is_rejected() {
        // GIF header: recognised by guess_format, not accepted here.
        let err = load_image(b"GIF89a\x01\x00\x01\x00\x00\x00\x00;").unwrap_err();
        match err {
            ChemistError::ImageDecode { detail } => assert!(detail.contains("not supported")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
