//! PNG serialization of the canvas.

use image::{ExtendedColorType, ImageEncoder, codecs::png::PngEncoder};
use tessera_pipeline::RgbaImage;

use crate::{Canvas, ExportError};

/// Encode the canvas's current frame as PNG bytes.
///
/// # Errors
///
/// Returns [`ExportError::SurfaceUnavailable`] for an unbound canvas and
/// [`ExportError::PngEncode`] if encoding fails.
pub fn encode_png(canvas: &Canvas) -> Result<Vec<u8>, ExportError> {
    encode_image(&canvas.to_rgba_image()?)
}

/// Encode any RGBA image as PNG bytes.
///
/// # Errors
///
/// Returns [`ExportError::PngEncode`] if encoding fails.
pub fn encode_image(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(buf)
}
