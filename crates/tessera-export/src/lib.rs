//! tessera-export: output backends for tessera mosaics.
//!
//! [`Canvas`] is a `tiny-skia` raster surface the animation paints onto.
//! [`png::encode_png`] serializes its current frame and [`svg::to_svg`]
//! writes the finished mosaic as vector paths. Nothing here touches the
//! filesystem.

pub mod canvas;
pub mod png;
pub mod svg;

pub use canvas::Canvas;
pub use png::encode_png;
pub use svg::{SvgMetadata, to_svg};

/// Errors from exporting a canvas.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The canvas has not been bound to an image yet.
    #[error("canvas has not been bound to an image")]
    SurfaceUnavailable,

    /// PNG encoding failed.
    #[error("failed to encode PNG: {0}")]
    PngEncode(#[from] image::ImageError),
}
