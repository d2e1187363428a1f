//! Fit the decoded image onto the output surface.
//!
//! The drawable surface never exceeds the configured maximum side
//! (800 px by default). The image is scaled by the largest factor that
//! keeps both sides within the bound, preserving aspect ratio, and the
//! resulting dimensions are floored to whole pixels. Every later stage
//! works in this surface space.
//!
//! If the image already fits, it is returned unchanged.

use image::imageops::FilterType;

use crate::types::{Dimensions, RgbaImage};

/// Surface dimensions for an image of `width × height` bounded by
/// `max_dimension` on both sides.
///
/// Dimensions are floored but never drop below one pixel unless the
/// source side is already zero.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops
)]
pub fn surface_dimensions(width: u32, height: u32, max_dimension: u32) -> Dimensions {
    if width == 0 || height == 0 {
        return Dimensions { width, height };
    }
    let max = f64::from(max_dimension);
    let scale = (max / f64::from(width))
        .min(max / f64::from(height))
        .min(1.0);
    let floor = |side: u32| ((f64::from(side) * scale).floor() as u32).max(1);
    Dimensions {
        width: floor(width),
        height: floor(height),
    }
}

/// Scale `image` onto the bounded surface.
///
/// Returns the (possibly unchanged) image and whether resampling was
/// actually applied.
#[must_use]
pub fn fit_to_surface(image: &RgbaImage, max_dimension: u32) -> (RgbaImage, bool) {
    let target = surface_dimensions(image.width(), image.height(), max_dimension);
    if target.width == image.width() && target.height == image.height() {
        return (image.clone(), false);
    }
    let resized = image::imageops::resize(image, target.width, target.height, FilterType::Triangle);
    (resized, true)
}
