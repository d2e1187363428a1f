//! Gaussian smoothing ahead of the gradient pass.
//!
//! Texture noise would otherwise register as edges. `imageproc` only
//! blurs single-channel images, so the RGBA working image is split into
//! planes, blurred and reassembled.

use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

use crate::types::RgbaImage;

/// Blur every channel of `image` (alpha included) with the same sigma.
///
/// Non-positive sigma returns a copy, since `imageproc` panics on
/// `sigma <= 0.0`.
#[must_use = "returns the blurred RGBA image"]
pub fn gaussian_blur_rgba(image: &RgbaImage, sigma: f32) -> RgbaImage {
    let (w, h) = image.dimensions();
    if sigma <= 0.0 || w == 0 || h == 0 {
        return image.clone();
    }

    let planes: [GrayImage; 4] = std::array::from_fn(|c| {
        let plane = GrayImage::from_fn(w, h, |x, y| Luma([image.get_pixel(x, y).0[c]]));
        gaussian_blur_f32(&plane, sigma)
    });

    let mut out = RgbaImage::new(w, h);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        pixel.0 = std::array::from_fn(|c| planes[c].get_pixel(x, y).0[0]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sigma_returns_identical_image() {
        let img = RgbaImage::from_fn(4, 4, |_, _| image::Rgba([100, 150, 200, 255]));
        assert_eq!(gaussian_blur_rgba(&img, 0.0), img);
        assert_eq!(gaussian_blur_rgba(&img, -1.0), img);
    }

    #[test]
    fn output_dimensions_preserved() {
        let img = RgbaImage::new(17, 31);
        assert_eq!(gaussian_blur_rgba(&img, 1.4).dimensions(), (17, 31));
    }

    #[test]
    fn empty_image_is_passed_through() {
        let img = RgbaImage::new(0, 0);
        assert_eq!(gaussian_blur_rgba(&img, 1.0).dimensions(), (0, 0));
    }

    #[test]
    fn blur_smooths_sharp_color_edge() {
        let img = RgbaImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        let blurred = gaussian_blur_rgba(&img, 2.0);
        let left = blurred.get_pixel(4, 5).0[0];
        let right = blurred.get_pixel(5, 5).0[0];
        assert!(left < 255, "expected red to fall near boundary, got {left}");
        assert!(right > 0, "expected red to rise near boundary, got {right}");
    }

    #[test]
    fn uniform_image_unchanged_by_blur() {
        let img = RgbaImage::from_fn(10, 10, |_, _| image::Rgba([100, 150, 200, 250]));
        let blurred = gaussian_blur_rgba(&img, 1.4);
        let expected: [u8; 4] = [100, 150, 200, 250];
        for pixel in blurred.pixels() {
            for (c, &exp) in expected.iter().enumerate() {
                let diff = i16::from(pixel.0[c]) - i16::from(exp);
                assert!(diff.abs() <= 1, "channel {c}: expected ~{exp}, got {}", pixel.0[c]);
            }
        }
    }
}
