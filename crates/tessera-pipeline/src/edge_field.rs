//! Gradient-magnitude field from pixel data.
//!
//! Each pixel is reduced to luma (`0.299 R + 0.587 G + 0.114 B`) and the
//! 3×3 Sobel kernels are applied to every interior pixel. The field
//! stores `sqrt(gx² + gy²)`. Border rows and columns stay zero: they are
//! never sampling candidates.

use image::Luma;
use imageproc::definitions::Image;
use imageproc::filter::filter;
use imageproc::kernel::Kernel;
use serde::{Deserialize, Serialize};

use crate::types::{GrayImage, RgbaImage};

const SOBEL_X: Kernel<'static, f32> =
    Kernel::new(&[-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0], 3, 3);
const SOBEL_Y: Kernel<'static, f32> =
    Kernel::new(&[-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0], 3, 3);

/// Dense, immutable gradient-magnitude field with one value per pixel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeField {
    width: u32,
    height: u32,
    magnitudes: Vec<f32>,
}

/// Location and value of the strongest gradient inside a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalMax {
    /// Column of the maximum.
    pub x: u32,
    /// Row of the maximum.
    pub y: u32,
    /// Gradient magnitude at the maximum.
    pub magnitude: f32,
}

impl EdgeField {
    /// Build the field from an RGBA buffer.
    ///
    /// Pass the smoothed image to suppress texture noise; the field
    /// always has the same dimensions as `image`.
    #[must_use]
    pub fn build(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        if width < 3 || height < 3 {
            return Self {
                width,
                height,
                magnitudes: vec![0.0; width as usize * height as usize],
            };
        }

        let plane: Image<Luma<f32>> =
            Image::from_fn(width, height, |x, y| Luma([luma(image.get_pixel(x, y).0)]));
        let gx: Image<Luma<f32>> = filter(&plane, SOBEL_X, |v| v);
        let gy: Image<Luma<f32>> = filter(&plane, SOBEL_Y, |v| v);

        // The filter clamps at the edges; the border carries no gradient.
        let magnitudes = gx
            .enumerate_pixels()
            .zip(gy.pixels())
            .map(|((x, y, h), v)| {
                if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                    0.0
                } else {
                    h.0[0].hypot(v.0[0])
                }
            })
            .collect();

        Self {
            width,
            height,
            magnitudes,
        }
    }

    /// Field width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Field height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Magnitude at `(x, y)`, or `0.0` outside the field.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.magnitudes[y as usize * self.width as usize + x as usize]
    }

    /// Largest magnitude in the whole field.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.magnitudes.iter().copied().fold(0.0, f32::max)
    }

    /// Strongest gradient in the `width × height` region at `(x, y)`,
    /// clipped to the field.
    ///
    /// Ties keep the first pixel in row-major order. Returns `None` when
    /// the clipped region is empty.
    #[must_use]
    pub fn max_in(&self, x: u32, y: u32, width: u32, height: u32) -> Option<LocalMax> {
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        let mut best: Option<LocalMax> = None;
        for py in y..y_end {
            for px in x..x_end {
                let magnitude = self.get(px, py);
                if best.is_none_or(|b| magnitude > b.magnitude) {
                    best = Some(LocalMax {
                        x: px,
                        y: py,
                        magnitude,
                    });
                }
            }
        }
        best
    }

    /// Render the field as a grayscale image for visualization.
    ///
    /// Magnitudes map directly onto 0–255 unless the field's maximum
    /// exceeds 255, in which case the field is scaled down to fit.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_gray_image(&self) -> GrayImage {
        let scale = 255.0 / self.max().max(255.0);
        GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([(self.get(x, y) * scale).round().clamp(0.0, 255.0) as u8])
        })
    }

    /// Number of pixels whose magnitude exceeds `threshold`.
    #[must_use]
    pub fn count_above(&self, threshold: f32) -> usize {
        self.magnitudes.iter().filter(|&&m| m > threshold).count()
    }
}

/// Luma of an RGBA pixel (alpha ignored).
#[must_use]
pub fn luma(rgba: [u8; 4]) -> f32 {
    0.114_f32.mul_add(
        f32::from(rgba[2]),
        0.299_f32.mul_add(f32::from(rgba[0]), 0.587 * f32::from(rgba[1])),
    )
}
