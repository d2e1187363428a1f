//! Shared types for the tessera image-to-mesh pipeline.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::mesh::RefineParams;
use crate::sampler::SamplerParams;

/// Re-export `RgbaImage` so downstream crates can reference the
/// working image without depending on `image` directly.
pub use image::RgbaImage;

/// Re-export `GrayImage` for the edge-field visualization.
pub use image::GrayImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Linear interpolation towards `other` (`t = 0` is `self`).
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            (other.x - self.x).mul_add(t, self.x),
            (other.y - self.y).mul_add(t, self.y),
        )
    }

    /// Midpoint of the segment to `other`.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        self.lerp(other, 0.5)
    }

    /// Identity key with one decimal of precision.
    ///
    /// Two points with the same key are treated as the same point.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn key(self) -> PointKey {
        PointKey((self.x * 10.0).round() as i64, (self.y * 10.0).round() as i64)
    }
}

/// Rounded-coordinate identity of a [`Point`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointKey(pub i64, pub i64);

/// Insertion-ordered set of points, deduplicated by [`Point::key`].
#[derive(Debug, Clone, Default)]
pub struct PointSet {
    points: Vec<Point>,
    keys: HashSet<PointKey>,
}

impl PointSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a point. Returns `false` if a point with the same key is
    /// already present (the new point is discarded).
    pub fn insert(&mut self, point: Point) -> bool {
        if self.keys.insert(point.key()) {
            self.points.push(point);
            true
        } else {
            false
        }
    }

    /// Whether a point with the same key is present.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        self.keys.contains(&point.key())
    }

    /// Number of unique points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The points in insertion order.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

impl FromIterator<Point> for PointSet {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        let mut set = Self::new();
        for p in iter {
            set.insert(p);
        }
        set
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Area in square pixels.
    #[must_use]
    pub fn area(self) -> f64 {
        f64::from(self.width) * f64::from(self.height)
    }

    /// Returns `true` if either side is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// An 8-bit-per-channel RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    /// Opaque black.
    pub const BLACK: Self = Self([0, 0, 0]);
    /// Opaque white.
    pub const WHITE: Self = Self([255, 255, 255]);

    /// `#rrggbb` hex notation.
    #[must_use]
    pub fn to_hex(self) -> String {
        let [r, g, b] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// Configuration for the image-to-mesh pipeline.
///
/// All parameters have defaults matching the reference visual output.
/// The tuning constants of the sampler and refinement loops are kept as
/// named fields so callers can override them without forking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Detail level on a 0–100 scale. Normalized to `[0, 1]` internally.
    pub quality: f64,

    /// Neither side of the working image exceeds this many pixels.
    pub max_dimension: u32,

    /// Gaussian sigma applied before the gradient pass. Non-positive
    /// values skip smoothing.
    pub blur_sigma: f32,

    /// Seed for point jitter and sparse fill. `None` derives one from the
    /// working image content and quality.
    pub seed: Option<u64>,

    /// Feature point sampler constants.
    pub sampler: SamplerParams,

    /// Mesh refinement constants.
    pub refine: RefineParams,
}

impl PipelineConfig {
    /// Default quality (0–100 scale).
    pub const DEFAULT_QUALITY: f64 = 50.0;

    /// Default maximum side of the working image.
    pub const DEFAULT_MAX_DIMENSION: u32 = 800;

    /// Default pre-gradient blur sigma.
    pub const DEFAULT_BLUR_SIGMA: f32 = 1.0;

    /// Quality normalized and clamped to `[0, 1]`.
    #[must_use]
    pub fn normalized_quality(&self) -> f64 {
        (self.quality / 100.0).clamp(0.0, 1.0)
    }

    /// Check the configuration for values the pipeline cannot honor.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] when `quality` is not
    /// finite, `max_dimension` is zero, or a refinement constant is not
    /// positive.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.quality.is_finite() {
            return Err(PipelineError::InvalidConfig(format!(
                "quality must be finite, got {}",
                self.quality
            )));
        }
        if self.max_dimension == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_dimension must be at least 1".to_string(),
            ));
        }
        if self.refine.sliver_ratio <= 0.0 || self.refine.oversized_fraction <= 0.0 {
            return Err(PipelineError::InvalidConfig(
                "refinement thresholds must be positive".to_string(),
            ));
        }
        if self.sampler.min_cell_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "min_cell_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality: Self::DEFAULT_QUALITY,
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
            seed: None,
            sampler: SamplerParams::default(),
            refine: RefineParams::default(),
        }
    }
}

/// A mesh triangle with its representative color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColoredTriangle {
    /// The triangle's corners.
    pub vertices: [Point; 3],
    /// Median color of the interior samples.
    pub color: Rgb,
    /// Centroid rounded to integer pixel coordinates.
    pub centroid: (i64, i64),
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The point set cannot be triangulated.
    #[error("cannot triangulate {points} points: {reason}")]
    Geometry {
        /// Number of unique points handed to the triangulator.
        points: usize,
        /// What made the set degenerate.
        reason: GeometryFault,
    },
}

/// Why a point set was rejected by the triangulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryFault {
    /// Fewer than three unique points.
    TooFewPoints,
    /// Every point lies on one line.
    Collinear,
    /// A coordinate is not finite or is out of the triangulator's range.
    InvalidCoordinate,
}

impl std::fmt::Display for GeometryFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewPoints => f.write_str("fewer than three unique points"),
            Self::Collinear => f.write_str("all points are collinear"),
            Self::InvalidCoordinate => f.write_str("a coordinate is out of range"),
        }
    }
}
