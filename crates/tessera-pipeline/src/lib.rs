//! tessera-pipeline: Pure image-to-mesh pipeline (sans-IO).
//!
//! Converts a raster image into a colored low-polygon mesh through:
//! decode -> fit to surface -> blur -> edge field -> feature point
//! sampling -> Delaunay triangulation -> refinement -> color sampling.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory byte
//! slices and returns structured data. Rendering and file output live in
//! `tessera-export`, and the animation in `tessera-animate`.

pub mod blur;
pub mod color;
pub mod decode;
pub mod diagnostics;
pub mod downsample;
pub mod edge_field;
pub mod mesh;
pub mod pipeline;
pub mod sampler;
pub mod types;

pub use edge_field::EdgeField;
pub use mesh::{Mesh, RefineParams, RefinementPass};
pub use pipeline::{Pipeline, StagedResult};
pub use sampler::{FeaturePoint, FeaturePoints, PointKind, SamplerParams};
pub use types::{
    ColoredTriangle, Dimensions, GeometryFault, GrayImage, PipelineConfig, PipelineError, Point,
    PointKey, PointSet, Rgb, RgbaImage,
};

/// Run the full pipeline in one call.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration and
/// returns every intermediate the animation needs. Use [`Pipeline`] to
/// advance one stage at a time instead.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for an invalid config,
/// [`PipelineError::EmptyInput`] if `image_bytes` is empty,
/// [`PipelineError::ImageDecode`] if the image format is unrecognized,
/// and [`PipelineError::Geometry`] if the sampled points cannot be
/// triangulated.
pub fn process(image_bytes: &[u8], config: &PipelineConfig) -> Result<StagedResult, PipelineError> {
    use pipeline::PipelineStage;

    Pipeline::new(image_bytes.to_vec(), config.clone()).complete()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    /// Four quadrants, alternating dark and light.
    fn quadrant_png(side: u32) -> Vec<u8> {
        let half = side / 2;
        encode_png(&RgbaImage::from_fn(side, side, |x, y| {
            if (x < half) == (y < half) {
                image::Rgba([30, 30, 30, 255])
            } else {
                image::Rgba([220, 220, 220, 255])
            }
        }))
    }

    /// Smooth gradient with a bright disc, for broad coverage.
    fn scene_png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbaImage::from_fn(width, height, |x, y| {
            let dx = f64::from(x) - f64::from(width) / 3.0;
            let dy = f64::from(y) - f64::from(height) / 2.0;
            if dx.hypot(dy) < f64::from(height) / 4.0 {
                image::Rgba([250, 210, 40, 255])
            } else {
                let r = u8::try_from(x * 255 / width).unwrap();
                let b = u8::try_from(y * 255 / height).unwrap();
                image::Rgba([r, 60, b, 255])
            }
        }))
    }

    fn config(quality: f64, seed: u64) -> PipelineConfig {
        PipelineConfig {
            quality,
            seed: Some(seed),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn process_empty_input() {
        let result = process(&[], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let result = process(&[0xFF, 0x00], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn uniform_image_gives_uniform_mosaic() {
        let png = encode_png(&RgbaImage::from_pixel(
            100,
            100,
            image::Rgba([70, 130, 180, 255]),
        ));
        let staged = process(&png, &config(50.0, 1)).unwrap();

        assert!(staged.edge_field.max() < 1e-3);
        assert_eq!(staged.features.count(PointKind::Salient), 0);
        assert_eq!(staged.features.count(PointKind::Edge), 0);
        assert_eq!(staged.features.count(PointKind::Corner), 4);
        assert!(staged.features.count(PointKind::Border) > 0);
        assert_eq!(staged.features.count(PointKind::Fill), 0);
        assert!(
            staged
                .triangles
                .iter()
                .all(|t| t.color == Rgb([70, 130, 180]))
        );
    }

    #[test]
    fn zero_quality_gives_two_triangles() {
        let png = scene_png(100, 100);
        let triangulated = Pipeline::new(png, config(0.0, 1))
            .decode()
            .unwrap()
            .fit()
            .build_edges()
            .sample()
            .triangulate()
            .unwrap();
        assert_eq!(triangulated.mesh().points().len(), 4);
        assert_eq!(triangulated.mesh().len(), 2);
    }

    #[test]
    fn checkerboard_at_full_quality_finds_the_boundary() {
        let staged = process(&quadrant_png(100), &config(100.0, 1)).unwrap();
        let near_boundary = staged
            .features
            .iter()
            .filter(|f| f.kind == PointKind::Salient)
            .any(|f| (f.point.x - 50.0).abs() <= 2.0 || (f.point.y - 50.0).abs() <= 2.0);
        assert!(near_boundary);
    }

    #[test]
    fn points_stay_inside_the_surface_and_are_unique() {
        let staged = process(&scene_png(160, 90), &config(80.0, 9)).unwrap();
        let (w, h) = (160.0, 90.0);
        let mut keys = std::collections::HashSet::new();
        for p in staged.mesh.points() {
            assert!((0.0..=w).contains(&p.x) && (0.0..=h).contains(&p.y), "{p:?}");
            assert!(keys.insert(p.key()), "duplicate {p:?}");
        }
        assert!(staged.mesh.points().len() >= 4);
    }

    #[test]
    fn triangles_reference_valid_indices() {
        let staged = process(&scene_png(120, 120), &config(70.0, 2)).unwrap();
        let n = staged.mesh.points().len();
        for t in staged.mesh.triangles() {
            assert!(t.iter().all(|&i| i < n));
            let area = mesh::TriangleMetrics::of(staged.mesh.corners(*t)).area;
            assert!(area >= 0.0);
        }
    }

    #[test]
    fn colors_are_one_of_the_five_samples() {
        let png = scene_png(120, 80);
        let staged = process(&png, &config(60.0, 4)).unwrap();
        for t in &staged.triangles {
            let samples = color::sample_points(t.vertices)
                .map(|p| color::pixel_at(&staged.working, p));
            for channel in 0..3 {
                assert!(samples.iter().any(|s| s.0[channel] == t.color.0[channel]));
            }
        }
    }

    #[test]
    fn refinement_runs_bounded_passes() {
        let png = scene_png(200, 150);
        let cfg = PipelineConfig {
            refine: RefineParams {
                passes: 3,
                ..RefineParams::default()
            },
            ..config(30.0, 5)
        };
        let staged = process(&png, &cfg).unwrap();
        assert!(!staged.refinement.is_empty());
        assert!(staged.refinement.len() <= 3);
        // Only the last pass may insert nothing.
        let (last, earlier) = staged.refinement.split_last().unwrap();
        assert!(earlier.iter().all(|p| p.inserted > 0));
        if staged.refinement.len() < 3 {
            assert_eq!(last.inserted, 0);
        }
        assert_eq!(staged.triangles.len(), staged.mesh.len());
    }

    #[test]
    fn refinement_never_grows_the_largest_defect() {
        let png = scene_png(200, 150);
        for quality in [10.0, 50.0] {
            let staged = process(&png, &config(quality, 3)).unwrap();
            let areas: Vec<f64> = staged
                .refinement
                .iter()
                .map(|p| p.largest_flagged_area)
                .collect();
            assert!(areas[0] > 0.0, "quality {quality}: nothing flagged");
            for pair in areas.windows(2) {
                assert!(
                    pair[1] <= pair[0] + 1e-9,
                    "quality {quality}: largest flagged area grew: {areas:?}"
                );
            }
        }
    }

    #[test]
    fn seeded_runs_share_topology() {
        let png = scene_png(140, 100);
        let a = process(&png, &config(65.0, 42)).unwrap();
        let b = process(&png, &config(65.0, 42)).unwrap();
        assert_eq!(a.mesh.triangles(), b.mesh.triangles());
        assert_eq!(a.mesh.points(), b.mesh.points());
        assert_eq!(a.triangles, b.triangles);
    }

    #[test]
    fn large_images_are_fitted_before_sampling() {
        let png = scene_png(1600, 400);
        let staged = process(&png, &config(20.0, 1)).unwrap();
        assert_eq!(
            staged.dimensions,
            Dimensions {
                width: 800,
                height: 200
            }
        );
        assert_eq!(staged.edge_field.width(), 800);
    }
}
