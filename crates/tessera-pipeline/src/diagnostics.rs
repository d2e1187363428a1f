//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning. [`process_staged_with_diagnostics`] collects them
//! alongside the pipeline results.
//!
//! Timestamps come from a caller-supplied [`Clock`] so the crate stays
//! free of platform time sources. Durations are serialized as fractional
//! seconds (`f64`) for JSON compatibility, since `std::time::Duration`
//! does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mesh::RefinementPass;
use crate::pipeline::{Pipeline, StagedResult};
use crate::types::{PipelineConfig, PipelineError};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 2: fit to the output surface.
    pub fit: StageDiagnostics,
    /// Stage 3: smoothing and gradient field.
    pub edge_field: StageDiagnostics,
    /// Stage 4: feature point sampling.
    pub sampling: StageDiagnostics,
    /// Stage 5: initial Delaunay triangulation.
    pub triangulation: StageDiagnostics,
    /// Stage 6: refinement passes.
    pub refinement: StageDiagnostics,
    /// Stage 7: per-triangle colors.
    pub coloring: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Surface fit metrics.
    Fit {
        /// Decoded width.
        original_width: u32,
        /// Decoded height.
        original_height: u32,
        /// Working width.
        width: u32,
        /// Working height.
        height: u32,
        /// Surface bound in effect.
        max_dimension: u32,
        /// Whether the image was scaled.
        applied: bool,
    },
    /// Edge field metrics.
    EdgeField {
        /// Pre-gradient blur sigma.
        sigma: f32,
        /// Largest gradient magnitude.
        max_magnitude: f32,
        /// Pixels above the edge threshold at the run's quality.
        strong_pixel_count: usize,
        /// Total pixel count.
        total_pixel_count: u64,
    },
    /// Sampler metrics.
    Sampling {
        /// Normalized quality.
        quality: f64,
        /// Seed used for jitter and fill.
        seed: u64,
        /// Unique points emitted.
        point_count: usize,
        /// Corner points.
        corner: usize,
        /// Border lattice points.
        border: usize,
        /// Salient cell maxima.
        salient: usize,
        /// Edge cell maxima.
        edge: usize,
        /// Sparse fill points.
        fill: usize,
    },
    /// Initial triangulation metrics.
    Triangulation {
        /// Vertices.
        point_count: usize,
        /// Triangles.
        triangle_count: usize,
    },
    /// Refinement metrics.
    Refinement {
        /// Per-pass records.
        passes: Vec<RefinementPass>,
        /// Vertices after refinement.
        point_count: usize,
        /// Triangles after refinement.
        triangle_count: usize,
    },
    /// Color sampling metrics.
    Coloring {
        /// Triangles colored.
        triangle_count: usize,
        /// Number of distinct colors.
        distinct_colors: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Working image width in pixels.
    pub image_width: u32,
    /// Working image height in pixels.
    pub image_height: u32,
    /// Working pixel count.
    pub pixel_count: u64,
    /// Final mesh vertices.
    pub point_count: usize,
    /// Final mesh triangles.
    pub triangle_count: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Decode", &self.decode),
            ("Fit", &self.fit),
            ("Edge Field", &self.edge_field),
            ("Sampling", &self.sampling),
            ("Triangulation", &self.triangulation),
            ("Refinement", &self.refinement),
            ("Coloring", &self.coloring),
        ];

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Points: {}  |  Triangles: {}",
            self.summary.point_count, self.summary.triangle_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Fit {
            original_width,
            original_height,
            width,
            height,
            max_dimension,
            applied,
        } => {
            if *applied {
                format!("{original_width}x{original_height} -> {width}x{height} (max {max_dimension})")
            } else {
                format!("{width}x{height} (fits {max_dimension})")
            }
        }
        StageMetrics::EdgeField {
            sigma,
            max_magnitude,
            strong_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *strong_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "sigma={sigma:.2} max={max_magnitude:.1} strong={strong_pixel_count} ({density:.1}%)"
            )
        }
        StageMetrics::Sampling {
            quality,
            seed,
            point_count,
            corner,
            border,
            salient,
            edge,
            fill,
        } => format!(
            "q={quality:.2} seed={seed} {point_count} pts (corner={corner} border={border} salient={salient} edge={edge} fill={fill})"
        ),
        StageMetrics::Triangulation {
            point_count,
            triangle_count,
        } => format!("{point_count} pts -> {triangle_count} tris"),
        StageMetrics::Refinement {
            passes,
            point_count,
            triangle_count,
        } => {
            let flagged: Vec<String> = passes
                .iter()
                .map(|p| format!("{}+{}", p.sharp, p.oversized))
                .collect();
            format!(
                "{} passes [{}] -> {point_count} pts, {triangle_count} tris",
                passes.len(),
                flagged.join(", "),
            )
        }
        StageMetrics::Coloring {
            triangle_count,
            distinct_colors,
        } => format!("{triangle_count} tris, {distinct_colors} colors"),
    }
}

/// Time one stage transition and capture its metrics.
fn timed<C: Clock, S>(
    clock: &C,
    run: impl FnOnce() -> Result<S, PipelineError>,
    measure: fn(&S) -> StageMetrics,
) -> Result<(S, StageDiagnostics), PipelineError> {
    let start = clock.now();
    let stage = run()?;
    let duration = clock.elapsed(&start);
    let metrics = measure(&stage);
    Ok((stage, StageDiagnostics { duration, metrics }))
}

/// Run the full pipeline while timing every stage.
///
/// # Errors
///
/// Returns whatever [`PipelineError`] the pipeline itself returns.
pub fn process_staged_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    use crate::pipeline::{Colored, Decoded, EdgesBuilt, Fitted, Refined, Sampled, Triangulated};

    let total_start = clock.now();
    let pending = Pipeline::new(image_bytes.to_vec(), config.clone());

    let (decoded, decode) = timed(clock, || pending.decode(), Decoded::measure)?;
    let (fitted, fit) = timed(clock, || Ok(decoded.fit()), Fitted::measure)?;
    let (edges, edge_field) = timed(clock, || Ok(fitted.build_edges()), EdgesBuilt::measure)?;
    let (sampled, sampling) = timed(clock, || Ok(edges.sample()), Sampled::measure)?;
    let (triangulated, triangulation) =
        timed(clock, || sampled.triangulate(), Triangulated::measure)?;
    let (refined, refinement) = timed(clock, || triangulated.refine(), Refined::measure)?;
    let (colored, coloring) = timed(clock, || Ok(refined.color()), Colored::measure)?;

    let total_duration = clock.elapsed(&total_start);
    let staged = colored.into_result();
    let summary = PipelineSummary {
        image_width: staged.dimensions.width,
        image_height: staged.dimensions.height,
        pixel_count: u64::from(staged.dimensions.width) * u64::from(staged.dimensions.height),
        point_count: staged.mesh.points().len(),
        triangle_count: staged.mesh.len(),
    };

    let diagnostics = PipelineDiagnostics {
        decode,
        fit,
        edge_field,
        sampling,
        triangulation,
        refinement,
        coloring,
        total_duration,
        summary,
    };
    Ok((staged, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Clock that advances one millisecond per reading.
    struct StepClock(Cell<u64>);

    impl Clock for StepClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn checker_png() -> Vec<u8> {
        let img = image::RgbaImage::from_fn(48, 48, |x, y| {
            if (x / 12 + y / 12) % 2 == 0 {
                image::Rgba([20, 20, 20, 255])
            } else {
                image::Rgba([230, 230, 230, 255])
            }
        });
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

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn diagnostics_cover_every_stage() {
        let clock = StepClock(Cell::new(0));
        let config = PipelineConfig {
            seed: Some(3),
            ..PipelineConfig::default()
        };
        let (staged, diag) =
            process_staged_with_diagnostics(&checker_png(), &config, &clock).unwrap();

        // Each stage reads the clock twice.
        assert_eq!(diag.decode.duration, Duration::from_millis(1));
        assert_eq!(diag.summary.triangle_count, staged.mesh.len());
        assert!(diag.total_duration >= Duration::from_millis(7));
        assert!(matches!(
            diag.sampling.metrics,
            StageMetrics::Sampling { seed: 3, .. }
        ));
        assert!(matches!(
            &diag.refinement.metrics,
            StageMetrics::Refinement { passes, .. } if passes == &staged.refinement
        ));
    }

    #[test]
    fn diagnostics_propagate_errors() {
        let clock = StepClock(Cell::new(0));
        let result = process_staged_with_diagnostics(&[], &PipelineConfig::default(), &clock);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn report_lists_stages() {
        let clock = StepClock(Cell::new(0));
        let (_, diag) =
            process_staged_with_diagnostics(&checker_png(), &PipelineConfig::default(), &clock)
                .unwrap();
        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Triangulation"));
        assert!(report.contains("Refinement"));
        assert!(report.contains("48x48"));
    }

    #[test]
    fn diagnostics_serialize_to_json() {
        let clock = StepClock(Cell::new(0));
        let (_, diag) =
            process_staged_with_diagnostics(&checker_png(), &PipelineConfig::default(), &clock)
                .unwrap();
        let json = serde_json::to_string(&diag).unwrap();
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary.triangle_count, diag.summary.triangle_count);
        assert!((back.total_duration.as_secs_f64() - diag.total_duration.as_secs_f64()).abs() < 1e-9);
    }
}
