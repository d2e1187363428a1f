//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs the whole pipeline in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time and
//! return to its event loop between stages:
//!
//! ```rust
//! # use tessera_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(png, PipelineConfig::default())
//!     .decode()?
//!     .fit()
//!     .build_edges()
//!     .sample()
//!     .triangulate()?
//!     .refine()?
//!     .color()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying the intermediates later
//! stages and the animation still need. Skipping a stage or calling them
//! out of order is a compile-time error.
//!
//! Every stage also carries a short status label describing the work its
//! advance performs ("edge extraction", "triangulating", ...), for hosts
//! that surface progress to a user.

use std::hash::Hasher;

use rand::SeedableRng;
use rand::rngs::StdRng;
use siphasher::sip::SipHasher13;

use crate::diagnostics::StageMetrics;
use crate::edge_field::EdgeField;
use crate::mesh::{Mesh, RefinementPass};
use crate::sampler::{FeaturePoints, PointKind};
use crate::types::{ColoredTriangle, Dimensions, PipelineConfig, PipelineError, Rgb, RgbaImage};

/// Everything a finished run produced.
///
/// The edge field and mesh are frozen; the animation reads them without
/// copying.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// The working image (fitted to the output surface, unsmoothed).
    pub working: RgbaImage,
    /// Gradient magnitudes of the (smoothed) working image.
    pub edge_field: EdgeField,
    /// Sampled feature points, before refinement.
    pub features: FeaturePoints,
    /// The refined mesh.
    pub mesh: Mesh,
    /// One record per executed refinement pass.
    pub refinement: Vec<RefinementPass>,
    /// One colored triangle per mesh triangle, in mesh order.
    pub triangles: Vec<ColoredTriangle>,
    /// Working image dimensions.
    pub dimensions: Dimensions,
    /// Seed the sampler used.
    pub seed: u64,
}

fn dimensions_of(image: &RgbaImage) -> Dimensions {
    Dimensions {
        width: image.width(),
        height: image.height(),
    }
}

/// Seed derived from the working image content and quality.
///
/// Identical inputs always give the same seed, so runs without an
/// explicit seed are still reproducible.
#[must_use]
pub fn content_seed(image: &RgbaImage, quality: f64) -> u64 {
    let mut hasher = SipHasher13::new();
    hasher.write_u32(image.width());
    hasher.write_u32(image.height());
    hasher.write(image.as_raw());
    hasher.write_u64(quality.to_bits());
    hasher.finish()
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The source image bytes and config are stored but not yet touched.
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing, call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Validate the config, decode the source image and advance to the
    /// [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the config fails
    /// [`PipelineConfig::validate`], [`PipelineError::EmptyInput`] if the
    /// source bytes are empty, and [`PipelineError::ImageDecode`] if the
    /// image format is unrecognized or the data is corrupt.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.config.validate()?;
        let source_len = self.source.len();
        let original = crate::decode::decode_rgba(&self.source)?;
        tracing::info!(
            bytes = source_len,
            width = original.width(),
            height = original.height(),
            "decoded source image"
        );
        Ok(Decoded {
            config: self.config,
            original,
            source_len,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source image.
#[must_use = "pipeline stages are consumed by advancing, call .fit() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    original: RgbaImage,
    source_len: usize,
}

impl Decoded {
    /// The decoded RGBA image at its original size.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// Fit the image onto the output surface and advance.
    pub fn fit(self) -> Fitted {
        let (working, applied) =
            crate::downsample::fit_to_surface(&self.original, self.config.max_dimension);
        tracing::debug!(
            width = working.width(),
            height = working.height(),
            applied,
            "fitted to surface"
        );
        Fitted {
            original_dimensions: dimensions_of(&self.original),
            config: self.config,
            working,
            applied,
        }
    }

    pub(crate) fn measure(&self) -> StageMetrics {
        StageMetrics::Decode {
            input_bytes: self.source_len,
            width: self.original.width(),
            height: self.original.height(),
            pixel_count: u64::from(self.original.width()) * u64::from(self.original.height()),
        }
    }
}

// ───────────────────────── Stage 2: Fitted ───────────────────────────

/// Pipeline state after fitting the image to the output surface.
#[must_use = "pipeline stages are consumed by advancing, call .build_edges() to continue"]
pub struct Fitted {
    config: PipelineConfig,
    working: RgbaImage,
    applied: bool,
    original_dimensions: Dimensions,
}

impl Fitted {
    /// The working image.
    #[must_use]
    pub const fn working(&self) -> &RgbaImage {
        &self.working
    }

    /// Whether the image was actually scaled down.
    #[must_use]
    pub const fn applied(&self) -> bool {
        self.applied
    }

    /// Smooth the working image, build the edge field and advance.
    pub fn build_edges(self) -> EdgesBuilt {
        let smoothed = crate::blur::gaussian_blur_rgba(&self.working, self.config.blur_sigma);
        let edge_field = EdgeField::build(&smoothed);
        tracing::info!(max = edge_field.max(), "built edge field");
        EdgesBuilt {
            config: self.config,
            working: self.working,
            edge_field,
        }
    }

    pub(crate) fn measure(&self) -> StageMetrics {
        StageMetrics::Fit {
            original_width: self.original_dimensions.width,
            original_height: self.original_dimensions.height,
            width: self.working.width(),
            height: self.working.height(),
            max_dimension: self.config.max_dimension,
            applied: self.applied,
        }
    }
}

// ───────────────────────── Stage 3: EdgesBuilt ───────────────────────

/// Pipeline state after the gradient pass.
#[must_use = "pipeline stages are consumed by advancing, call .sample() to continue"]
pub struct EdgesBuilt {
    config: PipelineConfig,
    working: RgbaImage,
    edge_field: EdgeField,
}

impl EdgesBuilt {
    /// The gradient-magnitude field.
    #[must_use]
    pub const fn edge_field(&self) -> &EdgeField {
        &self.edge_field
    }

    /// Sample feature points and advance.
    ///
    /// Uses `config.seed` when set, otherwise [`content_seed`].
    pub fn sample(self) -> Sampled {
        let q = self.config.normalized_quality();
        let seed = self
            .config
            .seed
            .unwrap_or_else(|| content_seed(&self.working, self.config.quality));
        let mut rng = StdRng::seed_from_u64(seed);
        let features = crate::sampler::sample(
            &self.edge_field,
            &self.working,
            q,
            &self.config.sampler,
            &mut rng,
        );
        tracing::info!(points = features.len(), seed, "sampled feature points");
        Sampled {
            config: self.config,
            working: self.working,
            edge_field: self.edge_field,
            features,
            seed,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn measure(&self) -> StageMetrics {
        let threshold = self
            .config
            .sampler
            .edge_threshold
            .at(self.config.normalized_quality()) as f32;
        StageMetrics::EdgeField {
            sigma: self.config.blur_sigma,
            max_magnitude: self.edge_field.max(),
            strong_pixel_count: self.edge_field.count_above(threshold),
            total_pixel_count: u64::from(self.edge_field.width())
                * u64::from(self.edge_field.height()),
        }
    }
}

// ───────────────────────── Stage 4: Sampled ──────────────────────────

/// Pipeline state after feature point sampling.
#[must_use = "pipeline stages are consumed by advancing, call .triangulate() to continue"]
pub struct Sampled {
    config: PipelineConfig,
    working: RgbaImage,
    edge_field: EdgeField,
    features: FeaturePoints,
    seed: u64,
}

impl Sampled {
    /// The sampled points.
    #[must_use]
    pub const fn features(&self) -> &FeaturePoints {
        &self.features
    }

    /// The seed the sampler used.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Delaunay-triangulate the sampled points and advance.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Geometry`] when the point set is
    /// degenerate (fewer than three unique points or all collinear).
    pub fn triangulate(self) -> Result<Triangulated, PipelineError> {
        let points = self.features.points().iter().copied().collect();
        let mesh = Mesh::triangulate(points).inspect_err(|e| {
            tracing::warn!(error = %e, "triangulation failed");
        })?;
        tracing::info!(triangles = mesh.len(), "triangulated");
        Ok(Triangulated {
            config: self.config,
            working: self.working,
            edge_field: self.edge_field,
            features: self.features,
            seed: self.seed,
            mesh,
        })
    }

    pub(crate) fn measure(&self) -> StageMetrics {
        StageMetrics::Sampling {
            quality: self.config.normalized_quality(),
            seed: self.seed,
            point_count: self.features.len(),
            corner: self.features.count(PointKind::Corner),
            border: self.features.count(PointKind::Border),
            salient: self.features.count(PointKind::Salient),
            edge: self.features.count(PointKind::Edge),
            fill: self.features.count(PointKind::Fill),
        }
    }
}

// ───────────────────────── Stage 5: Triangulated ─────────────────────

/// Pipeline state after the initial triangulation.
#[must_use = "pipeline stages are consumed by advancing, call .refine() to continue"]
pub struct Triangulated {
    config: PipelineConfig,
    working: RgbaImage,
    edge_field: EdgeField,
    features: FeaturePoints,
    seed: u64,
    mesh: Mesh,
}

impl Triangulated {
    /// The unrefined mesh.
    #[must_use]
    pub const fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Run the refinement passes and advance.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Geometry`] if a re-triangulation fails.
    pub fn refine(self) -> Result<Refined, PipelineError> {
        let dimensions = dimensions_of(&self.working);
        let refined = self.mesh.refine(&self.config.refine, dimensions)?;
        tracing::info!(
            passes = refined.passes.len(),
            points = refined.mesh.points().len(),
            triangles = refined.mesh.len(),
            "refined mesh"
        );
        Ok(Refined {
            config: self.config,
            working: self.working,
            edge_field: self.edge_field,
            features: self.features,
            seed: self.seed,
            mesh: refined.mesh,
            passes: refined.passes,
        })
    }

    pub(crate) fn measure(&self) -> StageMetrics {
        StageMetrics::Triangulation {
            point_count: self.mesh.points().len(),
            triangle_count: self.mesh.len(),
        }
    }
}

// ───────────────────────── Stage 6: Refined ──────────────────────────

/// Pipeline state after mesh refinement. The mesh is frozen from here on.
#[must_use = "pipeline stages are consumed by advancing, call .color() to continue"]
pub struct Refined {
    config: PipelineConfig,
    working: RgbaImage,
    edge_field: EdgeField,
    features: FeaturePoints,
    seed: u64,
    mesh: Mesh,
    passes: Vec<RefinementPass>,
}

impl Refined {
    /// The refined mesh.
    #[must_use]
    pub const fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Per-pass refinement records.
    #[must_use]
    pub fn passes(&self) -> &[RefinementPass] {
        &self.passes
    }

    /// Color every triangle from the unsmoothed working image and advance.
    pub fn color(self) -> Colored {
        let triangles = crate::color::color_triangles(&self.mesh, &self.working);
        tracing::info!(triangles = triangles.len(), "colored mesh");
        Colored {
            working: self.working,
            edge_field: self.edge_field,
            features: self.features,
            seed: self.seed,
            mesh: self.mesh,
            passes: self.passes,
            triangles,
        }
    }

    pub(crate) fn measure(&self) -> StageMetrics {
        StageMetrics::Refinement {
            passes: self.passes.clone(),
            point_count: self.mesh.points().len(),
            triangle_count: self.mesh.len(),
        }
    }
}

// ───────────────────────── Stage 7: Colored ──────────────────────────

/// Final pipeline state: every triangle has a color.
pub struct Colored {
    working: RgbaImage,
    edge_field: EdgeField,
    features: FeaturePoints,
    seed: u64,
    mesh: Mesh,
    passes: Vec<RefinementPass>,
    triangles: Vec<ColoredTriangle>,
}

impl Colored {
    /// The colored triangles.
    #[must_use]
    pub fn triangles(&self) -> &[ColoredTriangle] {
        &self.triangles
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            dimensions: dimensions_of(&self.working),
            working: self.working,
            edge_field: self.edge_field,
            features: self.features,
            mesh: self.mesh,
            refinement: self.passes,
            triangles: self.triangles,
            seed: self.seed,
        }
    }

    pub(crate) fn measure(&self) -> StageMetrics {
        let distinct: std::collections::HashSet<Rgb> =
            self.triangles.iter().map(|t| t.color).collect();
        StageMetrics::Coloring {
            triangle_count: self.triangles.len(),
            distinct_colors: distinct.len(),
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 8;

/// The output produced by a single pipeline stage.
///
/// Each variant borrows the data that the corresponding stage computed.
#[must_use]
pub enum StageOutput<'a> {
    /// Source image bytes (not yet decoded).
    Source {
        /// The raw image bytes.
        bytes: &'a [u8],
    },
    /// Decoded RGBA image.
    Decoded {
        /// The original image.
        original: &'a RgbaImage,
    },
    /// Image fitted to the output surface.
    Fitted {
        /// The working image.
        working: &'a RgbaImage,
    },
    /// Gradient-magnitude field.
    EdgesBuilt {
        /// The edge field.
        edge_field: &'a EdgeField,
    },
    /// Feature points.
    Sampled {
        /// The sampled points.
        features: &'a FeaturePoints,
    },
    /// Initial triangulation.
    Triangulated {
        /// The unrefined mesh.
        mesh: &'a Mesh,
    },
    /// Refined mesh.
    Refined {
        /// The frozen mesh.
        mesh: &'a Mesh,
        /// Per-pass records.
        passes: &'a [RefinementPass],
    },
    /// Colored triangles.
    Colored {
        /// One entry per mesh triangle.
        triangles: &'a [ColoredTriangle],
        /// Working image dimensions.
        dimensions: Dimensions,
    },
}

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// Both the typed API (individual stage structs) and the dynamic API
/// ([`Stage`] enum) are available. Each stage struct implements this
/// trait and [`Stage`] delegates to whichever variant it holds.
pub trait PipelineStage: Sized {
    /// Short machine name of this stage (e.g. `"source"`, `"mesh"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `7` for
    /// Colored).
    const INDEX: usize;

    /// Human-readable label for the work advancing from this stage
    /// performs.
    const STATUS: &str;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Stage-specific metrics for diagnostics.
    ///
    /// Returns `None` for the initial [`Pending`] stage which has not
    /// yet performed any processing.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(Some(stage))` on success, `Ok(None)` if already at
    /// the final stage, or `Err` if the stage transition fails.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when decoding or triangulation fails.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    fn complete(self) -> Result<StagedResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;
    const STATUS: &str = "decoding image";

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            bytes: &self.source,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Decoded(self.decode()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.decode()?.complete()
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 1;
    const STATUS: &str = "fitting to surface";

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Decoded {
            original: &self.original,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.measure())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Fitted(self.fit())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.fit().complete()
    }
}

impl PipelineStage for Fitted {
    const NAME: &str = "fit";
    const INDEX: usize = 2;
    const STATUS: &str = "edge extraction";

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Fitted {
            working: &self.working,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.measure())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::EdgesBuilt(self.build_edges())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.build_edges().complete()
    }
}

impl PipelineStage for EdgesBuilt {
    const NAME: &str = "edges";
    const INDEX: usize = 3;
    const STATUS: &str = "sampling points";

    fn output(&self) -> StageOutput<'_> {
        StageOutput::EdgesBuilt {
            edge_field: &self.edge_field,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.measure())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Sampled(self.sample())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.sample().complete()
    }
}

impl PipelineStage for Sampled {
    const NAME: &str = "points";
    const INDEX: usize = 4;
    const STATUS: &str = "triangulating";

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Sampled {
            features: &self.features,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.measure())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Triangulated(self.triangulate()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.triangulate()?.complete()
    }
}

impl PipelineStage for Triangulated {
    const NAME: &str = "triangulate";
    const INDEX: usize = 5;
    const STATUS: &str = "refining mesh";

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Triangulated { mesh: &self.mesh }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.measure())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Refined(self.refine()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.refine()?.complete()
    }
}

impl PipelineStage for Refined {
    const NAME: &str = "refine";
    const INDEX: usize = 6;
    const STATUS: &str = "sampling colors";

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Refined {
            mesh: &self.mesh,
            passes: &self.passes,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.measure())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Colored(self.color())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.color().into_result())
    }
}

impl PipelineStage for Colored {
    const NAME: &str = "color";
    const INDEX: usize = 7;
    const STATUS: &str = "done";

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Colored {
            triangles: &self.triangles,
            dimensions: dimensions_of(&self.working),
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.measure())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
///
/// Use [`From`] conversions to enter the dynamic API from any typed
/// stage, then call [`advance`](Self::advance) in a loop. Each call runs
/// exactly one stage, so a host can yield to its event loop in between:
///
/// ```rust
/// # use tessera_pipeline::{Pipeline, PipelineConfig, PipelineError};
/// # use tessera_pipeline::pipeline::{Stage, Advance};
/// # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(png, PipelineConfig::default()).into();
/// loop {
///     println!("{}", stage.status());
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Decoded`].
    Decoded(Decoded),
    /// See [`Fitted`].
    Fitted(Fitted),
    /// See [`EdgesBuilt`].
    EdgesBuilt(EdgesBuilt),
    /// See [`Sampled`].
    Sampled(Sampled),
    /// See [`Triangulated`].
    Triangulated(Triangulated),
    /// See [`Refined`].
    Refined(Refined),
    /// See [`Colored`].
    Colored(Colored),
}

/// Compile-time guard: adding a [`Stage`] variant makes this match
/// non-exhaustive until [`STAGE_COUNT`] is revisited.
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Decoded(_)
        | Stage::Fitted(_)
        | Stage::EdgesBuilt(_)
        | Stage::Sampled(_)
        | Stage::Triangulated(_)
        | Stage::Refined(_)
        | Stage::Colored(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Decoded(s) => s.$method($($arg),*),
            Self::Fitted(s) => s.$method($($arg),*),
            Self::EdgesBuilt(s) => s.$method($($arg),*),
            Self::Sampled(s) => s.$method($($arg),*),
            Self::Triangulated(s) => s.$method($($arg),*),
            Self::Refined(s) => s.$method($($arg),*),
            Self::Colored(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Short machine name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// Status label for the work the next [`advance`](Self::advance)
    /// performs.
    #[must_use]
    pub fn status(&self) -> &'static str {
        delegate!(self, status)
    }

    /// The output this stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Colored(_))
    }

    /// Advance to the next stage.
    ///
    /// Returns `Ok(None)` if already complete (the final stage is
    /// consumed).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Run exactly one stage, returning `self` unchanged if already
    /// complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        Ok(match self {
            Self::Pending(s) => Advance::Next(Self::Decoded(s.decode()?)),
            Self::Decoded(s) => Advance::Next(Self::Fitted(s.fit())),
            Self::Fitted(s) => Advance::Next(Self::EdgesBuilt(s.build_edges())),
            Self::EdgesBuilt(s) => Advance::Next(Self::Sampled(s.sample())),
            Self::Sampled(s) => Advance::Next(Self::Triangulated(s.triangulate()?)),
            Self::Triangulated(s) => Advance::Next(Self::Refined(s.refine()?)),
            Self::Refined(s) => Advance::Next(Self::Colored(s.color())),
            Self::Colored(s) => Advance::Complete(Self::Colored(s)),
        })
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<StagedResult, PipelineError> {
        delegate!(self, complete)
    }
}

// The trait's associated constants aren't reachable through `self`, so
// the macro calls these instead.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
    fn status(&self) -> &'static str;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }

    fn status(&self) -> &'static str {
        T::STATUS
    }
}

macro_rules! stage_from {
    ($($ty:ident),*) => {
        $(
            impl From<$ty> for Stage {
                fn from(s: $ty) -> Self {
                    Self::$ty(s)
                }
            }
        )*
    };
}

stage_from!(
    Pending,
    Decoded,
    Fitted,
    EdgesBuilt,
    Sampled,
    Triangulated,
    Refined,
    Colored
);

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental image-to-mesh pipeline.
///
/// Created via [`Pipeline::new`], which stores the source image and
/// config without doing any processing.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from source image bytes and config.
    ///
    /// No processing is performed. The config is validated by the first
    /// stage, [`Pending::decode`].
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }
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

    /// Left half dark red, right half light blue.
    fn split_png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                image::Rgba([120, 10, 10, 255])
            } else {
                image::Rgba([180, 200, 255, 255])
            }
        }))
    }

    fn seeded(quality: f64) -> PipelineConfig {
        PipelineConfig {
            quality,
            seed: Some(7),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn pending_exposes_source_bytes() {
        let png = split_png(20, 20);
        let len = png.len();
        let pending = Pipeline::new(png, PipelineConfig::default());
        assert_eq!(pending.source().len(), len);
    }

    #[test]
    fn decode_rejects_invalid_config_before_decoding() {
        let config = PipelineConfig {
            max_dimension: 0,
            ..PipelineConfig::default()
        };
        let result = Pipeline::new(split_png(10, 10), config).decode();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn decode_empty_input_returns_error() {
        let result = Pipeline::new(vec![], PipelineConfig::default()).decode();
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn fit_scales_large_images_down() {
        let config = PipelineConfig {
            max_dimension: 50,
            ..PipelineConfig::default()
        };
        let decoded = Pipeline::new(split_png(200, 100), config).decode().unwrap();
        assert_eq!(decoded.original().dimensions(), (200, 100));
        let fitted = decoded.fit();
        assert!(fitted.applied());
        assert_eq!(fitted.working().dimensions(), (50, 25));
    }

    #[test]
    fn typed_chain_produces_full_result() {
        let staged = Pipeline::new(split_png(120, 80), seeded(60.0))
            .decode()
            .unwrap()
            .fit()
            .build_edges()
            .sample()
            .triangulate()
            .unwrap()
            .refine()
            .unwrap()
            .color()
            .into_result();

        assert_eq!(
            staged.dimensions,
            Dimensions {
                width: 120,
                height: 80
            }
        );
        assert_eq!(staged.triangles.len(), staged.mesh.len());
        assert!(staged.features.count(PointKind::Salient) > 0);
        assert_eq!(staged.seed, 7);
        // Triangles on either side of the boundary pick up both colors.
        let colors: std::collections::HashSet<Rgb> =
            staged.triangles.iter().map(|t| t.color).collect();
        assert!(colors.contains(&Rgb([120, 10, 10])));
        assert!(colors.contains(&Rgb([180, 200, 255])));
    }

    #[test]
    fn loop_visits_every_stage_in_order() {
        let mut stage: Stage = Pipeline::new(split_png(40, 40), seeded(50.0)).into();
        let mut names = vec![stage.name()];
        let mut statuses = vec![stage.status()];
        loop {
            match stage.advance().unwrap() {
                Advance::Next(next) => {
                    assert_eq!(next.index(), names.len());
                    names.push(next.name());
                    statuses.push(next.status());
                    assert!(next.metrics().is_some());
                    stage = next;
                }
                Advance::Complete(done) => {
                    stage = done;
                    break;
                }
            }
        }
        assert!(stage.is_complete());
        assert_eq!(names.len(), STAGE_COUNT);
        assert_eq!(
            names,
            [
                "source",
                "decode",
                "fit",
                "edges",
                "points",
                "triangulate",
                "refine",
                "color"
            ]
        );
        assert!(statuses.contains(&"edge extraction"));
        assert!(statuses.contains(&"triangulating"));
        let result = stage.complete().unwrap();
        assert!(!result.triangles.is_empty());
    }

    #[test]
    fn next_on_final_stage_returns_none() {
        let done = Pipeline::new(split_png(20, 20), seeded(50.0))
            .decode()
            .unwrap()
            .fit()
            .build_edges()
            .sample()
            .triangulate()
            .unwrap()
            .refine()
            .unwrap()
            .color();
        assert!(PipelineStage::next(done).unwrap().is_none());
    }

    #[test]
    fn output_matches_stage() {
        let stage: Stage = Pipeline::new(split_png(20, 20), seeded(50.0))
            .decode()
            .unwrap()
            .fit()
            .build_edges()
            .into();
        assert!(matches!(stage.output(), StageOutput::EdgesBuilt { .. }));
    }

    #[test]
    fn content_seed_depends_on_pixels_and_quality() {
        let a = RgbaImage::from_pixel(8, 8, image::Rgba([1, 2, 3, 255]));
        let b = RgbaImage::from_pixel(8, 8, image::Rgba([1, 2, 4, 255]));
        assert_eq!(content_seed(&a, 50.0), content_seed(&a, 50.0));
        assert_ne!(content_seed(&a, 50.0), content_seed(&b, 50.0));
        assert_ne!(content_seed(&a, 50.0), content_seed(&a, 51.0));
    }

    #[test]
    fn unseeded_runs_are_reproducible() {
        let png = split_png(64, 48);
        let run = || {
            Pipeline::new(png.clone(), PipelineConfig::default())
                .complete()
                .unwrap()
        };
        let (a, b) = (run(), run());
        assert_eq!(a.seed, b.seed);
        assert_eq!(a.mesh.triangles(), b.mesh.triangles());
    }

    #[test]
    fn single_pixel_image_still_meshes() {
        // The corners of a 1x1 surface are distinct; no interior cells.
        // Both half-triangles exceed the tiny area limit, so refinement
        // still splits them.
        let staged = Pipeline::new(encode_png(&RgbaImage::new(1, 1)), seeded(50.0))
            .complete()
            .unwrap();
        assert_eq!(staged.features.len(), 4);
        assert!(staged.mesh.points().len() >= 4);
        assert!(staged.triangles.len() >= 2);
        assert_eq!(staged.triangles.len(), staged.mesh.len());
    }
}
