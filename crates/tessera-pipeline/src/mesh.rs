//! Delaunay triangulation and quality refinement.
//!
//! The initial mesh is a planar Delaunay triangulation of the sampled
//! points (via [`spade`]). Delaunay minimizes skinny triangles for a
//! given point set but cannot fix an irregular set, so a fixed number of
//! refinement passes follows. Each pass flags triangles that are
//!
//! - *sharp*: `longest / max(1, shortest) > sliver_ratio` with
//!   `area > sliver_min_area`, or
//! - *oversized*: `area > oversized_fraction · width · height`,
//!
//! inserts the midpoint of every flagged triangle's longest edge, and
//! re-triangulates the whole point set from scratch. A pass that
//! inserts nothing ends refinement early.

use serde::{Deserialize, Serialize};
use spade::{DelaunayTriangulation, Point2, Triangulation};

use crate::types::{Dimensions, GeometryFault, PipelineError, Point, PointSet};

/// Refinement constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    /// Number of refinement passes.
    pub passes: u32,
    /// Longest-to-shortest edge ratio above which a triangle is a sliver.
    pub sliver_ratio: f64,
    /// Slivers at or below this area (px²) are left alone.
    pub sliver_min_area: f64,
    /// Triangles larger than this fraction of the image area are split.
    pub oversized_fraction: f64,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            passes: 2,
            sliver_ratio: 4.0,
            sliver_min_area: 50.0,
            oversized_fraction: 0.04,
        }
    }
}

/// Why a triangle was flagged for bisection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Defect {
    /// Elongated sliver.
    Sharp,
    /// Too large a share of the image.
    Oversized,
}

impl RefineParams {
    /// Classify a triangle, or `None` if it needs no refinement.
    ///
    /// A triangle that is both sharp and oversized reports [`Defect::Sharp`].
    #[must_use]
    pub fn classify(&self, metrics: &TriangleMetrics, dimensions: Dimensions) -> Option<Defect> {
        let ratio = metrics.longest() / metrics.shortest().max(1.0);
        if ratio > self.sliver_ratio && metrics.area > self.sliver_min_area {
            Some(Defect::Sharp)
        } else if metrics.area > self.oversized_fraction * dimensions.area() {
            Some(Defect::Oversized)
        } else {
            None
        }
    }
}

/// Edge lengths and area of one triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleMetrics {
    /// Lengths of edges `ab`, `bc`, `ca`.
    pub edges: [f64; 3],
    /// Heron area, clamped at zero.
    pub area: f64,
}

impl TriangleMetrics {
    /// Measure the triangle `[a, b, c]`.
    #[must_use]
    pub fn of(corners: [Point; 3]) -> Self {
        let [a, b, c] = corners;
        let edges = [a.distance(b), b.distance(c), c.distance(a)];
        let s = (edges[0] + edges[1] + edges[2]) / 2.0;
        let product = s * (s - edges[0]) * (s - edges[1]) * (s - edges[2]);
        Self {
            edges,
            area: product.max(0.0).sqrt(),
        }
    }

    /// Length of the longest edge.
    #[must_use]
    pub fn longest(&self) -> f64 {
        self.edges.iter().copied().fold(0.0, f64::max)
    }

    /// Length of the shortest edge.
    #[must_use]
    pub fn shortest(&self) -> f64 {
        self.edges.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Index of the longest edge (`0 = ab`, `1 = bc`, `2 = ca`).
    #[must_use]
    pub fn longest_index(&self) -> usize {
        let mut best = 0;
        for i in 1..3 {
            if self.edges[i] > self.edges[best] {
                best = i;
            }
        }
        best
    }
}

/// Midpoint of the longest edge of `corners`.
#[must_use]
pub fn longest_edge_midpoint(corners: [Point; 3]) -> Point {
    let i = TriangleMetrics::of(corners).longest_index();
    corners[i].midpoint(corners[(i + 1) % 3])
}

/// A point set and its triangulation.
///
/// Triangles are index triples into [`points`](Self::points); the three
/// indices of a triangle are always distinct.
#[derive(Debug, Clone)]
pub struct Mesh {
    points: PointSet,
    triangles: Vec<[usize; 3]>,
}

impl Mesh {
    /// Delaunay-triangulate a deduplicated point set.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Geometry`] when the set has fewer than
    /// three points, all points are collinear, or a coordinate is not
    /// representable.
    pub fn triangulate(points: PointSet) -> Result<Self, PipelineError> {
        let triangles = delaunay(points.points())?;
        Ok(Self { points, triangles })
    }

    /// The mesh vertices.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        self.points.points()
    }

    /// Triangle index triples.
    #[must_use]
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Number of triangles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// Returns `true` if the mesh has no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Corner positions of `triangle`.
    #[must_use]
    pub fn corners(&self, triangle: [usize; 3]) -> [Point; 3] {
        let points = self.points.points();
        triangle.map(|i| points[i])
    }

    /// Iterate over the corner positions of every triangle.
    pub fn iter_corners(&self) -> impl Iterator<Item = [Point; 3]> + '_ {
        self.triangles.iter().map(|&t| self.corners(t))
    }

    /// Count the triangles flagged by `params`.
    #[must_use]
    pub fn defects(&self, params: &RefineParams, dimensions: Dimensions) -> DefectCount {
        let mut count = DefectCount::default();
        for corners in self.iter_corners() {
            let metrics = TriangleMetrics::of(corners);
            match params.classify(&metrics, dimensions) {
                Some(Defect::Sharp) => count.sharp += 1,
                Some(Defect::Oversized) => count.oversized += 1,
                None => {}
            }
        }
        count
    }

    /// Run the refinement passes and freeze the mesh.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Geometry`] if a re-triangulation fails.
    /// Inserted points never make a valid set degenerate, so this only
    /// surfaces coordinate overflow.
    pub fn refine(
        mut self,
        params: &RefineParams,
        dimensions: Dimensions,
    ) -> Result<Refined, PipelineError> {
        let mut passes = Vec::new();

        for pass in 0..params.passes {
            let mut record = RefinementPass::default();
            let mut splits = Vec::new();
            for corners in self.iter_corners() {
                let metrics = TriangleMetrics::of(corners);
                let Some(defect) = params.classify(&metrics, dimensions) else {
                    continue;
                };
                match defect {
                    Defect::Sharp => record.sharp += 1,
                    Defect::Oversized => record.oversized += 1,
                }
                record.largest_flagged_area = record.largest_flagged_area.max(metrics.area);
                splits.push(longest_edge_midpoint(corners));
            }

            for midpoint in splits {
                if self.points.insert(midpoint) {
                    record.inserted += 1;
                }
            }

            tracing::debug!(
                pass,
                sharp = record.sharp,
                oversized = record.oversized,
                inserted = record.inserted,
                "refinement pass"
            );
            passes.push(record);

            if record.inserted == 0 {
                break;
            }
            self.triangles = delaunay(self.points.points())?;
        }

        Ok(Refined { mesh: self, passes })
    }
}

/// Flagged-triangle counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectCount {
    /// Slivers.
    pub sharp: usize,
    /// Oversized triangles.
    pub oversized: usize,
}

impl DefectCount {
    /// Total flagged triangles.
    #[must_use]
    pub const fn total(self) -> usize {
        self.sharp + self.oversized
    }
}

/// What one refinement pass found and did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RefinementPass {
    /// Slivers found at the start of the pass.
    pub sharp: usize,
    /// Oversized triangles found at the start of the pass.
    pub oversized: usize,
    /// Midpoints that survived deduplication.
    pub inserted: usize,
    /// Area of the largest flagged triangle (0 when none).
    pub largest_flagged_area: f64,
}

/// A frozen mesh and the history of its refinement.
#[derive(Debug, Clone)]
pub struct Refined {
    /// The final mesh.
    pub mesh: Mesh,
    /// One record per executed pass.
    pub passes: Vec<RefinementPass>,
}

/// Triangulate `points`, returning index triples into the slice.
fn delaunay(points: &[Point]) -> Result<Vec<[usize; 3]>, PipelineError> {
    let fault = |reason| PipelineError::Geometry {
        points: points.len(),
        reason,
    };
    if points.len() < 3 {
        return Err(fault(GeometryFault::TooFewPoints));
    }

    let mut triangulation: DelaunayTriangulation<Point2<f64>> = DelaunayTriangulation::new();
    // Maps spade's vertex index back to the position in `points`.
    let mut index_of = vec![usize::MAX; points.len()];
    for (i, p) in points.iter().enumerate() {
        let handle = triangulation
            .insert(Point2::new(p.x, p.y))
            .map_err(|_| fault(GeometryFault::InvalidCoordinate))?;
        if let Some(slot) = index_of.get_mut(handle.index())
            && *slot == usize::MAX
        {
            *slot = i;
        }
    }

    let triangles: Vec<[usize; 3]> = triangulation
        .inner_faces()
        .map(|face| face.vertices().map(|v| index_of[v.fix().index()]))
        .collect();

    if triangles.is_empty() {
        return Err(fault(GeometryFault::Collinear));
    }
    Ok(triangles)
}
