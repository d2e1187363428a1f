//! Draw commands and the per-phase frame composition.
//!
//! A frame is a flat list of [`DrawCommand`]s, painted in order onto a
//! [`Surface`]. Every frame starts with a [`DrawCommand::Clear`], so a
//! surface never needs to remember earlier frames.

use serde::{Deserialize, Serialize};
use tessera_pipeline::{ColoredTriangle, Dimensions, GrayImage, Point, Rgb, RgbaImage, StagedResult};

use crate::AnimateError;
use crate::ease::Ease;
use crate::phase::Phase;
use crate::timeline::AnimationState;

/// Background behind every frame.
pub const BACKGROUND: Rgb = Rgb([16, 16, 20]);
/// Wireframe stroke color.
pub const WIRE_COLOR: Rgb = Rgb([235, 235, 240]);
/// Wireframe stroke width in pixels.
pub const WIRE_WIDTH: f32 = 0.75;
/// Wireframe opacity while fully shown.
pub const WIRE_OPACITY: f32 = 0.6;
/// Feature point color.
pub const POINT_COLOR: Rgb = Rgb([255, 90, 60]);
/// Feature point radius in pixels.
pub const POINT_RADIUS: f32 = 1.5;
/// Edge field opacity once dimmed behind the points.
pub const EDGE_DIM: f32 = 0.35;

/// A raster layer the surface was bound with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layer {
    /// The working image.
    Source,
    /// The edge field visualization.
    EdgeField,
}

/// One painting operation. Opacities are in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    /// Fill the whole surface.
    Clear {
        /// Fill color.
        color: Rgb,
    },
    /// Blend a bound raster layer over the whole surface.
    Image {
        /// Which layer.
        layer: Layer,
        /// Blend opacity.
        opacity: f32,
    },
    /// A filled dot.
    Dot {
        /// Center.
        center: Point,
        /// Radius in pixels.
        radius: f32,
        /// Fill color.
        color: Rgb,
        /// Blend opacity.
        opacity: f32,
    },
    /// A triangle outline.
    StrokeTriangle {
        /// Corners.
        vertices: [Point; 3],
        /// Stroke width in pixels.
        width: f32,
        /// Stroke color.
        color: Rgb,
        /// Blend opacity.
        opacity: f32,
    },
    /// A filled triangle.
    FillTriangle {
        /// Corners.
        vertices: [Point; 3],
        /// Fill color.
        color: Rgb,
        /// Blend opacity.
        opacity: f32,
    },
}

/// A drawable surface.
pub trait Surface {
    /// Prepare the surface for a run: size it and take copies of the
    /// raster layers.
    ///
    /// # Errors
    ///
    /// Returns [`AnimateError::ResourceUnavailable`] if the surface cannot
    /// hold an image of `dimensions`.
    fn bind(
        &mut self,
        dimensions: Dimensions,
        source: &RgbaImage,
        edges: &GrayImage,
    ) -> Result<(), AnimateError>;

    /// Paint one command.
    fn draw(&mut self, command: &DrawCommand);

    /// Paint a whole frame.
    fn render(&mut self, commands: &[DrawCommand]) {
        for command in commands {
            self.draw(command);
        }
    }
}

/// The frozen geometry the animation reveals.
#[derive(Debug, Clone)]
pub struct Artwork {
    dimensions: Dimensions,
    points: Vec<Point>,
    triangles: Vec<ColoredTriangle>,
    fill_order: Vec<usize>,
}

impl Artwork {
    /// Build from mesh vertices and colored triangles (in mesh order).
    ///
    /// Fills are revealed by centroid, top row first, left to right.
    #[must_use]
    pub fn new(dimensions: Dimensions, points: Vec<Point>, triangles: Vec<ColoredTriangle>) -> Self {
        let mut fill_order: Vec<usize> = (0..triangles.len()).collect();
        fill_order.sort_by_key(|&i| {
            let (x, y) = triangles[i].centroid;
            (y, x)
        });
        Self {
            dimensions,
            points,
            triangles,
            fill_order,
        }
    }

    /// Build from a finished pipeline run.
    #[must_use]
    pub fn from_staged(staged: &StagedResult) -> Self {
        Self::new(
            staged.dimensions,
            staged.mesh.points().to_vec(),
            staged.triangles.clone(),
        )
    }

    /// Surface dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Points shown during the point cloud phase.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Triangles in mesh order.
    #[must_use]
    pub fn triangles(&self) -> &[ColoredTriangle] {
        &self.triangles
    }

    /// Triangles in fill order.
    pub fn in_fill_order(&self) -> impl Iterator<Item = &ColoredTriangle> + '_ {
        self.fill_order.iter().map(|&i| &self.triangles[i])
    }
}

fn dots(points: &[Point], opacity: f32) -> impl Iterator<Item = DrawCommand> + '_ {
    points.iter().map(move |&center| DrawCommand::Dot {
        center,
        radius: POINT_RADIUS,
        color: POINT_COLOR,
        opacity,
    })
}

fn strokes<'a>(
    triangles: impl Iterator<Item = &'a ColoredTriangle> + 'a,
    opacity: f32,
) -> impl Iterator<Item = DrawCommand> + 'a {
    triangles.map(move |t| DrawCommand::StrokeTriangle {
        vertices: t.vertices,
        width: WIRE_WIDTH,
        color: WIRE_COLOR,
        opacity,
    })
}

fn fills<'a>(
    triangles: impl Iterator<Item = &'a ColoredTriangle> + 'a,
) -> impl Iterator<Item = DrawCommand> + 'a {
    triangles.map(|t| DrawCommand::FillTriangle {
        vertices: t.vertices,
        color: t.color,
        opacity: 1.0,
    })
}

/// Compose the frame for `state`.
///
/// The work is proportional to the number of points and triangles.
#[must_use]
pub fn compose(state: &AnimationState, art: &Artwork) -> Vec<DrawCommand> {
    let p = state.progress;
    let mut out = vec![DrawCommand::Clear { color: BACKGROUND }];

    match state.phase {
        Phase::SourceImage => {
            out.push(DrawCommand::Image {
                layer: Layer::Source,
                opacity: Ease::Linear.opacity(p),
            });
        }
        Phase::EdgeVisualization => {
            let mix = Ease::InOutCubic.opacity(p);
            out.push(DrawCommand::Image {
                layer: Layer::Source,
                opacity: 1.0 - mix,
            });
            out.push(DrawCommand::Image {
                layer: Layer::EdgeField,
                opacity: mix,
            });
        }
        Phase::PointCloud => {
            let dim = Ease::Linear.opacity(p);
            out.push(DrawCommand::Image {
                layer: Layer::EdgeField,
                opacity: (1.0 - EDGE_DIM).mul_add(-dim, 1.0),
            });
            let shown = Ease::OutCubic.reveal(p, art.points.len());
            out.extend(dots(&art.points[..shown], 1.0));
        }
        Phase::Wireframe => {
            let fade = Ease::Linear.opacity(p);
            out.push(DrawCommand::Image {
                layer: Layer::EdgeField,
                opacity: EDGE_DIM * (1.0 - fade),
            });
            out.extend(dots(&art.points, 1.0 - fade));
            let shown = Ease::OutCubic.reveal(p, art.triangles.len());
            out.extend(strokes(art.triangles[..shown].iter(), WIRE_OPACITY));
        }
        Phase::ColorFill => {
            out.extend(strokes(art.triangles.iter(), WIRE_OPACITY));
            let shown = Ease::OutCubic.reveal(p, art.triangles.len());
            out.extend(fills(art.in_fill_order().take(shown)));
        }
        Phase::EdgeFadeOut => {
            out.extend(fills(art.triangles.iter()));
            let fade = Ease::Linear.opacity(p);
            out.extend(strokes(art.triangles.iter(), WIRE_OPACITY * (1.0 - fade)));
        }
        Phase::Complete => {
            out.extend(fills(art.triangles.iter()));
        }
    }
    out
}
