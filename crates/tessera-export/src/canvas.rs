//! `tiny-skia` raster surface.

use tessera_animate::{AnimateError, DrawCommand, Layer, Surface};
use tessera_pipeline::{Dimensions, GrayImage, Point, Rgb, RgbaImage};
use tiny_skia::{
    Color, ColorU8, FillRule, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};

use crate::ExportError;

struct Bound {
    target: Pixmap,
    source: Pixmap,
    edges: Pixmap,
}

/// An anti-aliased raster surface.
///
/// Starts unbound; [`Surface::bind`] sizes it and takes copies of the
/// source and edge layers. Drawing onto an unbound canvas does nothing.
#[derive(Default)]
pub struct Canvas {
    bound: Option<Bound>,
}

impl Canvas {
    /// An unbound canvas.
    #[must_use]
    pub const fn new() -> Self {
        Self { bound: None }
    }

    /// Size of the bound surface.
    #[must_use]
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.bound.as_ref().map(|b| Dimensions {
            width: b.target.width(),
            height: b.target.height(),
        })
    }

    /// The current frame as straight (non-premultiplied) RGBA.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::SurfaceUnavailable`] if the canvas is
    /// unbound.
    pub fn to_rgba_image(&self) -> Result<RgbaImage, ExportError> {
        let bound = self.bound.as_ref().ok_or(ExportError::SurfaceUnavailable)?;
        let target = &bound.target;
        let raw = target
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        RgbaImage::from_raw(target.width(), target.height(), raw)
            .ok_or(ExportError::SurfaceUnavailable)
    }
}

fn pixmap_from(width: u32, height: u32, pixel: impl Fn(u32, u32) -> ColorU8) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(width, height)?;
    for (i, out) in pixmap.pixels_mut().iter_mut().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let i = i as u32;
        *out = pixel(i % width, i / width).premultiply();
    }
    Some(pixmap)
}

fn paint(color: Rgb, opacity: f32, anti_alias: bool) -> Paint<'static> {
    let [r, g, b] = color.0;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let a = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = anti_alias;
    paint
}

#[allow(clippy::cast_possible_truncation)]
fn triangle_path(vertices: &[Point; 3]) -> Option<tiny_skia::Path> {
    let [a, b, c] = vertices;
    let mut pb = PathBuilder::new();
    pb.move_to(a.x as f32, a.y as f32);
    pb.line_to(b.x as f32, b.y as f32);
    pb.line_to(c.x as f32, c.y as f32);
    pb.close();
    pb.finish()
}

impl Surface for Canvas {
    fn bind(
        &mut self,
        dimensions: Dimensions,
        source: &RgbaImage,
        edges: &GrayImage,
    ) -> Result<(), AnimateError> {
        let Dimensions { width, height } = dimensions;
        let (Some(target), Some(source), Some(edges)) = (
            Pixmap::new(width, height),
            pixmap_from(source.width(), source.height(), |x, y| {
                let [r, g, b, a] = source.get_pixel(x, y).0;
                ColorU8::from_rgba(r, g, b, a)
            }),
            pixmap_from(edges.width(), edges.height(), |x, y| {
                let [v] = edges.get_pixel(x, y).0;
                ColorU8::from_rgba(v, v, v, 255)
            }),
        ) else {
            tracing::warn!(width, height, "cannot allocate canvas");
            return Err(AnimateError::ResourceUnavailable);
        };
        tracing::debug!(width, height, "canvas bound");
        self.bound = Some(Bound {
            target,
            source,
            edges,
        });
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn draw(&mut self, command: &DrawCommand) {
        let Some(bound) = &mut self.bound else {
            return;
        };
        let target = &mut bound.target;
        match command {
            DrawCommand::Clear { color } => {
                let [r, g, b] = color.0;
                target.fill(Color::from_rgba8(r, g, b, 255));
            }
            DrawCommand::Image { layer, opacity } => {
                if *opacity <= 0.0 {
                    return;
                }
                let layer = match layer {
                    Layer::Source => &bound.source,
                    Layer::EdgeField => &bound.edges,
                };
                let paint = PixmapPaint {
                    opacity: opacity.clamp(0.0, 1.0),
                    ..PixmapPaint::default()
                };
                target.draw_pixmap(0, 0, layer.as_ref(), &paint, Transform::identity(), None);
            }
            DrawCommand::Dot {
                center,
                radius,
                color,
                opacity,
            } => {
                if let Some(path) =
                    PathBuilder::from_circle(center.x as f32, center.y as f32, *radius)
                {
                    target.fill_path(
                        &path,
                        &paint(*color, *opacity, true),
                        FillRule::Winding,
                        Transform::identity(),
                        None,
                    );
                }
            }
            DrawCommand::StrokeTriangle {
                vertices,
                width,
                color,
                opacity,
            } => {
                if let Some(path) = triangle_path(vertices) {
                    let stroke = Stroke {
                        width: *width,
                        line_join: LineJoin::Round,
                        ..Stroke::default()
                    };
                    target.stroke_path(
                        &path,
                        &paint(*color, *opacity, true),
                        &stroke,
                        Transform::identity(),
                        None,
                    );
                }
            }
            DrawCommand::FillTriangle {
                vertices,
                color,
                opacity,
            } => {
                // Neighbouring fills share edges; anti-aliasing them shows
                // the background through the seams.
                if let Some(path) = triangle_path(vertices) {
                    target.fill_path(
                        &path,
                        &paint(*color, *opacity, false),
                        FillRule::Winding,
                        Transform::identity(),
                        None,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    fn bound(width: u32, height: u32) -> Canvas {
        let source = RgbaImage::from_pixel(width, height, image::Rgba([200, 100, 50, 255]));
        let edges = GrayImage::from_pixel(width, height, image::Luma([255]));
        let mut canvas = Canvas::new();
        canvas.bind(dims(width, height), &source, &edges).unwrap();
        canvas
    }

    #[test]
    fn unbound_canvas_cannot_export() {
        let mut canvas = Canvas::new();
        canvas.draw(&DrawCommand::Clear { color: Rgb::WHITE });
        assert!(canvas.dimensions().is_none());
        assert!(matches!(
            canvas.to_rgba_image(),
            Err(ExportError::SurfaceUnavailable)
        ));
    }

    #[test]
    fn zero_sized_bind_is_unavailable() {
        let mut canvas = Canvas::new();
        let err = canvas
            .bind(dims(0, 0), &RgbaImage::new(0, 0), &GrayImage::new(0, 0))
            .unwrap_err();
        assert!(matches!(err, AnimateError::ResourceUnavailable));
    }

    #[test]
    fn clear_fills_every_pixel() {
        let mut canvas = bound(4, 3);
        canvas.draw(&DrawCommand::Clear {
            color: Rgb([1, 2, 3]),
        });
        let img = canvas.to_rgba_image().unwrap();
        assert_eq!(img.dimensions(), (4, 3));
        assert!(img.pixels().all(|p| p.0 == [1, 2, 3, 255]));
    }

    #[test]
    fn opaque_source_layer_replaces_background() {
        let mut canvas = bound(4, 4);
        canvas.render(&[
            DrawCommand::Clear { color: Rgb::BLACK },
            DrawCommand::Image {
                layer: Layer::Source,
                opacity: 1.0,
            },
        ]);
        let img = canvas.to_rgba_image().unwrap();
        assert_eq!(img.get_pixel(2, 2).0, [200, 100, 50, 255]);
    }

    #[test]
    fn half_opacity_blends() {
        let mut canvas = bound(4, 4);
        canvas.render(&[
            DrawCommand::Clear { color: Rgb::BLACK },
            DrawCommand::Image {
                layer: Layer::EdgeField,
                opacity: 0.5,
            },
        ]);
        let [r, g, b, a] = canvas.to_rgba_image().unwrap().get_pixel(1, 1).0;
        assert_eq!(a, 255);
        for c in [r, g, b] {
            assert!((120..=135).contains(&c), "{c}");
        }
    }

    #[test]
    fn fill_covers_interior_only() {
        let mut canvas = bound(20, 20);
        canvas.render(&[
            DrawCommand::Clear { color: Rgb::BLACK },
            DrawCommand::FillTriangle {
                vertices: [
                    Point::new(0.0, 0.0),
                    Point::new(20.0, 0.0),
                    Point::new(0.0, 20.0),
                ],
                color: Rgb([0, 255, 0]),
                opacity: 1.0,
            },
        ]);
        let img = canvas.to_rgba_image().unwrap();
        assert_eq!(img.get_pixel(3, 3).0, [0, 255, 0, 255]);
        assert_eq!(img.get_pixel(17, 17).0, [0, 0, 0, 255]);
    }

    #[test]
    fn transparent_commands_leave_pixels_alone() {
        let mut canvas = bound(10, 10);
        canvas.render(&[
            DrawCommand::Clear { color: Rgb::BLACK },
            DrawCommand::Dot {
                center: Point::new(5.0, 5.0),
                radius: 3.0,
                color: Rgb::WHITE,
                opacity: 0.0,
            },
            DrawCommand::Image {
                layer: Layer::Source,
                opacity: 0.0,
            },
        ]);
        let img = canvas.to_rgba_image().unwrap();
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }
}
