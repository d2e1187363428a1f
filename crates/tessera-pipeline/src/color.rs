//! Per-triangle color sampling.
//!
//! Five interior samples are taken per triangle: the centroid, a point
//! halfway from each edge midpoint towards the opposite vertex, and the
//! centroid again (weighting it double). The per-channel median of the
//! five rejects a single outlier sample from a stray texture detail.

use crate::mesh::Mesh;
use crate::types::{ColoredTriangle, Point, Rgb, RgbaImage};

/// How far each edge-midpoint sample is pulled towards the opposite
/// vertex.
pub const INTERIOR_BLEND: f64 = 0.5;

/// Centroid of a triangle.
#[must_use]
pub fn centroid(corners: [Point; 3]) -> Point {
    let [a, b, c] = corners;
    Point::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0)
}

/// The five sample locations for a triangle, in sampling order.
#[must_use]
pub fn sample_points(corners: [Point; 3]) -> [Point; 5] {
    let [a, b, c] = corners;
    let center = centroid(corners);
    [
        center,
        a.midpoint(b).lerp(c, INTERIOR_BLEND),
        b.midpoint(c).lerp(a, INTERIOR_BLEND),
        c.midpoint(a).lerp(b, INTERIOR_BLEND),
        center,
    ]
}

/// RGB at the pixel containing `point`, clamped to the image.
///
/// An empty image reads as black.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn pixel_at(image: &RgbaImage, point: Point) -> Rgb {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Rgb::BLACK;
    }
    // Clamp in f64 first so NaN and huge values land inside the image.
    let x = point.x.floor().clamp(0.0, f64::from(w - 1)) as u32;
    let y = point.y.floor().clamp(0.0, f64::from(h - 1)) as u32;
    let [r, g, b, _] = image.get_pixel(x, y).0;
    Rgb([r, g, b])
}

/// Per-channel median of five colors.
#[must_use]
pub fn median(samples: [Rgb; 5]) -> Rgb {
    let channel = |i: usize| {
        let mut values = samples.map(|s| s.0[i]);
        values.sort_unstable();
        values[2]
    };
    Rgb([channel(0), channel(1), channel(2)])
}

/// Representative color of one triangle.
#[must_use]
pub fn triangle_color(image: &RgbaImage, corners: [Point; 3]) -> Rgb {
    median(sample_points(corners).map(|p| pixel_at(image, p)))
}

/// Color every triangle of `mesh` from `image`.
///
/// Output order matches the mesh's triangle order.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn color_triangles(mesh: &Mesh, image: &RgbaImage) -> Vec<ColoredTriangle> {
    mesh.iter_corners()
        .map(|vertices| {
            let c = centroid(vertices);
            ColoredTriangle {
                vertices,
                color: triangle_color(image, vertices),
                centroid: (c.x.round() as i64, c.y.round() as i64),
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::PointSet;

    fn tri(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> [Point; 3] {
        [Point::new(a.0, a.1), Point::new(b.0, b.1), Point::new(c.0, c.1)]
    }

    #[test]
    fn samples_are_inside_the_triangle() {
        let corners = tri((0.0, 0.0), (30.0, 0.0), (0.0, 30.0));
        let samples = sample_points(corners);
        assert_eq!(samples[0], Point::new(10.0, 10.0));
        assert_eq!(samples[0], samples[4]);
        // Midpoint of ab is (15, 0); halfway to c = (0, 30) gives (7.5, 15).
        assert_eq!(samples[1], Point::new(7.5, 15.0));
        for p in samples {
            assert!(p.x > 0.0 && p.y > 0.0 && p.x + p.y < 30.0, "{p:?}");
        }
    }

    #[test]
    fn pixel_lookup_floors_and_clamps() {
        let img = RgbaImage::from_fn(4, 4, |x, y| {
            image::Rgba([u8::try_from(x * 10 + y).unwrap(), 0, 0, 255])
        });
        assert_eq!(pixel_at(&img, Point::new(1.9, 2.9)).0[0], 12);
        assert_eq!(pixel_at(&img, Point::new(-5.0, 100.0)).0[0], 3);
        assert_eq!(pixel_at(&img, Point::new(4.0, 4.0)).0[0], 33);
        assert_eq!(pixel_at(&RgbaImage::new(0, 0), Point::new(0.0, 0.0)), Rgb::BLACK);
    }

    #[test]
    fn median_rejects_single_outlier() {
        let c = Rgb([100, 50, 25]);
        let out = median([c, c, Rgb([255, 255, 255]), c, Rgb([90, 40, 20])]);
        assert_eq!(out, c);
    }

    #[test]
    fn median_is_per_channel() {
        let out = median([
            Rgb([1, 9, 5]),
            Rgb([2, 8, 5]),
            Rgb([3, 7, 5]),
            Rgb([4, 6, 5]),
            Rgb([5, 5, 5]),
        ]);
        assert_eq!(out, Rgb([3, 7, 5]));
    }

    #[test]
    fn uniform_image_colors_every_triangle_the_same() {
        let img = RgbaImage::from_pixel(100, 100, image::Rgba([12, 200, 99, 255]));
        let points: PointSet = [(0.0, 0.0), (99.0, 0.0), (0.0, 99.0), (99.0, 99.0), (40.0, 60.0)]
            .into_iter()
            .map(|(x, y)| Point::new(x, y))
            .collect();
        let mesh = Mesh::triangulate(points).unwrap();
        let colored = color_triangles(&mesh, &img);
        assert_eq!(colored.len(), mesh.len());
        assert!(colored.iter().all(|t| t.color == Rgb([12, 200, 99])));
    }

    #[test]
    fn colored_triangles_keep_vertices_and_round_centroid() {
        let img = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        let points: PointSet = [(0.0, 0.0), (4.0, 0.0), (0.0, 4.0)]
            .into_iter()
            .map(|(x, y)| Point::new(x, y))
            .collect();
        let mesh = Mesh::triangulate(points).unwrap();
        let colored = color_triangles(&mesh, &img);
        assert_eq!(colored.len(), 1);
        let t = colored[0];
        assert_eq!(t.color, Rgb([255, 0, 0]));
        // Centroid (1.33, 1.33).
        assert_eq!(t.centroid, (1, 1));
        assert_eq!(mesh.corners(mesh.triangles()[0]), t.vertices);
    }
}
