//! SVG export of the finished mosaic.
//!
//! Each colored triangle becomes one closed `<path>`, built with the
//! [`svg`] crate. Paths are stroked in their own fill color at a hairline
//! width so that renderers do not show seams between neighbours.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Path, Title};
use svg::node::{Node, Text, Value};

use tessera_pipeline::{ColoredTriangle, Dimensions, Point};

/// Stroke width used to close seams between neighbouring triangles.
const SEAM_WIDTH: f64 = 0.5;

/// Optional document metadata.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Emitted as `<title>`.
    pub title: Option<&'a str>,
    /// Emitted as `<desc>`.
    pub description: Option<&'a str>,
    /// Serialized pipeline configuration, embedded in `<metadata>` so the
    /// file records how it was made.
    pub config_json: Option<&'a str>,
}

/// `d` attribute for one closed triangle.
#[must_use]
pub fn triangle_path_data(vertices: &[Point; 3]) -> String {
    let [a, b, c] = vertices;
    let data = Data::new()
        .move_to((a.x, a.y))
        .line_to((b.x, b.y))
        .line_to((c.x, c.y))
        .close();
    String::from(Value::from(data))
}

/// Serialize triangles (painted in order) into an SVG document sized to
/// `dimensions`.
#[must_use]
pub fn to_svg(
    triangles: &[ColoredTriangle],
    dimensions: Dimensions,
    metadata: &SvgMetadata<'_>,
) -> String {
    let Dimensions { width, height } = dimensions;
    let mut doc = Document::new()
        .set("width", width)
        .set("height", height)
        .set("viewBox", (0, 0, width, height));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }
    if let Some(config_json) = metadata.config_json {
        let mut pipeline_el = Element::new("tessera:pipeline");
        pipeline_el.assign("xmlns:tessera", "https://tessera-rs.github.io/ns/1");
        pipeline_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(pipeline_el);
        doc = doc.add(metadata_el);
    }

    for triangle in triangles {
        let color = triangle.color.to_hex();
        let path = Path::new()
            .set("d", triangle_path_data(&triangle.vertices))
            .set("fill", color.clone())
            .set("stroke", color)
            .set("stroke-width", SEAM_WIDTH)
            .set("stroke-linejoin", "round");
        doc = doc.add(path);
    }

    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
