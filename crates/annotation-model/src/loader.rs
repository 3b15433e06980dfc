//! CVAT-style annotation document loading.
//!
//! The document is XML with `track` elements, each containing `box`,
//! `ellipse` and `polygon` children:
//!
//! ```xml
//! <annotations>
//!   <track id="0" label="face">
//!     <box frame="0" occluded="0" xtl="10.5" ytl="10" xbr="50" ybr="50.9"/>
//!     <ellipse frame="1" occluded="0" cx="30" cy="30" rx="8" ry="5"/>
//!     <polygon frame="2" points="10,10;40,10;25,50"/>
//!   </track>
//! </annotations>
//! ```
//!
//! Geometry attributes are real numbers truncated toward zero.

use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::index::AnnotationIndex;
use crate::region::{Point, Region, Shape};

/// Errors that can occur while loading an annotation document.
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed annotation document: {source}")]
    Xml {
        #[from]
        source: roxmltree::Error,
    },

    #[error("<{element}> at line {line} is missing required attribute `{attribute}`")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
        line: u32,
    },

    #[error("<{element}> at line {line} has invalid `{attribute}` value {value:?}")]
    InvalidAttribute {
        element: String,
        attribute: &'static str,
        value: String,
        line: u32,
    },

    #[error("<polygon> at line {line} has malformed points {value:?}")]
    InvalidPoints { value: String, line: u32 },
}

impl AnnotationError {
    /// Whether the document itself does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AnnotationError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Read and parse an annotation file.
pub fn load_annotations(path: impl AsRef<Path>) -> Result<AnnotationIndex, AnnotationError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| AnnotationError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_annotations(&content)
}

/// Parse annotation XML into a frame index.
///
/// Every `track` descendant of the root is visited in document order, and
/// every shape element inside it is indexed in document order.
pub fn parse_annotations(xml: &str) -> Result<AnnotationIndex, AnnotationError> {
    let doc = Document::parse(xml)?;
    let mut index = AnnotationIndex::new();

    for track in doc.descendants().filter(|n| n.has_tag_name("track")) {
        let track_id = track.attribute("id").and_then(|v| v.trim().parse().ok());
        let label = track.attribute("label").map(str::to_string);

        for node in track.descendants().filter(Node::is_element) {
            let shape = match node.tag_name().name() {
                "box" => parse_box(&doc, node)?,
                "ellipse" => parse_ellipse(&doc, node)?,
                "polygon" => parse_polygon(&doc, node)?,
                _ => continue,
            };

            let frame = required_int(&doc, node, "frame")?;
            let frame = u64::try_from(frame).map_err(|_| invalid(&doc, node, "frame"))?;
            let occluded = match node.tag_name().name() {
                "polygon" => optional_int(&doc, node, "occluded")?.unwrap_or(0),
                _ => required_int(&doc, node, "occluded")?,
            };
            let outside = optional_int(&doc, node, "outside")?.unwrap_or(0);

            index.push(Region {
                frame,
                occluded: occluded == 1,
                outside: outside == 1,
                track_id,
                label: label.clone(),
                shape,
            });
        }
    }

    Ok(index)
}

fn parse_box(doc: &Document, node: Node) -> Result<Shape, AnnotationError> {
    Ok(Shape::Box {
        x1: required_real(doc, node, "xtl")? as i32,
        y1: required_real(doc, node, "ytl")? as i32,
        x2: required_real(doc, node, "xbr")? as i32,
        y2: required_real(doc, node, "ybr")? as i32,
    })
}

fn parse_ellipse(doc: &Document, node: Node) -> Result<Shape, AnnotationError> {
    Ok(Shape::Ellipse {
        cx: required_real(doc, node, "cx")?,
        cy: required_real(doc, node, "cy")?,
        rx: required_real(doc, node, "rx")?,
        ry: required_real(doc, node, "ry")?,
    })
}

fn parse_polygon(doc: &Document, node: Node) -> Result<Shape, AnnotationError> {
    let raw = required_attr(doc, node, "points")?;
    let points = parse_points(raw).ok_or_else(|| AnnotationError::InvalidPoints {
        value: raw.to_string(),
        line: line_of(doc, node),
    })?;
    Ok(Shape::Polygon { points })
}

/// Parse `"x1,y1;x2,y2;..."`, ignoring empty segments.
pub fn parse_points(raw: &str) -> Option<Vec<Point>> {
    raw.split(';')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let (x, y) = segment.split_once(',')?;
            let x = parse_real(x)?;
            let y = parse_real(y)?;
            Some(Point::new(x as i32, y as i32))
        })
        .collect()
}

fn parse_real(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn required_attr<'a>(
    doc: &Document,
    node: Node<'a, '_>,
    attribute: &'static str,
) -> Result<&'a str, AnnotationError> {
    node.attribute(attribute)
        .ok_or_else(|| AnnotationError::MissingAttribute {
            element: node.tag_name().name().to_string(),
            attribute,
            line: line_of(doc, node),
        })
}

fn required_real(
    doc: &Document,
    node: Node,
    attribute: &'static str,
) -> Result<f64, AnnotationError> {
    let raw = required_attr(doc, node, attribute)?;
    parse_real(raw).ok_or_else(|| invalid(doc, node, attribute))
}

fn required_int(
    doc: &Document,
    node: Node,
    attribute: &'static str,
) -> Result<i64, AnnotationError> {
    let raw = required_attr(doc, node, attribute)?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| invalid(doc, node, attribute))
}

fn optional_int(
    doc: &Document,
    node: Node,
    attribute: &'static str,
) -> Result<Option<i64>, AnnotationError> {
    match node.attribute(attribute) {
        None => Ok(None),
        Some(_) => required_int(doc, node, attribute).map(Some),
    }
}

fn invalid(doc: &Document, node: Node, attribute: &'static str) -> AnnotationError {
    AnnotationError::InvalidAttribute {
        element: node.tag_name().name().to_string(),
        attribute,
        value: node.attribute(attribute).unwrap_or_default().to_string(),
        line: line_of(doc, node),
    }
}

fn line_of(doc: &Document, node: Node) -> u32 {
    doc.text_pos_at(node.range().start).row
}
