//! Region geometry for annotated redaction areas.
//!
//! Coordinates are in source-frame pixels, `(0, 0)` top-left.

/// An integer pixel vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// The closed set of annotation shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Axis-aligned box given by its top-left and bottom-right corners.
    Box { x1: i32, y1: i32, x2: i32, y2: i32 },

    /// Axis-aligned ellipse given by center and semi-axes.
    Ellipse { cx: f64, cy: f64, rx: f64, ry: f64 },

    /// Closed polygon. Vertex order defines the fill boundary.
    Polygon { points: Vec<Point> },
}

/// Which variant a [`Shape`] is, without its geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Box,
    Ellipse,
    Polygon,
}

impl ShapeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ShapeKind::Box => "box",
            ShapeKind::Ellipse => "ellipse",
            ShapeKind::Polygon => "polygon",
        }
    }
}

/// Width and height of the smallest axis-aligned box enclosing a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub w: f64,
    pub h: f64,
}

impl Extent {
    /// A region with no positive area contributes nothing.
    pub fn is_degenerate(&self) -> bool {
        !(self.w > 0.0 && self.h > 0.0)
    }

    /// The larger of the two dimensions.
    pub fn max_side(&self) -> f64 {
        self.w.max(self.h)
    }
}

/// Box corners after clamping into `[0, width-1] x [0, height-1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClampedBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl ClampedBox {
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Box { .. } => ShapeKind::Box,
            Shape::Ellipse { .. } => ShapeKind::Ellipse,
            Shape::Polygon { .. } => ShapeKind::Polygon,
        }
    }

    /// Distinct polygon vertices in ring order: trailing vertices equal to
    /// the first are dropped. Empty for other shapes.
    pub fn polygon_vertices(&self) -> &[Point] {
        let Shape::Polygon { points } = self else {
            return &[];
        };
        let mut end = points.len();
        while end > 1 && points[end - 1] == points[0] {
            end -= 1;
        }
        &points[..end]
    }

    /// Bounding extent within a `width x height` frame.
    ///
    /// Only boxes are clamped to the frame; ellipse and polygon extents are
    /// measured from their raw coordinates. Polygons with fewer than three
    /// vertices, not counting a closing repeat of the first, have a zero
    /// extent.
    pub fn extent(&self, width: u32, height: u32) -> Extent {
        match self {
            Shape::Box { .. } => {
                let clamped = self
                    .clamped_box(width, height)
                    .unwrap_or(ClampedBox {
                        x1: 0,
                        y1: 0,
                        x2: 0,
                        y2: 0,
                    });
                Extent {
                    w: clamped.x2 as f64 - clamped.x1 as f64,
                    h: clamped.y2 as f64 - clamped.y1 as f64,
                }
            }
            Shape::Ellipse { rx, ry, .. } => Extent {
                w: 2.0 * rx,
                h: 2.0 * ry,
            },
            Shape::Polygon { .. } => {
                let points = self.polygon_vertices();
                if points.len() < 3 {
                    return Extent { w: 0.0, h: 0.0 };
                }
                let (mut min_x, mut max_x) = (i64::MAX, i64::MIN);
                let (mut min_y, mut max_y) = (i64::MAX, i64::MIN);
                for p in points {
                    min_x = min_x.min(p.x as i64);
                    max_x = max_x.max(p.x as i64);
                    min_y = min_y.min(p.y as i64);
                    max_y = max_y.max(p.y as i64);
                }
                Extent {
                    w: (max_x - min_x) as f64,
                    h: (max_y - min_y) as f64,
                }
            }
        }
    }

    /// Clamp box corners into the frame. `None` for non-box shapes and for
    /// empty frames.
    ///
    /// Corners are clamped independently, so an inverted box stays inverted
    /// and reports a non-positive extent.
    pub fn clamped_box(&self, width: u32, height: u32) -> Option<ClampedBox> {
        let Shape::Box { x1, y1, x2, y2 } = *self else {
            return None;
        };
        if width == 0 || height == 0 {
            return None;
        }
        let max_x = (width - 1) as i64;
        let max_y = (height - 1) as i64;
        let cx = |v: i32| (v as i64).clamp(0, max_x) as u32;
        let cy = |v: i32| (v as i64).clamp(0, max_y) as u32;
        Some(ClampedBox {
            x1: cx(x1),
            y1: cy(y1),
            x2: cx(x2),
            y2: cy(y2),
        })
    }
}

/// One annotated region on one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Zero-based frame number the region applies to.
    pub frame: u64,

    /// Region is hidden behind something else; never redacted.
    pub occluded: bool,

    /// Tracked object has left the frame (CVAT `outside`).
    pub outside: bool,

    /// `id` of the enclosing track, if present.
    pub track_id: Option<u32>,

    /// `label` of the enclosing track, if present.
    pub label: Option<String>,

    pub shape: Shape,
}

impl Region {
    /// Create an unoccluded, untracked region.
    pub fn new(frame: u64, shape: Shape) -> Self {
        Self {
            frame,
            occluded: false,
            outside: false,
            track_id: None,
            label: None,
            shape,
        }
    }

    pub fn with_occluded(mut self, occluded: bool) -> Self {
        self.occluded = occluded;
        self
    }

    pub fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }

    pub fn extent(&self, width: u32, height: u32) -> Extent {
        self.shape.extent(width, height)
    }
}
