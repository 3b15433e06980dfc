//! Binary mask rasterization for annotated shapes.
//!
//! Masks are single-channel buffers the size of a frame holding
//! [`MASK_OFF`] or [`MASK_ON`].

use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point as ProcPoint;
use imageproc::rect::Rect;

use vidredact_annotation_model::region::Shape;

pub const MASK_OFF: u8 = 0;
pub const MASK_ON: u8 = 255;

/// Half-open pixel rectangle `[x, x + width) x [y, y + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelWindow {
    /// The whole `width x height` frame.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// Allocate an all-off mask for a `width x height` frame.
pub fn blank_mask(width: u32, height: u32) -> GrayImage {
    GrayImage::new(width, height)
}

/// Clear `mask`, then fill the shape with [`MASK_ON`].
///
/// Boxes are filled half-open over their clamped corners. Ellipses are
/// filled around their rounded center and semi-axes, one row span at a time,
/// so the work is bounded by the frame whatever the radii. Polygons are
/// scan-filled in vertex order; a closing vertex equal to the first is
/// ignored and fewer than three vertices draws nothing. Anything outside the
/// frame is clipped.
pub fn rasterize_into(shape: &Shape, mask: &mut GrayImage) {
    clear(mask);
    let (width, height) = mask.dimensions();
    let on = Luma([MASK_ON]);

    match shape {
        Shape::Box { .. } => {
            let Some(clamped) = shape.clamped_box(width, height) else {
                return;
            };
            if clamped.width() == 0 || clamped.height() == 0 {
                return;
            }
            let rect = Rect::at(clamped.x1 as i32, clamped.y1 as i32)
                .of_size(clamped.width(), clamped.height());
            draw_filled_rect_mut(mask, rect, on);
        }
        Shape::Ellipse { cx, cy, rx, ry } => fill_ellipse(mask, *cx, *cy, *rx, *ry),
        Shape::Polygon { .. } => {
            let vertices: Vec<ProcPoint<i32>> = shape
                .polygon_vertices()
                .iter()
                .map(|p| ProcPoint::new(p.x, p.y))
                .collect();
            if vertices.len() < 3 {
                return;
            }
            draw_polygon_mut(mask, &vertices, on);
        }
    }
}

/// Rasterize a shape into a freshly allocated mask.
pub fn rasterize(shape: &Shape, width: u32, height: u32) -> GrayImage {
    let mut mask = blank_mask(width, height);
    rasterize_into(shape, &mut mask);
    mask
}

/// Smallest window containing every on pixel, or `None` for an empty mask.
pub fn mask_bounds(mask: &GrayImage) -> Option<PixelWindow> {
    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0u32, 0u32);
    let mut any = false;

    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] == MASK_ON {
            any = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    any.then(|| PixelWindow {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Number of on pixels.
pub fn coverage(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] == MASK_ON).count()
}

fn clear(mask: &mut GrayImage) {
    for pixel in mask.pixels_mut() {
        pixel[0] = MASK_OFF;
    }
}

/// Fill the pixels with `(dx / rx)^2 + (dy / ry)^2 <= 1` around the rounded
/// center, using rounded semi-axes. Only rows and columns inside the mask are
/// visited.
fn fill_ellipse(mask: &mut GrayImage, cx: f64, cy: f64, rx: f64, ry: f64) {
    if !(rx >= 0.0 && ry >= 0.0 && cx.is_finite() && cy.is_finite()) {
        return;
    }
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let (cx, cy) = (cx.round(), cy.round());
    let (rx, ry) = (rx.round(), ry.round());
    let max_x = (width - 1) as f64;
    let max_y = (height - 1) as f64;

    let top = (cy - ry).max(0.0);
    let bottom = (cy + ry).min(max_y);
    if top > bottom {
        return;
    }
    for y in top as u32..=bottom as u32 {
        let half = if ry == 0.0 {
            rx
        } else {
            let t = (y as f64 - cy) / ry;
            (rx * (1.0 - t * t).max(0.0).sqrt() + 1e-9).floor()
        };
        let left = (cx - half).max(0.0);
        let right = (cx + half).min(max_x);
        if left > right {
            continue;
        }
        for x in left as u32..=right as u32 {
            mask.put_pixel(x, y, Luma([MASK_ON]));
        }
    }
}
