//! Adaptive Gaussian blur driven by region size.
//!
//! Each surviving region gets its own kernel, sized from the region's
//! bounding extent, and is blurred against the frame as it stands when the
//! region is reached. Earlier regions on the same frame therefore feed into
//! later ones.
//!
//! The blurred copy is only computed over the mask's bounding window. Border
//! handling always refers to the full frame (reflect-101), so every pixel the
//! mask selects is identical to the same pixel of a whole-frame blur.

use image::{GrayImage, RgbImage};

use vidredact_annotation_model::region::{Extent, Shape};
use vidredact_common::config::BlurConfig;

use crate::mask::{blank_mask, mask_bounds, rasterize_into, PixelWindow, MASK_ON};

/// Kernel sizing rule: `floor(ratio * max(w, h))`, bumped to odd.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelSizing {
    pub ratio: f64,
    pub min_kernel: u32,
}

impl Default for KernelSizing {
    fn default() -> Self {
        Self {
            ratio: 0.35,
            min_kernel: 1,
        }
    }
}

impl From<&BlurConfig> for KernelSizing {
    fn from(config: &BlurConfig) -> Self {
        Self {
            ratio: config.kernel_ratio,
            min_kernel: config.min_kernel,
        }
    }
}

impl KernelSizing {
    /// Odd kernel side for a region, or `None` when the extent is degenerate.
    pub fn kernel_for(&self, extent: Extent) -> Option<u32> {
        if extent.is_degenerate() {
            return None;
        }
        let raw = (self.ratio * extent.max_side()).floor();
        let k = if raw.is_finite() && raw > 0.0 {
            raw.min((u32::MAX - 1) as f64) as u32
        } else {
            0
        };
        Some(make_odd(k).max(make_odd(self.min_kernel)))
    }
}

fn make_odd(k: u32) -> u32 {
    if k % 2 == 0 {
        k + 1
    } else {
        k
    }
}

/// A `size x size` Gaussian kernel. Weights are evaluated on demand, so
/// kernels far wider than the frame cost no extra memory.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKernel {
    size: u32,
    sigma: f64,
}

impl GaussianKernel {
    /// Build a kernel of odd `size` (even sizes are bumped, zero becomes 1).
    /// Sigma is derived from the size.
    pub fn new(size: u32) -> Self {
        let size = make_odd(size).max(1);
        Self {
            size,
            sigma: Self::sigma_for(size),
        }
    }

    /// Blur strength for a kernel side: `0.3 * ((size - 1) / 2 - 1) + 0.8`.
    ///
    /// OpenCV swaps in fixed tables for sizes up to 7; this uses the formula
    /// for every size.
    pub fn sigma_for(size: u32) -> f64 {
        0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn radius(&self) -> u32 {
        self.size / 2
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Unnormalized weight at offset `d` from the center.
    fn raw_weight(&self, d: i64) -> f64 {
        let d = d as f64;
        (-0.5 * d * d / (self.sigma * self.sigma)).exp()
    }

    /// All `size` normalized weights, left to right.
    pub fn weights(&self) -> Vec<f64> {
        let radius = self.radius() as i64;
        let raw: Vec<f64> = (-radius..=radius).map(|d| self.raw_weight(d)).collect();
        let sum: f64 = raw.iter().sum();
        raw.into_iter().map(|w| w / sum).collect()
    }
}

/// Reflect-101 border index (`gfedcb|abcdefgh|gfedcba`).
fn reflect_101(i: i64, n: usize) -> usize {
    let n = n as i64;
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let m = i.rem_euclid(period);
    (if m >= n { period - m } else { m }) as usize
}

/// Kernel weights folded onto the `n` samples of one axis.
///
/// Reflect-101 is periodic with period `2 * (n - 1)`, so every tap lands on
/// one residue class. Summing the weights per class once lets each output
/// sample read at most `n` source samples whatever the kernel size.
struct FoldedKernel {
    n: usize,
    residues: Vec<f64>,
}

impl FoldedKernel {
    fn new(kernel: &GaussianKernel, n: usize) -> Self {
        let period = if n <= 1 { 1 } else { 2 * (n - 1) };
        let p = period as i64;
        let mut residues = vec![0f64; period];
        let mut total = 0.0;
        for t in 0..=kernel.radius() as i64 {
            let w = kernel.raw_weight(t);
            residues[t.rem_euclid(p) as usize] += w;
            total += w;
            if t > 0 {
                residues[(-t).rem_euclid(p) as usize] += w;
                total += w;
            }
        }
        for value in &mut residues {
            *value /= total;
        }
        Self { n, residues }
    }

    /// Weight of source sample `src` in output sample `x`.
    fn weight(&self, x: usize, src: usize) -> f64 {
        if self.n <= 1 {
            return self.residues[0];
        }
        let period = self.residues.len() as i64;
        let (x, src) = (x as i64, src as i64);
        let direct = self.residues[(src - x).rem_euclid(period) as usize];
        if src == 0 || src == self.n as i64 - 1 {
            direct
        } else {
            direct + self.residues[(-src - x).rem_euclid(period) as usize]
        }
    }

    /// Source samples feeding output sample `x`, with their weights.
    fn taps(&self, x: usize, radius: u32) -> Vec<(usize, f32)> {
        let span = 2 * radius as usize + 1;
        let sources: Vec<usize> = if span < self.residues.len() {
            let r = radius as i64;
            let mut reached: Vec<usize> = (-r..=r)
                .map(|t| reflect_101(x as i64 + t, self.n))
                .collect();
            reached.sort_unstable();
            reached.dedup();
            reached
        } else {
            (0..self.n).collect()
        };
        sources
            .into_iter()
            .filter_map(|src| {
                let w = self.weight(x, src);
                (w > 0.0).then_some((src, w as f32))
            })
            .collect()
    }
}

/// Blur the whole frame.
pub fn gaussian_blur(frame: &RgbImage, kernel: &GaussianKernel) -> RgbImage {
    let (width, height) = frame.dimensions();
    gaussian_blur_window(frame, kernel, PixelWindow::full(width, height))
}

/// Blur `frame` and return only `window` of the result.
///
/// Samples outside the window come from the full frame, so the output equals
/// the matching crop of [`gaussian_blur`].
pub fn gaussian_blur_window(
    frame: &RgbImage,
    kernel: &GaussianKernel,
    window: PixelWindow,
) -> RgbImage {
    let (width, height) = frame.dimensions();
    let mut out = RgbImage::new(window.width, window.height);
    if window.is_empty() || width == 0 || height == 0 {
        return out;
    }

    let radius = kernel.radius();
    let src = frame.as_raw();
    let stride = width as usize * 3;

    let horizontal_fold = FoldedKernel::new(kernel, width as usize);
    let vertical_fold = FoldedKernel::new(kernel, height as usize);

    let col_taps: Vec<Vec<(usize, f32)>> = (window.x..window.right())
        .map(|x| horizontal_fold.taps(x as usize, radius))
        .collect();
    let row_taps: Vec<Vec<(usize, f32)>> = (window.y..window.bottom())
        .map(|y| vertical_fold.taps(y as usize, radius))
        .collect();

    // Source rows the vertical pass will touch.
    let lo = row_taps.iter().flatten().map(|&(row, _)| row).min().unwrap_or(0);
    let hi = row_taps.iter().flatten().map(|&(row, _)| row).max().unwrap_or(0);

    // Horizontal pass over those rows, restricted to the window's columns.
    let cols = window.width as usize;
    let mut horizontal = vec![0f32; (hi - lo + 1) * cols * 3];
    for row in lo..=hi {
        let src_row = &src[row * stride..(row + 1) * stride];
        let dst_row = &mut horizontal[(row - lo) * cols * 3..(row - lo + 1) * cols * 3];
        for (c, taps) in col_taps.iter().enumerate() {
            let mut acc = [0f32; 3];
            for &(x, w) in taps {
                let offset = x * 3;
                acc[0] += w * src_row[offset] as f32;
                acc[1] += w * src_row[offset + 1] as f32;
                acc[2] += w * src_row[offset + 2] as f32;
            }
            dst_row[c * 3..c * 3 + 3].copy_from_slice(&acc);
        }
    }

    // Vertical pass.
    let out_buf: &mut [u8] = &mut out;
    for (r, taps) in row_taps.iter().enumerate() {
        for c in 0..cols {
            let mut acc = [0f32; 3];
            for &(row, w) in taps {
                let base = ((row - lo) * cols + c) * 3;
                acc[0] += w * horizontal[base];
                acc[1] += w * horizontal[base + 1];
                acc[2] += w * horizontal[base + 2];
            }
            let base = (r * cols + c) * 3;
            for ch in 0..3 {
                out_buf[base + ch] = acc[ch].round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    out
}

/// Copy blurred pixels into `frame` wherever `mask` is on.
///
/// `blurred` covers exactly `window`; mask pixels outside the window are
/// ignored.
pub fn composite(frame: &mut RgbImage, blurred: &RgbImage, window: PixelWindow, mask: &GrayImage) {
    for y in window.y..window.bottom() {
        for x in window.x..window.right() {
            if mask.get_pixel(x, y)[0] == MASK_ON {
                let pixel = *blurred.get_pixel(x - window.x, y - window.y);
                frame.put_pixel(x, y, pixel);
            }
        }
    }
}

/// What happened to one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurOutcome {
    /// The region was blurred with a `kernel x kernel` Gaussian.
    Applied { kernel: u32 },

    /// Non-positive bounding extent; nothing was done.
    Degenerate,
}

/// Per-region blur engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveBlur {
    sizing: KernelSizing,
}

impl AdaptiveBlur {
    pub fn new(sizing: KernelSizing) -> Self {
        Self { sizing }
    }

    pub fn sizing(&self) -> KernelSizing {
        self.sizing
    }

    /// Kernel side for `shape` on a `width x height` frame. `None` when the
    /// region would be skipped.
    pub fn kernel_for(&self, shape: &Shape, width: u32, height: u32) -> Option<u32> {
        self.sizing.kernel_for(shape.extent(width, height))
    }

    /// Blur one region of `frame` in place.
    ///
    /// `mask` is scratch space; it is resized to the frame if needed, then
    /// cleared and redrawn for this region.
    pub fn apply(&self, frame: &mut RgbImage, shape: &Shape, mask: &mut GrayImage) -> BlurOutcome {
        let (width, height) = frame.dimensions();
        let Some(kernel_size) = self.kernel_for(shape, width, height) else {
            return BlurOutcome::Degenerate;
        };

        if mask.dimensions() != (width, height) {
            *mask = blank_mask(width, height);
        }
        rasterize_into(shape, mask);
        if let Some(window) = mask_bounds(mask) {
            let kernel = GaussianKernel::new(kernel_size);
            let blurred = gaussian_blur_window(frame, &kernel, window);
            composite(frame, &blurred, window, mask);
        }

        BlurOutcome::Applied {
            kernel: kernel_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::rasterize;
    use image::Rgb;
    use vidredact_annotation_model::region::Point;

    fn gradient_frame(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                ((x * 7 + y * 3) % 256) as u8,
                ((x * x + y) % 256) as u8,
                if (x / 4 + y / 4) % 2 == 0 { 255 } else { 0 },
            ])
        })
    }

    #[test]
    fn test_kernel_for_triangle_extent() {
        let sizing = KernelSizing::default();
        assert_eq!(sizing.kernel_for(Extent { w: 30.0, h: 40.0 }), Some(15));
    }

    #[test]
    fn test_kernel_even_is_bumped_and_small_is_one() {
        let sizing = KernelSizing::default();
        // floor(0.35 * 40) = 14 -> 15; floor(0.35 * 20) = 7 stays.
        assert_eq!(sizing.kernel_for(Extent { w: 40.0, h: 1.0 }), Some(15));
        assert_eq!(sizing.kernel_for(Extent { w: 20.0, h: 20.0 }), Some(7));
        assert_eq!(sizing.kernel_for(Extent { w: 1.0, h: 1.0 }), Some(1));
        assert_eq!(sizing.kernel_for(Extent { w: 0.5, h: 0.5 }), Some(1));
    }

    #[test]
    fn test_kernel_respects_min_kernel() {
        let sizing = KernelSizing {
            ratio: 0.35,
            min_kernel: 8,
        };
        assert_eq!(sizing.kernel_for(Extent { w: 2.0, h: 2.0 }), Some(9));
    }

    #[test]
    fn test_degenerate_extent_has_no_kernel() {
        let sizing = KernelSizing::default();
        assert_eq!(sizing.kernel_for(Extent { w: 0.0, h: 10.0 }), None);
        assert_eq!(sizing.kernel_for(Extent { w: 10.0, h: -2.0 }), None);
    }

    #[test]
    fn test_gaussian_weights_are_normalized_and_symmetric() {
        for size in [1, 3, 5, 15, 51] {
            let kernel = GaussianKernel::new(size);
            let w = kernel.weights();
            assert_eq!(w.len(), size as usize);
            let sum: f64 = w.iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
            for i in 0..w.len() / 2 {
                assert!((w[i] - w[w.len() - 1 - i]).abs() < 1e-15);
            }
        }
        assert_eq!(GaussianKernel::new(4).size(), 5);
        assert_eq!(GaussianKernel::new(0).size(), 1);
    }

    #[test]
    fn test_sigma_matches_size_rule() {
        assert!((GaussianKernel::sigma_for(3) - 0.8).abs() < 1e-12);
        assert!((GaussianKernel::sigma_for(15) - 2.6).abs() < 1e-12);
    }

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-4, 5), 4);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(12, 5), 4);
        assert_eq!(reflect_101(-3, 1), 0);
    }

    #[test]
    fn test_kernel_one_is_identity() {
        let frame = gradient_frame(17, 11);
        let blurred = gaussian_blur(&frame, &GaussianKernel::new(1));
        assert_eq!(blurred, frame);
    }

    #[test]
    fn test_uniform_frame_stays_uniform() {
        let frame = RgbImage::from_pixel(20, 20, Rgb([90, 10, 200]));
        let blurred = gaussian_blur(&frame, &GaussianKernel::new(9));
        assert_eq!(blurred, frame);
    }

    #[test]
    fn test_window_blur_matches_full_blur() {
        let frame = gradient_frame(40, 30);
        let kernel = GaussianKernel::new(11);
        let full = gaussian_blur(&frame, &kernel);
        let window = PixelWindow {
            x: 3,
            y: 20,
            width: 30,
            height: 10,
        };
        let part = gaussian_blur_window(&frame, &kernel, window);
        for (x, y, pixel) in part.enumerate_pixels() {
            assert_eq!(pixel, full.get_pixel(x + window.x, y + window.y));
        }
    }

    #[test]
    fn test_kernel_wider_than_frame() {
        let frame = gradient_frame(6, 4);
        let kernel = GaussianKernel::new(31);
        let full = gaussian_blur(&frame, &kernel);
        assert_eq!(full.dimensions(), (6, 4));
    }

    #[test]
    fn test_composite_only_touches_mask() {
        let mut frame = gradient_frame(32, 32);
        let original = frame.clone();
        let shape = Shape::Box {
            x1: 8,
            y1: 8,
            x2: 16,
            y2: 16,
        };
        let mask = rasterize(&shape, 32, 32);
        let window = mask_bounds(&mask).unwrap();
        let blurred = gaussian_blur_window(&frame, &GaussianKernel::new(5), window);
        composite(&mut frame, &blurred, window, &mask);

        for (x, y, pixel) in frame.enumerate_pixels() {
            if !(8..16).contains(&x) || !(8..16).contains(&y) {
                assert_eq!(pixel, original.get_pixel(x, y));
            }
        }
        assert_ne!(frame, original);
    }

    #[test]
    fn test_composite_is_idempotent() {
        let mut frame = gradient_frame(32, 32);
        let shape = Shape::Ellipse {
            cx: 16.0,
            cy: 16.0,
            rx: 9.0,
            ry: 5.0,
        };
        let mask = rasterize(&shape, 32, 32);
        let window = mask_bounds(&mask).unwrap();
        let blurred = gaussian_blur_window(&frame, &GaussianKernel::new(7), window);

        composite(&mut frame, &blurred, window, &mask);
        let once = frame.clone();
        composite(&mut frame, &blurred, window, &mask);
        assert_eq!(frame, once);
    }

    #[test]
    fn test_apply_degenerate_ellipse_is_noop() {
        let mut frame = gradient_frame(20, 20);
        let original = frame.clone();
        let mut mask = blank_mask(20, 20);
        let outcome = AdaptiveBlur::default().apply(
            &mut frame,
            &Shape::Ellipse {
                cx: 10.0,
                cy: 10.0,
                rx: 0.0,
                ry: 0.0,
            },
            &mut mask,
        );
        assert_eq!(outcome, BlurOutcome::Degenerate);
        assert_eq!(frame, original);
    }

    #[test]
    fn test_apply_polygon_reports_kernel() {
        let mut frame = gradient_frame(64, 64);
        let mut mask = blank_mask(64, 64);
        let triangle = Shape::Polygon {
            points: vec![Point::new(10, 10), Point::new(40, 10), Point::new(25, 50)],
        };
        let outcome = AdaptiveBlur::default().apply(&mut frame, &triangle, &mut mask);
        assert_eq!(outcome, BlurOutcome::Applied { kernel: 15 });
    }

    #[test]
    fn test_apply_matches_whole_frame_reference() {
        let mut frame = gradient_frame(48, 36);
        let reference_src = frame.clone();
        let shape = Shape::Box {
            x1: 5,
            y1: 4,
            x2: 30,
            y2: 20,
        };
        let mut mask = blank_mask(48, 36);
        let outcome = AdaptiveBlur::default().apply(&mut frame, &shape, &mut mask);
        let BlurOutcome::Applied { kernel } = outcome else {
            panic!("box should be blurred");
        };
        assert_eq!(kernel, 9);

        let full = gaussian_blur(&reference_src, &GaussianKernel::new(kernel));
        let mut expected = reference_src.clone();
        for (x, y, pixel) in expected.enumerate_pixels_mut() {
            if (5..30).contains(&x) && (4..20).contains(&y) {
                *pixel = *full.get_pixel(x, y);
            }
        }
        assert_eq!(frame, expected);
    }

    #[test]
    fn test_folded_weights_match_reflected_taps() {
        for (size, n) in [(5, 9), (31, 6), (71, 10), (9, 2), (7, 1)] {
            let kernel = GaussianKernel::new(size);
            let folded = FoldedKernel::new(&kernel, n);
            let weights = kernel.weights();
            let r = kernel.radius() as i64;
            for x in 0..n {
                let mut expected = vec![0f64; n];
                for t in -r..=r {
                    expected[reflect_101(x as i64 + t, n)] += weights[(t + r) as usize];
                }
                for (src, want) in expected.iter().enumerate() {
                    assert!((folded.weight(x, src) - want).abs() < 1e-12);
                }
                let taps = folded.taps(x, kernel.radius());
                assert!(taps.len() <= n);
                let total: f32 = taps.iter().map(|&(_, w)| w).sum();
                assert!((total - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_huge_kernel_on_small_frame() {
        let frame = RgbImage::from_pixel(8, 6, Rgb([40, 120, 250]));
        let blurred = gaussian_blur(&frame, &GaussianKernel::new(2_000_001));
        assert_eq!(blurred, frame);
    }

    #[test]
    fn test_kernel_is_not_capped_to_frame() {
        let src = gradient_frame(10, 8);
        let shape = Shape::Ellipse {
            cx: 5.0,
            cy: 4.0,
            rx: 100.0,
            ry: 100.0,
        };
        let blur = AdaptiveBlur::default();
        assert_eq!(blur.kernel_for(&shape, 10, 8), Some(71));

        let mut frame = src.clone();
        let mut mask = blank_mask(10, 8);
        assert_eq!(
            blur.apply(&mut frame, &shape, &mut mask),
            BlurOutcome::Applied { kernel: 71 }
        );

        // The ellipse covers the whole frame.
        assert_eq!(frame, gaussian_blur(&src, &GaussianKernel::new(71)));
        assert_ne!(frame, gaussian_blur(&src, &GaussianKernel::new(21)));
    }

    proptest::proptest! {
        #[test]
        fn prop_kernel_is_odd_and_positive(w in 0.001f64..5000.0, h in 0.001f64..5000.0, ratio in 0.01f64..2.0) {
            let sizing = KernelSizing { ratio, min_kernel: 1 };
            let k = sizing.kernel_for(Extent { w, h }).unwrap();
            proptest::prop_assert!(k >= 1);
            proptest::prop_assert_eq!(k % 2, 1);
        }

        #[test]
        fn prop_window_blur_matches_full_blur(
            x in 0u32..24, y in 0u32..16, ww in 1u32..24, wh in 1u32..16, size in 0u32..21,
        ) {
            let frame = gradient_frame(24, 16);
            let window = PixelWindow {
                x,
                y,
                width: ww.min(24 - x),
                height: wh.min(16 - y),
            };
            let kernel = GaussianKernel::new(size);
            let full = gaussian_blur(&frame, &kernel);
            let part = gaussian_blur_window(&frame, &kernel, window);
            for (px, py, pixel) in part.enumerate_pixels() {
                proptest::prop_assert_eq!(pixel, full.get_pixel(px + window.x, py + window.y));
            }
        }
    }
}
