//! vidredact Processing Core
//!
//! Per-frame redaction math:
//! - **Mask Rasterizer:** Turn a box, ellipse or polygon into a binary mask
//! - **Adaptive Blur:** Size a Gaussian kernel from the region and blur
//!   only the masked pixels
//!
//! This crate is pure computation. Frames come in as RGB buffers and go
//! out modified in place; no I/O happens here.

pub mod blur;
pub mod mask;

pub use blur::{AdaptiveBlur, BlurOutcome, GaussianKernel, KernelSizing};
pub use mask::{blank_mask, mask_bounds, rasterize, rasterize_into, PixelWindow};
