//! vidredact Render Engine
//!
//! Offline redaction pipeline that decodes source video, blurs annotated
//! regions frame by frame, and re-encodes the result.
//!
//! # Pipeline Architecture
//!
//! ```text
//! input.mp4 ──► ffmpeg decode (rgb24) ──┐
//!                                       ├── per-frame regions ── Adaptive Blur
//! annotations.xml ──► AnnotationIndex ──┘                            │
//!                                                                    ▼
//!                                                  ffmpeg encode (same size/rate)
//!                                                                    │
//!                                                                    ▼
//!                                                               output.mp4
//! ```
//!
//! Batches of `(input, output, annotation)` triplets run one after another;
//! a failing triplet is recorded in the [`BatchReport`] and never stops the
//! rest.

pub mod batch;
pub mod media;
pub mod pipeline;

pub use batch::*;
pub use media::*;
pub use pipeline::*;
