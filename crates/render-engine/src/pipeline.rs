//! Frame pipeline driver.
//!
//! Reads every frame from a source, blurs that frame's annotated regions in
//! document order, and writes every frame to the sink exactly once.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use vidredact_annotation_model::index::AnnotationIndex;
use vidredact_annotation_model::region::Region;
use vidredact_common::config::{AppConfig, MediaConfig};
use vidredact_common::error::RedactResult;
use vidredact_processing_core::blur::{AdaptiveBlur, BlurOutcome, KernelSizing};
use vidredact_processing_core::mask::blank_mask;

use crate::media::{FrameSink, FrameSource};

/// Everything a redaction run needs besides its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct RedactionSettings {
    pub sizing: KernelSizing,

    /// Skip regions flagged `outside` as well as occluded ones.
    pub skip_outside: bool,

    pub media: MediaConfig,
}

impl Default for RedactionSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for RedactionSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            sizing: KernelSizing::from(&config.blur),
            skip_outside: config.blur.skip_outside,
            media: config.media.clone(),
        }
    }
}

/// Counters for one processed video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoStats {
    pub frames_read: u64,
    pub frames_written: u64,
    pub regions_blurred: u64,

    /// Occluded regions, plus `outside` ones when those are skipped too.
    pub regions_skipped_occluded: u64,
    pub regions_skipped_degenerate: u64,
    pub elapsed: Duration,
}

/// Why a region was left alone before any blurring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    Occluded,
    Outside,
}

fn skip_reason(region: &Region, skip_outside: bool) -> Option<Skip> {
    if region.occluded {
        Some(Skip::Occluded)
    } else if skip_outside && region.outside {
        Some(Skip::Outside)
    } else {
        None
    }
}

/// Run one video through the redaction loop.
///
/// Stops at the first `None` from the source, then finishes the sink. The
/// caller owns both handles and releases them when they drop.
pub fn redact_stream(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    index: &AnnotationIndex,
    settings: &RedactionSettings,
) -> RedactResult<VideoStats> {
    let start = Instant::now();
    let blur = AdaptiveBlur::new(settings.sizing);
    let info = source.stream_info().clone();
    let mut mask = blank_mask(info.width, info.height);
    let mut stats = VideoStats::default();
    let mut frame_idx: u64 = 0;

    while let Some(mut frame) = source.next_frame()? {
        stats.frames_read += 1;

        for region in index.regions_at(frame_idx) {
            if let Some(reason) = skip_reason(region, settings.skip_outside) {
                stats.regions_skipped_occluded += 1;
                tracing::trace!(
                    frame = frame_idx,
                    track = ?region.track_id,
                    reason = ?reason,
                    "Region skipped"
                );
                continue;
            }

            match blur.apply(&mut frame, &region.shape, &mut mask) {
                BlurOutcome::Applied { kernel } => {
                    stats.regions_blurred += 1;
                    tracing::trace!(
                        frame = frame_idx,
                        shape = region.kind().as_str(),
                        kernel,
                        "Region blurred"
                    );
                }
                BlurOutcome::Degenerate => {
                    stats.regions_skipped_degenerate += 1;
                    tracing::debug!(
                        frame = frame_idx,
                        shape = region.kind().as_str(),
                        track = ?region.track_id,
                        "Skipping region with empty extent"
                    );
                }
            }
        }

        sink.write_frame(&frame)?;
        stats.frames_written += 1;
        frame_idx += 1;
    }

    sink.finish()?;
    stats.elapsed = start.elapsed();

    if let Some(expected) = info.frame_count {
        if expected != stats.frames_read {
            tracing::debug!(
                expected,
                actual = stats.frames_read,
                "Container frame count differs from frames decoded"
            );
        }
    }

    Ok(stats)
}
