//! Frame-number index over annotated regions.

use std::collections::{BTreeMap, BTreeSet};

use crate::region::{Region, ShapeKind};

/// Regions grouped by frame number.
///
/// Within a frame, regions keep document order. The index is built once and
/// only read afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationIndex {
    frames: BTreeMap<u64, Vec<Region>>,
}

/// Aggregate counts over an index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationSummary {
    pub tracks: usize,
    pub frames: usize,
    pub regions: usize,
    pub boxes: usize,
    pub ellipses: usize,
    pub polygons: usize,
    pub occluded: usize,
    pub outside: usize,
    pub first_frame: Option<u64>,
    pub last_frame: Option<u64>,
}

impl AnnotationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a region after any already indexed for its frame.
    pub fn push(&mut self, region: Region) {
        self.frames.entry(region.frame).or_default().push(region);
    }

    /// Regions for a frame, in document order. Empty when unannotated.
    pub fn regions_at(&self, frame: u64) -> &[Region] {
        self.frames.get(&frame).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct annotated frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn region_count(&self) -> usize {
        self.frames.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Lowest and highest annotated frame numbers.
    pub fn frame_range(&self) -> Option<(u64, u64)> {
        let first = *self.frames.keys().next()?;
        let last = *self.frames.keys().next_back()?;
        Some((first, last))
    }

    /// Iterate `(frame, regions)` in ascending frame order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[Region])> {
        self.frames.iter().map(|(f, r)| (*f, r.as_slice()))
    }

    pub fn summary(&self) -> AnnotationSummary {
        let mut summary = AnnotationSummary {
            frames: self.frame_count(),
            ..Default::default()
        };
        if let Some((first, last)) = self.frame_range() {
            summary.first_frame = Some(first);
            summary.last_frame = Some(last);
        }

        let mut tracks = BTreeSet::new();
        for region in self.frames.values().flatten() {
            summary.regions += 1;
            match region.kind() {
                ShapeKind::Box => summary.boxes += 1,
                ShapeKind::Ellipse => summary.ellipses += 1,
                ShapeKind::Polygon => summary.polygons += 1,
            }
            if region.occluded {
                summary.occluded += 1;
            }
            if region.outside {
                summary.outside += 1;
            }
            if let Some(id) = region.track_id {
                tracks.insert(id);
            }
        }
        summary.tracks = tracks.len();
        summary
    }
}

impl FromIterator<Region> for AnnotationIndex {
    fn from_iter<T: IntoIterator<Item = Region>>(iter: T) -> Self {
        let mut index = Self::new();
        for region in iter {
            index.push(region);
        }
        index
    }
}
