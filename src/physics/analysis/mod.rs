// src/physics/analysis/mod.rs
pub mod boop;
pub mod facet_stats;
pub mod interstice;
pub mod voronoi;

pub use boop::Boop;
pub use facet_stats::{
    DistStats, VoroAreaStats, VoroAreaStatsSeparate, VoroVolStats, VoroVolStatsSeparate,
};
pub use interstice::{CalcVolumeArea, VolumeAreaInterstice};
pub use voronoi::{
    AreaWtIFoldSymmetry, CharacterMotif, Cn, IFoldSymmetry, VolWtIFoldSymmetry, VoronoiIndex,
};

use std::ops::RangeInclusive;

/// Facet edge-count bins `min..=max`.
///
/// With `include_beyond_max`, facets with more than `max` edges land in the
/// `max` bin; otherwise they are dropped. Facets below `min` are always
/// dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeRange {
    pub min: usize,
    pub max: usize,
    pub include_beyond_max: bool,
}

impl Default for EdgeRange {
    fn default() -> Self {
        Self {
            min: 3,
            max: 7,
            include_beyond_max: true,
        }
    }
}

impl EdgeRange {
    pub fn new(min: usize, max: usize, include_beyond_max: bool) -> Self {
        Self {
            min,
            max,
            include_beyond_max,
        }
    }

    pub fn len(&self) -> usize {
        (self.max + 1).saturating_sub(self.min)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn edges(&self) -> RangeInclusive<usize> {
        self.min..=self.max
    }

    /// Bin index of a facet with `edge` edges, or `None` when dropped.
    pub fn bin(&self, edge: i32) -> Option<usize> {
        let edge = usize::try_from(edge).ok()?;
        if edge < self.min || self.is_empty() {
            None
        } else if edge > self.max {
            self.include_beyond_max.then(|| self.len() - 1)
        } else {
            Some(edge - self.min)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_binning() {
        let range = EdgeRange::default();
        assert_eq!(range.len(), 5);
        assert_eq!(range.bin(3), Some(0));
        assert_eq!(range.bin(7), Some(4));
        assert_eq!(range.bin(9), Some(4));
        assert_eq!(range.bin(2), None);
        assert_eq!(range.bin(-1), None);

        let strict = EdgeRange::new(3, 7, false);
        assert_eq!(strict.bin(8), None);
    }
}
