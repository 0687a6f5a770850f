#![forbid(unsafe_code)]

//! Snapshot equality for coordinate arrays.
//!
//! # Algorithm
//!
//! 1. Compare extents (four floats). Different extents prove the shapes
//!    differ, so coordinates are never touched on this path.
//! 2. Only when extents match, compare the coordinate trees position by
//!    position, in order, with exact float equality.
//!
//! There is no epsilon: transforms are deterministic, so a round trip through
//! the same pair of projections reproduces the same bits.

use crate::coords::Coordinates;
use crate::extent::Extent;

/// Coordinates paired with their precomputed extent.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub coordinates: Coordinates,
    pub extent: Extent,
}

impl Snapshot {
    /// Build a snapshot, computing the extent from `coordinates`.
    #[must_use]
    pub fn new(coordinates: Coordinates) -> Self {
        let extent = Extent::of(&coordinates);
        Self {
            coordinates,
            extent,
        }
    }

    #[must_use]
    pub fn into_coordinates(self) -> Coordinates {
        self.coordinates
    }
}

/// Semantic equality of two snapshots, extent first.
#[must_use]
pub fn snapshots_equal(a: &Snapshot, b: &Snapshot) -> bool {
    if a.extent != b.extent {
        return false;
    }
    a.coordinates == b.coordinates
}
