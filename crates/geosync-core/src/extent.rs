#![forbid(unsafe_code)]

//! Axis-aligned bounding extents.
//!
//! An [`Extent`] is a cheap, fixed-size summary of a coordinate array. Two
//! different shapes can share an extent, so it is only ever used to prove
//! inequality quickly.
//!
//! The empty extent is `[+inf, +inf, -inf, -inf]`; extending it with any
//! position yields that position's degenerate box.

use crate::coords::{Coordinates, Position};

/// Bounding box `[min_x, min_y, max_x, max_y]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for Extent {
    fn default() -> Self {
        Self::empty()
    }
}

impl Extent {
    /// Create an extent from its corners.
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The extent containing nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        )
    }

    /// Bounding box of every position in `coords`.
    #[must_use]
    pub fn of(coords: &Coordinates) -> Self {
        let mut extent = Self::empty();
        coords.for_each_position(|p| extent.extend_position(*p));
        extent
    }

    /// True if no position has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.max_x < self.min_x || self.max_y < self.min_y
    }

    /// Grow to include `p`.
    pub fn extend_position(&mut self, p: Position) {
        self.min_x = self.min_x.min(p[0]);
        self.min_y = self.min_y.min(p[1]);
        self.max_x = self.max_x.max(p[0]);
        self.max_y = self.max_y.max(p[1]);
    }

    /// Grow to include `other`.
    pub fn extend(&mut self, other: &Extent) {
        if other.is_empty() {
            return;
        }
        self.extend_position([other.min_x, other.min_y]);
        self.extend_position([other.max_x, other.max_y]);
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_x - self.min_x
        }
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_y - self.min_y
        }
    }

    /// Midpoint of the box, `None` when empty.
    #[must_use]
    pub fn center(&self) -> Option<Position> {
        if self.is_empty() {
            return None;
        }
        Some([
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        ])
    }

    /// Inclusive containment test.
    #[must_use]
    pub fn contains_position(&self, p: Position) -> bool {
        p[0] >= self.min_x && p[0] <= self.max_x && p[1] >= self.min_y && p[1] <= self.max_y
    }

    #[must_use]
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_extent_is_empty() {
        let e = Extent::empty();
        assert!(e.is_empty());
        assert_eq!(e.width(), 0.0);
        assert_eq!(e.center(), None);
        assert!(!e.contains_position([0.0, 0.0]));
    }

    #[test]
    fn point_extent_is_degenerate() {
        let e = Extent::of(&Coordinates::Point([3.0, -2.0]));
        assert!(!e.is_empty());
        assert_eq!(e.to_array(), [3.0, -2.0, 3.0, -2.0]);
        assert_eq!(e.width(), 0.0);
        assert!(e.contains_position([3.0, -2.0]));
    }

    #[test]
    fn polygon_extent_covers_all_rings() {
        let coords = Coordinates::Polygon(vec![
            vec![[0.0, 0.0], [4.0, 0.0], [4.0, 3.0], [0.0, 0.0]],
            vec![[1.0, 1.0], [2.0, 1.0], [1.0, 2.0], [1.0, 1.0]],
        ]);
        let e = Extent::of(&coords);
        assert_eq!(e.to_array(), [0.0, 0.0, 4.0, 3.0]);
        assert_eq!(e.center(), Some([2.0, 1.5]));
    }

    #[test]
    fn extend_ignores_empty() {
        let mut e = Extent::new(0.0, 0.0, 1.0, 1.0);
        e.extend(&Extent::empty());
        assert_eq!(e.to_array(), [0.0, 0.0, 1.0, 1.0]);
        e.extend(&Extent::new(-1.0, 0.5, 0.5, 2.0));
        assert_eq!(e.to_array(), [-1.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn empty_extents_compare_equal() {
        assert_eq!(Extent::empty(), Extent::default());
    }
}
