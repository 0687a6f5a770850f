#![forbid(unsafe_code)]

//! Representative interior points.

use geo::InteriorPoint;

use crate::coords::{Coordinates, Position};

/// A point guaranteed to lie on the geometry (inside for areal kinds, on a
/// vertex or segment for linear kinds). `None` for degenerate input.
#[must_use]
pub fn point_on_surface(coords: &Coordinates) -> Option<Position> {
    if let Coordinates::Point(p) = coords {
        return Some(*p);
    }
    coords
        .to_geo()
        .interior_point()
        .map(|point| [point.x(), point.y()])
}
