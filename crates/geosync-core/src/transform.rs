#![forbid(unsafe_code)]

//! Projection transform resolver.
//!
//! A [`TransformTable`] maps each [`GeometryKind`] to a transform function
//! that knows the kind's nesting. Resolution happens once, when a binding is
//! set up; the resulting [`CoordTransform`] is a plain strategy value with no
//! runtime type inspection on the hot path beyond a shape check.
//!
//! # Invariants
//!
//! 1. Transforms are pure and return the input unchanged when
//!    `from == to`.
//! 2. Output nesting always equals input nesting.
//! 3. A kind missing from the table fails at resolve time, never per call.

use std::fmt;

use crate::coords::{
    Coordinates, GeometryKind, try_map_line, try_map_polygons, try_map_rings,
};
use crate::error::{Error, Result};
use crate::projection::{Projection, transform_position};

/// Signature of a per-kind coordinate transform.
pub type TransformFn = fn(&Coordinates, &Projection, &Projection) -> Result<Coordinates>;

/// Kind-to-transform lookup table.
#[derive(Clone)]
pub struct TransformTable {
    entries: [Option<TransformFn>; 6],
}

impl Default for TransformTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl TransformTable {
    /// A table with no entries.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: [None; 6],
        }
    }

    /// A table covering every [`GeometryKind`].
    #[must_use]
    pub fn standard() -> Self {
        Self::empty()
            .with(GeometryKind::Point, transform_point)
            .with(GeometryKind::LineString, transform_line_string)
            .with(GeometryKind::Polygon, transform_polygon)
            .with(GeometryKind::MultiPoint, transform_multi_point)
            .with(GeometryKind::MultiLineString, transform_multi_line_string)
            .with(GeometryKind::MultiPolygon, transform_multi_polygon)
    }

    /// Register (or replace) the transform for `kind`.
    #[must_use]
    pub fn with(mut self, kind: GeometryKind, transform: TransformFn) -> Self {
        self.entries[kind.index()] = Some(transform);
        self
    }

    /// Remove the transform for `kind`.
    #[must_use]
    pub fn without(mut self, kind: GeometryKind) -> Self {
        self.entries[kind.index()] = None;
        self
    }

    #[must_use]
    pub fn supports(&self, kind: GeometryKind) -> bool {
        self.entries[kind.index()].is_some()
    }

    /// Resolve the strategy for `kind`.
    pub fn resolve(&self, kind: GeometryKind) -> Result<CoordTransform> {
        self.entries[kind.index()]
            .map(|apply| CoordTransform { kind, apply })
            .ok_or(Error::MissingTransform(kind))
    }
}

impl fmt::Debug for TransformTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<GeometryKind> = GeometryKind::ALL
            .into_iter()
            .filter(|kind| self.supports(*kind))
            .collect();
        f.debug_struct("TransformTable")
            .field("kinds", &kinds)
            .finish()
    }
}

/// A transform resolved for one geometry kind.
#[derive(Clone, Copy)]
pub struct CoordTransform {
    kind: GeometryKind,
    apply: TransformFn,
}

impl CoordTransform {
    #[must_use]
    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    /// Transform `coords` from `from` to `to`.
    pub fn apply(
        &self,
        coords: &Coordinates,
        from: &Projection,
        to: &Projection,
    ) -> Result<Coordinates> {
        if coords.kind() != self.kind {
            return Err(Error::ShapeMismatch {
                expected: self.kind,
                found: coords.kind(),
            });
        }
        (self.apply)(coords, from, to)
    }
}

impl fmt::Debug for CoordTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordTransform")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

fn mismatch(expected: GeometryKind, coords: &Coordinates) -> Error {
    Error::ShapeMismatch {
        expected,
        found: coords.kind(),
    }
}

/// Transform a `Point`.
pub fn transform_point(
    coords: &Coordinates,
    from: &Projection,
    to: &Projection,
) -> Result<Coordinates> {
    match coords {
        Coordinates::Point(p) => Ok(Coordinates::Point(transform_position(*p, from, to)?)),
        other => Err(mismatch(GeometryKind::Point, other)),
    }
}

/// Transform a `LineString`.
pub fn transform_line_string(
    coords: &Coordinates,
    from: &Projection,
    to: &Projection,
) -> Result<Coordinates> {
    let mut f = |p| transform_position(p, from, to);
    match coords {
        Coordinates::LineString(line) => Ok(Coordinates::LineString(try_map_line(line, &mut f)?)),
        other => Err(mismatch(GeometryKind::LineString, other)),
    }
}

/// Transform a `Polygon`, ring by ring.
pub fn transform_polygon(
    coords: &Coordinates,
    from: &Projection,
    to: &Projection,
) -> Result<Coordinates> {
    let mut f = |p| transform_position(p, from, to);
    match coords {
        Coordinates::Polygon(rings) => Ok(Coordinates::Polygon(try_map_rings(rings, &mut f)?)),
        other => Err(mismatch(GeometryKind::Polygon, other)),
    }
}

/// Transform a `MultiPoint`.
pub fn transform_multi_point(
    coords: &Coordinates,
    from: &Projection,
    to: &Projection,
) -> Result<Coordinates> {
    let mut f = |p| transform_position(p, from, to);
    match coords {
        Coordinates::MultiPoint(points) => {
            Ok(Coordinates::MultiPoint(try_map_line(points, &mut f)?))
        }
        other => Err(mismatch(GeometryKind::MultiPoint, other)),
    }
}

/// Transform a `MultiLineString`.
pub fn transform_multi_line_string(
    coords: &Coordinates,
    from: &Projection,
    to: &Projection,
) -> Result<Coordinates> {
    let mut f = |p| transform_position(p, from, to);
    match coords {
        Coordinates::MultiLineString(lines) => {
            Ok(Coordinates::MultiLineString(try_map_rings(lines, &mut f)?))
        }
        other => Err(mismatch(GeometryKind::MultiLineString, other)),
    }
}

/// Transform a `MultiPolygon`.
pub fn transform_multi_polygon(
    coords: &Coordinates,
    from: &Projection,
    to: &Projection,
) -> Result<Coordinates> {
    let mut f = |p| transform_position(p, from, to);
    match coords {
        Coordinates::MultiPolygon(polygons) => {
            Ok(Coordinates::MultiPolygon(try_map_polygons(polygons, &mut f)?))
        }
        other => Err(mismatch(GeometryKind::MultiPolygon, other)),
    }
}
