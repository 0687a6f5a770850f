#![forbid(unsafe_code)]

//! Typed coordinate arrays and the closed set of geometry kinds.
//!
//! A [`Coordinates`] value never records its projection; callers carry the
//! projection alongside it. The nesting depth of every variant is fixed by its
//! [`GeometryKind`]:
//!
//! ```text
//! Point            [x, y]                       depth 0
//! LineString       [[x, y], ...]                depth 1
//! MultiPoint       [[x, y], ...]                depth 1
//! Polygon          [[[x, y], ...], ...]         depth 2
//! MultiLineString  [[[x, y], ...], ...]         depth 2
//! MultiPolygon     [[[[x, y], ...], ...], ...]  depth 3
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A 2D position `[x, y]` in some projection.
pub type Position = [f64; 2];

/// Supported geometry kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
}

impl GeometryKind {
    /// Every supported kind, in declaration order.
    pub const ALL: [GeometryKind; 6] = [
        Self::Point,
        Self::LineString,
        Self::Polygon,
        Self::MultiPoint,
        Self::MultiLineString,
        Self::MultiPolygon,
    ];

    /// Canonical name, matching the renderer's geometry type tags.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::Polygon => "Polygon",
            Self::MultiPoint => "MultiPoint",
            Self::MultiLineString => "MultiLineString",
            Self::MultiPolygon => "MultiPolygon",
        }
    }

    /// Number of array levels above a single position.
    #[must_use]
    pub const fn depth(self) -> usize {
        match self {
            Self::Point => 0,
            Self::LineString | Self::MultiPoint => 1,
            Self::Polygon | Self::MultiLineString => 2,
            Self::MultiPolygon => 3,
        }
    }

    /// Dense index into per-kind tables.
    #[must_use]
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Point => 0,
            Self::LineString => 1,
            Self::Polygon => 2,
            Self::MultiPoint => 3,
            Self::MultiLineString => 4,
            Self::MultiPolygon => 5,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GeometryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownGeometryKind(s.to_string()))
    }
}

/// A coordinate array whose nesting matches its geometry kind.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "type", content = "coordinates")
)]
pub enum Coordinates {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Vec<Position>>),
    MultiPoint(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Coordinates {
    /// The geometry kind this array's shape belongs to.
    #[must_use]
    pub fn kind(&self) -> GeometryKind {
        match self {
            Self::Point(_) => GeometryKind::Point,
            Self::LineString(_) => GeometryKind::LineString,
            Self::Polygon(_) => GeometryKind::Polygon,
            Self::MultiPoint(_) => GeometryKind::MultiPoint,
            Self::MultiLineString(_) => GeometryKind::MultiLineString,
            Self::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }

    /// Total number of positions at the leaves.
    #[must_use]
    pub fn position_count(&self) -> usize {
        let mut count = 0;
        self.for_each_position(|_| count += 1);
        count
    }

    /// True when the array holds no positions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.position_count() == 0
    }

    /// Visit every position in order.
    pub fn for_each_position(&self, mut f: impl FnMut(&Position)) {
        match self {
            Self::Point(p) => f(p),
            Self::LineString(line) | Self::MultiPoint(line) => line.iter().for_each(f),
            Self::Polygon(rings) | Self::MultiLineString(rings) => {
                rings.iter().flatten().for_each(f)
            }
            Self::MultiPolygon(polygons) => polygons.iter().flatten().flatten().for_each(f),
        }
    }

    /// Check that this array is non-empty and shaped for `kind`.
    pub fn validate(&self, kind: GeometryKind) -> Result<()> {
        if self.kind() != kind {
            return Err(Error::ShapeMismatch {
                expected: kind,
                found: self.kind(),
            });
        }
        if self.is_empty() {
            return Err(Error::EmptyCoordinates(kind));
        }
        Ok(())
    }

    /// Convert to a `geo` geometry for algorithms that operate on it.
    #[must_use]
    pub fn to_geo(&self) -> geo::Geometry<f64> {
        use geo::{LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};

        fn line(positions: &[Position]) -> LineString<f64> {
            LineString::from(positions.to_vec())
        }

        fn polygon(rings: &[Vec<Position>]) -> Polygon<f64> {
            let mut rings = rings.iter();
            let exterior = rings.next().map(|r| line(r)).unwrap_or_else(|| line(&[]));
            Polygon::new(exterior, rings.map(|r| line(r)).collect())
        }

        match self {
            Self::Point(p) => Point::from(*p).into(),
            Self::LineString(positions) => line(positions).into(),
            Self::Polygon(rings) => polygon(rings).into(),
            Self::MultiPoint(positions) => {
                MultiPoint::new(positions.iter().map(|p| Point::from(*p)).collect()).into()
            }
            Self::MultiLineString(lines) => {
                MultiLineString::new(lines.iter().map(|l| line(l)).collect()).into()
            }
            Self::MultiPolygon(polygons) => {
                MultiPolygon::new(polygons.iter().map(|p| polygon(p)).collect()).into()
            }
        }
    }
}

/// Apply a fallible position mapping across one level of positions.
pub(crate) fn try_map_line<F>(line: &[Position], f: &mut F) -> Result<Vec<Position>>
where
    F: FnMut(Position) -> Result<Position>,
{
    line.iter().map(|p| f(*p)).collect()
}

/// Apply a fallible position mapping across two levels (rings or lines).
pub(crate) fn try_map_rings<F>(rings: &[Vec<Position>], f: &mut F) -> Result<Vec<Vec<Position>>>
where
    F: FnMut(Position) -> Result<Position>,
{
    rings.iter().map(|ring| try_map_line(ring, &mut *f)).collect()
}

/// Apply a fallible position mapping across three levels (polygons).
pub(crate) fn try_map_polygons<F>(
    polygons: &[Vec<Vec<Position>>],
    f: &mut F,
) -> Result<Vec<Vec<Vec<Position>>>>
where
    F: FnMut(Position) -> Result<Position>,
{
    polygons
        .iter()
        .map(|rings| try_map_rings(rings, &mut *f))
        .collect()
}
