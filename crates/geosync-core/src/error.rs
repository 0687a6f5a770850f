#![forbid(unsafe_code)]

//! Error type shared by the geosync crates.
//!
//! Every variant is a programmer or configuration error. Nothing in geosync
//! retries; errors surface to whoever invoked the failing operation.
//!
//! # Failure Modes
//!
//! | Variant | Raised by | When |
//! |---------|-----------|------|
//! | `UnknownGeometryKind` | `GeometryKind::from_str` | Unrecognized kind name |
//! | `MissingTransform` | `TransformTable::resolve` | Kind absent from the table |
//! | `UnknownProjection` | `Projection::from_code` | Unsupported projection code |
//! | `ShapeMismatch` | transforms, validation, geometry writes | Coordinates of another kind |
//! | `EmptyCoordinates` | validation | Coordinate array with no positions |
//! | `Transform` | projection math | Non-finite or out-of-domain position |
//! | `MissingView` | binding init | No renderer view attached |
//! | `MissingGeometry` | binding mount | Geometry handle already dropped |
//! | `NotInitialized` | binding mount | Mount before init |

use std::fmt;

use crate::coords::{GeometryKind, Position};

/// Errors from coordinate binding operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A geometry kind name did not match any supported kind.
    UnknownGeometryKind(String),
    /// The transform table has no entry for the requested kind.
    MissingTransform(GeometryKind),
    /// A projection code is not one of the built-in definitions.
    UnknownProjection(String),
    /// Coordinates do not have the nesting expected for a geometry kind.
    ShapeMismatch {
        expected: GeometryKind,
        found: GeometryKind,
    },
    /// A coordinate array with no positions was supplied.
    EmptyCoordinates(GeometryKind),
    /// A position could not be moved between projections.
    Transform {
        from: String,
        to: String,
        position: Position,
        reason: &'static str,
    },
    /// The binding was initialized without a renderer view.
    MissingView,
    /// The renderer dropped the geometry handle before it was observed.
    MissingGeometry,
    /// A lifecycle step that needs the binding context ran before `init`.
    NotInitialized,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownGeometryKind(name) => write!(f, "unknown geometry kind: {name}"),
            Self::MissingTransform(kind) => write!(f, "no transform registered for {kind}"),
            Self::UnknownProjection(code) => write!(f, "unknown projection: {code}"),
            Self::ShapeMismatch { expected, found } => {
                write!(f, "expected {expected} coordinates, found {found}")
            }
            Self::EmptyCoordinates(kind) => write!(f, "{kind} coordinates must not be empty"),
            Self::Transform {
                from,
                to,
                position,
                reason,
            } => write!(
                f,
                "cannot transform [{}, {}] from {from} to {to}: {reason}",
                position[0], position[1]
            ),
            Self::MissingView => f.write_str("binding requires a renderer view"),
            Self::MissingGeometry => f.write_str("geometry handle is no longer available"),
            Self::NotInitialized => f.write_str("binding has not been initialized"),
        }
    }
}

impl std::error::Error for Error {}

/// Result alias for geosync operations.
pub type Result<T> = std::result::Result<T, Error>;
