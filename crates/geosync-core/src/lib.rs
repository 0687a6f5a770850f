#![forbid(unsafe_code)]

//! Core: coordinates, projections, transforms, and snapshot comparison.
//!
//! # Role in geosync
//! `geosync-core` holds the pure half of the coordinate binding engine. It
//! knows nothing about timers, subscriptions, or renderers; the runtime crate
//! (`geosync-runtime`) builds the reactive binding on top of it.
//!
//! # Primary responsibilities
//! - **Coordinates**: typed nested coordinate arrays per [`GeometryKind`].
//! - **Projection**: coordinate reference systems and position transforms.
//! - **TransformTable**: per-kind transform resolution, done once at setup.
//! - **Snapshot comparison**: extent-first equality used to gate writes and
//!   deduplicate change notifications.

pub mod compare;
pub mod coords;
pub mod error;
pub mod extent;
pub mod projection;
pub mod surface;
pub mod transform;

pub use compare::{Snapshot, snapshots_equal};
pub use coords::{Coordinates, GeometryKind, Position};
pub use error::{Error, Result};
pub use extent::Extent;
pub use projection::{Projection, ProjectionDef, transform_position};
pub use surface::point_on_surface;
pub use transform::{CoordTransform, TransformFn, TransformTable};
