#![forbid(unsafe_code)]

//! Per-binding projection context.
//!
//! Built once when a binding initializes: the transform for the binding's
//! geometry kind is resolved from the table, and the view and bind projections
//! are captured. After that, every conversion is a plain call with no lookup.
//!
//! # Invariants
//!
//! 1. `to_view_projection(to_bind_projection(c))` returns `c` within transform
//!    round-trip tolerance.
//! 2. When the bind projection equals the view projection both conversions
//!    return the input unchanged.

use geosync_core::{
    CoordTransform, Coordinates, Error, GeometryKind, Position, Projection, Result,
    TransformTable, transform_position,
};
use tracing::debug;

use crate::pipeline::ThrottleConfig;
use crate::view::MapView;

/// Per-binding configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindOptions {
    /// Projection the declared coordinates are expressed in. `None` means the
    /// view projection.
    pub bind_to_projection: Option<Projection>,
    /// Change pipeline throttle.
    pub throttle: ThrottleConfig,
}

impl BindOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_bind_projection(mut self, projection: Projection) -> Self {
        self.bind_to_projection = Some(projection);
        self
    }

    /// Look the bind projection up by code, e.g. `"EPSG:4326"`.
    pub fn with_bind_projection_code(self, code: &str) -> Result<Self> {
        Ok(self.with_bind_projection(Projection::from_code(code)?))
    }

    #[must_use]
    pub fn with_throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = throttle;
        self
    }
}

/// Resolved transform plus the two projections it converts between.
#[derive(Debug, Clone)]
pub struct BindingContext {
    transform: CoordTransform,
    view_projection: Projection,
    bind_projection: Projection,
}

impl BindingContext {
    /// Resolve the context for `kind`.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingView`] if `view` is `None`.
    /// - [`Error::MissingTransform`] if `table` has no entry for `kind`.
    pub fn new(
        kind: GeometryKind,
        table: &TransformTable,
        view: Option<&dyn MapView>,
        options: &BindOptions,
    ) -> Result<Self> {
        let view = view.ok_or(Error::MissingView)?;
        let transform = table.resolve(kind)?;
        let view_projection = view.projection();
        let bind_projection = options
            .bind_to_projection
            .clone()
            .unwrap_or_else(|| view_projection.clone());
        debug!(
            kind = %kind,
            view = %view_projection,
            bind = %bind_projection,
            "binding context resolved"
        );
        Ok(Self {
            transform,
            view_projection,
            bind_projection,
        })
    }

    #[must_use]
    pub fn kind(&self) -> GeometryKind {
        self.transform.kind()
    }

    #[must_use]
    pub fn view_projection(&self) -> &Projection {
        &self.view_projection
    }

    #[must_use]
    pub fn bind_projection(&self) -> &Projection {
        &self.bind_projection
    }

    /// Whether both sides share one projection.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.view_projection == self.bind_projection
    }

    /// Native (view) coordinates to declared (bind) coordinates.
    pub fn to_bind_projection(&self, native: &Coordinates) -> Result<Coordinates> {
        self.transform
            .apply(native, &self.view_projection, &self.bind_projection)
    }

    /// Declared (bind) coordinates to native (view) coordinates.
    pub fn to_view_projection(&self, declared: &Coordinates) -> Result<Coordinates> {
        self.transform
            .apply(declared, &self.bind_projection, &self.view_projection)
    }

    /// Single native position to the bind projection.
    pub fn position_to_bind_projection(&self, native: Position) -> Result<Position> {
        transform_position(native, &self.view_projection, &self.bind_projection)
    }
}
