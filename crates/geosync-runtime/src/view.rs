#![forbid(unsafe_code)]

//! Renderer seams: the map view and the geometry container.
//!
//! A binding never talks to a concrete renderer. It asks a [`MapView`] for the
//! projection the map is drawn in and hands its geometry to a
//! [`GeometryContainer`] (the feature or layer slot that displays it).

use std::cell::{Cell, RefCell};

use geosync_core::Projection;

use crate::geometry::GeometryHandle;

/// The map view a binding renders into.
pub trait MapView {
    /// Projection the view draws in. Native geometry coordinates use it.
    fn projection(&self) -> Projection;
}

/// Something that displays a geometry: a feature, an overlay, a draw layer.
pub trait GeometryContainer {
    /// Attach `Some(geometry)` on mount, `None` on teardown.
    fn set_geometry(&self, geometry: Option<GeometryHandle>);
}

/// A view with a fixed projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticView {
    projection: Projection,
}

impl StaticView {
    #[must_use]
    pub fn new(projection: Projection) -> Self {
        Self { projection }
    }
}

impl Default for StaticView {
    fn default() -> Self {
        Self::new(Projection::web_mercator())
    }
}

impl MapView for StaticView {
    fn projection(&self) -> Projection {
        self.projection.clone()
    }
}

/// Container that holds at most one geometry and counts assignments.
#[derive(Debug, Default)]
pub struct GeometrySlot {
    current: RefCell<Option<GeometryHandle>>,
    assignments: Cell<u64>,
}

impl GeometrySlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> Option<GeometryHandle> {
        self.current.borrow().clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.borrow().is_none()
    }

    /// Number of `set_geometry` calls seen.
    #[must_use]
    pub fn assignments(&self) -> u64 {
        self.assignments.get()
    }
}

impl GeometryContainer for GeometrySlot {
    fn set_geometry(&self, geometry: Option<GeometryHandle>) {
        *self.current.borrow_mut() = geometry;
        self.assignments.set(self.assignments.get() + 1);
    }
}
