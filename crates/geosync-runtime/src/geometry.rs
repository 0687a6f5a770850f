#![forbid(unsafe_code)]

//! Renderer-owned geometry handle.
//!
//! A [`GeometryHandle`] models the mutable geometry object a renderer keeps
//! for a map feature. Coordinates are stored in the view projection. Every
//! mutation bumps a revision counter and notifies change listeners, whether
//! or not the value actually changed; filtering redundant notifications is
//! the job of the change pipeline.
//!
//! Bindings only hold a [`WeakGeometryHandle`]: the renderer owns the object
//! and may drop it at any time.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use geosync_core::{Coordinates, Error, Extent, GeometryKind, Result, Snapshot};

use crate::reactive::{Emitter, Subscription};

/// Payload delivered to geometry change listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryChange {
    /// Handle revision after the mutation.
    pub revision: u64,
}

struct GeometryState {
    coordinates: Coordinates,
    revision: u64,
}

struct GeometryInner {
    kind: GeometryKind,
    state: RefCell<GeometryState>,
    changes: Emitter<GeometryChange>,
}

/// Shared handle to a mutable geometry.
#[derive(Clone)]
pub struct GeometryHandle {
    inner: Rc<GeometryInner>,
}

impl fmt::Debug for GeometryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("GeometryHandle")
            .field("kind", &self.inner.kind)
            .field("revision", &state.revision)
            .field("positions", &state.coordinates.position_count())
            .finish()
    }
}

impl GeometryHandle {
    /// Create a handle. The kind is fixed by the initial coordinates.
    #[must_use]
    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            inner: Rc::new(GeometryInner {
                kind: coordinates.kind(),
                state: RefCell::new(GeometryState {
                    coordinates,
                    revision: 0,
                }),
                changes: Emitter::new(),
            }),
        }
    }

    #[must_use]
    pub fn kind(&self) -> GeometryKind {
        self.inner.kind
    }

    /// Clone of the current native coordinates.
    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        self.inner.state.borrow().coordinates.clone()
    }

    #[must_use]
    pub fn extent(&self) -> Extent {
        Extent::of(&self.inner.state.borrow().coordinates)
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.coordinates())
    }

    /// Mutation counter. Starts at 0, +1 per mutation.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.state.borrow().revision
    }

    /// Replace the coordinates and notify listeners.
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] if `coordinates` is of another kind. The
    /// handle is left untouched and nobody is notified.
    pub fn set_coordinates(&self, coordinates: Coordinates) -> Result<()> {
        if coordinates.kind() != self.inner.kind {
            return Err(Error::ShapeMismatch {
                expected: self.inner.kind,
                found: coordinates.kind(),
            });
        }
        let revision = {
            let mut state = self.inner.state.borrow_mut();
            state.coordinates = coordinates;
            state.revision += 1;
            state.revision
        };
        self.inner.changes.emit(&GeometryChange { revision });
        Ok(())
    }

    /// Edit the coordinates in place, then notify as [`Self::set_coordinates`].
    pub fn modify(&self, f: impl FnOnce(&mut Coordinates)) -> Result<()> {
        let mut coordinates = self.coordinates();
        f(&mut coordinates);
        self.set_coordinates(coordinates)
    }

    /// Shift every position by `(dx, dy)` in native units.
    pub fn translate(&self, dx: f64, dy: f64) -> Result<()> {
        self.modify(|coords| {
            for_each_position_mut(coords, |p| {
                p[0] += dx;
                p[1] += dy;
            });
        })
    }

    /// Notify listeners without changing coordinates.
    pub fn touch(&self) {
        let revision = {
            let mut state = self.inner.state.borrow_mut();
            state.revision += 1;
            state.revision
        };
        self.inner.changes.emit(&GeometryChange { revision });
    }

    /// Listen for mutations. Dropping the guard deregisters.
    pub fn on_change(&self, listener: impl Fn(&GeometryChange) + 'static) -> Subscription {
        self.inner.changes.subscribe(listener)
    }

    /// Change listeners whose guard is still alive.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.changes.live_listener_count()
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakGeometryHandle {
        WeakGeometryHandle(Rc::downgrade(&self.inner))
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Non-owning reference to a [`GeometryHandle`].
#[derive(Clone, Default)]
pub struct WeakGeometryHandle(Weak<GeometryInner>);

impl WeakGeometryHandle {
    /// A reference that never upgrades.
    #[must_use]
    pub fn dangling() -> Self {
        Self(Weak::new())
    }

    #[must_use]
    pub fn upgrade(&self) -> Option<GeometryHandle> {
        self.0.upgrade().map(|inner| GeometryHandle { inner })
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for WeakGeometryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakGeometryHandle")
            .field(&self.is_alive())
            .finish()
    }
}

fn for_each_position_mut(coords: &mut Coordinates, mut f: impl FnMut(&mut [f64; 2])) {
    match coords {
        Coordinates::Point(p) => f(p),
        Coordinates::LineString(line) | Coordinates::MultiPoint(line) => {
            line.iter_mut().for_each(f);
        }
        Coordinates::Polygon(rings) | Coordinates::MultiLineString(rings) => {
            rings.iter_mut().flatten().for_each(f);
        }
        Coordinates::MultiPolygon(polygons) => {
            polygons.iter_mut().flatten().flatten().for_each(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn line() -> Coordinates {
        Coordinates::LineString(vec![[0.0, 0.0], [1.0, 1.0]])
    }

    #[test]
    fn set_bumps_revision_and_notifies() {
        let geom = GeometryHandle::new(line());
        let seen = Rc::new(Cell::new(0u64));
        let s = Rc::clone(&seen);
        let _sub = geom.on_change(move |c| s.set(c.revision));

        geom.set_coordinates(Coordinates::LineString(vec![[2.0, 2.0]]))
            .unwrap();
        assert_eq!(geom.revision(), 1);
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn identical_write_still_notifies() {
        let geom = GeometryHandle::new(line());
        let count = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&count);
        let _sub = geom.on_change(move |_| c.set(c.get() + 1));

        geom.set_coordinates(line()).unwrap();
        geom.set_coordinates(line()).unwrap();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn wrong_kind_rejected_silently() {
        let geom = GeometryHandle::new(line());
        let count = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&count);
        let _sub = geom.on_change(move |_| c.set(c.get() + 1));

        let err = geom
            .set_coordinates(Coordinates::Point([0.0, 0.0]))
            .unwrap_err();
        assert_eq!(
            err,
            Error::ShapeMismatch {
                expected: GeometryKind::LineString,
                found: GeometryKind::Point,
            }
        );
        assert_eq!(geom.revision(), 0);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn translate_shifts_every_position() {
        let geom = GeometryHandle::new(Coordinates::Polygon(vec![vec![
            [0.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
        ]]));
        geom.translate(10.0, -1.0).unwrap();
        assert_eq!(
            geom.coordinates(),
            Coordinates::Polygon(vec![vec![[10.0, -1.0], [11.0, -1.0], [10.0, 0.0]]])
        );
    }

    #[test]
    fn touch_notifies_without_change() {
        let geom = GeometryHandle::new(line());
        let before = geom.coordinates();
        geom.touch();
        assert_eq!(geom.revision(), 1);
        assert_eq!(geom.coordinates(), before);
    }

    #[test]
    fn weak_handle_follows_owner() {
        let geom = GeometryHandle::new(line());
        let weak = geom.downgrade();
        assert!(weak.upgrade().is_some_and(|g| g.ptr_eq(&geom)));
        drop(geom);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
        assert!(WeakGeometryHandle::dangling().upgrade().is_none());
    }

    #[test]
    fn dropped_guard_deregisters() {
        let geom = GeometryHandle::new(line());
        let sub = geom.on_change(|_| {});
        assert_eq!(geom.listener_count(), 1);
        drop(sub);
        assert_eq!(geom.listener_count(), 0);
    }
}
