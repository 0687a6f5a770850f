#![forbid(unsafe_code)]

//! Synchronization controller: keeps a declared coordinate property and a
//! renderer geometry in step.
//!
//! # Paths
//!
//! - **External write** ([`GeometryBinding::set_coordinates`]): validate,
//!   store as the declared value, remap into the view projection, and write
//!   into the geometry only when the result differs from what the geometry
//!   already holds. The comparison is the feedback-loop guard: echoing an
//!   emitted value back through the property is a no-op.
//! - **Internal change** (change pipeline emission): bump the revision,
//!   record the value as declared, notify [`GeometryBinding::on_update`]
//!   listeners.
//!
//! # Lifecycle
//!
//! ```text
//! new ──init──▶ initialized ──mount──▶ mounted
//!                  ▲    │                 │
//!                  │    └──deinit──▶ new  │
//!                  └──────unmount─────────┘
//! ```
//!
//! # Invariants
//!
//! 1. At rest the declared value equals the geometry's coordinates mapped to
//!    the bind projection.
//! 2. The revision advances by exactly one per update notification and never
//!    on an external write.
//! 3. After `unmount` no update notification is delivered, including one
//!    whose throttle window was open at teardown.
//!
//! # Failure Modes
//!
//! | Condition | Error |
//! |-----------|-------|
//! | `init` without a view | [`Error::MissingView`] |
//! | Kind missing from the variant's table | [`Error::MissingTransform`] |
//! | `mount` before `init` | [`Error::NotInitialized`] |
//! | `mount` after the renderer dropped the geometry | [`Error::MissingGeometry`] |
//! | Empty or wrongly nested input | [`Error::EmptyCoordinates`], [`Error::ShapeMismatch`] |
//! | Transform failure | [`Error::Transform`] |

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use geosync_core::{
    Coordinates, Error, Extent, GeometryKind, Position, Result, Snapshot, TransformTable,
    point_on_surface, snapshots_equal,
};
use tracing::{debug, trace};

use crate::context::{BindOptions, BindingContext};
use crate::geometry::{GeometryHandle, WeakGeometryHandle};
use crate::pipeline::{ChangePipeline, UpdateEvent};
use crate::reactive::{Emitter, Subscription};
use crate::scheduler::Scheduler;
use crate::view::{GeometryContainer, MapView};

/// Mount/unmount lifecycle driven by the host.
pub trait Lifecycle {
    /// Resolve configuration. Fails fast on missing collaborators.
    fn init(&mut self) -> Result<()>;
    /// Start observing the geometry and hand it to the container.
    fn mount(&mut self) -> Result<()>;
    /// Stop observing and detach from the container.
    fn unmount(&mut self) -> Result<()>;
    /// Release everything `init` resolved.
    fn deinit(&mut self) -> Result<()>;
}

/// What a binding is for: its geometry kind and the transforms it may use.
pub trait GeometryVariant {
    fn kind(&self) -> GeometryKind;

    fn transform_table(&self) -> TransformTable {
        TransformTable::standard()
    }
}

impl GeometryVariant for GeometryKind {
    fn kind(&self) -> GeometryKind {
        *self
    }
}

/// Variant with an explicit transform table.
#[derive(Debug, Clone)]
pub struct CustomVariant {
    pub kind: GeometryKind,
    pub table: TransformTable,
}

impl GeometryVariant for CustomVariant {
    fn kind(&self) -> GeometryKind {
        self.kind
    }

    fn transform_table(&self) -> TransformTable {
        self.table.clone()
    }
}

/// Access to the geometry a binding manages, for nested consumers (styles,
/// interactions) that attach to the same geometry.
pub trait GeometryServices {
    fn geometry(&self) -> Option<GeometryHandle>;
}

/// Collaborators a binding needs, passed in explicitly.
#[derive(Clone)]
pub struct BindingDeps {
    pub view: Option<Rc<dyn MapView>>,
    pub container: Option<Rc<dyn GeometryContainer>>,
    pub geometry: WeakGeometryHandle,
    pub scheduler: Scheduler,
}

impl fmt::Debug for BindingDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingDeps")
            .field("view", &self.view.as_ref().map(|v| v.projection()))
            .field("container", &self.container.is_some())
            .field("geometry", &self.geometry)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl BindingDeps {
    /// Deps with only a geometry and a scheduler. The binding holds the
    /// geometry weakly.
    #[must_use]
    pub fn new(geometry: &GeometryHandle, scheduler: Scheduler) -> Self {
        Self {
            view: None,
            container: None,
            geometry: geometry.downgrade(),
            scheduler,
        }
    }

    #[must_use]
    pub fn with_view(mut self, view: Rc<dyn MapView>) -> Self {
        self.view = Some(view);
        self
    }

    #[must_use]
    pub fn with_container(mut self, container: Rc<dyn GeometryContainer>) -> Self {
        self.container = Some(container);
        self
    }
}

/// Result of an external write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Stored as declared; no context or geometry to write into yet.
    Detached,
    /// Geometry already held the same coordinates.
    Unchanged,
    /// Geometry was updated.
    Written,
}

/// Values derived from the geometry, cached per revision.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedValues {
    /// Extent in the bind projection.
    pub extent: Extent,
    /// Representative interior point in the bind projection.
    pub point: Option<Position>,
    /// Native coordinates at computation time.
    pub view_coordinates: Coordinates,
}

#[derive(Debug, Default)]
struct SyncState {
    declared: Option<Coordinates>,
    revision: u64,
}

#[derive(Debug, Default)]
struct DerivedCache {
    revision: Option<u64>,
    values: Option<DerivedValues>,
}

/// Two-way binding between a declared coordinate property and a geometry.
pub struct GeometryBinding {
    variant: Box<dyn GeometryVariant>,
    options: BindOptions,
    deps: BindingDeps,
    context: Option<Rc<BindingContext>>,
    state: Rc<RefCell<SyncState>>,
    updates: Emitter<UpdateEvent>,
    pipeline: Option<ChangePipeline>,
    derived: RefCell<DerivedCache>,
}

impl fmt::Debug for GeometryBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeometryBinding")
            .field("kind", &self.kind())
            .field("initialized", &self.is_initialized())
            .field("mounted", &self.is_mounted())
            .field("revision", &self.revision())
            .finish_non_exhaustive()
    }
}

impl GeometryBinding {
    pub fn new(
        variant: impl GeometryVariant + 'static,
        deps: BindingDeps,
        options: BindOptions,
    ) -> Self {
        Self {
            variant: Box::new(variant),
            options,
            deps,
            context: None,
            state: Rc::new(RefCell::new(SyncState::default())),
            updates: Emitter::new(),
            pipeline: None,
            derived: RefCell::new(DerivedCache::default()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> GeometryKind {
        self.variant.kind()
    }

    #[must_use]
    pub fn options(&self) -> &BindOptions {
        &self.options
    }

    #[must_use]
    pub fn context(&self) -> Option<&BindingContext> {
        self.context.as_deref()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Current declared value, in the bind projection.
    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinates> {
        self.state.borrow().declared.clone()
    }

    /// Number of update notifications delivered so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.state.borrow().revision
    }

    /// Assign the declared coordinates.
    ///
    /// # Errors
    ///
    /// Validation and transform errors. On a validation error the declared
    /// value is left unchanged.
    pub fn set_coordinates(&self, coordinates: Coordinates) -> Result<SyncOutcome> {
        coordinates.validate(self.kind())?;
        self.state.borrow_mut().declared = Some(coordinates.clone());
        self.sync_to_native(&coordinates)
    }

    fn sync_to_native(&self, declared: &Coordinates) -> Result<SyncOutcome> {
        match self.context.as_deref() {
            Some(context) => self.write_through(context, declared),
            None => {
                trace!("declared value stored; nothing to sync yet");
                Ok(SyncOutcome::Detached)
            }
        }
    }

    fn write_through(
        &self,
        context: &BindingContext,
        declared: &Coordinates,
    ) -> Result<SyncOutcome> {
        let Some(geometry) = self.deps.geometry.upgrade() else {
            trace!("geometry released; declared value stored only");
            return Ok(SyncOutcome::Detached);
        };

        let remapped = Snapshot::new(context.to_view_projection(declared)?);
        if snapshots_equal(&remapped, &geometry.snapshot()) {
            trace!(kind = %self.kind(), "native geometry already matches; write skipped");
            return Ok(SyncOutcome::Unchanged);
        }

        debug!(
            kind = %self.kind(),
            positions = remapped.coordinates.position_count(),
            "writing declared coordinates to native geometry"
        );
        geometry.set_coordinates(remapped.into_coordinates())?;
        if let Some(pipeline) = &self.pipeline {
            pipeline.note_external_write();
        }
        Ok(SyncOutcome::Written)
    }

    /// Listen for `update:coordinates` notifications.
    pub fn on_update(&self, listener: impl Fn(&UpdateEvent) + 'static) -> Subscription {
        self.updates.subscribe(listener)
    }

    /// Extent of the geometry in the bind projection.
    pub fn extent(&self) -> Result<Option<Extent>> {
        Ok(self.derived()?.map(|values| values.extent))
    }

    /// Representative interior point in the bind projection.
    pub fn point(&self) -> Result<Option<Position>> {
        Ok(self.derived()?.and_then(|values| values.point))
    }

    /// Geometry coordinates in the view projection.
    pub fn view_coordinates(&self) -> Result<Option<Coordinates>> {
        Ok(self.derived()?.map(|values| values.view_coordinates))
    }

    /// All derived values. Recomputed only after the revision advanced;
    /// `None` without a context, view, or live geometry.
    pub fn derived(&self) -> Result<Option<DerivedValues>> {
        let (Some(context), Some(_), Some(geometry)) = (
            self.context.as_ref(),
            self.deps.view.as_ref(),
            self.deps.geometry.upgrade(),
        ) else {
            return Ok(None);
        };

        let revision = self.revision();
        let mut cache = self.derived.borrow_mut();
        if cache.revision == Some(revision)
            && let Some(values) = &cache.values
        {
            return Ok(Some(values.clone()));
        }

        let native = geometry.coordinates();
        let bound = context.to_bind_projection(&native)?;
        let point = point_on_surface(&native)
            .map(|p| context.position_to_bind_projection(p))
            .transpose()?;
        let values = DerivedValues {
            extent: Extent::of(&bound),
            point,
            view_coordinates: native,
        };
        cache.revision = Some(revision);
        cache.values = Some(values.clone());
        trace!(revision, "derived values recomputed");
        Ok(Some(values))
    }

    fn update_sink(
        state: Weak<RefCell<SyncState>>,
        updates: Emitter<UpdateEvent>,
    ) -> impl Fn(UpdateEvent) -> Result<()> {
        move |event: UpdateEvent| {
            let Some(state) = state.upgrade() else {
                return Ok(());
            };
            let revision = {
                let mut st = state.borrow_mut();
                st.revision += 1;
                st.declared = Some(event.value.clone());
                st.revision
            };
            debug!(revision, event = %event.name(), "geometry changed; notifying");
            updates.emit(&event);
            Ok(())
        }
    }
}

impl Lifecycle for GeometryBinding {
    fn init(&mut self) -> Result<()> {
        if self.context.is_some() {
            return Ok(());
        }
        let context = BindingContext::new(
            self.kind(),
            &self.variant.transform_table(),
            self.deps.view.as_deref(),
            &self.options,
        )?;

        // The context is kept only once the stored declared value is in sync.
        let declared = self.state.borrow().declared.clone();
        if let Some(declared) = declared {
            self.write_through(&context, &declared)?;
        }
        self.context = Some(Rc::new(context));
        debug!(kind = %self.kind(), "geometry binding initialized");
        Ok(())
    }

    fn mount(&mut self) -> Result<()> {
        if self.pipeline.is_some() {
            return Ok(());
        }
        let context = self.context.clone().ok_or(Error::NotInitialized)?;
        let geometry = self
            .deps
            .geometry
            .upgrade()
            .ok_or(Error::MissingGeometry)?;

        self.pipeline = Some(ChangePipeline::attach(
            &geometry,
            context,
            self.deps.scheduler.clone(),
            self.options.throttle,
            Self::update_sink(Rc::downgrade(&self.state), self.updates.clone()),
        ));
        if let Some(container) = &self.deps.container {
            container.set_geometry(Some(geometry));
        }
        debug!(kind = %self.kind(), "geometry binding mounted");
        Ok(())
    }

    fn unmount(&mut self) -> Result<()> {
        let Some(mut pipeline) = self.pipeline.take() else {
            return Ok(());
        };
        pipeline.detach();
        if let Some(container) = &self.deps.container {
            container.set_geometry(None);
        }
        debug!(kind = %self.kind(), "geometry binding unmounted");
        Ok(())
    }

    fn deinit(&mut self) -> Result<()> {
        self.unmount()?;
        self.context = None;
        *self.derived.borrow_mut() = DerivedCache::default();
        Ok(())
    }
}

impl GeometryServices for GeometryBinding {
    fn geometry(&self) -> Option<GeometryHandle> {
        self.deps.geometry.upgrade()
    }
}
