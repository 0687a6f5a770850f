#![forbid(unsafe_code)]

//! Runtime: reactive binding between declared coordinates and a renderer
//! geometry.
//!
//! # Role in geosync
//! `geosync-runtime` drives the pure pieces from `geosync-core` on a
//! single-threaded event loop. A [`GeometryBinding`] owns one declared
//! coordinate property; the renderer owns the [`GeometryHandle`]. Writes flow
//! one way through [`GeometryBinding::set_coordinates`], renderer mutations
//! flow back through the [`ChangePipeline`].
//!
//! # Primary responsibilities
//! - **Emitter / Subscription**: listener registration with RAII teardown.
//! - **Scheduler**: cancelable one-shot timers with a manual clock for tests.
//! - **BindingContext**: transform and projections resolved once at init.
//! - **ChangePipeline**: trailing-edge throttle, remap, dedup.
//! - **GeometryBinding**: the synchronization controller and its lifecycle.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use geosync_core::{Coordinates, GeometryKind, Projection};
//! use geosync_runtime::{
//!     BindOptions, BindingDeps, GeometryBinding, GeometryHandle, Lifecycle, Scheduler,
//!     StaticView,
//! };
//! use web_time::{Duration, Instant};
//!
//! let scheduler = Scheduler::manual(Instant::now());
//! let geometry = GeometryHandle::new(Coordinates::Point([0.0, 0.0]));
//! let deps = BindingDeps::new(&geometry, scheduler.clone())
//!     .with_view(Rc::new(StaticView::new(Projection::web_mercator())));
//! let mut binding = GeometryBinding::new(GeometryKind::Point, deps, BindOptions::new());
//!
//! binding.init()?;
//! binding.mount()?;
//! binding.set_coordinates(Coordinates::Point([10.0, 20.0]))?;
//! scheduler.advance(Duration::from_millis(100))?;
//! assert_eq!(binding.revision(), 1);
//! # Ok::<(), geosync_core::Error>(())
//! ```

pub mod binding;
pub mod context;
pub mod geometry;
#[cfg(feature = "logging")]
pub mod logging;
pub mod pipeline;
pub mod reactive;
pub mod scheduler;
pub mod view;

pub use binding::{
    BindingDeps, CustomVariant, DerivedValues, GeometryBinding, GeometryServices,
    GeometryVariant, Lifecycle, SyncOutcome,
};
pub use context::{BindOptions, BindingContext};
pub use geometry::{GeometryChange, GeometryHandle, WeakGeometryHandle};
pub use pipeline::{
    COORDINATES_PROPERTY, ChangePipeline, DEFAULT_THROTTLE_INTERVAL, DedupStage, RemapStage,
    ThrottleAction, ThrottleConfig, ThrottleStage, UPDATE_COORDINATES_EVENT, UpdateEvent,
};
pub use reactive::{Emitter, Subscription};
pub use scheduler::{ClockMode, Scheduler, TimerId};
pub use view::{GeometryContainer, GeometrySlot, MapView, StaticView};
