#![forbid(unsafe_code)]

//! Reactive notification primitives for geosync.
//!
//! - [`Emitter`]: a shared event source with listener callbacks.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//!
//! # Architecture
//!
//! Everything here is single-threaded: `Rc<RefCell<..>>` storage, listeners
//! held as `Weak` callbacks and pruned lazily during emission.
//!
//! # Invariants
//!
//! 1. Listeners are notified in registration order.
//! 2. Dropping a [`Subscription`] removes its callback before the next
//!    emission.
//! 3. No borrow of the listener list is held while callbacks run.

pub mod emitter;

pub use emitter::{Emitter, Subscription};
