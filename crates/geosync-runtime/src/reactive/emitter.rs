#![forbid(unsafe_code)]

//! Event emitter with RAII subscriptions.
//!
//! # Design
//!
//! [`Emitter<E>`] keeps its listeners as `Weak` callbacks in shared
//! (`Rc<RefCell<..>>`) storage. [`Emitter::subscribe`] hands the only strong
//! reference back to the caller inside a [`Subscription`]; dropping the guard
//! makes the callback unreachable before the next emission.
//!
//! Unlike a value cell, an emitter has no current value and no equality
//! gate: every [`Emitter::emit`] reaches every live listener.
//!
//! # Failure Modes
//!
//! - **Re-entrant emit**: a listener may emit on the same emitter; the
//!   listener list is snapshotted before callbacks run, so the nested emission
//!   sees the same listeners and no borrow is held across calls.
//! - **Subscriber leak**: guards stored forever keep callbacks alive. Dead
//!   entries are pruned lazily on the next emission.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type ListenerRc<E> = Rc<dyn Fn(&E)>;
type ListenerWeak<E> = Weak<dyn Fn(&E)>;

/// A shared, multi-listener event source.
///
/// Cloning an `Emitter` creates another handle to the **same** listener list.
pub struct Emitter<E> {
    listeners: Rc<RefCell<Vec<ListenerWeak<E>>>>,
    emitted: Rc<Cell<u64>>,
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: Rc::clone(&self.listeners),
            emitted: Rc::clone(&self.emitted),
        }
    }
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listener_count", &self.listeners.borrow().len())
            .field("emitted", &self.emitted.get())
            .finish()
    }
}

impl<E: 'static> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> Emitter<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(Vec::new())),
            emitted: Rc::new(Cell::new(0)),
        }
    }

    /// Register a listener. It stays registered while the returned guard
    /// lives.
    pub fn subscribe(&self, listener: impl Fn(&E) + 'static) -> Subscription {
        let strong: ListenerRc<E> = Rc::new(listener);
        self.listeners.borrow_mut().push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Deliver `event` to every live listener in registration order.
    pub fn emit(&self, event: &E) {
        let live: Vec<ListenerRc<E>> = {
            let mut listeners = self.listeners.borrow_mut();
            listeners.retain(|w| w.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        self.emitted.set(self.emitted.get() + 1);
        for listener in &live {
            listener(event);
        }
    }

    /// Registered listeners, including dead ones not yet pruned.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Listeners whose guard is still alive.
    #[must_use]
    pub fn live_listener_count(&self) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Total number of `emit` calls.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.emitted.get()
    }
}

/// RAII guard for a listener.
///
/// Holds the only strong reference to the callback; dropping it leaves a dead
/// `Weak` in the emitter that is skipped and pruned on the next emission.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
