#![forbid(unsafe_code)]

//! Cooperative single-threaded timer scheduler.
//!
//! Deferred work (throttle flushes) is queued here as one-shot timers and run
//! when the host drives the scheduler with [`Scheduler::run_until`],
//! [`Scheduler::advance`], or [`Scheduler::run_pending`]. Nothing runs on
//! another thread, so a task never overlaps a synchronous write path.
//!
//! # Clocks
//!
//! - [`Scheduler::new`] reads the system clock.
//! - [`Scheduler::manual`] starts from a fixed instant and only moves when
//!   the scheduler is driven. Tests use it to step through throttle windows
//!   deterministically.
//!
//! # Invariants
//!
//! | Property | Guarantee |
//! |----------|-----------|
//! | Ordering | Timers fire by `(deadline, schedule order)` |
//! | Cancellation | A cancelled timer never runs |
//! | Re-entrancy | No internal borrow is held while a task runs; tasks may schedule or cancel |
//! | Logical time | While a task runs, a manual clock reads that task's deadline |
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Task returns `Err` | Driving stops and a manual clock still reaches the target; the error is returned. Later timers stay queued for the next drive call |
//! | Cancel of a fired timer | Returns `false` |

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::rc::Rc;

use geosync_core::Result;
use tracing::trace;
use web_time::{Duration, Instant};

/// Identifier of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Where the scheduler reads "now" from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    System,
    Manual,
}

type Task = Box<dyn FnOnce() -> Result<()>>;

struct SchedulerInner {
    mode: ClockMode,
    /// Manual clock reading. Unused in system mode.
    now: Instant,
    next_seq: u64,
    queue: BinaryHeap<Reverse<(Instant, u64)>>,
    tasks: HashMap<u64, Task>,
    fired: u64,
}

impl SchedulerInner {
    fn pop_due(&mut self, now: Instant) -> Option<(Instant, u64, Task)> {
        while let Some(&Reverse((deadline, seq))) = self.queue.peek() {
            if !self.tasks.contains_key(&seq) {
                // Cancelled; drop the stale heap entry.
                self.queue.pop();
                continue;
            }
            if deadline > now {
                return None;
            }
            self.queue.pop();
            return self.tasks.remove(&seq).map(|task| (deadline, seq, task));
        }
        None
    }
}

/// Shared handle to a cooperative timer queue.
///
/// Cloning shares the same queue and clock.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field("mode", &inner.mode)
            .field("pending", &inner.tasks.len())
            .field("fired", &inner.fired)
            .finish()
    }
}

impl Scheduler {
    /// Scheduler driven by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(ClockMode::System, Instant::now())
    }

    /// Scheduler with a manual clock starting at `start`.
    #[must_use]
    pub fn manual(start: Instant) -> Self {
        Self::with_mode(ClockMode::Manual, start)
    }

    fn with_mode(mode: ClockMode, start: Instant) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                mode,
                now: start,
                next_seq: 0,
                queue: BinaryHeap::new(),
                tasks: HashMap::new(),
                fired: 0,
            })),
        }
    }

    #[must_use]
    pub fn mode(&self) -> ClockMode {
        self.inner.borrow().mode
    }

    /// Current time as seen by scheduled work.
    #[must_use]
    pub fn now(&self) -> Instant {
        let inner = self.inner.borrow();
        match inner.mode {
            ClockMode::System => Instant::now(),
            ClockMode::Manual => inner.now,
        }
    }

    /// Queue `task` to run once `delay` has elapsed.
    pub fn schedule_after(
        &self,
        delay: Duration,
        task: impl FnOnce() -> Result<()> + 'static,
    ) -> TimerId {
        let deadline = self.now() + delay;
        let mut inner = self.inner.borrow_mut();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.queue.push(Reverse((deadline, seq)));
        inner.tasks.insert(seq, Box::new(task));
        trace!(timer = seq, ?delay, "timer scheduled");
        TimerId(seq)
    }

    /// Cancel a pending timer. Returns whether it was still pending.
    pub fn cancel(&self, id: TimerId) -> bool {
        let removed = self.inner.borrow_mut().tasks.remove(&id.0).is_some();
        if removed {
            trace!(timer = id.0, "timer cancelled");
        }
        removed
    }

    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.inner.borrow().tasks.contains_key(&id.0)
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.borrow().tasks.len()
    }

    /// Total number of timers that have run.
    #[must_use]
    pub fn fired(&self) -> u64 {
        self.inner.borrow().fired
    }

    /// Deadline of the earliest pending timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        let mut inner = self.inner.borrow_mut();
        while let Some(&Reverse((deadline, seq))) = inner.queue.peek() {
            if inner.tasks.contains_key(&seq) {
                return Some(deadline);
            }
            inner.queue.pop();
        }
        None
    }

    /// Run every timer due at or before `now`, in deadline order.
    ///
    /// Timers scheduled by running tasks are included when they also fall
    /// due by `now`. A manual clock ends at `now` (it never moves backward).
    /// Returns the number of timers that ran.
    pub fn run_until(&self, now: Instant) -> Result<usize> {
        let mut ran = 0;
        loop {
            let task = {
                let mut inner = self.inner.borrow_mut();
                let Some((deadline, seq, task)) = inner.pop_due(now) else {
                    break;
                };
                if inner.mode == ClockMode::Manual && deadline > inner.now {
                    inner.now = deadline;
                }
                inner.fired += 1;
                trace!(timer = seq, "timer fired");
                task
            };
            ran += 1;
            if let Err(err) = task() {
                self.settle_clock(now);
                return Err(err);
            }
        }

        self.settle_clock(now);
        Ok(ran)
    }

    /// Move a manual clock up to `now`, never backward.
    fn settle_clock(&self, now: Instant) {
        let mut inner = self.inner.borrow_mut();
        if inner.mode == ClockMode::Manual && now > inner.now {
            inner.now = now;
        }
    }

    /// Move the clock forward by `by` and run everything that fell due.
    pub fn advance(&self, by: Duration) -> Result<usize> {
        self.run_until(self.now() + by)
    }

    /// Run timers already due without moving a manual clock.
    pub fn run_pending(&self) -> Result<usize> {
        self.run_until(self.now())
    }
}
