#![forbid(unsafe_code)]

//! Change pipeline: native mutation notifications to declared-projection
//! update events.
//!
//! # Stages
//!
//! ```text
//! geometry change ──▶ ThrottleStage ──(timer)──▶ RemapStage ──▶ DedupStage ──▶ sink
//!   (sample native)     trailing edge              to bind       vs. last
//!                                                  projection    emission
//! ```
//!
//! Each stage is a plain struct with its own tests. [`ChangePipeline`] wires
//! them to a [`GeometryHandle`] and a [`Scheduler`].
//!
//! # Throttle semantics
//!
//! The first notification in a quiet period opens a window and schedules a
//! flush `interval` later. Further notifications inside the window replace
//! the pending sample. The flush emits whatever sample is pending at that
//! moment, so a burst of N mutations yields exactly one emission carrying the
//! last state.
//!
//! # Invariants
//!
//! | Property | Guarantee |
//! |----------|-----------|
//! | Completeness | Every window that saw a notification ends in a flush |
//! | Ordering | A newer sample always supersedes an older one |
//! | Dedup | Two consecutive emissions with no external write between them are never [`snapshots_equal`] |
//! | Teardown | After [`ChangePipeline::detach`] nothing reaches the sink |
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Remap fails at flush | Error returned from the scheduler drive call; the sample is dropped |
//! | Sink returns `Err` | Same as above |
//! | Geometry dropped mid-window | Pending sample still flushes; later notifications cannot arrive |

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use geosync_core::{Coordinates, Result, Snapshot, snapshots_equal};
use tracing::{debug, trace};
use web_time::{Duration, Instant};

use crate::context::BindingContext;
use crate::geometry::{GeometryChange, GeometryHandle};
use crate::reactive::Subscription;
use crate::scheduler::{Scheduler, TimerId};

/// Name of the declared coordinate property.
pub const COORDINATES_PROPERTY: &str = "coordinates";

/// Event name hosts see for coordinate updates.
pub const UPDATE_COORDINATES_EVENT: &str = "update:coordinates";

/// Throttle interval used when none is configured.
pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_millis(100);

/// Throttle settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Length of a throttle window.
    pub interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_THROTTLE_INTERVAL,
        }
    }
}

impl ThrottleConfig {
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// A property change surfaced to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEvent {
    pub property: &'static str,
    pub value: Coordinates,
}

impl UpdateEvent {
    #[must_use]
    pub fn coordinates(value: Coordinates) -> Self {
        Self {
            property: COORDINATES_PROPERTY,
            value,
        }
    }

    /// `update:<property>`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("update:{}", self.property)
    }
}

// =============================================================================
// Throttle stage
// =============================================================================

/// Result of offering a sample to the throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleAction {
    /// A new window opened; the caller must flush at `flush_at`.
    OpenWindow { flush_at: Instant },
    /// The sample replaced the pending one in the open window.
    Coalesced,
}

/// Trailing-edge throttle holding at most one pending sample.
#[derive(Debug)]
pub struct ThrottleStage<T> {
    interval: Duration,
    flush_at: Option<Instant>,
    pending: Option<T>,
    coalesced: u64,
}

impl<T> ThrottleStage<T> {
    #[must_use]
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            interval: config.interval,
            flush_at: None,
            pending: None,
            coalesced: 0,
        }
    }

    /// Offer a sample observed at `now`.
    pub fn offer_at(&mut self, sample: T, now: Instant) -> ThrottleAction {
        self.pending = Some(sample);
        if self.flush_at.is_some() {
            self.coalesced += 1;
            return ThrottleAction::Coalesced;
        }
        let flush_at = now + self.interval;
        self.flush_at = Some(flush_at);
        ThrottleAction::OpenWindow { flush_at }
    }

    /// Close the window and take the trailing sample.
    pub fn flush(&mut self) -> Option<T> {
        self.flush_at = None;
        self.pending.take()
    }

    /// Close the window and discard the pending sample.
    pub fn cancel(&mut self) {
        self.flush_at = None;
        self.pending = None;
    }

    #[must_use]
    pub fn is_window_open(&self) -> bool {
        self.flush_at.is_some()
    }

    #[must_use]
    pub fn flush_at(&self) -> Option<Instant> {
        self.flush_at
    }

    #[must_use]
    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref()
    }

    /// Samples superseded inside a window so far.
    #[must_use]
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

// =============================================================================
// Remap and dedup stages
// =============================================================================

/// Maps native samples into the bind projection.
#[derive(Debug, Clone)]
pub struct RemapStage {
    context: Rc<BindingContext>,
}

impl RemapStage {
    #[must_use]
    pub fn new(context: Rc<BindingContext>) -> Self {
        Self { context }
    }

    pub fn apply(&self, native: &Coordinates) -> Result<Snapshot> {
        Ok(Snapshot::new(self.context.to_bind_projection(native)?))
    }
}

/// Drops a snapshot equal to the previous emission.
#[derive(Debug, Default)]
pub struct DedupStage {
    last: Option<Snapshot>,
    dropped: u64,
}

impl DedupStage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass `snapshot` through unless it equals the last one admitted.
    pub fn admit(&mut self, snapshot: Snapshot) -> Option<Snapshot> {
        if self
            .last
            .as_ref()
            .is_some_and(|last| snapshots_equal(last, &snapshot))
        {
            self.dropped += 1;
            return None;
        }
        self.last = Some(snapshot.clone());
        Some(snapshot)
    }

    /// Forget the last emission so the next snapshot always passes.
    pub fn reset(&mut self) {
        self.last = None;
    }

    #[must_use]
    pub fn last(&self) -> Option<&Snapshot> {
        self.last.as_ref()
    }

    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

// =============================================================================
// Pipeline
// =============================================================================

type Sink = Rc<dyn Fn(UpdateEvent) -> Result<()>>;

struct PipelineState {
    throttle: ThrottleStage<Coordinates>,
    remap: RemapStage,
    dedup: DedupStage,
    timer: Option<TimerId>,
    active: bool,
    emitted: u64,
    sink: Sink,
}

/// Throttle, remap, and dedup wired to a geometry's change notifications.
///
/// Detaches on drop.
pub struct ChangePipeline {
    state: Rc<RefCell<PipelineState>>,
    scheduler: Scheduler,
    subscription: Option<Subscription>,
}

impl fmt::Debug for ChangePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ChangePipeline")
            .field("active", &state.active)
            .field("window_open", &state.throttle.is_window_open())
            .field("emitted", &state.emitted)
            .finish()
    }
}

impl ChangePipeline {
    /// Subscribe to `geometry` and start forwarding updates to `sink`.
    pub fn attach(
        geometry: &GeometryHandle,
        context: Rc<BindingContext>,
        scheduler: Scheduler,
        config: ThrottleConfig,
        sink: impl Fn(UpdateEvent) -> Result<()> + 'static,
    ) -> Self {
        let state = Rc::new(RefCell::new(PipelineState {
            throttle: ThrottleStage::new(config),
            remap: RemapStage::new(context),
            dedup: DedupStage::new(),
            timer: None,
            active: true,
            emitted: 0,
            sink: Rc::new(sink),
        }));

        let weak_state = Rc::downgrade(&state);
        let weak_geometry = geometry.downgrade();
        let timers = scheduler.clone();
        let subscription = geometry.on_change(move |change| {
            let (Some(state), Some(geometry)) = (weak_state.upgrade(), weak_geometry.upgrade())
            else {
                return;
            };
            Self::handle_change(&state, &geometry, &timers, change);
        });

        debug!(
            kind = %geometry.kind(),
            interval = ?config.interval,
            "change pipeline attached"
        );
        Self {
            state,
            scheduler,
            subscription: Some(subscription),
        }
    }

    fn handle_change(
        state: &Rc<RefCell<PipelineState>>,
        geometry: &GeometryHandle,
        scheduler: &Scheduler,
        change: &GeometryChange,
    ) {
        let mut st = state.borrow_mut();
        if !st.active {
            return;
        }
        let now = scheduler.now();
        match st.throttle.offer_at(geometry.coordinates(), now) {
            ThrottleAction::OpenWindow { flush_at } => {
                let weak = Rc::downgrade(state);
                let delay = flush_at.saturating_duration_since(now);
                let id = scheduler.schedule_after(delay, move || match weak.upgrade() {
                    Some(state) => Self::flush(&state),
                    None => Ok(()),
                });
                st.timer = Some(id);
                trace!(revision = change.revision, "throttle window opened");
            }
            ThrottleAction::Coalesced => {
                trace!(revision = change.revision, "change coalesced into open window");
            }
        }
    }

    fn flush(state: &Rc<RefCell<PipelineState>>) -> Result<()> {
        let (event, sink) = {
            let mut st = state.borrow_mut();
            st.timer = None;
            if !st.active {
                return Ok(());
            }
            let Some(sample) = st.throttle.flush() else {
                return Ok(());
            };
            let snapshot = st.remap.apply(&sample)?;
            let Some(snapshot) = st.dedup.admit(snapshot) else {
                trace!("duplicate snapshot dropped");
                return Ok(());
            };
            st.emitted += 1;
            (
                UpdateEvent::coordinates(snapshot.into_coordinates()),
                Rc::clone(&st.sink),
            )
        };
        trace!(property = event.property, "emitting update");
        sink(event)
    }

    /// Record that the geometry was written from outside the pipeline.
    ///
    /// The last emission no longer describes the declared value, so the next
    /// flush passes dedup even when it repeats that emission.
    pub fn note_external_write(&self) {
        let mut st = self.state.borrow_mut();
        if st.active && st.dedup.last().is_some() {
            st.dedup.reset();
            trace!("dedup baseline cleared by external write");
        }
    }

    /// Stop observing and cancel any pending flush. Idempotent.
    pub fn detach(&mut self) {
        let was_subscribed = self.subscription.take().is_some();
        let timer = {
            let mut st = self.state.borrow_mut();
            st.active = false;
            st.throttle.cancel();
            st.timer.take()
        };
        if let Some(id) = timer
            && self.scheduler.cancel(id)
        {
            debug!("pending flush cancelled on detach");
        }
        if was_subscribed {
            debug!("change pipeline detached");
        }
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Whether a throttle window is open with a flush scheduled.
    #[must_use]
    pub fn has_pending_flush(&self) -> bool {
        self.state.borrow().timer.is_some()
    }

    /// Updates forwarded to the sink so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.state.borrow().emitted
    }

    /// Flushes dropped as duplicates so far.
    #[must_use]
    pub fn deduplicated(&self) -> u64 {
        self.state.borrow().dedup.dropped()
    }
}

impl Drop for ChangePipeline {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BindOptions;
    use crate::view::StaticView;
    use geosync_core::{GeometryKind, Projection, TransformTable};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn identity_context(kind: GeometryKind) -> Rc<BindingContext> {
        let view = StaticView::default();
        Rc::new(
            BindingContext::new(
                kind,
                &TransformTable::standard(),
                Some(&view),
                &BindOptions::new(),
            )
            .unwrap(),
        )
    }

    fn recorder() -> (Rc<RefCell<Vec<UpdateEvent>>>, impl Fn(UpdateEvent) -> Result<()>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink_log = Rc::clone(&log);
        (log, move |event| {
            sink_log.borrow_mut().push(event);
            Ok(())
        })
    }

    #[test]
    fn throttle_opens_then_coalesces() {
        let t0 = Instant::now();
        let mut throttle = ThrottleStage::new(ThrottleConfig::default());
        assert_eq!(
            throttle.offer_at(1, t0),
            ThrottleAction::OpenWindow {
                flush_at: t0 + ms(100)
            }
        );
        assert_eq!(throttle.offer_at(2, t0 + ms(10)), ThrottleAction::Coalesced);
        assert_eq!(throttle.offer_at(3, t0 + ms(20)), ThrottleAction::Coalesced);
        assert_eq!(throttle.pending(), Some(&3));
        assert_eq!(throttle.coalesced(), 2);

        assert_eq!(throttle.flush(), Some(3));
        assert!(!throttle.is_window_open());
        assert_eq!(throttle.flush(), None);
    }

    #[test]
    fn throttle_cancel_discards_pending() {
        let mut throttle = ThrottleStage::new(ThrottleConfig::default());
        throttle.offer_at("a", Instant::now());
        throttle.cancel();
        assert!(!throttle.is_window_open());
        assert_eq!(throttle.flush(), None);
    }

    #[test]
    fn dedup_drops_consecutive_equal() {
        let mut dedup = DedupStage::new();
        let a = Snapshot::new(Coordinates::Point([1.0, 1.0]));
        let b = Snapshot::new(Coordinates::Point([2.0, 2.0]));

        assert!(dedup.admit(a.clone()).is_some());
        assert!(dedup.admit(a.clone()).is_none());
        assert!(dedup.admit(b).is_some());
        // Only the immediately preceding emission counts.
        assert!(dedup.admit(a).is_some());
        assert_eq!(dedup.dropped(), 1);
    }

    #[test]
    fn dedup_reset_admits_previous_value() {
        let mut dedup = DedupStage::new();
        let a = Snapshot::new(Coordinates::Point([1.0, 1.0]));
        assert!(dedup.admit(a.clone()).is_some());
        dedup.reset();
        assert!(dedup.last().is_none());
        assert!(dedup.admit(a).is_some());
        assert_eq!(dedup.dropped(), 0);
    }

    #[test]
    fn remap_converts_to_bind_projection() {
        let view = StaticView::new(Projection::utm(31, true).unwrap());
        let ctx = BindingContext::new(
            GeometryKind::Point,
            &TransformTable::standard(),
            Some(&view),
            &BindOptions::new().with_bind_projection(Projection::wgs84()),
        )
        .unwrap();
        let remap = RemapStage::new(Rc::new(ctx));
        let snap = remap
            .apply(&Coordinates::Point([500_000.0, 0.0]))
            .unwrap();
        assert_eq!(snap.coordinates, Coordinates::Point([3.0, 0.0]));
    }

    #[test]
    fn burst_emits_last_state_once() {
        let sched = Scheduler::manual(Instant::now());
        let geom = GeometryHandle::new(Coordinates::Point([0.0, 0.0]));
        let (log, sink) = recorder();
        let pipeline = ChangePipeline::attach(
            &geom,
            identity_context(GeometryKind::Point),
            sched.clone(),
            ThrottleConfig::default(),
            sink,
        );

        for i in 1..=5 {
            geom.set_coordinates(Coordinates::Point([f64::from(i), 0.0]))
                .unwrap();
            sched.advance(ms(10)).unwrap();
        }
        assert!(log.borrow().is_empty());
        assert!(pipeline.has_pending_flush());

        sched.advance(ms(100)).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![UpdateEvent::coordinates(Coordinates::Point([5.0, 0.0]))]
        );
        assert_eq!(pipeline.emitted(), 1);
    }

    #[test]
    fn unchanged_window_is_deduplicated() {
        let sched = Scheduler::manual(Instant::now());
        let geom = GeometryHandle::new(Coordinates::Point([0.0, 0.0]));
        let (log, sink) = recorder();
        let pipeline = ChangePipeline::attach(
            &geom,
            identity_context(GeometryKind::Point),
            sched.clone(),
            ThrottleConfig::default(),
            sink,
        );

        geom.set_coordinates(Coordinates::Point([1.0, 1.0])).unwrap();
        sched.advance(ms(100)).unwrap();
        geom.touch();
        sched.advance(ms(100)).unwrap();

        assert_eq!(log.borrow().len(), 1);
        assert_eq!(pipeline.deduplicated(), 1);
    }

    #[test]
    fn external_write_clears_dedup_baseline() {
        let sched = Scheduler::manual(Instant::now());
        let geom = GeometryHandle::new(Coordinates::Point([0.0, 0.0]));
        let (log, sink) = recorder();
        let pipeline = ChangePipeline::attach(
            &geom,
            identity_context(GeometryKind::Point),
            sched.clone(),
            ThrottleConfig::default(),
            sink,
        );

        geom.set_coordinates(Coordinates::Point([1.0, 1.0])).unwrap();
        sched.advance(ms(100)).unwrap();
        pipeline.note_external_write();
        geom.touch();
        sched.advance(ms(100)).unwrap();

        assert_eq!(log.borrow().len(), 2);
        assert_eq!(pipeline.deduplicated(), 0);
    }

    #[test]
    fn detach_cancels_pending_flush() {
        let sched = Scheduler::manual(Instant::now());
        let geom = GeometryHandle::new(Coordinates::Point([0.0, 0.0]));
        let (log, sink) = recorder();
        let mut pipeline = ChangePipeline::attach(
            &geom,
            identity_context(GeometryKind::Point),
            sched.clone(),
            ThrottleConfig::default(),
            sink,
        );

        geom.set_coordinates(Coordinates::Point([1.0, 1.0])).unwrap();
        assert_eq!(sched.pending_timers(), 1);
        pipeline.detach();
        assert_eq!(sched.pending_timers(), 0);
        assert_eq!(geom.listener_count(), 0);

        geom.set_coordinates(Coordinates::Point([2.0, 2.0])).unwrap();
        sched.advance(ms(500)).unwrap();
        assert!(log.borrow().is_empty());
        assert!(!pipeline.is_attached());
    }

    #[test]
    fn drop_detaches() {
        let sched = Scheduler::manual(Instant::now());
        let geom = GeometryHandle::new(Coordinates::Point([0.0, 0.0]));
        let (log, sink) = recorder();
        let pipeline = ChangePipeline::attach(
            &geom,
            identity_context(GeometryKind::Point),
            sched.clone(),
            ThrottleConfig::default(),
            sink,
        );
        geom.touch();
        drop(pipeline);

        sched.advance(ms(200)).unwrap();
        assert!(log.borrow().is_empty());
        assert_eq!(sched.pending_timers(), 0);
    }

    #[test]
    fn custom_interval_is_respected() {
        let sched = Scheduler::manual(Instant::now());
        let geom = GeometryHandle::new(Coordinates::Point([0.0, 0.0]));
        let (log, sink) = recorder();
        let _pipeline = ChangePipeline::attach(
            &geom,
            identity_context(GeometryKind::Point),
            sched.clone(),
            ThrottleConfig::default().with_interval(ms(20)),
            sink,
        );

        geom.touch();
        sched.advance(ms(19)).unwrap();
        assert!(log.borrow().is_empty());
        sched.advance(ms(1)).unwrap();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn event_name_is_prefixed() {
        let event = UpdateEvent::coordinates(Coordinates::Point([0.0, 0.0]));
        assert_eq!(event.name(), UPDATE_COORDINATES_EVENT);
    }
}
