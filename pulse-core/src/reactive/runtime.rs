//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computeds,
//! and effects. It owns all shared state of one reactive graph:
//!
//! - the subscriber arena (id → notification callback)
//! - the dependency registry (subscriber → subscriber-sets it has joined)
//! - the pending queue and flush engine
//! - the tracking stack and batch controller
//!
//! Because the runtime is an explicit object rather than a process-wide
//! singleton, independent graphs (one per test case, or per isolated
//! subsystem) never share accidental state.
//!
//! # Propagation
//!
//! A write enqueues the signal's subscribers and requests a flush. Outside a
//! batch the flush runs immediately, draining the queue to exhaustion on the
//! caller's stack: each drained subscriber is an effect wrapper (re-runs the
//! user callback) or a computed's invalidation marker (marks dirty and
//! enqueues the computed's own subscribers, producing transitive fan-out).
//! Subscribers enqueued while the drain is in progress are picked up by the
//! same drain, so a write is fully propagated before the triggering call
//! returns.
//!
//! Ordering is enqueue order: subscribers of the same signal run in their
//! subscriber set's insertion order, and relayed notifications run where the
//! relay put them in the queue. There is no topological sorting, so the
//! engine is not glitch-free across diamond-shaped graphs; see the
//! integration tests for the documented behavior.

use std::collections::HashMap;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::context::{TrackingGuard, TrackingStack};
use super::{Computed, Effect, NotifyFn, Signal, SubscriberId, SubscriberSet};

/// An explicit reactive graph.
///
/// `Runtime` is a cheap handle; clones share the same graph. All four public
/// operations of the engine hang off it:
///
/// ```rust
/// use pulse_core::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.signal(1);
/// let c = count.clone();
/// let double = rt.computed(move || c.get() * 2);
///
/// assert_eq!(double.get(), 2);
/// count.set(5);
/// assert_eq!(double.get(), 10);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

pub(crate) struct RuntimeInner {
    /// Allocator for subscriber ids; never reused.
    next_id: AtomicU64,

    /// Subscriber arena: id → notification callback. Entries are removed on
    /// unsubscription; a queued id with no arena entry is skipped.
    arena: RwLock<HashMap<SubscriberId, NotifyFn>>,

    /// Dependency registry: subscriber → the subscriber-sets it has joined.
    /// Holds weak back-references only (the sets are owned by their
    /// signals/computeds) and is consulted solely for disposal and re-run
    /// reconciliation, never during propagation.
    registry: Mutex<HashMap<SubscriberId, SmallVec<[Weak<SubscriberSet>; 4]>>>,

    /// Distinct subscriber ids awaiting execution, in enqueue order.
    pending: Mutex<IndexSet<SubscriberId>>,

    /// The currently evaluating subscriber, for dependency discovery.
    tracking: Arc<TrackingStack>,

    /// Batch reentrancy depth. While non-zero, flush requests are deferred.
    batch_depth: AtomicUsize,

    /// Set while the flush engine is draining, so reentrant flush requests
    /// fold into the active drain instead of recursing.
    flushing: AtomicBool,
}

impl Runtime {
    /// Create an empty reactive graph.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                next_id: AtomicU64::new(0),
                arena: RwLock::new(HashMap::new()),
                registry: Mutex::new(HashMap::new()),
                pending: Mutex::new(IndexSet::new()),
                tracking: Arc::new(TrackingStack::new()),
                batch_depth: AtomicUsize::new(0),
                flushing: AtomicBool::new(false),
            }),
        }
    }

    /// Create a signal holding `initial`.
    pub fn signal<T>(&self, initial: T) -> Signal<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Signal::new(self.clone(), initial)
    }

    /// Create a lazily evaluated, memoized derived value.
    ///
    /// `compute` does not run here; it runs on the first read.
    pub fn computed<T, F>(&self, compute: F) -> Computed<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Computed::new(self.clone(), compute)
    }

    /// Create an effect.
    ///
    /// `f` runs immediately, once, with dependency tracking active; it then
    /// re-runs whenever any signal or computed it read during its latest run
    /// changes. The returned handle unsubscribes the effect.
    pub fn effect<F>(&self, f: F) -> Effect
    where
        F: Fn() + Send + Sync + 'static,
    {
        Effect::new(self.clone(), f)
    }

    /// Run `f` with flushing deferred until the outermost batch exits.
    ///
    /// Writes inside the batch enqueue their subscribers but do not flush;
    /// nested batches share the same queue and never flush independently.
    /// When the outermost scope exits, everything accumulated is flushed in
    /// a single pass.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.batch_depth.fetch_add(1, Ordering::SeqCst);
        let _guard = BatchGuard { runtime: self };
        f()
    }

    // ------------------------------------------------------------------
    // Plumbing used by the primitives
    // ------------------------------------------------------------------

    pub(crate) fn next_subscriber_id(&self) -> SubscriberId {
        SubscriberId::from_raw(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Install a subscriber's notification callback in the arena.
    pub(crate) fn register_subscriber(&self, id: SubscriberId, notify: NotifyFn) {
        self.inner.arena.write().insert(id, notify);
    }

    /// Remove a subscriber's arena entry. Still-queued occurrences of the id
    /// are skipped by the drain loop.
    pub(crate) fn remove_subscriber(&self, id: SubscriberId) {
        self.inner.arena.write().remove(&id);
    }

    /// Register the currently evaluating subscriber (if any) into the given
    /// subscriber set, recording the join in the dependency registry.
    ///
    /// Called by `Signal::get` and `Computed::get`. Outside any tracked
    /// evaluation this is a no-op.
    pub(crate) fn track_read(&self, subscribers: &Arc<SubscriberSet>) {
        let Some(id) = self.inner.tracking.current() else {
            return;
        };

        if subscribers.insert(id) {
            self.inner
                .registry
                .lock()
                .entry(id)
                .or_default()
                .push(Arc::downgrade(subscribers));
        }
    }

    /// Remove `id` from every subscriber set it has joined and clear its
    /// registry entry. Idempotent.
    ///
    /// Used by effect/computed re-runs (replace-on-each-run dependency
    /// reconciliation) and by unsubscription.
    pub(crate) fn clear_registrations(&self, id: SubscriberId) {
        let Some(joined) = self.inner.registry.lock().remove(&id) else {
            return;
        };

        for set in joined {
            if let Some(set) = set.upgrade() {
                set.remove(id);
            }
        }
    }

    /// Push a tracking frame for `id`; reads register against it until the
    /// guard drops.
    pub(crate) fn enter(&self, id: SubscriberId) -> TrackingGuard {
        self.inner.tracking.enter(id)
    }

    /// Add subscriber ids to the pending queue, deduplicating against
    /// entries already waiting.
    pub(crate) fn enqueue(&self, ids: Vec<SubscriberId>) {
        if ids.is_empty() {
            return;
        }
        self.inner.pending.lock().extend(ids);
    }

    /// Flush now unless a batch is active. Called after every write.
    pub(crate) fn request_flush(&self) {
        if self.inner.batch_depth.load(Ordering::SeqCst) > 0 {
            return;
        }
        self.run_flush();
    }

    /// Drain the pending queue to exhaustion.
    ///
    /// Each drained subscriber may enqueue further subscribers (a computed's
    /// invalidation marker enqueues its readers); those are drained by the
    /// same loop. A panicking callback is isolated: the drain continues with
    /// the next subscriber and the first captured unwind resumes after the
    /// queue is empty.
    fn run_flush(&self) {
        if self.inner.flushing.swap(true, Ordering::SeqCst) {
            // A drain is already in progress higher up the stack; the
            // entries just enqueued will be picked up by its loop.
            return;
        }

        trace!(pending = self.inner.pending.lock().len(), "flush start");

        let mut first_panic = None;

        loop {
            let next = self.inner.pending.lock().shift_remove_index(0);
            let Some(id) = next else {
                break;
            };

            // Unsubscribed while queued: permanently inert, skip.
            let Some(notify) = self.inner.arena.read().get(&id).cloned() else {
                continue;
            };

            trace!(subscriber = id.raw(), "running subscriber");
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| notify())) {
                debug!(subscriber = id.raw(), "subscriber panicked during flush");
                first_panic.get_or_insert(payload);
            }
        }

        self.inner.flushing.store(false, Ordering::SeqCst);

        if let Some(payload) = first_panic {
            resume_unwind(payload);
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("subscribers", &self.inner.arena.read().len())
            .field("pending", &self.inner.pending.lock().len())
            .field(
                "batch_depth",
                &self.inner.batch_depth.load(Ordering::SeqCst),
            )
            .finish()
    }
}

/// Restores the batch depth on every exit path; the deferred flush runs when
/// the outermost scope exits normally.
struct BatchGuard<'a> {
    runtime: &'a Runtime,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let depth = self.runtime.inner.batch_depth.fetch_sub(1, Ordering::SeqCst) - 1;
        if depth == 0 && !std::thread::panicking() {
            self.runtime.run_flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn runtimes_are_isolated() {
        let rt1 = Runtime::new();
        let rt2 = Runtime::new();

        let a = rt1.signal(0);
        let runs = Arc::new(AtomicI32::new(0));

        let runs2 = runs.clone();
        let a2 = a.clone();
        let _sub = rt1.effect(move || {
            a2.get();
            runs2.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // A write in an unrelated runtime flushes nothing here.
        let b = rt2.signal(0);
        b.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        a.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn queued_ids_deduplicate() {
        let rt = Runtime::new();
        let id = rt.next_subscriber_id();

        rt.enqueue(vec![id, id]);
        rt.enqueue(vec![id]);

        assert_eq!(rt.inner.pending.lock().len(), 1);
    }

    #[test]
    fn flush_skips_unsubscribed_ids() {
        let rt = Runtime::new();
        let runs = Arc::new(AtomicI32::new(0));

        let id = rt.next_subscriber_id();
        let runs2 = runs.clone();
        rt.register_subscriber(id, Arc::new(move || {
            runs2.fetch_add(1, Ordering::SeqCst);
        }));

        rt.enqueue(vec![id]);
        rt.remove_subscriber(id);
        rt.request_flush();

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_subscriber_does_not_starve_the_queue() {
        let rt = Runtime::new();
        let runs = Arc::new(AtomicI32::new(0));

        let bad = rt.next_subscriber_id();
        rt.register_subscriber(bad, Arc::new(|| panic!("broken subscriber")));

        let good = rt.next_subscriber_id();
        let runs2 = runs.clone();
        rt.register_subscriber(good, Arc::new(move || {
            runs2.fetch_add(1, Ordering::SeqCst);
        }));

        rt.enqueue(vec![bad, good]);
        let result = catch_unwind(AssertUnwindSafe(|| rt.request_flush()));

        // The panic surfaced to the caller, but only after the good
        // subscriber ran.
        assert!(result.is_err());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(rt.inner.pending.lock().len(), 0);
    }

    #[test]
    fn batch_defers_and_coalesces() {
        let rt = Runtime::new();
        let runs = Arc::new(AtomicI32::new(0));

        let id = rt.next_subscriber_id();
        let runs2 = runs.clone();
        rt.register_subscriber(id, Arc::new(move || {
            runs2.fetch_add(1, Ordering::SeqCst);
        }));

        rt.batch(|| {
            rt.enqueue(vec![id]);
            rt.request_flush();
            assert_eq!(runs.load(Ordering::SeqCst), 0);

            rt.enqueue(vec![id]);
            rt.request_flush();
        });

        // One flush, one run, at outermost exit.
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn batch_returns_the_closure_value() {
        let rt = Runtime::new();
        let out = rt.batch(|| 42);
        assert_eq!(out, 42);
    }
}
