//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when one of
//! its dependencies has changed, and only when it is actually read.
//!
//! # How Computeds Work
//!
//! 1. Creation stores the compute function; nothing runs yet.
//!
//! 2. The first read evaluates the function with the tracking context set to
//!    the computed's invalidation marker, so every signal/computed read
//!    during evaluation registers that marker. The result is cached and the
//!    state becomes Clean.
//!
//! 3. When a dependency changes, the flush engine invokes the marker. It
//!    does not recompute: it flips the state to Dirty and enqueues the
//!    computed's own subscribers. Propagation is purely mark-and-relay.
//!
//! 4. A read in the Dirty state repeats the tracked evaluation from step 2,
//!    after clearing the marker's stale registrations, so run-to-run
//!    dependency changes are picked up.
//!
//! # Why This Matters
//!
//! A signal change can fan out to many computeds, but only the ones actually
//! read afterwards pay for recomputation. Computeds that nobody reads stay
//! dirty at zero cost.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::runtime::Runtime;
use super::{SubscriberId, SubscriberSet};

/// Observable state of a computed's cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// Never evaluated; the first read will run the compute function.
    Uninitialized,

    /// The cached value is authoritative.
    Clean,

    /// A dependency changed since the cache was filled; the next read
    /// recomputes.
    Dirty,
}

/// The cache slot. Dirty keeps the stale value around but never serves it.
enum CachedState<T> {
    Uninitialized,
    Clean(T),
    Dirty(T),
}

impl<T> CachedState<T> {
    fn tag(&self) -> ComputedState {
        match self {
            CachedState::Uninitialized => ComputedState::Uninitialized,
            CachedState::Clean(_) => ComputedState::Clean,
            CachedState::Dirty(_) => ComputedState::Dirty,
        }
    }
}

struct ComputedInner<T> {
    compute: Box<dyn Fn() -> T + Send + Sync>,
    cache: Mutex<CachedState<T>>,

    /// Effects and computeds that read this value during their latest run.
    subscribers: Arc<SubscriberSet>,
}

impl<T> ComputedInner<T> {
    /// Clean(v) → Dirty(v). Uninitialized and Dirty are unchanged.
    fn mark_dirty(&self) {
        let mut cache = self.cache.lock();
        let prev = std::mem::replace(&mut *cache, CachedState::Uninitialized);
        *cache = match prev {
            CachedState::Clean(value) | CachedState::Dirty(value) => CachedState::Dirty(value),
            CachedState::Uninitialized => CachedState::Uninitialized,
        };
    }
}

/// A lazily evaluated, memoized derived value.
///
/// Created through [`Runtime::computed`]. Read-only; clones share state and
/// identity.
///
/// ```rust
/// use pulse_core::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.signal(1);
///
/// let c = count.clone();
/// let double = rt.computed(move || c.get() * 2);
///
/// assert_eq!(double.get(), 2);
/// count.set(5);
/// assert_eq!(double.get(), 10);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    runtime: Runtime,

    /// The synthetic invalidation subscriber registered with every
    /// dependency read during evaluation.
    subscriber_id: SubscriberId,

    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new<F>(runtime: Runtime, compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let subscriber_id = runtime.next_subscriber_id();
        let inner = Arc::new(ComputedInner {
            compute: Box::new(compute),
            cache: Mutex::new(CachedState::Uninitialized),
            subscribers: Arc::new(SubscriberSet::new()),
        });

        // The invalidation marker: mark dirty, relay to our own subscribers.
        // It only ever runs from the flush engine, which drains whatever it
        // enqueues in the same pass, so no flush request is needed here.
        let weak = Arc::downgrade(&inner);
        let relay = runtime.clone();
        runtime.register_subscriber(
            subscriber_id,
            Arc::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                trace!("computed invalidated");
                inner.mark_dirty();
                relay.enqueue(inner.subscribers.snapshot());
            }),
        );

        Self {
            runtime,
            subscriber_id,
            inner,
        }
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// If a subscriber is currently evaluating, it joins this computed's own
    /// subscriber set. The compute function runs only when the state is not
    /// Clean, so between two dependency changes it executes at most once no
    /// matter how many times this is called.
    pub fn get(&self) -> T {
        self.runtime.track_read(&self.inner.subscribers);

        let cached = match &*self.inner.cache.lock() {
            CachedState::Clean(value) => Some(value.clone()),
            _ => None,
        };

        match cached {
            Some(value) => value,
            None => self.recompute(),
        }
    }

    /// Run the full dependency-tracked evaluation and cache the result.
    ///
    /// Identical for initialization and dirty re-reads: stale registrations
    /// of the invalidation marker are cleared first and fresh ones collected
    /// during the run, so the dependency set always reflects the latest
    /// evaluation.
    fn recompute(&self) -> T {
        trace!("computed recomputing");
        self.runtime.clear_registrations(self.subscriber_id);

        let value = {
            let _guard = self.runtime.enter(self.subscriber_id);
            (self.inner.compute)()
        };

        *self.inner.cache.lock() = CachedState::Clean(value.clone());
        value
    }

    /// Current cache state.
    pub fn state(&self) -> ComputedState {
        self.inner.cache.lock().tag()
    }

    /// Whether the computed has ever been evaluated. True in the Dirty state
    /// too; the stale value just isn't served.
    pub fn has_value(&self) -> bool {
        self.state() != ComputedState::Uninitialized
    }

    /// Number of subscribers currently attached to this computed.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            subscriber_id: self.subscriber_id,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("state", &self.state())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
