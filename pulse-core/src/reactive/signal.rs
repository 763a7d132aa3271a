//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a tracked evaluation (computed/effect),
//!    the reader joins the signal's subscriber set.
//!
//! 2. When a signal is written, every current subscriber is enqueued and a
//!    flush is requested. Writes always notify; there is no equality
//!    short-circuit, so writing the current value back still triggers a run.
//!
//! 3. `peek` reads the value without touching the tracking context and never
//!    registers a dependency.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::runtime::Runtime;
use super::SubscriberSet;

/// A reactive signal holding a value of type T.
///
/// Created through [`Runtime::signal`]. Clones share the same cell:
///
/// ```rust
/// use pulse_core::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.signal(0);
///
/// assert_eq!(count.get(), 0);
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    runtime: Runtime,

    /// The current value.
    value: Arc<RwLock<T>>,

    /// Subscribers that read this signal during their latest run, in join
    /// order.
    subscribers: Arc<SubscriberSet>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(runtime: Runtime, value: T) -> Self {
        Self {
            runtime,
            value: Arc::new(RwLock::new(value)),
            subscribers: Arc::new(SubscriberSet::new()),
        }
    }

    /// Get the current value.
    ///
    /// If a subscriber is currently evaluating, it joins this signal's
    /// subscriber set and the join is recorded for later reconciliation.
    pub fn get(&self) -> T {
        self.runtime.track_read(&self.subscribers);
        self.value.read().clone()
    }

    /// Get the current value without registering a dependency.
    ///
    /// Never consults the tracking context, so reading inside an effect does
    /// not make the effect react to this signal.
    pub fn peek(&self) -> T {
        self.value.read().clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// The store is unconditional and every subscriber currently in the set
    /// is enqueued, then a flush is requested. Outside a batch the flush
    /// completes before this call returns.
    pub fn set(&self, value: T) {
        {
            *self.value.write() = value;
        }

        // Snapshot before enqueuing: a run triggered by this write may
        // reshape the live set.
        let queued = self.subscribers.snapshot();
        trace!(subscribers = queued.len(), "signal write");

        self.runtime.enqueue(queued);
        self.runtime.request_flush();
    }

    /// Update the value using a function of the current value.
    ///
    /// Notifies exactly like [`set`](Self::set).
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.value.read();
            f(&guard)
        };
        self.set(new_value);
    }

    /// Number of subscribers currently attached to this signal.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            value: Arc::clone(&self.value),
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("value", &self.peek())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn signal_get_and_set() {
        let rt = Runtime::new();
        let signal = rt.signal(0);

        assert_eq!(signal.get(), 0);
        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let rt = Runtime::new();
        let signal = rt.signal(10);

        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_clone_shares_state() {
        let rt = Runtime::new();
        let signal1 = rt.signal(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let rt = Runtime::new();
        let signal = rt.signal(1);

        // No tracked evaluation is active, so neither read registers.
        signal.get();
        signal.peek();

        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn write_of_unchanged_value_still_notifies() {
        let rt = Runtime::new();
        let signal = rt.signal(7);
        let runs = Arc::new(AtomicI32::new(0));

        let runs2 = runs.clone();
        let s = signal.clone();
        let _sub = rt.effect(move || {
            s.get();
            runs2.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        signal.set(7);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn tracked_read_subscribes_once() {
        let rt = Runtime::new();
        let signal = rt.signal(1);

        let s = signal.clone();
        let _sub = rt.effect(move || {
            // Multiple reads in one run still produce a single entry.
            s.get();
            s.get();
        });

        assert_eq!(signal.subscriber_count(), 1);
    }
}
