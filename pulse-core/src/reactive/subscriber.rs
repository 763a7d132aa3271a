//! Subscriber identity and subscriber sets.
//!
//! A subscriber is any computation that reacts to value changes: an effect's
//! wrapper or a computed's invalidation marker. Subscribers are referenced by
//! stable integer ids, never by callable identity; the runtime's arena maps
//! each id to its notification callback.

use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;

/// Unique identifier for a subscriber.
///
/// Allocated by the owning [`Runtime`](super::Runtime); ids are never reused
/// within a runtime. Signals and computeds store these ids in their
/// subscriber sets, and the pending queue holds them while a flush is owed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub(crate) fn raw(self) -> u64 {
        self.0
    }
}

/// Notification callback stored in the runtime's subscriber arena.
pub(crate) type NotifyFn = Arc<dyn Fn() + Send + Sync>;

/// The set of subscribers attached to one signal or computed.
///
/// Insertion order is significant: within a flush, subscribers of the same
/// value run in the order they first joined. Set semantics make duplicate
/// joins impossible.
pub(crate) struct SubscriberSet {
    entries: Mutex<IndexSet<SubscriberId>>,
}

impl SubscriberSet {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(IndexSet::new()),
        }
    }

    /// Add a subscriber. Returns false if it was already a member.
    pub(crate) fn insert(&self, id: SubscriberId) -> bool {
        self.entries.lock().insert(id)
    }

    /// Remove a subscriber, preserving the relative order of the remaining
    /// members. Removing a non-member is a no-op.
    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        self.entries.lock().shift_remove(&id)
    }

    /// Stable snapshot of the current membership, in insertion order.
    ///
    /// Callers iterate the snapshot rather than the live set, so a callback
    /// that joins or leaves mid-iteration cannot skip or double-visit
    /// co-subscribers.
    pub(crate) fn snapshot(&self) -> Vec<SubscriberId> {
        self.entries.lock().iter().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.entries.lock().contains(&id)
    }
}
