//! Tracking Context
//!
//! The tracking context records which subscriber is currently evaluating.
//! This enables automatic dependency discovery: when a signal or computed is
//! read, the value registers the active subscriber as a dependent.
//!
//! # Implementation
//!
//! The context is an explicit stack owned by the runtime. Entering a tracked
//! evaluation pushes the subscriber's id and returns a guard; dropping the
//! guard pops it. The stack supports arbitrary nesting (an effect invoking a
//! computed which reads other signals), and the guard restores the previous
//! frame on every exit path, including unwinds.

use std::sync::Arc;

use parking_lot::Mutex;

use super::SubscriberId;

/// The stack of currently evaluating subscribers. The top frame is the one
/// that reads register against.
pub(crate) struct TrackingStack {
    frames: Mutex<Vec<SubscriberId>>,
}

impl TrackingStack {
    pub(crate) fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
        }
    }

    /// The subscriber currently evaluating, if any.
    pub(crate) fn current(&self) -> Option<SubscriberId> {
        self.frames.lock().last().copied()
    }

    /// Push a frame for the given subscriber.
    ///
    /// The frame is popped when the returned guard is dropped.
    pub(crate) fn enter(self: &Arc<Self>, id: SubscriberId) -> TrackingGuard {
        self.frames.lock().push(id);
        TrackingGuard {
            stack: Arc::clone(self),
            id,
        }
    }
}

/// Guard that pops the tracking frame when dropped.
pub(crate) struct TrackingGuard {
    stack: Arc<TrackingStack>,
    id: SubscriberId,
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        let popped = self.stack.frames.lock().pop();

        // Catch mismatched enter/exit pairs early.
        if let Some(frame) = popped {
            debug_assert_eq!(
                frame, self.id,
                "tracking frame mismatch: expected {:?}, got {:?}",
                self.id, frame
            );
        }
    }
}
