//! Effect Implementation
//!
//! An Effect is a side-effecting computation that fully re-runs whenever any
//! signal or computed it read during its previous run changes.
//!
//! # How Effects Work
//!
//! 1. On creation, the effect runs its function immediately, once, with
//!    dependency tracking active. Every value read during the run joins the
//!    effect's wrapper identity to its subscriber set.
//!
//! 2. When a dependency changes, the flush engine re-runs the wrapper end to
//!    end, not incrementally. Before each tracked run the wrapper clears
//!    its previous registrations, so the dependency set is rebuilt from
//!    scratch every time. Values no longer read stop triggering the effect;
//!    newly read ones start.
//!
//! 3. The returned handle unsubscribes the effect: its identity leaves every
//!    subscriber set it joined and the effect becomes permanently inert.
//!    Unsubscription is idempotent, and dropping the handle does nothing;
//!    disposal is always explicit.
//!
//! # Differences from Computed
//!
//! - Computeds return a value; effects do not.
//! - Computeds are lazy (recompute on read); effects re-run eagerly when
//!   flushed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::runtime::Runtime;
use super::SubscriberId;

/// Unsubscribe handle for a running effect.
///
/// Created through [`Runtime::effect`]. Clones share the disposed flag.
///
/// ```rust
/// use pulse_core::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.signal(0);
///
/// let c = count.clone();
/// let sub = rt.effect(move || {
///     println!("count is {}", c.get());
/// });
///
/// count.set(5); // prints: "count is 5"
///
/// sub.unsubscribe();
/// count.set(10); // prints nothing
/// ```
pub struct Effect {
    runtime: Runtime,

    /// Wrapper identity used for all of this effect's registrations.
    id: SubscriberId,

    disposed: Arc<AtomicBool>,
}

impl Effect {
    pub(crate) fn new<F>(runtime: Runtime, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = runtime.next_subscriber_id();
        let disposed = Arc::new(AtomicBool::new(false));

        let wrapper: Arc<dyn Fn() + Send + Sync> = {
            let runtime = runtime.clone();
            let disposed = Arc::clone(&disposed);
            Arc::new(move || {
                if disposed.load(Ordering::SeqCst) {
                    return;
                }

                // Replace-on-each-run: drop the previous run's
                // registrations, then rebuild them during the tracked run.
                runtime.clear_registrations(id);
                let _guard = runtime.enter(id);
                f();
            })
        };

        runtime.register_subscriber(id, Arc::clone(&wrapper));

        // Initial run, immediate and exactly once.
        wrapper();

        Self {
            runtime,
            id,
            disposed,
        }
    }

    /// Permanently stop the effect.
    ///
    /// Removes the wrapper identity from every subscriber set it joined and
    /// clears its registry entry. Calling this more than once is a no-op;
    /// other subscribers of the same signals keep their positions and keep
    /// running.
    pub fn unsubscribe(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        debug!(subscriber = self.id.raw(), "effect unsubscribed");
        self.runtime.clear_registrations(self.id);
        self.runtime.remove_subscriber(self.id);
    }

    /// Whether [`unsubscribe`](Self::unsubscribe) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            id: self.id,
            disposed: Arc::clone(&self.disposed),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
