//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computeds, and
//! effects, coordinated by an explicit [`Runtime`].
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a computed or effect), the signal
//! automatically registers that context as a subscriber. When the signal's
//! value is written, all subscribers are notified. Notification is
//! unconditional: writing a value equal to the old one still triggers it.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. It is lazy: the
//! compute function never runs before the first read, and between two
//! dependency changes it runs at most once no matter how often the value is
//! read. When a dependency changes, the computed is only marked dirty and the
//! notification is relayed to its own subscribers; recomputation waits for
//! the next read.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that fully re-runs whenever any
//! value it read during its previous run changes. Effects are used to
//! synchronize reactive state with external systems, such as re-rendering a
//! component or logging.
//!
//! ## Batching
//!
//! [`Runtime::batch`] defers flushing until the outermost batch scope exits,
//! so a burst of writes produces a single notification pass.
//!
//! # Implementation Notes
//!
//! The runtime owns a tracking stack that records which subscriber is
//! currently evaluating. When a signal or computed is read, the top of the
//! stack joins that value's subscriber set. Writes enqueue subscriber ids
//! into a pending queue that the flush engine drains to exhaustion within
//! the call stack of the triggering write (or batch exit). There is no
//! deferred or asynchronous scheduling.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod computed;
mod context;
mod effect;
mod runtime;
mod signal;
mod subscriber;

pub use computed::{Computed, ComputedState};
pub use effect::Effect;
pub use runtime::Runtime;
pub use signal::Signal;
pub use subscriber::SubscriberId;

pub(crate) use subscriber::{NotifyFn, SubscriberSet};
