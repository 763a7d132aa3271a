//! Pulse Core
//!
//! This crate provides the core reactive runtime for the Pulse UI framework.
//! It implements:
//!
//! - Reactive primitives (signals, computeds, effects)
//! - Automatic dependency tracking
//! - Transactional batching with a synchronous flush engine
//!
//! The engine lets components subscribe directly to the state they read, so a
//! host framework can re-render exactly the parts of the UI that depend on a
//! changed value instead of diffing a virtual tree.
//!
//! # Architecture
//!
//! Everything lives in the `reactive` module:
//!
//! - `runtime`: the explicit graph owner (subscriber arena, dependency
//!   registry, pending queue, flush engine, batch controller)
//! - `signal` / `computed` / `effect`: the three reactive primitives
//! - `context`: the tracking stack that makes dependency discovery automatic
//!
//! # Example
//!
//! ```rust
//! use pulse_core::Runtime;
//!
//! let rt = Runtime::new();
//!
//! // Create a signal
//! let count = rt.signal(0);
//!
//! // Create a derived value
//! let c = count.clone();
//! let doubled = rt.computed(move || c.get() * 2);
//!
//! // Create an effect
//! let c = count.clone();
//! let d = doubled.clone();
//! let _sub = rt.effect(move || {
//!     let doubled = d.get();
//!     let count = c.get();
//!     println!("Count: {count}, Doubled: {doubled}");
//! });
//!
//! // Update the signal
//! count.set(5);
//! // Effect automatically re-runs, prints: "Count: 5, Doubled: 10"
//! ```

pub mod reactive;

pub use reactive::{Computed, ComputedState, Effect, Runtime, Signal, SubscriberId};
