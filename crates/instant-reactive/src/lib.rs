#![forbid(unsafe_code)]

//! Fine-grained reactive runtime for the Instant bindings.
//!
//! This crate provides the primitives the subscription adapters are built on:
//!
//! - [`Observable`]: a shared, version-tracked reactive cell with change
//!   notification via subscriber callbacks.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`Computed`]: a memoized value derived from one or more sources.
//! - [`Effect`]: a side effect that re-runs when its sources change.
//! - [`Scope`]: the ownership tree; disposing a scope runs its cleanups.
//! - [`Input`]: an adapter argument that is either fixed or reactive.
//! - [`Runtime`]: clock and timer queue, real or [`LabClock`]-driven.
//!
//! # Architecture
//!
//! Everything is single-threaded (`Rc<RefCell<..>>`). Dependencies are
//! declared explicitly: effects and computed values are handed the sources
//! they watch instead of discovering them through tracked reads. Callbacks
//! run with every internal borrow released, so they may freely read and
//! write other cells.

pub mod computed;
pub mod effect;
pub mod input;
pub mod observable;
pub mod runtime;
pub mod scope;
pub mod timer;

pub use computed::Computed;
pub use effect::Effect;
pub use input::{Input, sources};
pub use observable::{Observable, Subscription, Track};
pub use runtime::Runtime;
pub use scope::{Scope, WeakScope};
pub use timer::{Clock, LabClock, TimerId};

pub use web_time::{Duration, Instant};
