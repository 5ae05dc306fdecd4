#![forbid(unsafe_code)]

//! Shared, version-tracked reactive cells.
//!
//! [`Observable<T>`] is the "reactive cell" of the runtime: a value behind
//! `Rc<RefCell<..>>` with a version counter and a list of subscribers that
//! are told about every change. Subscribers are held as `Weak` callbacks; the
//! matching strong reference lives inside the [`Subscription`] guard, so
//! dropping the guard is all it takes to unsubscribe.
//!
//! # Invariants
//!
//! 1. `version` increments exactly once per `set` that changes the value.
//! 2. Setting a value equal to the current one is a no-op: no version bump
//!    and no notification.
//! 3. Subscribers are notified in registration order, with the lock released,
//!    so a callback may read or write the same observable.
//! 4. A subscriber whose guard was dropped is never called again.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = dyn Fn(&T);

struct ObservableInner<T> {
    value: T,
    version: u64,
    subscribers: Vec<Weak<Callback<T>>>,
}

/// A reactive cell holding a value of type `T`.
///
/// Cloning an `Observable` yields another handle to the **same** cell.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Default + Clone + PartialEq + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create a new cell holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone the current value out of the cell.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value without cloning.
    ///
    /// # Panics
    ///
    /// Panics if `f` writes to this same observable.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Replace the value, notifying subscribers if it changed.
    ///
    /// Returns `true` when the value was different and subscribers ran.
    pub fn set(&self, value: T) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return false;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
        true
    }

    /// Mutate a copy of the value in place and store it back.
    ///
    /// Follows the same change detection as [`set`](Self::set).
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut next = self.get();
        f(&mut next);
        self.set(next)
    }

    /// Number of changes applied since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Register `callback` to run after every change.
    ///
    /// The callback stays registered for as long as the returned guard lives.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let callback: Rc<Callback<T>> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&callback));
        Subscription::holding(callback)
    }

    /// Number of subscribers whose guards are still alive.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    fn notify(&self) {
        // Snapshot live callbacks and the value, then release the borrow so
        // callbacks are free to touch this cell again.
        let (snapshot, value) = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|weak| weak.strong_count() > 0);
            let live: Vec<Rc<Callback<T>>> =
                inner.subscribers.iter().filter_map(Weak::upgrade).collect();
            (live, inner.value.clone())
        };
        for callback in snapshot {
            callback(&value);
        }
    }
}

// ─── Subscription ────────────────────────────────────────────────────────────

/// RAII guard for a registered callback.
///
/// Dropping the guard removes the callback before the next notification.
pub struct Subscription {
    guard: Option<Box<dyn Any>>,
}

impl Subscription {
    pub(crate) fn holding<G: 'static>(guard: G) -> Self {
        Self {
            guard: Some(Box::new(guard)),
        }
    }

    /// A guard attached to nothing, used for static inputs.
    #[must_use]
    pub fn detached() -> Self {
        Self { guard: None }
    }

    /// Whether this guard keeps no callback alive.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.guard.is_none()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("detached", &self.is_detached())
            .finish()
    }
}

// ─── Track ───────────────────────────────────────────────────────────────────

/// A reactive source that can wake dependents when it changes.
///
/// Implemented by [`Observable`] and [`Computed`](crate::Computed); effects
/// and computed values take their dependencies as `&dyn Track`.
pub trait Track {
    /// Call `wake` after every change until the returned guard is dropped.
    fn watch(&self, wake: Rc<dyn Fn()>) -> Subscription;
}

impl<T: Clone + PartialEq + 'static> Track for Observable<T> {
    fn watch(&self, wake: Rc<dyn Fn()>) -> Subscription {
        self.subscribe(move |_| wake())
    }
}
